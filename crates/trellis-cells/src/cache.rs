//! Value-keyed cache of constructed nodes.
//!
//! One [`RenderCache`] belongs to a column or view and is shared by all of
//! its slots. The first time a value is shown, the construction callback
//! builds a node for it; every later slot showing an equal value gets the
//! same node instance back.
//!
//! By default the cache never evicts, so its size grows with the number of
//! distinct values ever displayed. Views over unbounded or streaming data
//! should set [`RenderCacheConfig::max_entries`].

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use trellis_core::logging::targets;

use crate::node::NodeRef;

/// Configuration for a [`RenderCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderCacheConfig {
    /// Upper bound on cached entries. `None` keeps every entry for the
    /// cache's lifetime. When the bound is reached, the oldest half of the
    /// entries is dropped before the next insertion.
    pub max_entries: Option<usize>,
}

impl RenderCacheConfig {
    /// A cache that never evicts.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Set the entry bound using builder pattern.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries.max(1));
        self
    }
}

/// Read access to a render cache for a controller.
///
/// Controllers work over any item type, while only hashable items can key
/// a [`RenderCache`]; this trait is the seam between the two.
pub trait CellCacheLookup<T>: Send + Sync {
    /// Return the node for `item`, constructing it on first use.
    fn get_or_create(&self, item: &T) -> NodeRef;
}

type NodeFactory<T> = Box<dyn Fn(&T) -> NodeRef + Send + Sync>;

struct Entries<T> {
    nodes: HashMap<T, NodeRef>,
    order: VecDeque<T>,
}

/// A cache mapping item values to constructed nodes.
pub struct RenderCache<T> {
    entries: Mutex<Entries<T>>,
    factory: NodeFactory<T>,
    config: RenderCacheConfig,
    constructed: AtomicUsize,
}

impl<T> RenderCache<T>
where
    T: Eq + Hash + Clone + Send + Sync + 'static,
{
    /// Create an unbounded cache with the given construction callback.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&T) -> NodeRef + Send + Sync + 'static,
    {
        Self::with_config(RenderCacheConfig::default(), factory)
    }

    /// Create a cache with explicit configuration.
    pub fn with_config<F>(config: RenderCacheConfig, factory: F) -> Self
    where
        F: Fn(&T) -> NodeRef + Send + Sync + 'static,
    {
        Self {
            entries: Mutex::new(Entries {
                nodes: HashMap::new(),
                order: VecDeque::new(),
            }),
            factory: Box::new(factory),
            config,
            constructed: AtomicUsize::new(0),
        }
    }

    /// Return the cached node for `item`, constructing it if absent.
    ///
    /// The construction callback runs while the cache is locked, so two
    /// slots asking for the same value never build two nodes. The callback
    /// must not call back into this cache.
    pub fn get_or_create(&self, item: &T) -> NodeRef {
        let mut entries = self.entries.lock();
        if let Some(node) = entries.nodes.get(item) {
            return node.clone();
        }

        if let Some(max) = self.config.max_entries
            && entries.nodes.len() >= max
        {
            Self::evict_half(&mut entries);
        }

        let node = (self.factory)(item);
        self.constructed.fetch_add(1, Ordering::Relaxed);
        entries.nodes.insert(item.clone(), node.clone());
        entries.order.push_back(item.clone());
        tracing::trace!(
            target: targets::CACHE,
            entries = entries.nodes.len(),
            "constructed render cache entry"
        );
        node
    }

    /// Get a cached node without constructing one.
    pub fn get(&self, item: &T) -> Option<NodeRef> {
        self.entries.lock().nodes.get(item).cloned()
    }

    /// Returns `true` if a node is cached for `item`.
    pub fn contains(&self, item: &T) -> bool {
        self.entries.lock().nodes.contains_key(item)
    }

    /// Drop the entry for `item`, if any.
    pub fn invalidate(&self, item: &T) -> bool {
        let mut entries = self.entries.lock();
        let removed = entries.nodes.remove(item).is_some();
        if removed {
            entries.order.retain(|key| key != item);
        }
        removed
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.nodes.clear();
        entries.order.clear();
    }

    /// Get the number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.lock().nodes.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().nodes.is_empty()
    }

    /// Total number of construction callback invocations.
    pub fn constructed_count(&self) -> usize {
        self.constructed.load(Ordering::Relaxed)
    }

    /// The cache configuration.
    pub fn config(&self) -> RenderCacheConfig {
        self.config
    }

    // Simple eviction: drop the oldest half.
    fn evict_half(entries: &mut Entries<T>) {
        let target = entries.nodes.len().div_ceil(2);
        for _ in 0..target {
            match entries.order.pop_front() {
                Some(key) => {
                    entries.nodes.remove(&key);
                }
                None => break,
            }
        }
        tracing::debug!(
            target: targets::CACHE,
            evicted = target,
            remaining = entries.nodes.len(),
            "render cache full, evicted oldest entries"
        );
    }
}

impl<T> CellCacheLookup<T> for RenderCache<T>
where
    T: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn get_or_create(&self, item: &T) -> NodeRef {
        RenderCache::get_or_create(self, item)
    }
}

impl<T> fmt::Debug for RenderCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderCache")
            .field("entries", &self.entries.lock().nodes.len())
            .field("config", &self.config)
            .field("constructed", &self.constructed.load(Ordering::Relaxed))
            .finish()
    }
}

static_assertions::assert_impl_all!(RenderCache<String>: Send, Sync);
