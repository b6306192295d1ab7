//! Injection scopes for fragment resolution.
//!
//! A [`Scope`] groups the shared components a fragment may need (models,
//! services, settings) and is the context in which fragment types are
//! resolved. Cloning a scope is cheap and yields a handle to the same
//! component set.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use trellis_core::logging::targets;

use crate::error::{CellError, Result};
use crate::fragment::{FragmentBindings, FragmentType};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

struct ScopeInner {
    id: u64,
    components: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

/// A set of shared components, keyed by type.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
                components: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// The process-wide default scope.
    pub fn default_scope() -> Scope {
        static DEFAULT: OnceLock<Scope> = OnceLock::new();
        DEFAULT.get_or_init(Scope::new).clone()
    }

    /// Unique id of this scope.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Register a component, replacing any previous one of the same type.
    pub fn insert<C: Any + Send + Sync>(&self, component: Arc<C>) {
        self.inner
            .components
            .write()
            .insert(TypeId::of::<C>(), component);
    }

    /// Set a component using builder pattern.
    pub fn with<C: Any + Send + Sync>(self, component: C) -> Self {
        self.insert(Arc::new(component));
        self
    }

    /// Get a component by type.
    pub fn get<C: Any + Send + Sync>(&self) -> Option<Arc<C>> {
        let component = self.inner.components.read().get(&TypeId::of::<C>())?.clone();
        component.downcast::<C>().ok()
    }

    /// Get a component by type, failing if it was never registered.
    pub fn require<C: Any + Send + Sync>(&self) -> Result<Arc<C>> {
        self.get::<C>().ok_or_else(|| {
            CellError::fragment_resolution::<C>(format!(
                "component is not registered in scope {}",
                self.id()
            ))
        })
    }

    /// Returns `true` if a component of type `C` is registered.
    pub fn contains<C: Any + Send + Sync>(&self) -> bool {
        self.inner
            .components
            .read()
            .contains_key(&TypeId::of::<C>())
    }

    /// Resolve a new fragment instance of type `F` in this scope.
    ///
    /// Every call creates a fresh instance wired to `bindings`.
    pub fn find_fragment<F, R, T>(&self, bindings: &FragmentBindings<R, T>) -> Result<F>
    where
        F: FragmentType<R, T>,
        R: Clone + PartialEq + Send + Sync + 'static,
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        let fragment = F::create(self, bindings).inspect_err(|err| {
            tracing::error!(
                target: targets::FRAGMENT,
                fragment = std::any::type_name::<F>(),
                scope = self.id(),
                error = %err,
                "fragment resolution failed"
            );
        })?;
        tracing::trace!(
            target: targets::FRAGMENT,
            fragment = std::any::type_name::<F>(),
            scope = self.id(),
            "resolved fragment"
        );
        Ok(fragment)
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Scope {}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("components", &self.inner.components.read().len())
            .finish()
    }
}

static_assertions::assert_impl_all!(Scope: Send, Sync);
