//! Property system for Trellis.
//!
//! A [`Property<T>`] wraps a value, detects real changes, and notifies
//! through its [`changed`](Property::changed) signal. A property can also
//! follow another property through a one-way binding, which is how a cell
//! fragment's `editing` flag tracks the edit state of whichever cell
//! currently hosts it.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use trellis_core::Property;
//!
//! let source = Arc::new(Property::new(false));
//! let follower = Arc::new(Property::new(false));
//!
//! follower.bind(&source);
//! source.set(true);
//! assert!(follower.get());
//!
//! follower.unbind();
//! source.set(false);
//! assert!(follower.get());
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::logging::targets;
use crate::signal::{ConnectionGuard, Signal};

/// A reactive property that tracks changes.
///
/// `set()` compares the new value with the current one and only stores and
/// emits [`changed`](Self::changed) when they differ. The signal is emitted
/// after the internal lock is released, so slots may read the property.
pub struct Property<T: 'static> {
    value: RwLock<T>,
    changed: Arc<Signal<T>>,
    binding: Mutex<Option<ConnectionGuard<T>>>,
}

impl<T: Clone + Send + Sync + 'static> Property<T> {
    /// Create a new property with an initial value.
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
            changed: Arc::new(Signal::new()),
            binding: Mutex::new(None),
        }
    }

    /// Get the current value.
    ///
    /// This clones the value. For large types, consider using `with()` instead.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Access the value through a closure without cloning.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.value.read())
    }

    /// Set the value without change notification.
    pub fn set_silent(&self, value: T) {
        *self.value.write() = value;
    }

    /// The signal emitted with the new value after every real change.
    pub fn changed(&self) -> &Arc<Signal<T>> {
        &self.changed
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Property<T> {
    /// Set the value, returning `true` if the value changed.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self.value.write();
            if *current == value {
                return false;
            }
            *current = value.clone();
        }
        self.changed.emit(value);
        true
    }

    /// Set the value, returning the old value if it changed.
    pub fn replace(&self, value: T) -> Option<T> {
        let old = {
            let mut current = self.value.write();
            if *current == value {
                return None;
            }
            std::mem::replace(&mut *current, value.clone())
        };
        self.changed.emit(value);
        Some(old)
    }

    /// Make this property follow `source`.
    ///
    /// Any previous binding is released first, so calling `bind` repeatedly
    /// never accumulates listeners on old sources. The current source value
    /// is copied immediately.
    pub fn bind(self: &Arc<Self>, source: &Arc<Property<T>>) {
        let target = Arc::downgrade(self);
        let guard = source.changed.connect_scoped(move |value: &T| {
            if let Some(target) = target.upgrade() {
                target.set(value.clone());
            }
        });

        let previous = self.binding.lock().replace(guard);
        if previous.is_some() {
            tracing::trace!(target: targets::PROPERTY, "replacing existing property binding");
        }
        drop(previous);
        self.set(source.get());
    }

    /// Release the binding, if any. The current value is kept.
    ///
    /// Calling this on an unbound property does nothing.
    pub fn unbind(&self) {
        let previous = self.binding.lock().take();
        drop(previous);
    }

    /// Returns `true` while the property follows a source.
    pub fn is_bound(&self) -> bool {
        self.binding.lock().is_some()
    }
}

impl<T: Clone + Default + Send + Sync + 'static> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + fmt::Debug + Send + Sync + 'static> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("value", &self.get())
            .field("bound", &self.binding.lock().is_some())
            .finish()
    }
}

static_assertions::assert_impl_all!(Property<bool>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_property_set_detects_change() {
        let prop = Property::new(10);

        assert!(!prop.set(10));
        assert_eq!(prop.get(), 10);

        assert!(prop.set(20));
        assert_eq!(prop.get(), 20);
    }

    #[test]
    fn test_property_changed_signal() {
        let prop = Property::new(String::new());
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_clone = hits.clone();
        prop.changed().connect(move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        prop.set("a".to_string());
        prop.set("a".to_string());
        prop.set_silent("b".to_string());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(prop.get(), "b");
    }

    #[test]
    fn test_property_replace() {
        let prop = Property::new("hello".to_string());

        assert!(prop.replace("hello".to_string()).is_none());
        assert_eq!(prop.replace("world".to_string()), Some("hello".to_string()));
        assert_eq!(prop.get(), "world");
    }

    #[test]
    fn test_property_with_closure() {
        let prop = Property::new(vec![1, 2, 3]);
        let sum: i32 = prop.with(|v| v.iter().sum());
        assert_eq!(sum, 6);
    }

    #[test]
    fn test_bind_follows_source() {
        let source = Arc::new(Property::new(1));
        let follower = Arc::new(Property::new(0));

        follower.bind(&source);
        assert_eq!(follower.get(), 1);
        assert!(follower.is_bound());

        source.set(5);
        assert_eq!(follower.get(), 5);
    }

    #[test]
    fn test_rebind_releases_previous_source() {
        let first = Arc::new(Property::new(false));
        let second = Arc::new(Property::new(false));
        let follower = Arc::new(Property::new(false));

        follower.bind(&first);
        follower.bind(&second);
        assert_eq!(first.changed().connection_count(), 0);
        assert_eq!(second.changed().connection_count(), 1);

        first.set(true);
        assert!(!follower.get());
        second.set(true);
        assert!(follower.get());
    }

    #[test]
    fn test_unbind_is_idempotent() {
        let source = Arc::new(Property::new(1));
        let follower = Arc::new(Property::new(0));

        follower.bind(&source);
        follower.unbind();
        follower.unbind();
        assert!(!follower.is_bound());
        assert_eq!(source.changed().connection_count(), 0);

        source.set(9);
        assert_eq!(follower.get(), 1);
    }

    #[test]
    fn test_dropped_follower_does_not_break_source() {
        let source = Arc::new(Property::new(1));
        {
            let follower = Arc::new(Property::new(0));
            follower.bind(&source);
        }
        assert_eq!(source.changed().connection_count(), 0);
        assert!(source.set(2));
    }
}
