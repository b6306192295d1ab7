//! Reusable sub-views bound to whichever item occupies a slot.
//!
//! A cell fragment is created at most once per slot, the first time the
//! slot receives an item, and is rebound on every later item change. The
//! fragment sees its current item through [`FragmentBindings`], a set of
//! observable properties that the owning slot keeps up to date:
//!
//! - `item`: the column value shown by the slot, `None` while detached
//! - `row`: the full row the value belongs to
//! - `editing`: follows the slot's edit state while bound
//! - `cell`: the [`SlotId`] of the hosting slot, cleared on detach
//!
//! # Example
//!
//! ```
//! use trellis_cells::{
//!     CellFragment, FragmentBindings, FragmentType, Label, NodeRef, Result, Scope,
//! };
//! use std::sync::Arc;
//!
//! struct PriceTag {
//!     label: Arc<Label>,
//! }
//!
//! impl CellFragment<String, u32> for PriceTag {
//!     fn root(&self) -> NodeRef {
//!         self.label.clone()
//!     }
//! }
//!
//! impl FragmentType<String, u32> for PriceTag {
//!     fn create(_scope: &Scope, bindings: &FragmentBindings<String, u32>) -> Result<Self> {
//!         let label = Label::new("").into_node();
//!         let target = label.clone();
//!         bindings.item.changed().connect(move |price| {
//!             target.text.set(price.map(|p| format!("${p}")).unwrap_or_default());
//!         });
//!         Ok(Self { label })
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use trellis_core::Property;
use trellis_core::logging::targets;

use crate::error::{CellError, Result};
use crate::node::NodeRef;
use crate::scope::Scope;

/// Stable identity of a cell slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u64);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}

/// A sub-view hosted by a cell.
///
/// The edit hooks default to doing nothing. The owning slot calls them on
/// every edit transition whether or not they are overridden.
pub trait CellFragment<R, T>: Send + Sync {
    /// The node the slot shows while this fragment is bound.
    fn root(&self) -> NodeRef;

    /// The hosting slot entered editing.
    fn start_edit(&self) {}

    /// The hosting slot committed `value`.
    fn commit_edit(&self, _value: &T) {}

    /// The hosting slot discarded its edit.
    fn cancel_edit(&self) {}
}

/// A fragment type that can be resolved in a [`Scope`].
pub trait FragmentType<R, T>: CellFragment<R, T> + Sized + 'static {
    /// Build a new instance wired to `bindings`.
    fn create(scope: &Scope, bindings: &FragmentBindings<R, T>) -> Result<Self>;
}

/// Builds a fragment instance for a slot.
pub type FragmentFactory<R, T> = Arc<
    dyn Fn(&Scope, &FragmentBindings<R, T>) -> Result<Box<dyn CellFragment<R, T>>> + Send + Sync,
>;

/// Create a factory resolving fragment type `F`.
pub fn fragment_factory<F, R, T>() -> FragmentFactory<R, T>
where
    F: FragmentType<R, T>,
    R: Clone + PartialEq + Send + Sync + 'static,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    Arc::new(|scope, bindings| {
        let fragment = scope.find_fragment::<F, R, T>(bindings)?;
        Ok(Box::new(fragment) as Box<dyn CellFragment<R, T>>)
    })
}

/// Observable state a fragment reads.
pub struct FragmentBindings<R: 'static, T: 'static> {
    /// The current column value.
    pub item: Arc<Property<Option<T>>>,
    /// The row the current value belongs to.
    pub row: Arc<Property<Option<R>>>,
    /// Whether the hosting slot is editing.
    pub editing: Arc<Property<bool>>,
    /// The hosting slot.
    pub cell: Arc<Property<Option<SlotId>>>,
}

impl<R, T> FragmentBindings<R, T>
where
    R: Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Create unbound bindings.
    pub fn new() -> Self {
        Self {
            item: Arc::new(Property::new(None)),
            row: Arc::new(Property::new(None)),
            editing: Arc::new(Property::new(false)),
            cell: Arc::new(Property::new(None)),
        }
    }
}

impl<R, T> Default for FragmentBindings<R, T>
where
    R: Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R: 'static, T: 'static> Clone for FragmentBindings<R, T> {
    fn clone(&self) -> Self {
        Self {
            item: self.item.clone(),
            row: self.row.clone(),
            editing: self.editing.clone(),
            cell: self.cell.clone(),
        }
    }
}

/// A fragment instance together with its bindings.
pub struct FragmentSlot<R: 'static, T: 'static> {
    fragment: Box<dyn CellFragment<R, T>>,
    bindings: FragmentBindings<R, T>,
    bound: bool,
}

impl<R, T> FragmentSlot<R, T>
where
    R: Clone + PartialEq + Send + Sync + 'static,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Resolve a fragment through `factory` and wrap it.
    pub fn create(factory: &FragmentFactory<R, T>, scope: &Scope) -> Result<Self> {
        let bindings = FragmentBindings::new();
        let fragment = factory(scope, &bindings)?;
        Ok(Self {
            fragment,
            bindings,
            bound: false,
        })
    }

    /// Wrap an already constructed fragment.
    pub fn from_fragment(
        fragment: Box<dyn CellFragment<R, T>>,
        bindings: FragmentBindings<R, T>,
    ) -> Self {
        Self {
            fragment,
            bindings,
            bound: false,
        }
    }

    /// Attach the fragment to a slot showing `item`.
    ///
    /// # Errors
    ///
    /// [`CellError::RecyclingSequence`] if the fragment is still bound.
    ///
    /// # Panics
    ///
    /// In debug builds, binding a bound fragment panics instead.
    pub fn bind(
        &mut self,
        item: T,
        row: Option<R>,
        owner: SlotId,
        editing: &Arc<Property<bool>>,
    ) -> Result<()> {
        if self.bound {
            let err = CellError::RecyclingSequence {
                message: format!(
                    "fragment bound to {owner} while still bound to {:?}",
                    self.bindings.cell.get()
                ),
            };
            tracing::error!(target: targets::FRAGMENT, error = %err, "recycling sequence violated");
            debug_assert!(!self.bound, "{err}");
            return Err(err);
        }

        self.bindings.editing.bind(editing);
        self.bindings.row.set(row);
        self.bindings.item.set(Some(item));
        self.bindings.cell.set(Some(owner));
        self.bound = true;
        tracing::trace!(target: targets::FRAGMENT, %owner, "fragment bound");
        Ok(())
    }

    /// Detach the fragment from its slot.
    ///
    /// Clears item, row and slot, releases the editing binding and forces
    /// editing off. Calling this on an unbound fragment does nothing.
    pub fn unbind(&mut self) {
        if !self.bound {
            return;
        }
        self.bindings.cell.set(None);
        self.bindings.item.set(None);
        self.bindings.row.set(None);
        self.bindings.editing.unbind();
        self.bindings.editing.set(false);
        self.bound = false;
        tracing::trace!(target: targets::FRAGMENT, "fragment unbound");
    }

    /// Unbind if needed, then bind to the new item.
    pub fn rebind(
        &mut self,
        item: T,
        row: Option<R>,
        owner: SlotId,
        editing: &Arc<Property<bool>>,
    ) -> Result<()> {
        self.unbind();
        self.bind(item, row, owner, editing)
    }

    /// Replace the item shown while staying bound.
    pub fn set_item(&self, item: T) {
        self.bindings.item.set(Some(item));
    }

    /// Returns `true` while attached to a slot.
    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// The fragment's root node.
    pub fn root(&self) -> NodeRef {
        self.fragment.root()
    }

    /// The observable state the fragment reads.
    pub fn bindings(&self) -> &FragmentBindings<R, T> {
        &self.bindings
    }

    pub(crate) fn start_edit(&self) {
        self.fragment.start_edit();
    }

    pub(crate) fn commit_edit(&self, value: &T) {
        self.fragment.commit_edit(value);
    }

    pub(crate) fn cancel_edit(&self) {
        self.fragment.cancel_edit();
    }
}

impl<R: 'static, T: 'static> fmt::Debug for FragmentSlot<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragmentSlot")
            .field("bound", &self.bound)
            .field("root", &self.fragment.root().node_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Label;
    use parking_lot::Mutex;

    struct NameTag {
        label: Arc<Label>,
        events: Arc<Mutex<Vec<String>>>,
    }

    impl CellFragment<String, i32> for NameTag {
        fn root(&self) -> NodeRef {
            self.label.clone()
        }

        fn commit_edit(&self, value: &i32) {
            self.events.lock().push(format!("commit {value}"));
        }
    }

    impl FragmentType<String, i32> for NameTag {
        fn create(scope: &Scope, bindings: &FragmentBindings<String, i32>) -> Result<Self> {
            let events = scope.require::<Mutex<Vec<String>>>()?;
            let label = Label::new("").into_node();
            let target = label.clone();
            bindings.item.changed().connect(move |item| {
                target
                    .text
                    .set(item.map(|v| v.to_string()).unwrap_or_default());
            });
            Ok(Self { label, events })
        }
    }

    fn name_tag_slot() -> (FragmentSlot<String, i32>, Arc<Mutex<Vec<String>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let scope = Scope::new();
        scope.insert(events.clone());
        let slot = FragmentSlot::create(&fragment_factory::<NameTag, _, _>(), &scope).unwrap();
        (slot, events)
    }

    #[test]
    fn test_bind_sets_bindings() {
        let (mut slot, _) = name_tag_slot();
        let editing = Arc::new(Property::new(false));

        slot.bind(7, Some("row".into()), SlotId(3), &editing).unwrap();
        let bindings = slot.bindings().clone();
        assert_eq!(bindings.item.get(), Some(7));
        assert_eq!(bindings.row.get().as_deref(), Some("row"));
        assert_eq!(bindings.cell.get(), Some(SlotId(3)));

        editing.set(true);
        assert!(bindings.editing.get());

        let root = slot.root();
        let label = root.as_any().downcast_ref::<Label>().unwrap();
        assert_eq!(label.text.get(), "7");
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "still bound"))]
    fn test_double_bind_is_rejected() {
        let (mut slot, _) = name_tag_slot();
        let editing = Arc::new(Property::new(false));
        slot.bind(1, None, SlotId(1), &editing).unwrap();

        let err = slot.bind(2, None, SlotId(2), &editing).unwrap_err();
        assert!(matches!(err, CellError::RecyclingSequence { .. }));
        assert_eq!(slot.bindings().item.get(), Some(1));
    }

    #[test]
    fn test_rebind_replaces_binding() {
        let (mut slot, _) = name_tag_slot();
        let editing = Arc::new(Property::new(false));
        slot.bind(1, None, SlotId(1), &editing).unwrap();

        slot.rebind(2, None, SlotId(2), &editing).unwrap();
        assert_eq!(slot.bindings().item.get(), Some(2));
        assert_eq!(editing.changed().connection_count(), 1);
    }

    #[test]
    fn test_unbind_clears_and_is_idempotent() {
        let (mut slot, _) = name_tag_slot();
        let editing = Arc::new(Property::new(true));
        slot.bind(5, Some("r".into()), SlotId(9), &editing).unwrap();
        assert!(slot.bindings().editing.get());

        slot.unbind();
        slot.unbind();
        let bindings = slot.bindings();
        assert_eq!(bindings.item.get(), None);
        assert_eq!(bindings.row.get(), None);
        assert_eq!(bindings.cell.get(), None);
        assert!(!bindings.editing.get());
        assert!(!bindings.editing.is_bound());
        assert_eq!(editing.changed().connection_count(), 0);
    }

    #[test]
    fn test_missing_component_fails_resolution() {
        let factory = fragment_factory::<NameTag, _, _>();
        let err = FragmentSlot::<String, i32>::create(&factory, &Scope::new()).unwrap_err();
        assert!(matches!(err, CellError::FragmentResolution { .. }));
    }

    #[test]
    fn test_edit_hooks_forwarded() {
        let (slot, events) = name_tag_slot();
        slot.start_edit();
        slot.commit_edit(&4);
        slot.cancel_edit();
        assert_eq!(events.lock().as_slice(), ["commit 4"]);
    }
}
