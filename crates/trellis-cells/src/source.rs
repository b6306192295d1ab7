//! Backing collections seen by cell controllers.
//!
//! Controllers never own data. They read the row and value at their
//! current index from an [`ItemSource`] and write committed values back
//! through it, so the write is visible to everything else observing the
//! collection.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use trellis_core::logging::targets;
use trellis_core::{Property, Signal};

use crate::error::{CellError, Result};

/// A change to an observable collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListChange {
    /// `count` items were inserted at `index`.
    Inserted { index: usize, count: usize },
    /// `count` items were removed at `index`.
    Removed { index: usize, count: usize },
    /// The item at `index` was replaced or modified.
    Updated { index: usize },
    /// The whole collection changed.
    Reset,
}

/// The collection behind a virtualized view.
///
/// `R` is the row type and `T` the value a cell shows. For lists both are
/// the item type; for table columns `T` is one field of the row.
pub trait ItemSource<R, T>: Send + Sync {
    /// Number of items.
    fn len(&self) -> usize;

    /// Returns `true` if there are no items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The row at `index`.
    fn row(&self, index: usize) -> Option<R>;

    /// The cell value at `index`.
    fn value(&self, index: usize) -> Option<T>;

    /// Store a committed value at `index`.
    fn write_back(&self, index: usize, value: T) -> Result<()>;

    /// Signal emitted when the collection changes, if it is observable.
    fn changed(&self) -> Option<Arc<Signal<ListChange>>> {
        None
    }
}

/// A vector that reports its changes.
pub struct ObservableList<T: 'static> {
    items: RwLock<Vec<T>>,
    changed: Arc<Signal<ListChange>>,
}

impl<T: Clone + Send + Sync + 'static> ObservableList<T> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Create a list holding `items`.
    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            items: RwLock::new(items),
            changed: Arc::new(Signal::new()),
        }
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Returns `true` if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// A clone of the item at `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        self.items.read().get(index).cloned()
    }

    /// Access the items without cloning.
    pub fn with<F, O>(&self, f: F) -> O
    where
        F: FnOnce(&[T]) -> O,
    {
        f(&self.items.read())
    }

    /// A clone of every item.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.read().clone()
    }

    /// Append an item.
    pub fn push(&self, item: T) {
        let index = {
            let mut items = self.items.write();
            items.push(item);
            items.len() - 1
        };
        self.changed.emit(ListChange::Inserted { index, count: 1 });
    }

    /// Insert an item at `index`.
    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        {
            let mut items = self.items.write();
            if index > items.len() {
                return Err(CellError::IndexOutOfBounds {
                    index,
                    len: items.len(),
                });
            }
            items.insert(index, item);
        }
        self.changed.emit(ListChange::Inserted { index, count: 1 });
        Ok(())
    }

    /// Remove and return the item at `index`.
    pub fn remove(&self, index: usize) -> Result<T> {
        let removed = {
            let mut items = self.items.write();
            if index >= items.len() {
                return Err(CellError::IndexOutOfBounds {
                    index,
                    len: items.len(),
                });
            }
            items.remove(index)
        };
        self.changed.emit(ListChange::Removed { index, count: 1 });
        Ok(removed)
    }

    /// Replace the item at `index`, returning the old one.
    pub fn set(&self, index: usize, item: T) -> Result<T> {
        let old = {
            let mut items = self.items.write();
            let len = items.len();
            let slot = items
                .get_mut(index)
                .ok_or(CellError::IndexOutOfBounds { index, len })?;
            std::mem::replace(slot, item)
        };
        self.changed.emit(ListChange::Updated { index });
        Ok(old)
    }

    /// Modify the item at `index` in place.
    pub fn update<F>(&self, index: usize, f: F) -> Result<()>
    where
        F: FnOnce(&mut T),
    {
        {
            let mut items = self.items.write();
            let len = items.len();
            let slot = items
                .get_mut(index)
                .ok_or(CellError::IndexOutOfBounds { index, len })?;
            f(slot);
        }
        self.changed.emit(ListChange::Updated { index });
        Ok(())
    }

    /// Replace every item.
    pub fn replace_all(&self, items: Vec<T>) {
        *self.items.write() = items;
        self.changed.emit(ListChange::Reset);
    }

    /// Emitted after every change, with the lock released.
    pub fn changed(&self) -> &Arc<Signal<ListChange>> {
        &self.changed
    }
}

impl<T: Clone + Send + Sync + 'static> Default for ObservableList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> From<Vec<T>> for ObservableList<T> {
    fn from(items: Vec<T>) -> Self {
        Self::from_vec(items)
    }
}

impl<T: Clone + fmt::Debug + Send + Sync + 'static> fmt::Debug for ObservableList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.read().iter()).finish()
    }
}

impl<T: Clone + Send + Sync + 'static> ItemSource<T, T> for ObservableList<T> {
    fn len(&self) -> usize {
        ObservableList::len(self)
    }

    fn row(&self, index: usize) -> Option<T> {
        self.get(index)
    }

    fn value(&self, index: usize) -> Option<T> {
        self.get(index)
    }

    fn write_back(&self, index: usize, value: T) -> Result<()> {
        self.set(index, value).map(drop)
    }

    fn changed(&self) -> Option<Arc<Signal<ListChange>>> {
        Some(self.changed.clone())
    }
}

type Getter<R, T> = Arc<dyn Fn(&R) -> T + Send + Sync>;
type Setter<R, T> = Arc<dyn Fn(&mut R, T) + Send + Sync>;

/// One field of the rows of an [`ObservableList`].
pub struct ColumnSource<R: 'static, T> {
    name: String,
    rows: Arc<ObservableList<R>>,
    getter: Getter<R, T>,
    setter: Option<Setter<R, T>>,
}

impl<R: Clone + Send + Sync + 'static, T> ColumnSource<R, T> {
    /// Create a read-only column.
    pub fn new<G>(name: impl Into<String>, rows: Arc<ObservableList<R>>, getter: G) -> Self
    where
        G: Fn(&R) -> T + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            rows,
            getter: Arc::new(getter),
            setter: None,
        }
    }

    /// Make the column writable using builder pattern.
    pub fn with_setter<S>(mut self, setter: S) -> Self
    where
        S: Fn(&mut R, T) + Send + Sync + 'static,
    {
        self.setter = Some(Arc::new(setter));
        self
    }

    /// The column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if committed values can be written back.
    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    /// The rows this column projects.
    pub fn rows(&self) -> &Arc<ObservableList<R>> {
        &self.rows
    }
}

impl<R, T> ItemSource<R, T> for ColumnSource<R, T>
where
    R: Clone + Send + Sync + 'static,
    T: Send + Sync,
{
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn row(&self, index: usize) -> Option<R> {
        self.rows.get(index)
    }

    fn value(&self, index: usize) -> Option<T> {
        self.rows.with(|rows| rows.get(index).map(|row| (self.getter)(row)))
    }

    fn write_back(&self, index: usize, value: T) -> Result<()> {
        let setter = self.setter.as_ref().ok_or_else(|| CellError::ReadOnly {
            column: self.name.clone(),
        })?;
        self.rows.update(index, |row| setter(row, value))
    }

    fn changed(&self) -> Option<Arc<Signal<ListChange>>> {
        Some(self.rows.changed().clone())
    }
}

impl<R: 'static, T> fmt::Debug for ColumnSource<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnSource")
            .field("name", &self.name)
            .field("writable", &self.setter.is_some())
            .finish()
    }
}

/// A node of a hierarchical collection.
pub struct TreeItem<T: 'static> {
    value: RwLock<T>,
    expanded: Property<bool>,
    children: RwLock<Vec<Arc<TreeItem<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> TreeItem<T> {
    /// Create a collapsed leaf.
    pub fn new(value: T) -> Arc<Self> {
        Arc::new(Self {
            value: RwLock::new(value),
            expanded: Property::new(false),
            children: RwLock::new(Vec::new()),
        })
    }

    /// A clone of the value.
    pub fn value(&self) -> T {
        self.value.read().clone()
    }

    /// Replace the value.
    pub fn set_value(&self, value: T) {
        *self.value.write() = value;
    }

    /// Returns `true` if the children are visible.
    pub fn is_expanded(&self) -> bool {
        self.expanded.get()
    }

    /// Show or hide the children.
    pub fn set_expanded(&self, expanded: bool) {
        self.expanded.set(expanded);
    }

    /// The expansion property.
    pub fn expanded(&self) -> &Property<bool> {
        &self.expanded
    }

    /// The direct children.
    pub fn children(&self) -> Vec<Arc<TreeItem<T>>> {
        self.children.read().clone()
    }

    /// Returns `true` if the item has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.read().is_empty()
    }

    /// Append a child holding `value` and return it.
    pub fn add_child(&self, value: T) -> Arc<TreeItem<T>> {
        let child = TreeItem::new(value);
        self.children.write().push(child.clone());
        child
    }

    /// Expand this item and its descendants down to `depth` levels.
    ///
    /// A depth of zero does nothing; one expands only this item.
    pub fn expand_to(&self, depth: usize) {
        if depth == 0 {
            return;
        }
        self.set_expanded(true);
        for child in self.children() {
            child.expand_to(depth - 1);
        }
    }

    /// Expand this item and every descendant.
    pub fn expand_all(&self) {
        self.expand_to(usize::MAX);
    }

    /// Collapse this item and every descendant.
    pub fn collapse_all(&self) {
        self.set_expanded(false);
        for child in self.children() {
            child.collapse_all();
        }
    }

    /// Build the subtree below this item.
    ///
    /// `child_factory` returns the child values of a value, or `None` for
    /// a leaf. It is applied recursively to every created child.
    pub fn populate<F>(&self, child_factory: F)
    where
        F: Fn(&T) -> Option<Vec<T>>,
    {
        self.populate_with(&child_factory);
    }

    fn populate_with(&self, child_factory: &dyn Fn(&T) -> Option<Vec<T>>) {
        let Some(values) = child_factory(&self.value()) else {
            return;
        };
        for value in values {
            let child = self.add_child(value);
            child.populate_with(child_factory);
        }
    }

    /// Number of items in this subtree, including this one.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children
            .read()
            .iter()
            .map(|child| child.subtree_len())
            .sum::<usize>()
    }

    fn collect_visible(self: &Arc<Self>, out: &mut Vec<Arc<TreeItem<T>>>) {
        out.push(self.clone());
        if self.is_expanded() {
            for child in self.children() {
                child.collect_visible(out);
            }
        }
    }
}

impl<T: Clone + fmt::Debug + Send + Sync + 'static> fmt::Debug for TreeItem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeItem")
            .field("value", &self.value())
            .field("expanded", &self.is_expanded())
            .field("children", &self.children.read().len())
            .finish()
    }
}

/// The visible rows of a tree, in depth-first order.
///
/// Collapsed items hide their descendants. The flattened rows are cached;
/// call [`structure_changed`](Self::structure_changed) after expanding,
/// collapsing or adding children to rebuild them and refresh views.
pub struct TreeSource<T: 'static> {
    root: Arc<TreeItem<T>>,
    show_root: bool,
    rows: RwLock<Option<Vec<Arc<TreeItem<T>>>>>,
    changed: Arc<Signal<ListChange>>,
}

impl<T: Clone + Send + Sync + 'static> TreeSource<T> {
    /// Create a source showing `root` and its expanded descendants.
    pub fn new(root: Arc<TreeItem<T>>) -> Self {
        Self {
            root,
            show_root: true,
            rows: RwLock::new(None),
            changed: Arc::new(Signal::new()),
        }
    }

    /// Hide the root item using builder pattern.
    pub fn with_show_root(mut self, show_root: bool) -> Self {
        self.show_root = show_root;
        *self.rows.get_mut() = None;
        self
    }

    /// The root item.
    pub fn root(&self) -> &Arc<TreeItem<T>> {
        &self.root
    }

    /// The visible items.
    pub fn visible(&self) -> Vec<Arc<TreeItem<T>>> {
        self.with_rows(<[_]>::to_vec)
    }

    /// The visible item at `index`.
    pub fn node(&self, index: usize) -> Option<Arc<TreeItem<T>>> {
        self.with_rows(|rows| rows.get(index).cloned())
    }

    /// Announce that expansion or children changed.
    ///
    /// Drops the cached rows; they are rebuilt on the next read.
    pub fn structure_changed(&self) {
        *self.rows.write() = None;
        tracing::trace!(target: targets::FLOW, "tree structure changed");
        self.changed.emit(ListChange::Reset);
    }

    fn with_rows<U>(&self, f: impl FnOnce(&[Arc<TreeItem<T>>]) -> U) -> U {
        if let Some(rows) = self.rows.read().as_deref() {
            return f(rows);
        }
        let mut rows = self.rows.write();
        f(rows.get_or_insert_with(|| self.flatten()))
    }

    fn flatten(&self) -> Vec<Arc<TreeItem<T>>> {
        let mut out = Vec::new();
        if self.show_root {
            self.root.collect_visible(&mut out);
        } else {
            for child in self.root.children() {
                child.collect_visible(&mut out);
            }
        }
        tracing::trace!(target: targets::FLOW, rows = out.len(), "tree rows flattened");
        out
    }
}

impl<T: Clone + Send + Sync + 'static> ItemSource<T, T> for TreeSource<T> {
    fn len(&self) -> usize {
        self.with_rows(<[_]>::len)
    }

    fn row(&self, index: usize) -> Option<T> {
        self.node(index).map(|node| node.value())
    }

    fn value(&self, index: usize) -> Option<T> {
        self.node(index).map(|node| node.value())
    }

    fn write_back(&self, index: usize, value: T) -> Result<()> {
        let node = self.node(index).ok_or_else(|| CellError::IndexOutOfBounds {
            index,
            len: self.len(),
        })?;
        node.set_value(value);
        self.changed.emit(ListChange::Updated { index });
        Ok(())
    }

    fn changed(&self) -> Option<Arc<Signal<ListChange>>> {
        Some(self.changed.clone())
    }
}

static_assertions::assert_impl_all!(ObservableList<String>: Send, Sync);
static_assertions::assert_impl_all!(TreeItem<String>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Person {
        name: String,
        age: u32,
    }

    fn people() -> Arc<ObservableList<Person>> {
        Arc::new(ObservableList::from_vec(vec![
            Person {
                name: "Ada".into(),
                age: 36,
            },
            Person {
                name: "Alan".into(),
                age: 41,
            },
        ]))
    }

    #[test]
    fn test_list_emits_changes() {
        let list = ObservableList::from_vec(vec![1, 2]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        list.changed().connect(move |change| seen_clone.lock().push(*change));

        list.push(3);
        list.insert(0, 0).unwrap();
        list.set(1, 10).unwrap();
        list.remove(3).unwrap();
        list.replace_all(vec![5]);

        assert_eq!(
            seen.lock().as_slice(),
            [
                ListChange::Inserted { index: 2, count: 1 },
                ListChange::Inserted { index: 0, count: 1 },
                ListChange::Updated { index: 1 },
                ListChange::Removed { index: 3, count: 1 },
                ListChange::Reset,
            ]
        );
        assert_eq!(list.snapshot(), vec![5]);
    }

    #[test]
    fn test_list_bounds() {
        let list = ObservableList::from_vec(vec![1]);
        assert_eq!(
            list.set(4, 0).unwrap_err(),
            CellError::IndexOutOfBounds { index: 4, len: 1 }
        );
        assert!(list.insert(2, 0).is_err());
        assert!(list.remove(1).is_err());
        assert!(ItemSource::write_back(&list, 0, 9).is_ok());
        assert_eq!(list.get(0), Some(9));
    }

    #[test]
    fn test_column_projection_and_write_back() {
        let rows = people();
        let ages = ColumnSource::new("age", rows.clone(), |p: &Person| p.age)
            .with_setter(|p: &mut Person, age| p.age = age);

        assert_eq!(ages.len(), 2);
        assert_eq!(ages.value(1), Some(41));
        assert_eq!(ages.row(0).map(|p| p.name), Some("Ada".to_string()));

        ages.write_back(0, 37).unwrap();
        assert_eq!(rows.get(0).unwrap().age, 37);
    }

    #[test]
    fn test_read_only_column_rejects_write() {
        let names = ColumnSource::new("name", people(), |p: &Person| p.name.clone());
        assert!(!names.is_writable());
        assert_eq!(
            names.write_back(0, "Grace".into()).unwrap_err(),
            CellError::ReadOnly {
                column: "name".into()
            }
        );
    }

    fn sample_tree() -> Arc<TreeItem<String>> {
        let root = TreeItem::new("root".to_string());
        root.populate(|value| match value.as_str() {
            "root" => Some(vec!["a".into(), "b".into()]),
            "a" => Some(vec!["a1".into(), "a2".into()]),
            _ => None,
        });
        root
    }

    #[test]
    fn test_populate_builds_subtree() {
        let root = sample_tree();
        assert_eq!(root.subtree_len(), 5);
        assert!(root.children()[1].is_leaf());
    }

    #[test]
    fn test_expand_to_depth() {
        let root = sample_tree();
        root.expand_to(1);
        assert!(root.is_expanded());
        assert!(!root.children()[0].is_expanded());

        let source = TreeSource::new(root.clone());
        assert_eq!(source.len(), 3);

        root.expand_all();
        source.structure_changed();
        assert_eq!(source.len(), 5);
        assert_eq!(source.value(2), Some("a1".to_string()));

        root.collapse_all();
        source.structure_changed();
        assert!(!root.children()[0].is_expanded());
        assert_eq!(source.len(), 1);
    }

    #[test]
    fn test_tree_rows_cached_until_structure_changes() {
        let root = sample_tree();
        root.expand_to(1);
        let source = TreeSource::new(root.clone());
        let resets = Arc::new(Mutex::new(0));
        let resets_clone = resets.clone();
        source.changed.connect(move |change| {
            if *change == ListChange::Reset {
                *resets_clone.lock() += 1;
            }
        });

        let first = source.node(1).unwrap();
        root.children()[0].set_expanded(true);
        assert_eq!(source.len(), 3);
        assert!(Arc::ptr_eq(&source.node(1).unwrap(), &first));

        source.write_back(1, "a*".into()).unwrap();
        assert_eq!(source.row(1), Some("a*".to_string()));
        assert!(Arc::ptr_eq(&source.node(1).unwrap(), &first));

        source.structure_changed();
        assert_eq!(*resets.lock(), 1);
        assert_eq!(source.len(), 5);
        assert_eq!(source.value(2), Some("a1".to_string()));
        assert!(Arc::ptr_eq(&source.node(1).unwrap(), &first));
    }

    #[test]
    fn test_tree_source_hidden_root_and_write_back() {
        let root = sample_tree();
        root.expand_all();
        let source = TreeSource::new(root).with_show_root(false);
        assert_eq!(source.len(), 4);
        assert_eq!(source.value(0), Some("a".to_string()));

        source.write_back(3, "b!".into()).unwrap();
        assert_eq!(source.value(3), Some("b!".to_string()));
        assert!(source.write_back(9, "x".into()).is_err());
    }
}
