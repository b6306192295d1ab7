//! Registration surface for item views.
//!
//! Each view (list, tree, table column) owns one [`ViewBinding`]. Application
//! code registers formatting, caching, fragments and editing on it; the host
//! virtualization loop then asks the binding for a [`CellFactory`] and calls
//! it once per visual slot it creates.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use trellis_cells::{EditDelegate, ListView, ObservableList};
//!
//! let items = Arc::new(ObservableList::from_vec(vec![1, 2, 3]));
//! let mut list = ListView::new(items);
//! list.cells()
//!     .cell_format(|cell, n: &i32| cell.set_text(format!("#{n}")))
//!     .cell_editor(EditDelegate::text().unwrap());
//!
//! let factory = list.cell_factory();
//! let cell = factory.create();
//! assert!(cell.surface().has_style_class("list-cell"));
//! ```

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use trellis_core::ErrorHandler;

use crate::cache::{RenderCache, RenderCacheConfig};
use crate::config::{CellConfig, EditEvent, FlowConfig};
use crate::controller::CellController;
use crate::converter::SharedConverter;
use crate::delegate::EditDelegate;
use crate::editor::EditorKind;
use crate::error::Result;
use crate::flow::VirtualFlow;
use crate::fragment::{FragmentType, SlotId, fragment_factory};
use crate::node::NodeRef;
use crate::scope::Scope;
use crate::source::{ColumnSource, ItemSource, ObservableList, TreeItem, TreeSource};
use crate::surface::{CellSurface, StyleBaseline};

/// Style classes every slot carries before any binding.
pub const BASE_STYLE_CLASSES: [&str; 2] = ["cell", "indexed-cell"];

// =========================================================================
// ViewBinding
// =========================================================================

/// Cell configuration, injection scope and backing source of one view.
pub struct ViewBinding<R: 'static, T: 'static> {
    config: CellConfig<R, T>,
    scope: Scope,
    source: Arc<dyn ItemSource<R, T>>,
}

impl<R, T> ViewBinding<R, T>
where
    R: Clone + PartialEq + Send + Sync + 'static,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a binding over `source`; `view_class` joins the baseline
    /// style classes.
    pub fn new(source: Arc<dyn ItemSource<R, T>>, view_class: &str) -> Self {
        let baseline = StyleBaseline::new(BASE_STYLE_CLASSES.into_iter().chain([view_class]));
        Self {
            config: CellConfig::new().with_baseline(baseline),
            scope: Scope::default_scope(),
            source,
        }
    }

    /// Resolve fragments in `scope` instead of the default scope.
    pub fn set_scope(&mut self, scope: Scope) -> &mut Self {
        self.scope = scope;
        self
    }

    /// The scope fragments are resolved in.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// The backing source.
    pub fn source(&self) -> &Arc<dyn ItemSource<R, T>> {
        &self.source
    }

    /// The configuration registered so far.
    pub fn config(&self) -> &CellConfig<R, T> {
        &self.config
    }

    fn update(&mut self, f: impl FnOnce(CellConfig<R, T>) -> CellConfig<R, T>) -> &mut Self {
        self.config = f(std::mem::take(&mut self.config));
        self
    }

    /// Register the formatter. Marks the view non-editable.
    pub fn cell_format<F>(&mut self, formatter: F) -> &mut Self
    where
        F: Fn(&mut CellSurface, &T) + Send + Sync + 'static,
    {
        self.update(|config| config.with_formatter(formatter).with_editable(false))
    }

    /// Add a formatting step after the current formatter.
    pub fn cell_decorator<F>(&mut self, decorator: F) -> &mut Self
    where
        F: Fn(&mut CellSurface, &T) + Send + Sync + 'static,
    {
        self.update(|config| config.with_decorator(decorator))
    }

    /// Format every cell as `converter.format(item)`.
    pub fn converter(&mut self, converter: SharedConverter<T>) -> &mut Self {
        self.cell_format(move |cell, item| cell.set_text(converter.format(item)))
    }

    /// Register a render cache built by `factory`, shared by every slot of
    /// the view.
    pub fn cell_cache<F>(&mut self, factory: F) -> &mut Self
    where
        T: Eq + Hash,
        F: Fn(&T) -> NodeRef + Send + Sync + 'static,
    {
        self.cell_cache_with_config(RenderCacheConfig::default(), factory)
    }

    /// Register a render cache with explicit configuration.
    pub fn cell_cache_with_config<F>(
        &mut self,
        cache_config: RenderCacheConfig,
        factory: F,
    ) -> &mut Self
    where
        T: Eq + Hash,
        F: Fn(&T) -> NodeRef + Send + Sync + 'static,
    {
        let cache = Arc::new(RenderCache::with_config(cache_config, factory));
        self.update(|config| config.with_cache(cache))
    }

    /// Register a fragment type, resolved once per slot in the view's scope.
    pub fn cell_fragment<F>(&mut self) -> &mut Self
    where
        F: FragmentType<R, T>,
    {
        let factory = fragment_factory::<F, R, T>();
        self.update(|config| config.with_fragment(factory))
    }

    /// Register an edit delegate. Marks the view editable.
    pub fn cell_editor(&mut self, delegate: EditDelegate<T>) -> &mut Self {
        self.update(|config| config.with_delegate(delegate).with_editable(true))
    }

    /// Register an edit delegate by kind, using the default converter.
    ///
    /// # Errors
    ///
    /// Fails for kinds with no construction path or when no default
    /// converter exists for `T`.
    pub fn cell_edit(&mut self, kind: EditorKind, choices: Vec<T>) -> Result<&mut Self> {
        let delegate = EditDelegate::from_kind(kind, choices)?;
        Ok(self.cell_editor(delegate))
    }

    /// Register the edit-support callback.
    pub fn edit_support<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&mut CellSurface, EditEvent, Option<&T>) + Send + Sync + 'static,
    {
        self.update(|config| config.with_edit_support(callback))
    }

    /// Freeze the current registration into a factory.
    ///
    /// Slots created by one factory share a single configuration and cache.
    pub fn cell_factory(&self) -> CellFactory<R, T> {
        CellFactory {
            config: Arc::new(self.config.clone()),
            scope: self.scope.clone(),
            source: self.source.clone(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl<R: 'static, T: 'static> fmt::Debug for ViewBinding<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewBinding")
            .field("config", &self.config)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

// =========================================================================
// CellFactory
// =========================================================================

/// Creates controllers for the host loop.
pub struct CellFactory<R: 'static, T: 'static> {
    config: Arc<CellConfig<R, T>>,
    scope: Scope,
    source: Arc<dyn ItemSource<R, T>>,
    next_id: Arc<AtomicU64>,
}

impl<R, T> CellFactory<R, T>
where
    R: Clone + PartialEq + Send + Sync + 'static,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a detached controller for a new visual slot.
    pub fn create(&self) -> CellController<R, T> {
        let id = SlotId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::trace!(target: trellis_core::logging::targets::CELL, slot = %id, "slot created");
        CellController::new(id, self.config.clone(), self.scope.clone(), self.source.clone())
    }

    /// Number of controllers created so far.
    pub fn created_count(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed) - 1
    }

    /// The shared configuration.
    pub fn config(&self) -> &Arc<CellConfig<R, T>> {
        &self.config
    }

    /// The backing source.
    pub fn source(&self) -> &Arc<dyn ItemSource<R, T>> {
        &self.source
    }
}

impl<R: 'static, T: 'static> Clone for CellFactory<R, T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            scope: self.scope.clone(),
            source: self.source.clone(),
            next_id: self.next_id.clone(),
        }
    }
}

impl<R: 'static, T: 'static> fmt::Debug for CellFactory<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellFactory")
            .field("config", &self.config)
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

// =========================================================================
// Views
// =========================================================================

/// A flat list of items.
pub struct ListView<T: 'static> {
    items: Arc<ObservableList<T>>,
    binding: ViewBinding<T, T>,
}

impl<T> ListView<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a list view over `items`.
    pub fn new(items: Arc<ObservableList<T>>) -> Self {
        let binding = ViewBinding::new(items.clone(), "list-cell");
        Self { items, binding }
    }

    /// The backing list.
    pub fn items(&self) -> &Arc<ObservableList<T>> {
        &self.items
    }

    /// Cell registration.
    pub fn cells(&mut self) -> &mut ViewBinding<T, T> {
        &mut self.binding
    }

    /// The factory for this view's slots.
    pub fn cell_factory(&self) -> CellFactory<T, T> {
        self.binding.cell_factory()
    }

    /// Build a virtualization loop over this view.
    pub fn flow(&self, config: FlowConfig, errors: Arc<ErrorHandler>) -> VirtualFlow<T, T> {
        VirtualFlow::new(self.cell_factory(), config, errors)
    }
}

/// A hierarchy of items, flattened to its expanded rows.
pub struct TreeView<T: 'static> {
    source: Arc<TreeSource<T>>,
    binding: ViewBinding<T, T>,
}

impl<T> TreeView<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a tree view showing `root` and its expanded descendants.
    pub fn new(root: Arc<TreeItem<T>>) -> Self {
        Self::from_source(TreeSource::new(root))
    }

    /// Create a tree view over a configured source.
    pub fn from_source(source: TreeSource<T>) -> Self {
        let source = Arc::new(source);
        let binding = ViewBinding::new(source.clone(), "tree-cell");
        Self { source, binding }
    }

    /// The root item.
    pub fn root(&self) -> &Arc<TreeItem<T>> {
        self.source.root()
    }

    /// The flattened source.
    pub fn source(&self) -> &Arc<TreeSource<T>> {
        &self.source
    }

    /// Expand the first `depth` levels below the root.
    pub fn expand_to(&self, depth: usize) {
        self.source.root().expand_to(depth);
        self.source.structure_changed();
    }

    /// Expand every item.
    pub fn expand_all(&self) {
        self.source.root().expand_all();
        self.source.structure_changed();
    }

    /// Collapse every item.
    pub fn collapse_all(&self) {
        self.source.root().collapse_all();
        self.source.structure_changed();
    }

    /// Grow the tree from the root using `child_factory`.
    ///
    /// The factory returns the children of a value, or `None` for a leaf.
    pub fn populate<F>(&self, child_factory: F)
    where
        F: Fn(&T) -> Option<Vec<T>>,
    {
        self.source.root().populate(child_factory);
        self.source.structure_changed();
    }

    /// Cell registration.
    pub fn cells(&mut self) -> &mut ViewBinding<T, T> {
        &mut self.binding
    }

    /// The factory for this view's slots.
    pub fn cell_factory(&self) -> CellFactory<T, T> {
        self.binding.cell_factory()
    }

    /// Build a virtualization loop over this view.
    pub fn flow(&self, config: FlowConfig, errors: Arc<ErrorHandler>) -> VirtualFlow<T, T> {
        VirtualFlow::new(self.cell_factory(), config, errors)
    }
}

/// Rows of a table; cells are configured per column.
pub struct TableView<R: 'static> {
    rows: Arc<ObservableList<R>>,
}

impl<R> TableView<R>
where
    R: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a table over `rows`.
    pub fn new(rows: Arc<ObservableList<R>>) -> Self {
        Self { rows }
    }

    /// The backing rows.
    pub fn rows(&self) -> &Arc<ObservableList<R>> {
        &self.rows
    }

    /// Create a read-only column.
    pub fn column<T, G>(&self, name: impl Into<String>, getter: G) -> TableColumn<R, T>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
        G: Fn(&R) -> T + Send + Sync + 'static,
    {
        TableColumn::from_source(ColumnSource::new(name, self.rows.clone(), getter))
    }

    /// Create a column whose commits are written through `setter`.
    pub fn editable_column<T, G, S>(
        &self,
        name: impl Into<String>,
        getter: G,
        setter: S,
    ) -> TableColumn<R, T>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
        G: Fn(&R) -> T + Send + Sync + 'static,
        S: Fn(&mut R, T) + Send + Sync + 'static,
    {
        let source = ColumnSource::new(name, self.rows.clone(), getter).with_setter(setter);
        TableColumn::from_source(source)
    }
}

/// One column of a [`TableView`].
pub struct TableColumn<R: 'static, T: 'static> {
    source: Arc<ColumnSource<R, T>>,
    binding: ViewBinding<R, T>,
}

impl<R, T> TableColumn<R, T>
where
    R: Clone + PartialEq + Send + Sync + 'static,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn from_source(source: ColumnSource<R, T>) -> Self {
        let source = Arc::new(source);
        let binding = ViewBinding::new(source.clone(), "table-cell");
        Self { source, binding }
    }

    /// The column title.
    pub fn name(&self) -> &str {
        self.source.name()
    }

    /// The column projection.
    pub fn source(&self) -> &Arc<ColumnSource<R, T>> {
        &self.source
    }

    /// Cell registration.
    pub fn cells(&mut self) -> &mut ViewBinding<R, T> {
        &mut self.binding
    }

    /// The factory for this column's slots.
    pub fn cell_factory(&self) -> CellFactory<R, T> {
        self.binding.cell_factory()
    }

    /// Build a virtualization loop over this column.
    pub fn flow(&self, config: FlowConfig, errors: Arc<ErrorHandler>) -> VirtualFlow<R, T> {
        VirtualFlow::new(self.cell_factory(), config, errors)
    }
}
