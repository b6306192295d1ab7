//! Virtualized cell recycling, render caching and in-place editing.
//!
//! Item views (lists, trees, table columns) show thousands of rows through a
//! handful of visual slots. This crate provides the per-slot machinery:
//!
//! - **Cell controllers**: rebind a slot to whatever item it now shows,
//!   restore its style baseline when it is detached, and run the
//!   `Idle -> Editing -> Idle` edit state machine
//! - **Render cache**: build one visual node per distinct value and share
//!   it across slots
//! - **Fragments**: long-lived sub-views created once per slot and rebound
//!   on every item change
//! - **Edit delegates**: text, dropdown, choice-list and toggle editors with
//!   typed converters
//! - **Host collaborators**: observable backing sources, injection scopes
//!   and a headless virtualization loop
//!
//! # Fragment Example
//!
//! ```
//! use std::sync::Arc;
//! use trellis_cells::{
//!     CellFragment, FragmentBindings, FragmentType, Label, ListView, NodeRef, ObservableList,
//!     Result, Scope,
//! };
//!
//! struct Badge {
//!     label: Arc<Label>,
//! }
//!
//! impl CellFragment<String, String> for Badge {
//!     fn root(&self) -> NodeRef {
//!         self.label.clone()
//!     }
//! }
//!
//! impl FragmentType<String, String> for Badge {
//!     fn create(_scope: &Scope, bindings: &FragmentBindings<String, String>) -> Result<Self> {
//!         let label = Label::new("").into_node();
//!         let target = label.clone();
//!         bindings.item.changed().connect(move |item| {
//!             target.text.set(item.clone().unwrap_or_default());
//!         });
//!         Ok(Badge { label })
//!     }
//! }
//!
//! let items = Arc::new(ObservableList::from_vec(vec!["new".to_string()]));
//! let mut list = ListView::new(items);
//! list.cells().cell_fragment::<Badge>();
//!
//! let mut cell = list.cell_factory().create();
//! cell.on_position_changed(Some(0));
//! cell.on_item_updated(Some("new".to_string()), false)?;
//! assert!(cell.fragment().is_some_and(|f| f.is_bound()));
//! # Ok::<(), trellis_cells::CellError>(())
//! ```
//!
//! # Editing Example
//!
//! ```
//! use std::sync::Arc;
//! use trellis_cells::{EditDelegate, InputEvent, Key, ListView, ObservableList};
//!
//! let items = Arc::new(ObservableList::from_vec(vec![5]));
//! let mut list = ListView::new(items.clone());
//! list.cells().cell_editor(EditDelegate::text()?);
//!
//! let mut cell = list.cell_factory().create();
//! cell.on_position_changed(Some(0));
//! cell.on_item_updated(items.get(0), false)?;
//!
//! assert!(cell.start_edit());
//! cell.handle_input(InputEvent::TextChanged("9".into()))?;
//! cell.handle_input(InputEvent::Key(Key::Enter))?;
//! assert_eq!(items.get(0), Some(9));
//! assert_eq!(cell.surface().text(), Some("9"));
//! # Ok::<(), trellis_cells::CellError>(())
//! ```

pub mod binding;
pub mod cache;
pub mod config;
pub mod controller;
pub mod converter;
pub mod delegate;
pub mod editor;
mod error;
pub mod flow;
pub mod fragment;
pub mod node;
pub mod scope;
pub mod source;
pub mod surface;

pub use binding::{CellFactory, ListView, TableColumn, TableView, TreeView, ViewBinding};
pub use cache::{CellCacheLookup, RenderCache, RenderCacheConfig};
pub use config::{CellConfig, EditEvent, EditSupport, FlowConfig, Formatter};
pub use controller::{CellController, EditState};
pub use converter::{
    BoolConverter, ChronoConverter, ConverterRegistry, FnConverter, FromStrConverter,
    InstantConverter, Number, ParseError, SharedConverter, StringConverter, TextConverter,
    builtin_converters, default_converter_for,
};
pub use delegate::{EditDelegate, ToggleAdapter, ToggleValue};
pub use editor::{
    ChoiceList, Dropdown, EditRequest, Editor, EditorKind, InputEvent, Key, PopupSkin,
    RequestQueue, TextInput,
};
pub use error::{CellError, Result};
pub use flow::VirtualFlow;
pub use fragment::{
    CellFragment, FragmentBindings, FragmentFactory, FragmentSlot, FragmentType, SlotId,
    fragment_factory,
};
pub use node::{Label, NodeRef, SceneNode, same_node};
pub use scope::Scope;
pub use source::{ColumnSource, ItemSource, ListChange, ObservableList, TreeItem, TreeSource};
pub use surface::{CellSurface, Graphic, StyleBaseline};
