//! The per-slot recycling unit.
//!
//! A [`CellController`] drives one visual slot of a virtualized view. The
//! host loop tells it which position it now shows
//! ([`on_position_changed`](CellController::on_position_changed)) and which
//! item sits there ([`on_item_updated`](CellController::on_item_updated)).
//! On each update the controller:
//!
//! 1. shows the render-cache node for the item, if a cache is registered;
//! 2. on the very first update only, resolves the fragment and snapshots
//!    the baseline style classes;
//! 3. rebinds the fragment to the new item and shows its root;
//! 4. runs the formatter, which may override everything above.
//!
//! When the slot loses its item it is *detached*: text, graphic and inline
//! style are cleared, style classes go back to the baseline, the fragment
//! is unbound and any edit in progress is dropped without a commit.
//!
//! # Edit state machine
//!
//! ```text
//!            start_edit                commit_edit(v) / cancel_edit
//!   Idle ───────────────▶ Editing ─────────────────────────────────▶ Idle
//!    ▲                       │
//!    └───────── detach ──────┘   (abandoned, nothing written)
//! ```

use std::fmt;
use std::sync::Arc;

use trellis_core::Property;
use trellis_core::logging::{span_names, targets};

use crate::config::{CellConfig, EditEvent};
use crate::editor::{EditRequest, Editor, InputEvent, RequestQueue};
use crate::error::{CellError, Result};
use crate::fragment::{FragmentSlot, SlotId};
use crate::scope::Scope;
use crate::source::ItemSource;
use crate::surface::{CellSurface, Graphic, StyleBaseline};

/// Edit state of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditState {
    #[default]
    Idle,
    Editing,
}

/// The transient part of an edit: the input widget and its request queue.
///
/// Toggle edits have no widget.
struct EditSession<T: 'static> {
    editor: Option<Editor<T>>,
    requests: RequestQueue,
}

/// Controller for one recyclable cell slot.
pub struct CellController<R: 'static, T: 'static> {
    id: SlotId,
    config: Arc<CellConfig<R, T>>,
    scope: Scope,
    source: Arc<dyn ItemSource<R, T>>,
    surface: CellSurface,
    index: Option<usize>,
    item: Option<T>,
    state: EditState,
    session: Option<EditSession<T>>,
    editing: Arc<Property<bool>>,
    fragment: Option<FragmentSlot<R, T>>,
    fresh: bool,
    baseline: Option<StyleBaseline>,
}

impl<R, T> CellController<R, T>
where
    R: Clone + PartialEq + Send + Sync + 'static,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a detached controller.
    pub fn new(
        id: SlotId,
        config: Arc<CellConfig<R, T>>,
        scope: Scope,
        source: Arc<dyn ItemSource<R, T>>,
    ) -> Self {
        let surface = CellSurface::with_baseline(config.baseline());
        Self {
            id,
            config,
            scope,
            source,
            surface,
            index: None,
            item: None,
            state: EditState::Idle,
            session: None,
            editing: Arc::new(Property::new(false)),
            fragment: None,
            fresh: true,
            baseline: None,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The slot identity.
    pub fn id(&self) -> SlotId {
        self.id
    }

    /// The position shown, or `None` while detached.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// The item shown.
    pub fn item(&self) -> Option<&T> {
        self.item.as_ref()
    }

    /// What the slot currently displays.
    pub fn surface(&self) -> &CellSurface {
        &self.surface
    }

    /// The edit state.
    pub fn state(&self) -> EditState {
        self.state
    }

    /// Returns `true` while an edit is in progress.
    pub fn is_editing(&self) -> bool {
        self.state == EditState::Editing
    }

    /// The observable edit flag fragments bind to.
    pub fn editing_property(&self) -> &Arc<Property<bool>> {
        &self.editing
    }

    /// The input widget of the current edit.
    pub fn editor(&self) -> Option<&Editor<T>> {
        self.session.as_ref().and_then(|s| s.editor.as_ref())
    }

    /// The slot's fragment, once resolved.
    pub fn fragment(&self) -> Option<&FragmentSlot<R, T>> {
        self.fragment.as_ref()
    }

    /// The configuration shared with the other slots of the view.
    pub fn config(&self) -> &Arc<CellConfig<R, T>> {
        &self.config
    }

    /// The scope fragments are resolved in.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    // =========================================================================
    // Recycling
    // =========================================================================

    /// The host moved this slot to `position`, or detached it (`None`).
    pub fn on_position_changed(&mut self, position: Option<usize>) {
        tracing::trace!(target: targets::CELL, slot = %self.id, ?position, "position changed");
        if self.is_editing() && position != self.index {
            self.abandon_edit("slot moved");
        }
        self.index = position;
        if position.is_none() {
            self.detach();
        }
    }

    /// The host delivered the item at the current position.
    ///
    /// `item == None` or `empty == true` detaches the slot.
    ///
    /// # Errors
    ///
    /// [`CellError::FragmentResolution`] if the fragment cannot be built on
    /// the first update. The slot still shows the cached node and the
    /// formatter output.
    pub fn on_item_updated(&mut self, item: Option<T>, empty: bool) -> Result<()> {
        let _span = tracing::trace_span!(
            target: targets::CELL,
            span_names::UPDATE_ITEM,
            slot = %self.id,
            index = ?self.index
        )
        .entered();

        let item = match item {
            Some(item) if !empty => item,
            _ => {
                self.detach();
                return Ok(());
            }
        };

        if self.is_editing() {
            if self.item.as_ref() == Some(&item) {
                return Ok(());
            }
            self.abandon_edit("item replaced");
        }
        self.item = Some(item.clone());

        let mut result = Ok(());
        if self.fresh {
            self.fresh = false;
            self.baseline = Some(self.surface.snapshot_baseline());
            if let Some(factory) = self.config.fragment() {
                match FragmentSlot::create(factory, &self.scope) {
                    Ok(fragment) => self.fragment = Some(fragment),
                    Err(err) => result = Err(err),
                }
            }
        }

        if let Some(fragment) = self.fragment.as_mut() {
            let row = self.index.and_then(|index| self.source.row(index));
            if let Err(err) = fragment.rebind(item.clone(), row, self.id, &self.editing) {
                result = Err(err);
            }
        }

        self.present(&item);
        tracing::trace!(target: targets::CELL, slot = %self.id, "item bound");
        result
    }

    /// Drop the item and return the slot to its pre-binding look.
    fn detach(&mut self) {
        if self.is_editing() {
            self.abandon_edit("slot detached");
        }
        self.item = None;
        let baseline = self
            .baseline
            .clone()
            .unwrap_or_else(|| self.config.baseline().clone());
        self.surface.reset(&baseline);
        if let Some(fragment) = self.fragment.as_mut() {
            fragment.unbind();
        }
        tracing::trace!(target: targets::CELL, slot = %self.id, "slot detached");
    }

    /// Show `item` in the non-editing representation.
    fn present(&mut self, item: &T) {
        if let Some(cache) = self.config.cache() {
            self.surface.set_node(cache.get_or_create(item));
        } else if matches!(self.surface.graphic(), Graphic::Editor(_)) {
            self.surface.clear_graphic();
        }

        if let Some(fragment) = self.fragment.as_ref() {
            self.surface.set_node(fragment.root());
            self.surface.clear_text();
        } else if let Some(delegate) = self.config.delegate() {
            match delegate.toggle_adapter() {
                Some(adapter) => self.surface.set_graphic(Graphic::Toggle(adapter.is_on(item))),
                None => {
                    if let Some(text) = delegate.format(item) {
                        self.surface.set_text(text);
                    }
                }
            }
        }

        if let Some(formatter) = self.config.formatter() {
            formatter(&mut self.surface, item);
        }
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Enter editing. Returns `false` if the slot cannot edit right now.
    ///
    /// Editing needs an editable configuration with a delegate and a bound
    /// item. Text, dropdown and list delegates swap the text for an input
    /// widget; toggles stay as they are.
    pub fn start_edit(&mut self) -> bool {
        if self.is_editing() {
            return false;
        }
        let Some(delegate) = self.config.delegate().cloned() else {
            return false;
        };
        if !self.config.is_editable() || self.item.is_none() || self.index.is_none() {
            tracing::trace!(target: targets::EDIT, slot = %self.id, "start_edit ignored");
            return false;
        }

        let _span = self.edit_span().entered();
        self.state = EditState::Editing;
        self.editing.set(true);
        self.notify(EditEvent::StartEdit, None);
        if let Some(fragment) = self.fragment.as_ref() {
            fragment.start_edit();
        }

        let requests = RequestQueue::new();
        let display = self.surface.text().map(str::to_owned);
        let editor =
            delegate.create_editor(display.as_deref(), self.item.as_ref(), requests.clone());
        if let Some(editor) = editor.as_ref() {
            self.surface.clear_text();
            self.surface.set_graphic(Graphic::Editor(editor.kind()));
        }
        self.session = Some(EditSession { editor, requests });
        tracing::debug!(target: targets::EDIT, kind = %delegate.kind(), "edit started");
        true
    }

    /// Commit `value`: write it back, leave editing and show it.
    ///
    /// # Errors
    ///
    /// [`CellError::NotEditing`] outside an edit, [`CellError::Detached`]
    /// without a position, or the backing collection's write error. A
    /// failed write cancels the edit.
    pub fn commit_edit(&mut self, value: T) -> Result<()> {
        if !self.is_editing() {
            return Err(CellError::NotEditing { slot: self.id.0 });
        }
        let Some(index) = self.index else {
            return Err(CellError::Detached { slot: self.id.0 });
        };
        let _span = self.edit_span().entered();

        if let Err(err) = self.source.write_back(index, value.clone()) {
            tracing::warn!(target: targets::EDIT, error = %err, "write-back failed");
            self.cancel_edit();
            return Err(err);
        }

        self.end_session();
        self.notify(EditEvent::CommitEdit, Some(&value));
        if let Some(fragment) = self.fragment.as_ref() {
            fragment.commit_edit(&value);
            fragment.set_item(value.clone());
            fragment.bindings().row.set(self.source.row(index));
        }
        self.item = Some(value.clone());
        self.present(&value);
        tracing::debug!(target: targets::EDIT, index, "edit committed");
        Ok(())
    }

    /// Leave editing without writing anything. Returns `false` if the slot
    /// was not editing.
    pub fn cancel_edit(&mut self) -> bool {
        if !self.is_editing() {
            return false;
        }
        let _span = self.edit_span().entered();
        self.end_session();
        self.notify(EditEvent::CancelEdit, None);
        if let Some(fragment) = self.fragment.as_ref() {
            fragment.cancel_edit();
        }
        if let Some(item) = self.item.clone() {
            self.present(&item);
        }
        tracing::debug!(target: targets::EDIT, "edit cancelled");
        true
    }

    /// Flip an always-present toggle and commit the new value.
    ///
    /// Does nothing for other delegates or when editing is not possible.
    /// A toggle edit already opened with [`start_edit`](Self::start_edit)
    /// is committed with the flipped value.
    pub fn toggle(&mut self) -> Result<()> {
        let Some(adapter) = self
            .config
            .delegate()
            .and_then(|delegate| delegate.toggle_adapter())
            .cloned()
        else {
            return Ok(());
        };
        if !self.is_editing() && !self.start_edit() {
            return Ok(());
        }
        let Some(current) = self.item.as_ref() else {
            self.cancel_edit();
            return Ok(());
        };
        let value = adapter.value_for(!adapter.is_on(current));
        self.commit_edit(value)
    }

    /// Route user input to the slot.
    ///
    /// While editing, the event goes to the input widget and any commit or
    /// cancel it requests is carried out. A pointer release on a toggle
    /// flips it, whether or not an edit was started first.
    ///
    /// # Errors
    ///
    /// [`CellError::Parse`] if typed text cannot be converted. The edit is
    /// cancelled first, so the prior value stays in place.
    pub fn handle_input(&mut self, event: InputEvent) -> Result<()> {
        let is_toggle = self
            .config
            .delegate()
            .is_some_and(|delegate| delegate.toggle_adapter().is_some());
        if is_toggle && event == InputEvent::PointerReleased {
            return self.toggle();
        }
        match self.session.as_ref() {
            Some(session) => {
                if let Some(editor) = session.editor.as_ref() {
                    editor.handle(&event);
                }
                self.drain_requests()
            }
            None if event == InputEvent::PointerReleased => self.toggle(),
            None => Ok(()),
        }
    }

    fn drain_requests(&mut self) -> Result<()> {
        loop {
            let Some(session) = self.session.as_ref() else {
                return Ok(());
            };
            let Some(request) = session.requests.pop() else {
                return Ok(());
            };

            match request {
                EditRequest::CommitText(text) => {
                    let converter = self
                        .config
                        .delegate()
                        .and_then(|delegate| delegate.converter())
                        .cloned();
                    let Some(converter) = converter else {
                        self.cancel_edit();
                        continue;
                    };
                    match converter.parse(&text) {
                        Ok(value) => self.commit_edit(value)?,
                        Err(err) => {
                            tracing::warn!(
                                target: targets::EDIT,
                                slot = %self.id,
                                error = %err,
                                "rejected edit input"
                            );
                            self.cancel_edit();
                            return Err(err.into());
                        }
                    }
                }
                EditRequest::CommitSelected => {
                    let selected = session.editor.as_ref().and_then(Editor::selected_value);
                    match selected {
                        Some(value) => self.commit_edit(value)?,
                        None => {
                            self.cancel_edit();
                        }
                    }
                }
                EditRequest::Cancel => {
                    self.cancel_edit();
                }
            }
        }
    }

    fn edit_span(&self) -> tracing::Span {
        tracing::debug_span!(target: targets::EDIT, span_names::EDIT, slot = %self.id)
    }

    fn end_session(&mut self) {
        self.state = EditState::Idle;
        self.session = None;
        self.editing.set(false);
    }

    fn abandon_edit(&mut self, reason: &'static str) {
        tracing::warn!(target: targets::EDIT, slot = %self.id, reason, "edit abandoned");
        self.end_session();
    }

    fn notify(&mut self, event: EditEvent, value: Option<&T>) {
        if let Some(callback) = self.config.edit_support().cloned() {
            callback(&mut self.surface, event, value);
        }
    }
}

impl<R: 'static, T: fmt::Debug + 'static> fmt::Debug for CellController<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellController")
            .field("id", &self.id)
            .field("index", &self.index)
            .field("item", &self.item)
            .field("state", &self.state)
            .field("fresh", &self.fresh)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegate::EditDelegate;
    use crate::editor::Key;
    use crate::source::ObservableList;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn controller(
        items: Vec<i32>,
        config: CellConfig<i32, i32>,
    ) -> (CellController<i32, i32>, Arc<ObservableList<i32>>) {
        let list = Arc::new(ObservableList::from_vec(items));
        let controller =
            CellController::new(SlotId(1), Arc::new(config), Scope::new(), list.clone());
        (controller, list)
    }

    fn bind(controller: &mut CellController<i32, i32>, list: &ObservableList<i32>, index: usize) {
        controller.on_position_changed(Some(index));
        controller.on_item_updated(list.get(index), false).unwrap();
    }

    #[test]
    fn test_formatter_runs_and_detach_clears() {
        let config = CellConfig::new().with_formatter(|surface: &mut CellSurface, item: &i32| {
            surface.set_text(item.to_string())
        });
        let (mut cell, list) = controller(vec![1, 7, 3], config);

        bind(&mut cell, &list, 1);
        assert_eq!(cell.surface().text(), Some("7"));

        cell.on_item_updated(None, true).unwrap();
        assert_eq!(cell.surface().text(), None);
        assert_eq!(cell.item(), None);
    }

    #[test]
    fn test_start_edit_requires_delegate_and_editable() {
        let (mut cell, list) = controller(vec![1], CellConfig::new().with_editable(true));
        bind(&mut cell, &list, 0);
        assert!(!cell.start_edit());

        let delegate = EditDelegate::text().unwrap();
        let (mut cell, list) = controller(vec![1], CellConfig::new().with_delegate(delegate));
        bind(&mut cell, &list, 0);
        assert!(!cell.start_edit());
        assert_eq!(cell.state(), EditState::Idle);
    }

    #[test]
    fn test_commit_outside_edit_is_rejected() {
        let delegate = EditDelegate::text().unwrap();
        let config = CellConfig::new().with_delegate(delegate).with_editable(true);
        let (mut cell, list) = controller(vec![1], config);
        bind(&mut cell, &list, 0);

        assert_eq!(
            cell.commit_edit(2).unwrap_err(),
            CellError::NotEditing { slot: 1 }
        );
        assert!(!cell.cancel_edit());
        assert_eq!(list.get(0), Some(1));
    }

    #[test]
    fn test_edit_support_sees_every_transition() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        let config = CellConfig::new()
            .with_delegate(EditDelegate::text().unwrap())
            .with_editable(true)
            .with_edit_support(move |_, event, value: Option<&i32>| {
                events_clone.lock().push((event, value.copied()));
            });
        let (mut cell, list) = controller(vec![5], config);
        bind(&mut cell, &list, 0);

        assert!(cell.start_edit());
        assert!(cell.editing_property().get());
        cell.cancel_edit();
        assert!(cell.start_edit());
        cell.commit_edit(6).unwrap();

        assert_eq!(
            events.lock().as_slice(),
            [
                (EditEvent::StartEdit, None),
                (EditEvent::CancelEdit, None),
                (EditEvent::StartEdit, None),
                (EditEvent::CommitEdit, Some(6)),
            ]
        );
        assert!(!cell.editing_property().get());
    }

    #[test]
    fn test_parse_failure_cancels_and_reports() {
        let config = CellConfig::new()
            .with_delegate(EditDelegate::text().unwrap())
            .with_editable(true);
        let (mut cell, list) = controller(vec![5], config);
        bind(&mut cell, &list, 0);

        assert!(cell.start_edit());
        cell.handle_input(InputEvent::TextChanged("five".into())).unwrap();
        let err = cell.handle_input(InputEvent::Key(Key::Enter)).unwrap_err();

        assert!(matches!(err, CellError::Parse(_)));
        assert!(!cell.is_editing());
        assert_eq!(list.get(0), Some(5));
        assert_eq!(cell.surface().text(), Some("5"));
    }

    #[test]
    fn test_replacing_item_abandons_edit() {
        let config = CellConfig::new()
            .with_delegate(EditDelegate::text().unwrap())
            .with_editable(true);
        let (mut cell, list) = controller(vec![5, 6], config);
        bind(&mut cell, &list, 0);
        assert!(cell.start_edit());

        cell.on_item_updated(Some(5), false).unwrap();
        assert!(cell.is_editing());

        bind(&mut cell, &list, 1);
        assert!(!cell.is_editing());
        assert!(cell.editor().is_none());
        assert_eq!(cell.surface().text(), Some("6"));
        assert_eq!(list.snapshot(), vec![5, 6]);
    }

    #[test]
    fn test_toggle_commits_negated_value() {
        let list = Arc::new(ObservableList::from_vec(vec![false]));
        let config = CellConfig::<bool, bool>::new()
            .with_delegate(EditDelegate::toggle())
            .with_editable(true);
        let mut cell = CellController::new(SlotId(4), Arc::new(config), Scope::new(), list.clone());
        cell.on_position_changed(Some(0));
        cell.on_item_updated(list.get(0), false).unwrap();
        assert_eq!(cell.surface().graphic(), &Graphic::Toggle(false));

        cell.handle_input(InputEvent::PointerReleased).unwrap();
        assert_eq!(list.get(0), Some(true));
        assert_eq!(cell.surface().graphic(), &Graphic::Toggle(true));
        assert!(!cell.is_editing());
    }

    #[test]
    fn test_cache_node_shown_and_restored_after_edit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let cache = Arc::new(crate::cache::RenderCache::new(move |v: &i32| -> crate::NodeRef {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            crate::node::Label::new(v.to_string()).into_node()
        }));
        let config = CellConfig::new()
            .with_cache(cache.clone())
            .with_delegate(EditDelegate::dropdown(vec![1, 2]).unwrap())
            .with_editable(true);
        let (mut cell, list) = controller(vec![1], config);
        bind(&mut cell, &list, 0);
        let shown = cell.surface().graphic().node().cloned().unwrap();
        assert!(cache.get(&1).is_some_and(|node| crate::node::same_node(&node, &shown)));

        assert!(cell.start_edit());
        assert_eq!(
            cell.surface().graphic(),
            &Graphic::Editor(crate::EditorKind::Dropdown)
        );
        cell.handle_input(InputEvent::Key(Key::Escape)).unwrap();
        assert!(cell.surface().graphic().is_node(&shown));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
