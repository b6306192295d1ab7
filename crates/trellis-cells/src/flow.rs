//! A reference host virtualization loop.
//!
//! [`VirtualFlow`] keeps a fixed pool of [`CellController`]s, one per visible
//! row plus some overscan, and reassigns them as the viewport moves. It is
//! the piece a toolkit's list or table skin normally provides; having it
//! here lets the engine run headless.
//!
//! Source changes are queued by a signal connection and applied on the next
//! [`layout`](VirtualFlow::layout), never from inside the emission.
//!
//! ```
//! use std::sync::Arc;
//! use trellis_cells::{FlowConfig, ListView, ObservableList};
//! use trellis_core::ErrorHandler;
//!
//! let items = Arc::new(ObservableList::from_vec((0..100).collect::<Vec<i32>>()));
//! let mut list = ListView::new(items);
//! list.cells().cell_format(|cell, n| cell.set_text(n.to_string()));
//!
//! let config = FlowConfig::new().with_viewport_len(10);
//! let mut flow = list.flow(config, Arc::new(ErrorHandler::new()));
//! flow.scroll_to(50);
//! assert_eq!(flow.visible_range(), 50..60);
//! assert_eq!(flow.slot_for(50).and_then(|c| c.surface().text()), Some("50"));
//! ```

use std::error::Error;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use parking_lot::Mutex;
use trellis_core::logging::{span_names, targets};
use trellis_core::{ConnectionGuard, ErrorHandler, PerfSpan};

use crate::binding::CellFactory;
use crate::config::FlowConfig;
use crate::controller::CellController;
use crate::editor::InputEvent;
use crate::source::{ItemSource, ListChange};

/// Headless virtualization loop over one view.
pub struct VirtualFlow<R: 'static, T: 'static> {
    factory: CellFactory<R, T>,
    source: Arc<dyn ItemSource<R, T>>,
    config: FlowConfig,
    slots: Vec<CellController<R, T>>,
    first: usize,
    pending: Arc<Mutex<Vec<ListChange>>>,
    _changes: Option<ConnectionGuard<ListChange>>,
    errors: Arc<ErrorHandler>,
}

impl<R, T> VirtualFlow<R, T>
where
    R: Clone + PartialEq + Send + Sync + 'static,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a flow and lay out the first page.
    pub fn new(factory: CellFactory<R, T>, config: FlowConfig, errors: Arc<ErrorHandler>) -> Self {
        let source = factory.source().clone();
        let pending = Arc::new(Mutex::new(Vec::new()));
        let changes = source.changed().map(|signal| {
            let pending = pending.clone();
            signal.connect_scoped(move |change| pending.lock().push(*change))
        });

        let mut flow = Self {
            factory,
            source,
            config,
            slots: Vec::new(),
            first: 0,
            pending,
            _changes: changes,
            errors,
        };
        flow.layout();
        flow
    }

    // =========================================================================
    // Viewport
    // =========================================================================

    /// The flow configuration.
    pub fn config(&self) -> FlowConfig {
        self.config
    }

    /// Index of the first visible row.
    pub fn first_visible(&self) -> usize {
        self.first
    }

    /// The rows inside the viewport.
    pub fn visible_range(&self) -> Range<usize> {
        let end = (self.first + self.config.viewport_len).min(self.source.len());
        self.first.min(end)..end
    }

    /// Scroll so that `index` is the first visible row, as far as the
    /// collection allows.
    pub fn scroll_to(&mut self, index: usize) {
        self.first = self.clamp_first(index);
        self.layout();
    }

    /// Scroll the least amount needed to show `index`.
    pub fn ensure_visible(&mut self, index: usize) {
        let range = self.visible_range();
        if range.contains(&index) {
            return;
        }
        let first = if index < range.start {
            index
        } else {
            (index + 1).saturating_sub(self.config.viewport_len)
        };
        self.scroll_to(first);
    }

    /// Resize the viewport.
    pub fn set_viewport_len(&mut self, viewport_len: usize) {
        self.config.viewport_len = viewport_len;
        self.first = self.clamp_first(self.first);
        self.layout();
    }

    fn clamp_first(&self, index: usize) -> usize {
        index.min(self.source.len().saturating_sub(self.config.viewport_len))
    }

    // =========================================================================
    // Layout
    // =========================================================================

    /// Apply queued source changes and assign every slot its row.
    ///
    /// Slots past the end of the collection are detached.
    pub fn layout(&mut self) {
        let _perf = PerfSpan::new(span_names::LAYOUT_PASS);
        self.pending.lock().clear();
        self.first = self.clamp_first(self.first);

        let pool_len = self.config.pool_len();
        while self.slots.len() < pool_len {
            self.slots.push(self.factory.create());
        }
        for mut slot in self.slots.drain(pool_len..) {
            slot.on_position_changed(None);
        }

        for offset in 0..self.slots.len() {
            self.assign(offset);
        }
        tracing::trace!(
            target: targets::FLOW,
            first = self.first,
            slots = self.slots.len(),
            len = self.source.len(),
            "layout pass"
        );
    }

    /// Re-push the current items into every slot.
    pub fn refresh(&mut self) {
        self.layout();
    }

    /// Apply queued source changes.
    ///
    /// A single updated row refreshes only the slot showing it; anything
    /// else triggers a full layout.
    pub fn sync(&mut self) {
        let changes = std::mem::take(&mut *self.pending.lock());
        if changes.is_empty() {
            return;
        }
        let full = changes
            .iter()
            .any(|change| !matches!(change, ListChange::Updated { .. }));
        if full {
            self.layout();
            return;
        }
        for change in changes {
            if let ListChange::Updated { index } = change
                && let Some(offset) = self.offset_of(index)
            {
                self.assign(offset);
            }
        }
    }

    fn assign(&mut self, offset: usize) {
        let index = self.first + offset;
        let position = (index < self.source.len()).then_some(index);
        let item = position.and_then(|index| self.source.value(index));
        let slot = &mut self.slots[offset];
        slot.on_position_changed(position);
        if position.is_some() {
            let empty = item.is_none();
            if let Err(err) = slot.on_item_updated(item, empty) {
                self.report(&err);
            }
        }
    }

    // =========================================================================
    // Routing
    // =========================================================================

    fn offset_of(&self, index: usize) -> Option<usize> {
        let offset = index.checked_sub(self.first)?;
        (offset < self.slots.len()).then_some(offset)
    }

    /// The controller showing `index`.
    pub fn slot_for(&self, index: usize) -> Option<&CellController<R, T>> {
        let offset = self.offset_of(index)?;
        self.slots.get(offset).filter(|slot| slot.index() == Some(index))
    }

    fn slot_for_mut(&mut self, index: usize) -> Option<&mut CellController<R, T>> {
        let offset = self.offset_of(index)?;
        self.slots.get_mut(offset).filter(|slot| slot.index() == Some(index))
    }

    /// Every controller in the pool, bound or not.
    pub fn controllers(&self) -> &[CellController<R, T>] {
        &self.slots
    }

    /// The backing source.
    pub fn source(&self) -> &Arc<dyn ItemSource<R, T>> {
        &self.source
    }

    /// Scroll `index` into view and start editing it.
    ///
    /// Returns `false` if the slot could not enter editing.
    pub fn start_edit(&mut self, index: usize) -> bool {
        self.ensure_visible(index);
        let started = self
            .slot_for_mut(index)
            .is_some_and(|slot| slot.start_edit());
        tracing::debug!(target: targets::FLOW, index, started, "edit requested");
        started
    }

    /// Cancel any edit on the row at `index`.
    pub fn cancel_edit(&mut self, index: usize) -> bool {
        self.slot_for_mut(index).is_some_and(|slot| slot.cancel_edit())
    }

    /// Deliver an input event to the slot showing `index`.
    ///
    /// Errors raised while handling the event go to the error handler.
    /// Returns `false` if no slot shows that row.
    pub fn handle_input(&mut self, index: usize, event: InputEvent) -> bool {
        let Some(slot) = self.slot_for_mut(index) else {
            return false;
        };
        let result = slot.handle_input(event);
        if let Err(err) = result {
            self.report(&err);
        }
        self.sync();
        true
    }

    /// Index of the row being edited, if any.
    pub fn editing_index(&self) -> Option<usize> {
        self.slots
            .iter()
            .find(|slot| slot.is_editing())
            .and_then(CellController::index)
    }

    fn report(&self, err: &(dyn Error + 'static)) {
        tracing::debug!(target: targets::FLOW, error = %err, "reporting cell error");
        self.errors.handle(err);
    }
}

impl<R: 'static, T: 'static> fmt::Debug for VirtualFlow<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualFlow")
            .field("config", &self.config)
            .field("first", &self.first)
            .field("slots", &self.slots.len())
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::ListView;
    use crate::delegate::EditDelegate;
    use crate::editor::Key;
    use crate::source::ObservableList;

    fn list_flow(
        len: i32,
        viewport: usize,
    ) -> (VirtualFlow<i32, i32>, Arc<ObservableList<i32>>, Arc<ErrorHandler>) {
        let items = Arc::new(ObservableList::from_vec((0..len).collect()));
        let mut list = ListView::new(items.clone());
        list.cells()
            .cell_decorator(|cell, n: &i32| cell.set_text(n.to_string()))
            .cell_editor(EditDelegate::text().unwrap());
        let errors = Arc::new(ErrorHandler::new());
        let config = FlowConfig::new().with_viewport_len(viewport).with_overscan(1);
        (list.flow(config, errors.clone()), items, errors)
    }

    #[test]
    fn test_pool_is_bounded_and_tail_detached() {
        let (flow, _, _) = list_flow(3, 5);
        assert_eq!(flow.controllers().len(), 6);
        let bound: Vec<_> = flow.controllers().iter().filter_map(|c| c.index()).collect();
        assert_eq!(bound, vec![0, 1, 2]);
        assert!(flow.controllers()[4].surface().text().is_none());
    }

    #[test]
    fn test_scroll_clamps_to_end() {
        let (mut flow, _, _) = list_flow(30, 10);
        flow.scroll_to(100);
        assert_eq!(flow.visible_range(), 20..30);
        assert_eq!(flow.slot_for(25).and_then(|c| c.surface().text()), Some("25"));
        assert!(flow.slot_for(5).is_none());

        flow.ensure_visible(3);
        assert_eq!(flow.first_visible(), 3);
    }

    #[test]
    fn test_list_changes_applied_on_sync() {
        let (mut flow, items, _) = list_flow(5, 5);
        items.set(2, 20).unwrap();
        assert_eq!(flow.slot_for(2).and_then(|c| c.surface().text()), Some("2"));

        flow.sync();
        assert_eq!(flow.slot_for(2).and_then(|c| c.surface().text()), Some("20"));

        items.remove(0).unwrap();
        flow.sync();
        assert_eq!(flow.slot_for(0).and_then(|c| c.surface().text()), Some("1"));
        assert!(flow.slot_for(4).is_none());
    }

    #[test]
    fn test_edit_routed_and_errors_reported() {
        let (mut flow, items, errors) = list_flow(50, 10);
        assert!(flow.start_edit(30));
        assert_eq!(flow.editing_index(), Some(30));

        flow.handle_input(30, InputEvent::TextChanged("x".into()));
        flow.handle_input(30, InputEvent::Key(Key::Enter));
        assert_eq!(errors.handled_count(), 1);
        assert_eq!(flow.editing_index(), None);

        assert!(flow.start_edit(30));
        flow.handle_input(30, InputEvent::TextChanged("300".into()));
        flow.handle_input(30, InputEvent::Key(Key::Enter));
        assert_eq!(items.get(30), Some(300));
        assert_eq!(flow.slot_for(30).and_then(|c| c.surface().text()), Some("300"));
        assert_eq!(errors.handled_count(), 1);
    }

    #[test]
    fn test_scrolling_away_abandons_edit() {
        let (mut flow, items, _) = list_flow(50, 10);
        assert!(flow.start_edit(0));
        flow.scroll_to(40);
        assert_eq!(flow.editing_index(), None);
        assert_eq!(items.get(0), Some(0));
    }
}
