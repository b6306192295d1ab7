//! Integration tests for the edit state machine and editors.

use std::sync::Arc;

use parking_lot::Mutex;
use trellis_cells::{
    CellError, EditDelegate, EditEvent, EditState, Editor, EditorKind, FlowConfig, Graphic,
    InputEvent, ItemSource, Key, ListView, ObservableList, TableView, ToggleAdapter,
};
use trellis_core::ErrorHandler;

#[derive(Debug, Clone, PartialEq)]
struct Task {
    title: String,
    priority: i32,
    done: bool,
}

fn tasks() -> Arc<ObservableList<Task>> {
    Arc::new(ObservableList::from_vec(vec![
        Task { title: "write".into(), priority: 2, done: false },
        Task { title: "review".into(), priority: 1, done: true },
    ]))
}

#[test]
fn text_edit_commits_parsed_value() {
    let items = Arc::new(ObservableList::from_vec(vec![5]));
    let mut list = ListView::new(items.clone());
    list.cells().cell_editor(EditDelegate::text().unwrap());

    let mut cell = list.cell_factory().create();
    cell.on_position_changed(Some(0));
    cell.on_item_updated(items.get(0), false).unwrap();
    assert_eq!(cell.surface().text(), Some("5"));

    assert!(cell.start_edit());
    assert_eq!(cell.state(), EditState::Editing);
    assert_eq!(cell.surface().text(), None);
    assert_eq!(cell.surface().graphic(), &Graphic::Editor(EditorKind::Text));
    assert_eq!(cell.editor().and_then(Editor::text), Some("5".to_string()));

    cell.handle_input(InputEvent::TextChanged("9".into())).unwrap();
    cell.handle_input(InputEvent::Key(Key::Enter)).unwrap();

    assert_eq!(items.get(0), Some(9));
    assert_eq!(cell.state(), EditState::Idle);
    assert_eq!(cell.surface().text(), Some("9"));
    assert!(cell.surface().graphic().is_empty());
}

#[test]
fn dropdown_preselects_and_cancel_leaves_value() {
    let items = Arc::new(ObservableList::from_vec(vec![2]));
    let mut list = ListView::new(items.clone());
    list.cells().cell_editor(EditDelegate::dropdown(vec![1, 2, 3]).unwrap());

    let mut cell = list.cell_factory().create();
    cell.on_position_changed(Some(0));
    cell.on_item_updated(items.get(0), false).unwrap();

    assert!(cell.start_edit());
    let Some(Editor::Dropdown(dropdown)) = cell.editor() else {
        panic!("expected a dropdown editor");
    };
    assert_eq!(dropdown.selected_value(), Some(2));

    cell.handle_input(InputEvent::Select(2)).unwrap();
    cell.handle_input(InputEvent::Key(Key::Escape)).unwrap();

    assert_eq!(items.get(0), Some(2));
    assert!(!cell.is_editing());
    assert_eq!(cell.surface().text(), Some("2"));
}

#[test]
fn dropdown_commits_on_popup_release() {
    let items = Arc::new(ObservableList::from_vec(vec![1]));
    let mut list = ListView::new(items.clone());
    list.cells().cell_editor(EditDelegate::dropdown(vec![1, 2, 3]).unwrap());

    let mut cell = list.cell_factory().create();
    cell.on_position_changed(Some(0));
    cell.on_item_updated(items.get(0), false).unwrap();
    assert!(cell.start_edit());

    cell.handle_input(InputEvent::ShowPopup).unwrap();
    let realized = match cell.editor() {
        Some(Editor::Dropdown(dropdown)) => dropdown.skin_realized().connection_count(),
        _ => panic!("expected a dropdown editor"),
    };
    assert_eq!(realized, 0);

    cell.handle_input(InputEvent::Select(2)).unwrap();
    cell.handle_input(InputEvent::PointerReleased).unwrap();
    assert_eq!(items.get(0), Some(3));
    assert!(!cell.is_editing());
}

#[test]
fn dropdown_popup_listener_attached_once_across_sessions() {
    let items = Arc::new(ObservableList::from_vec(vec![1]));
    let mut list = ListView::new(items.clone());
    list.cells().cell_editor(EditDelegate::dropdown(vec![1, 2]).unwrap());

    let mut cell = list.cell_factory().create();
    cell.on_position_changed(Some(0));
    cell.on_item_updated(items.get(0), false).unwrap();
    assert!(cell.start_edit());

    for _ in 0..3 {
        cell.handle_input(InputEvent::ShowPopup).unwrap();
        cell.handle_input(InputEvent::HidePopup).unwrap();
    }
    let Some(Editor::Dropdown(dropdown)) = cell.editor() else {
        panic!("expected a dropdown editor");
    };
    let skin = dropdown.skin().unwrap();
    assert_eq!(skin.pointer_released().connection_count(), 1);
    assert_eq!(dropdown.skin_realized().connection_count(), 0);
}

#[test]
fn choice_list_commits_when_closed() {
    let items = Arc::new(ObservableList::from_vec(vec!["b".to_string()]));
    let choices = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let mut list = ListView::new(items.clone());
    list.cells().cell_editor(EditDelegate::choice_list(choices).unwrap());

    let mut cell = list.cell_factory().create();
    cell.on_position_changed(Some(0));
    cell.on_item_updated(items.get(0), false).unwrap();
    assert!(cell.start_edit());
    assert_eq!(cell.surface().graphic(), &Graphic::Editor(EditorKind::ChoiceList));

    cell.handle_input(InputEvent::ShowPopup).unwrap();
    cell.handle_input(InputEvent::Select(0)).unwrap();
    cell.handle_input(InputEvent::HidePopup).unwrap();
    assert_eq!(items.get(0), Some("a".to_string()));
    assert_eq!(cell.surface().text(), Some("a"));
}

#[test]
fn choice_list_without_choices_is_rejected() {
    let err = EditDelegate::<i32>::choice_list(Vec::new()).unwrap_err();
    assert!(err.is_configuration());
    assert!(matches!(err, CellError::EmptyChoices { .. }));
}

#[test]
fn unparseable_text_cancels_and_reports() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();
    let items = Arc::new(ObservableList::from_vec(vec![5]));
    let mut list = ListView::new(items.clone());
    list.cells()
        .cell_editor(EditDelegate::text().unwrap())
        .edit_support(move |_, event, _: Option<&i32>| events_clone.lock().push(event));

    let mut cell = list.cell_factory().create();
    cell.on_position_changed(Some(0));
    cell.on_item_updated(items.get(0), false).unwrap();
    assert!(cell.start_edit());

    cell.handle_input(InputEvent::TextChanged("5.5.5".into())).unwrap();
    let err = cell.handle_input(InputEvent::Key(Key::Enter)).unwrap_err();
    let CellError::Parse(parse) = err else {
        panic!("expected a parse error");
    };
    assert_eq!(parse.input, "5.5.5");

    assert_eq!(items.get(0), Some(5));
    assert_eq!(cell.surface().text(), Some("5"));
    assert_eq!(
        events.lock().as_slice(),
        [EditEvent::StartEdit, EditEvent::CancelEdit]
    );
}

#[test]
fn no_default_converter_fails_at_registration() {
    #[derive(Debug, Clone, PartialEq)]
    struct Opaque;

    let err = EditDelegate::<Opaque>::text().unwrap_err();
    assert!(matches!(err, CellError::NoDefaultConverter { .. }));
    assert!(err.to_string().contains("Opaque"));
}

#[test]
fn toggle_column_writes_through_setter() {
    let rows = tasks();
    let table = TableView::new(rows.clone());
    let mut done = table.editable_column("done", |t: &Task| t.done, |t, done| t.done = done);
    done.cells().cell_editor(EditDelegate::toggle());

    let mut cell = done.cell_factory().create();
    cell.on_position_changed(Some(0));
    cell.on_item_updated(done.source().value(0), false).unwrap();
    assert_eq!(cell.surface().graphic(), &Graphic::Toggle(false));

    cell.handle_input(InputEvent::PointerReleased).unwrap();
    assert!(rows.get(0).is_some_and(|t| t.done && t.title == "write"));
    assert_eq!(cell.surface().graphic(), &Graphic::Toggle(true));
}

#[test]
fn toggle_adapter_maps_custom_values() {
    let items = Arc::new(ObservableList::from_vec(vec!["no".to_string()]));
    let mut list = ListView::new(items.clone());
    let adapter = ToggleAdapter::new(
        |value: &String| value == "yes",
        |on| if on { "yes".to_string() } else { "no".to_string() },
    );
    list.cells().cell_editor(EditDelegate::toggle_with(adapter));

    let mut cell = list.cell_factory().create();
    cell.on_position_changed(Some(0));
    cell.on_item_updated(items.get(0), false).unwrap();
    cell.toggle().unwrap();
    assert_eq!(items.get(0), Some("yes".to_string()));
    cell.toggle().unwrap();
    assert_eq!(items.get(0), Some("no".to_string()));
}

#[test]
fn read_only_column_rejects_commit() {
    let rows = tasks();
    let table = TableView::new(rows.clone());
    let mut priority = table.column("priority", |t: &Task| t.priority);
    priority.cells().cell_editor(EditDelegate::text().unwrap());

    let mut cell = priority.cell_factory().create();
    cell.on_position_changed(Some(1));
    cell.on_item_updated(Some(1), false).unwrap();
    assert!(cell.start_edit());

    let err = cell.commit_edit(7).unwrap_err();
    assert_eq!(err, CellError::ReadOnly { column: "priority".into() });
    assert!(!cell.is_editing());
    assert_eq!(rows.get(1).map(|t| t.priority), Some(1));
    assert_eq!(cell.surface().text(), Some("1"));
}

#[test]
fn non_editable_view_ignores_start_edit() {
    let items = Arc::new(ObservableList::from_vec(vec![1]));
    let mut list = ListView::new(items.clone());
    list.cells()
        .cell_editor(EditDelegate::text().unwrap())
        .cell_format(|cell, n: &i32| cell.set_text(format!("{n} pts")));

    let mut cell = list.cell_factory().create();
    cell.on_position_changed(Some(0));
    cell.on_item_updated(items.get(0), false).unwrap();
    assert!(!cell.start_edit());
    assert_eq!(cell.surface().text(), Some("1 pts"));
}

#[test]
fn flow_reports_edit_errors_to_handler() {
    let presented = Arc::new(Mutex::new(Vec::new()));
    let presented_clone = presented.clone();
    let errors = Arc::new(ErrorHandler::new().with_presenter(move |err| {
        presented_clone.lock().push(ErrorHandler::describe(err));
    }));

    let items = Arc::new(ObservableList::from_vec(vec![10, 20, 30]));
    let mut list = ListView::new(items.clone());
    list.cells().cell_editor(EditDelegate::text().unwrap());
    let mut flow = list.flow(FlowConfig::new().with_viewport_len(3), errors.clone());

    assert!(flow.start_edit(1));
    flow.handle_input(1, InputEvent::TextChanged("abc".into()));
    flow.handle_input(1, InputEvent::Key(Key::Enter));

    assert_eq!(errors.presented_count(), 1);
    assert!(presented.lock()[0].contains("abc"));
    assert_eq!(items.get(1), Some(20));
}

#[test]
fn toggle_started_through_flow_commits_on_release() {
    let items = Arc::new(ObservableList::from_vec(vec![false, false]));
    let mut list = ListView::new(items.clone());
    list.cells().cell_editor(EditDelegate::toggle());
    let config = FlowConfig::new().with_viewport_len(2);
    let mut flow = list.flow(config, Arc::new(ErrorHandler::new()));

    assert!(flow.start_edit(0));
    assert_eq!(flow.editing_index(), Some(0));
    flow.handle_input(0, InputEvent::PointerReleased);

    assert_eq!(items.get(0), Some(true));
    assert_eq!(items.get(1), Some(false));
    assert_eq!(flow.editing_index(), None);
    let graphic = flow.slot_for(0).map(|cell| cell.surface().graphic().clone());
    assert_eq!(graphic, Some(Graphic::Toggle(true)));
}

#[test]
fn toggle_cell_commits_after_explicit_start() {
    let items = Arc::new(ObservableList::from_vec(vec![true]));
    let mut list = ListView::new(items.clone());
    list.cells().cell_editor(EditDelegate::toggle());

    let mut cell = list.cell_factory().create();
    cell.on_position_changed(Some(0));
    cell.on_item_updated(items.get(0), false).unwrap();
    assert!(cell.start_edit());

    cell.handle_input(InputEvent::PointerReleased).unwrap();
    assert_eq!(items.get(0), Some(false));
    assert!(!cell.is_editing());
}
