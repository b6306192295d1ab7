//! Input widgets shown while a cell is editing.
//!
//! Editors are models, not drawn widgets: they hold the state an input
//! control would hold (text, selection, popup visibility) and translate
//! [`InputEvent`]s into [`EditRequest`]s. The owning controller drains the
//! requests after each event and performs the commit or cancel.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use trellis_core::logging::targets;
use trellis_core::{ConnectionGuard, Property, Signal, Subscription};

use crate::error::CellError;

/// The input control variants an edit session can instantiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditorKind {
    /// A single-line text input.
    Text,
    /// A dropdown with a popup list of choices.
    Dropdown,
    /// A single-select list that commits when it closes.
    ChoiceList,
    /// An always-present boolean toggle.
    Toggle,
}

impl EditorKind {
    /// All editor kinds.
    pub const ALL: [EditorKind; 4] = [
        EditorKind::Text,
        EditorKind::Dropdown,
        EditorKind::ChoiceList,
        EditorKind::Toggle,
    ];

    /// The canonical name of this kind.
    pub fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Dropdown => "dropdown",
            Self::ChoiceList => "choice-list",
            Self::Toggle => "toggle",
        }
    }
}

impl fmt::Display for EditorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EditorKind {
    type Err = CellError;

    /// Parse an editor name. Toolkit-style aliases (`textfield`,
    /// `combobox`, `choicebox`, `checkbox`) are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "textfield" | "text-field" => Ok(Self::Text),
            "dropdown" | "combobox" | "combo-box" => Ok(Self::Dropdown),
            "choice-list" | "choicelist" | "choicebox" | "choice-box" => Ok(Self::ChoiceList),
            "toggle" | "checkbox" | "check-box" => Ok(Self::Toggle),
            _ => Err(CellError::unsupported_editor(s)),
        }
    }
}

/// Keys an editor reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Escape,
    Tab,
    Other,
}

/// User input routed to a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A key was released.
    Key(Key),
    /// The input control lost keyboard focus.
    FocusLost,
    /// The text of a text input changed.
    TextChanged(String),
    /// The choice at the given index was highlighted.
    Select(usize),
    /// The choice popup opened.
    ShowPopup,
    /// The choice popup closed.
    HidePopup,
    /// A pointer button was released over the cell or its open popup.
    PointerReleased,
}

/// What an editor asks its controller to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditRequest {
    /// Parse the text and commit the result.
    CommitText(String),
    /// Commit the currently selected choice.
    CommitSelected,
    /// Discard the edit.
    Cancel,
}

/// Requests queued by an editor and its signal connections.
#[derive(Clone, Default)]
pub struct RequestQueue {
    inner: Arc<Mutex<VecDeque<EditRequest>>>,
}

impl RequestQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a request.
    pub fn push(&self, request: EditRequest) {
        tracing::trace!(target: targets::EDIT, ?request, "queued edit request");
        self.inner.lock().push_back(request);
    }

    /// Take the oldest request.
    pub fn pop(&self) -> Option<EditRequest> {
        self.inner.lock().pop_front()
    }

    /// Drop every pending request.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Number of pending requests.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns `true` if no request is pending.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.lock().iter()).finish()
    }
}

/// A single-line text input.
///
/// Enter commits the text, Escape cancels.
pub struct TextInput {
    text: Property<String>,
    requests: RequestQueue,
}

impl TextInput {
    /// Create an input pre-filled with `text`.
    pub fn new(text: impl Into<String>, requests: RequestQueue) -> Self {
        Self {
            text: Property::new(text.into()),
            requests,
        }
    }

    /// The current text.
    pub fn text(&self) -> String {
        self.text.get()
    }

    /// The text property.
    pub fn text_property(&self) -> &Property<String> {
        &self.text
    }

    /// React to an input event.
    pub fn handle(&self, event: &InputEvent) {
        match event {
            InputEvent::TextChanged(text) => {
                self.text.set(text.clone());
            }
            InputEvent::Key(Key::Enter) => self.requests.push(EditRequest::CommitText(self.text())),
            InputEvent::Key(Key::Escape) => self.requests.push(EditRequest::Cancel),
            _ => {}
        }
    }
}

impl fmt::Debug for TextInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextInput")
            .field("text", &self.text.get())
            .finish()
    }
}

/// Pre-select `current` if it is one of `choices`, else the first choice.
fn initial_selection<T: PartialEq>(choices: &[T], current: Option<&T>) -> Option<usize> {
    if choices.is_empty() {
        return None;
    }
    current
        .and_then(|item| choices.iter().position(|choice| choice == item))
        .or(Some(0))
}

/// The popup part of a dropdown, realized the first time the popup opens.
pub struct PopupSkin {
    pointer_released: Arc<Signal<()>>,
}

impl PopupSkin {
    fn new() -> Self {
        Self {
            pointer_released: Arc::new(Signal::new()),
        }
    }

    /// Emitted when a pointer button is released inside the popup content.
    pub fn pointer_released(&self) -> &Arc<Signal<()>> {
        &self.pointer_released
    }
}

impl fmt::Debug for PopupSkin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PopupSkin")
            .field("listeners", &self.pointer_released.connection_count())
            .finish()
    }
}

/// A dropdown editor.
///
/// Enter and focus loss commit the selected choice; Escape cancels. A
/// pointer release inside the open popup also commits. The popup skin
/// does not exist until the popup first opens, so that last commit path is
/// attached through a single-use subscription on
/// [`skin_realized`](Self::skin_realized) which unregisters itself as soon
/// as it fires.
pub struct Dropdown<T: 'static> {
    choices: Vec<T>,
    selected: Property<Option<usize>>,
    showing: Property<bool>,
    skin: Mutex<Option<Arc<PopupSkin>>>,
    skin_realized: Arc<Signal<Arc<PopupSkin>>>,
    popup_commit: Arc<Mutex<Option<ConnectionGuard<()>>>>,
    deferred: Mutex<Option<Subscription<Arc<PopupSkin>>>>,
    requests: RequestQueue,
}

impl<T> Dropdown<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a dropdown over `choices`, pre-selecting `current`.
    pub fn new(choices: Vec<T>, current: Option<&T>, requests: RequestQueue) -> Self {
        let selected = initial_selection(&choices, current);
        Self {
            choices,
            selected: Property::new(selected),
            showing: Property::new(false),
            skin: Mutex::new(None),
            skin_realized: Arc::new(Signal::new()),
            popup_commit: Arc::new(Mutex::new(None)),
            deferred: Mutex::new(None),
            requests,
        }
    }

    /// Attach the commit-on-pointer-release path to the popup.
    ///
    /// If the skin already exists the listener goes straight onto it.
    /// Otherwise a one-shot subscription waits for the skin and attaches
    /// the listener then. Calling this again is a no-op.
    pub fn wire_popup_commit(&self) {
        if self.popup_commit.lock().is_some() {
            return;
        }
        let mut deferred = self.deferred.lock();
        if deferred.as_ref().is_some_and(|sub| !sub.is_spent()) {
            return;
        }

        let skin = self.skin.lock().clone();
        match skin {
            Some(skin) => {
                *self.popup_commit.lock() = Some(commit_on_release(&skin, &self.requests));
            }
            None => {
                let requests = self.requests.clone();
                let popup_commit = self.popup_commit.clone();
                let subscription = self.skin_realized.subscribe_once(move |skin| {
                    *popup_commit.lock() = Some(commit_on_release(skin, &requests));
                });
                *deferred = Some(subscription);
            }
        }
    }

    /// Create the popup skin if it does not exist yet.
    pub fn realize_skin(&self) -> Arc<PopupSkin> {
        let (skin, created) = {
            let mut slot = self.skin.lock();
            match slot.as_ref() {
                Some(skin) => (skin.clone(), false),
                None => {
                    let skin = Arc::new(PopupSkin::new());
                    *slot = Some(skin.clone());
                    (skin, true)
                }
            }
        };
        if created {
            tracing::trace!(target: targets::EDIT, "dropdown popup skin realized");
            self.skin_realized.emit(skin.clone());
        }
        skin
    }

    /// The popup skin, if realized.
    pub fn skin(&self) -> Option<Arc<PopupSkin>> {
        self.skin.lock().clone()
    }

    /// Emitted once with the skin when the popup is first realized.
    pub fn skin_realized(&self) -> &Arc<Signal<Arc<PopupSkin>>> {
        &self.skin_realized
    }

    /// The choices offered.
    pub fn choices(&self) -> &[T] {
        &self.choices
    }

    /// Index of the selected choice.
    pub fn selected_index(&self) -> Option<usize> {
        self.selected.get()
    }

    /// The selected choice.
    pub fn selected_value(&self) -> Option<T> {
        self.selected_index()
            .and_then(|index| self.choices.get(index).cloned())
    }

    /// Returns `true` while the popup is open.
    pub fn is_showing(&self) -> bool {
        self.showing.get()
    }

    /// React to an input event.
    pub fn handle(&self, event: &InputEvent) {
        match event {
            InputEvent::Key(Key::Enter) | InputEvent::FocusLost => {
                self.requests.push(EditRequest::CommitSelected)
            }
            InputEvent::Key(Key::Escape) => self.requests.push(EditRequest::Cancel),
            InputEvent::Select(index) if *index < self.choices.len() => {
                self.selected.set(Some(*index));
            }
            InputEvent::ShowPopup => {
                self.realize_skin();
                self.showing.set(true);
            }
            InputEvent::HidePopup => {
                self.showing.set(false);
            }
            InputEvent::PointerReleased if self.is_showing() => {
                if let Some(skin) = self.skin() {
                    skin.pointer_released().emit(());
                }
                self.showing.set(false);
            }
            _ => {}
        }
    }
}

fn commit_on_release(skin: &Arc<PopupSkin>, requests: &RequestQueue) -> ConnectionGuard<()> {
    let requests = requests.clone();
    skin.pointer_released()
        .connect_scoped(move |_| requests.push(EditRequest::CommitSelected))
}

impl<T: fmt::Debug + 'static> fmt::Debug for Dropdown<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dropdown")
            .field("choices", &self.choices)
            .field("selected", &self.selected.get())
            .field("skin", &self.skin.lock().is_some())
            .finish()
    }
}

/// A single-select list without a separate popup.
///
/// Closing the list commits whatever is selected.
pub struct ChoiceList<T: 'static> {
    choices: Vec<T>,
    selected: Property<Option<usize>>,
    showing: Arc<Property<bool>>,
    _commit_on_hide: ConnectionGuard<bool>,
}

impl<T> ChoiceList<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a list over `choices`, pre-selecting `current`.
    pub fn new(choices: Vec<T>, current: Option<&T>, requests: RequestQueue) -> Self {
        let selected = initial_selection(&choices, current);
        let showing = Arc::new(Property::new(false));
        let commit_on_hide = showing.changed().connect_scoped(move |showing| {
            if !*showing {
                requests.push(EditRequest::CommitSelected);
            }
        });
        Self {
            choices,
            selected: Property::new(selected),
            showing,
            _commit_on_hide: commit_on_hide,
        }
    }

    /// The choices offered.
    pub fn choices(&self) -> &[T] {
        &self.choices
    }

    /// Index of the selected choice.
    pub fn selected_index(&self) -> Option<usize> {
        self.selected.get()
    }

    /// The selected choice.
    pub fn selected_value(&self) -> Option<T> {
        self.selected_index()
            .and_then(|index| self.choices.get(index).cloned())
    }

    /// Returns `true` while the list is open.
    pub fn is_showing(&self) -> bool {
        self.showing.get()
    }

    /// React to an input event.
    pub fn handle(&self, event: &InputEvent) {
        match event {
            InputEvent::ShowPopup => {
                self.showing.set(true);
            }
            InputEvent::Select(index) if *index < self.choices.len() => {
                self.selected.set(Some(*index));
            }
            InputEvent::HidePopup
            | InputEvent::PointerReleased
            | InputEvent::Key(Key::Enter | Key::Escape) => {
                self.showing.set(false);
            }
            _ => {}
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for ChoiceList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChoiceList")
            .field("choices", &self.choices)
            .finish_non_exhaustive()
    }
}

/// The input widget of one edit session.
#[derive(Debug)]
pub enum Editor<T: 'static> {
    Text(TextInput),
    Dropdown(Dropdown<T>),
    ChoiceList(ChoiceList<T>),
}

impl<T> Editor<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// The kind of this editor.
    pub fn kind(&self) -> EditorKind {
        match self {
            Self::Text(_) => EditorKind::Text,
            Self::Dropdown(_) => EditorKind::Dropdown,
            Self::ChoiceList(_) => EditorKind::ChoiceList,
        }
    }

    /// Forward an input event to the widget.
    pub fn handle(&self, event: &InputEvent) {
        match self {
            Self::Text(input) => input.handle(event),
            Self::Dropdown(dropdown) => dropdown.handle(event),
            Self::ChoiceList(list) => list.handle(event),
        }
    }

    /// The text of a text editor.
    pub fn text(&self) -> Option<String> {
        match self {
            Self::Text(input) => Some(input.text()),
            _ => None,
        }
    }

    /// The selected value of a choice editor.
    pub fn selected_value(&self) -> Option<T> {
        match self {
            Self::Text(_) => None,
            Self::Dropdown(dropdown) => dropdown.selected_value(),
            Self::ChoiceList(list) => list.selected_value(),
        }
    }
}
