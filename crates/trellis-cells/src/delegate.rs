//! Edit delegates.
//!
//! An [`EditDelegate`] describes how a column edits its values: which input
//! control an edit session instantiates and which converter moves values
//! to and from text. One delegate is shared by every slot of a column.
//!
//! Converters are resolved when the delegate is built. A delegate built
//! without an explicit converter looks one up with
//! [`default_converter_for`], so a missing converter is reported at
//! registration instead of at the first commit.
//!
//! # Example
//!
//! ```
//! use trellis_cells::{EditDelegate, EditorKind};
//!
//! let text = EditDelegate::<i32>::text().unwrap();
//! assert_eq!(text.kind(), EditorKind::Text);
//!
//! let dropdown = EditDelegate::dropdown(vec![1, 2, 3]).unwrap();
//! assert_eq!(dropdown.choices(), Some(&[1, 2, 3][..]));
//! ```

use std::fmt;
use std::sync::Arc;

use trellis_core::logging::targets;

use crate::converter::{SharedConverter, builtin_converters, default_converter_for};
use crate::editor::{ChoiceList, Dropdown, Editor, EditorKind, RequestQueue, TextInput};
use crate::error::{CellError, Result};

/// Values that can be shown by a toggle editor.
pub trait ToggleValue: Sized {
    /// Returns `true` if the toggle should appear checked.
    fn is_on(&self) -> bool;

    /// The value a toggle in state `on` commits.
    fn from_on(on: bool) -> Self;
}

impl ToggleValue for bool {
    fn is_on(&self) -> bool {
        *self
    }

    fn from_on(on: bool) -> Self {
        on
    }
}

impl ToggleValue for Option<bool> {
    fn is_on(&self) -> bool {
        self.unwrap_or(false)
    }

    fn from_on(on: bool) -> Self {
        Some(on)
    }
}

/// Maps column values to and from a toggle state.
pub struct ToggleAdapter<T> {
    get: Arc<dyn Fn(&T) -> bool + Send + Sync>,
    set: Arc<dyn Fn(bool) -> T + Send + Sync>,
}

impl<T> ToggleAdapter<T> {
    /// Create an adapter from a getter and a constructor.
    pub fn new<G, S>(get: G, set: S) -> Self
    where
        G: Fn(&T) -> bool + Send + Sync + 'static,
        S: Fn(bool) -> T + Send + Sync + 'static,
    {
        Self {
            get: Arc::new(get),
            set: Arc::new(set),
        }
    }

    /// The toggle state for `value`.
    pub fn is_on(&self, value: &T) -> bool {
        (self.get)(value)
    }

    /// The value committed for toggle state `on`.
    pub fn value_for(&self, on: bool) -> T {
        (self.set)(on)
    }
}

impl<T: ToggleValue + 'static> ToggleAdapter<T> {
    /// The adapter for a type with a natural toggle mapping.
    pub fn natural() -> Self {
        Self::new(T::is_on, T::from_on)
    }
}

impl<T> Clone for ToggleAdapter<T> {
    fn clone(&self) -> Self {
        Self {
            get: self.get.clone(),
            set: self.set.clone(),
        }
    }
}

/// Which input control edits a column, and how values become text.
pub enum EditDelegate<T> {
    /// A text input; commits parse the text with the converter.
    Text { converter: SharedConverter<T> },
    /// A dropdown over a fixed set of choices.
    Dropdown {
        choices: Arc<[T]>,
        converter: SharedConverter<T>,
    },
    /// A single-select list over a fixed, non-empty set of choices.
    ChoiceList {
        choices: Arc<[T]>,
        converter: SharedConverter<T>,
    },
    /// An always-present toggle. The converter, when present, formats the
    /// committed value as text for cells without a fragment.
    Toggle {
        adapter: ToggleAdapter<T>,
        converter: Option<SharedConverter<T>>,
    },
}

impl<T: 'static> EditDelegate<T> {
    /// A text delegate using the built-in converter for `T`.
    pub fn text() -> Result<Self> {
        Ok(Self::text_with(default_converter_for::<T>()?))
    }

    /// A text delegate with an explicit converter.
    pub fn text_with(converter: SharedConverter<T>) -> Self {
        Self::Text { converter }
    }

    /// A dropdown delegate using the built-in converter for `T`.
    ///
    /// An empty choice list is allowed; committing it cancels the edit.
    pub fn dropdown(choices: impl Into<Vec<T>>) -> Result<Self> {
        Ok(Self::dropdown_with(choices, default_converter_for::<T>()?))
    }

    /// A dropdown delegate with an explicit converter.
    pub fn dropdown_with(choices: impl Into<Vec<T>>, converter: SharedConverter<T>) -> Self {
        let choices: Vec<T> = choices.into();
        Self::Dropdown {
            choices: choices.into(),
            converter,
        }
    }

    /// A single-select list delegate using the built-in converter for `T`.
    pub fn choice_list(choices: impl Into<Vec<T>>) -> Result<Self> {
        Self::choice_list_with(choices, default_converter_for::<T>()?)
    }

    /// A single-select list delegate with an explicit converter.
    pub fn choice_list_with(
        choices: impl Into<Vec<T>>,
        converter: SharedConverter<T>,
    ) -> Result<Self> {
        let choices: Vec<T> = choices.into();
        if choices.is_empty() {
            let err = CellError::EmptyChoices {
                kind: EditorKind::ChoiceList.name(),
            };
            tracing::error!(target: targets::EDIT, error = %err, "invalid edit delegate");
            return Err(err);
        }
        Ok(Self::ChoiceList {
            choices: choices.into(),
            converter,
        })
    }

    /// A toggle delegate with an explicit adapter.
    ///
    /// The built-in converter for `T` is used for display text if one
    /// exists; toggles work without it.
    pub fn toggle_with(adapter: ToggleAdapter<T>) -> Self {
        Self::Toggle {
            adapter,
            converter: builtin_converters().lookup::<T>().ok(),
        }
    }

    /// Build a delegate for an editor kind chosen at runtime.
    ///
    /// `choices` is ignored for text editors. Toggles need a
    /// [`ToggleAdapter`], so asking for one here fails; use
    /// [`EditDelegate::toggle`] or [`EditDelegate::toggle_with`] instead.
    pub fn from_kind(kind: EditorKind, choices: Vec<T>) -> Result<Self> {
        match kind {
            EditorKind::Text => Self::text(),
            EditorKind::Dropdown => Self::dropdown(choices),
            EditorKind::ChoiceList => Self::choice_list(choices),
            EditorKind::Toggle => Err(CellError::unsupported_editor(format!(
                "{kind} for {}",
                std::any::type_name::<T>()
            ))),
        }
    }
}

impl<T: ToggleValue + 'static> EditDelegate<T> {
    /// A toggle delegate for a type with a natural toggle mapping.
    pub fn toggle() -> Self {
        Self::toggle_with(ToggleAdapter::natural())
    }
}

impl<T> EditDelegate<T> {
    /// The input control this delegate instantiates.
    pub fn kind(&self) -> EditorKind {
        match self {
            Self::Text { .. } => EditorKind::Text,
            Self::Dropdown { .. } => EditorKind::Dropdown,
            Self::ChoiceList { .. } => EditorKind::ChoiceList,
            Self::Toggle { .. } => EditorKind::Toggle,
        }
    }

    /// The converter, if the delegate has one.
    pub fn converter(&self) -> Option<&SharedConverter<T>> {
        match self {
            Self::Text { converter }
            | Self::Dropdown { converter, .. }
            | Self::ChoiceList { converter, .. } => Some(converter),
            Self::Toggle { converter, .. } => converter.as_ref(),
        }
    }

    /// The fixed choice set of a dropdown or list delegate.
    pub fn choices(&self) -> Option<&[T]> {
        match self {
            Self::Dropdown { choices, .. } | Self::ChoiceList { choices, .. } => Some(&choices[..]),
            _ => None,
        }
    }

    /// The toggle adapter of a toggle delegate.
    pub fn toggle_adapter(&self) -> Option<&ToggleAdapter<T>> {
        match self {
            Self::Toggle { adapter, .. } => Some(adapter),
            _ => None,
        }
    }

    /// Returns `true` for the always-present toggle variant.
    pub fn is_toggle(&self) -> bool {
        matches!(self, Self::Toggle { .. })
    }

    /// Format a value with the delegate's converter.
    pub fn format(&self, value: &T) -> Option<String> {
        self.converter().map(|converter| converter.format(value))
    }
}

impl<T> EditDelegate<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Construct the input widget for an edit session.
    ///
    /// `display_text` pre-fills a text input; `current` pre-selects a
    /// choice. Toggles have no session widget and return `None`.
    pub fn create_editor(
        &self,
        display_text: Option<&str>,
        current: Option<&T>,
        requests: RequestQueue,
    ) -> Option<Editor<T>> {
        match self {
            Self::Text { .. } => Some(Editor::Text(TextInput::new(
                display_text.unwrap_or_default(),
                requests,
            ))),
            Self::Dropdown { choices, .. } => {
                let dropdown = Dropdown::new(choices.to_vec(), current, requests);
                dropdown.wire_popup_commit();
                Some(Editor::Dropdown(dropdown))
            }
            Self::ChoiceList { choices, .. } => Some(Editor::ChoiceList(ChoiceList::new(
                choices.to_vec(),
                current,
                requests,
            ))),
            Self::Toggle { .. } => None,
        }
    }
}

impl<T> Clone for EditDelegate<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Text { converter } => Self::Text {
                converter: converter.clone(),
            },
            Self::Dropdown { choices, converter } => Self::Dropdown {
                choices: choices.clone(),
                converter: converter.clone(),
            },
            Self::ChoiceList { choices, converter } => Self::ChoiceList {
                choices: choices.clone(),
                converter: converter.clone(),
            },
            Self::Toggle { adapter, converter } => Self::Toggle {
                adapter: adapter.clone(),
                converter: converter.clone(),
            },
        }
    }
}

impl<T> fmt::Debug for EditDelegate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditDelegate")
            .field("kind", &self.kind())
            .field("choices", &self.choices().map(<[T]>::len))
            .field("has_converter", &self.converter().is_some())
            .finish()
    }
}
