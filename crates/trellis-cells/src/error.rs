//! Error types for the cell engine.

use crate::converter::ParseError;

/// Result type alias for cell operations.
pub type Result<T> = std::result::Result<T, CellError>;

/// Errors that can occur while configuring, recycling or editing cells.
///
/// `NoDefaultConverter`, `UnsupportedEditor` and `EmptyChoices` are
/// configuration errors: they are raised at registration time and should
/// not be retried. `Parse` is the only error a user can trigger by typing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CellError {
    /// No built-in converter exists for the value type and none was supplied.
    #[error(
        "no default converter for type '{type_name}', please define the converter manually"
    )]
    NoDefaultConverter { type_name: &'static str },

    /// The requested editor kind has no construction path.
    #[error("editor '{kind}' is not supported")]
    UnsupportedEditor { kind: String },

    /// A single-select list editor was configured without choices.
    #[error("editor '{kind}' requires a non-empty choice set")]
    EmptyChoices { kind: &'static str },

    /// Text entered into an editor could not be converted.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A commit was requested while the cell was not editing.
    #[error("cell {slot} is not editing")]
    NotEditing { slot: u64 },

    /// The cell has no backing position.
    #[error("cell {slot} is detached")]
    Detached { slot: u64 },

    /// The backing collection has no item at the position.
    #[error("index {index} is out of bounds for a collection of {len} items")]
    IndexOutOfBounds { index: usize, len: usize },

    /// The backing collection rejected the write.
    #[error("column '{column}' is read-only")]
    ReadOnly { column: String },

    /// The fragment type could not be resolved from the scope.
    #[error("failed to resolve fragment '{fragment}': {message}")]
    FragmentResolution {
        fragment: &'static str,
        message: String,
    },

    /// A fragment was bound or unbound out of sequence.
    #[error("fragment slot bound out of sequence: {message}")]
    RecyclingSequence { message: String },
}

impl CellError {
    /// Create a missing-converter error for `T`.
    pub fn no_default_converter<T: ?Sized>() -> Self {
        Self::NoDefaultConverter {
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Create an unsupported-editor error.
    pub fn unsupported_editor(kind: impl Into<String>) -> Self {
        Self::UnsupportedEditor { kind: kind.into() }
    }

    /// Create a fragment resolution error for `F`.
    pub fn fragment_resolution<F: ?Sized>(message: impl Into<String>) -> Self {
        Self::FragmentResolution {
            fragment: std::any::type_name::<F>(),
            message: message.into(),
        }
    }

    /// Returns `true` for errors raised while registering a configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::NoDefaultConverter { .. }
                | Self::UnsupportedEditor { .. }
                | Self::EmptyChoices { .. }
        )
    }
}
