//! Error types for Trellis core.

/// Errors produced inside the core reactive primitives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A panic captured by an installed panic hook.
    #[error("panic: {message}")]
    Panic {
        /// The panic message, or a placeholder when the payload is not a string.
        message: String,
        /// Source location reported by the panic hook.
        location: Option<String>,
    },
}

impl CoreError {
    /// Create a panic error.
    pub fn panic(message: impl Into<String>, location: Option<String>) -> Self {
        Self::Panic {
            message: message.into(),
            location,
        }
    }
}
