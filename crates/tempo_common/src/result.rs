//! Result and internal error types shared by every pass.

/// The result type for fallible internal operations.
///
/// `Err` means an internal consistency check failed (a bug in a pass or a
/// malformed input netlist) and the pipeline must stop. Problems in the user's
/// design are reported through the diagnostic sink and the pass still
/// returns `Ok`.
pub type TempoResult<T> = Result<T, InternalError>;

/// An internal error indicating a broken invariant, not a user input problem.
#[derive(Debug, thiserror::Error)]
#[error("internal compiler error: {message}")]
pub struct InternalError {
    /// Description of the failed invariant.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}
