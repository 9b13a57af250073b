//! Runtime error types.
//!
//! Misuse of the primitives (time going backwards, resizing a busy pool)
//! panics. [`RuntimeError`] covers what can go wrong through no fault of
//! the caller.

use std::io;

/// Errors from starting or joining OS threads.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The OS refused to start a thread.
    #[error("failed to spawn thread `{name}`: {source}")]
    Spawn {
        /// Name given to the thread.
        name: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// A fork branch panicked instead of returning.
    #[error("fork branch `{name}` panicked")]
    BranchPanicked {
        /// Name of the branch thread.
        name: String,
    },
}
