//! User-facing diagnostics for the Tempo scheduling passes.
//!
//! Passes report problems in the user's design as [`Diagnostic`]s into a
//! shared [`DiagnosticSink`] and keep going; only broken internal invariants
//! stop compilation (see [`tempo_common::InternalError`]).

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use severity::Severity;
pub use sink::DiagnosticSink;
