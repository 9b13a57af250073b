//! Shared foundational types used across the Tempo scheduling toolchain.
//!
//! This crate provides interned identifiers, source spans, simulation time
//! units and time scales, and the internal error type returned by every pass.

#![warn(missing_docs)]

pub mod ident;
pub mod result;
pub mod span;
pub mod time;

pub use ident::{Ident, Interner};
pub use result::{InternalError, TempoResult};
pub use span::Span;
pub use time::{ParseTimeError, TimeScale, TimeUnit, TimeValue};
