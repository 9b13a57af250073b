//! Source locations carried by netlist nodes and diagnostics.

use serde::{Deserialize, Serialize};

/// A byte range in a source file, `start` inclusive and `end` exclusive.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Span {
    /// Index of the source file in the front end's file table.
    pub file: u32,
    /// Byte offset of the start of the span.
    pub start: u32,
    /// Byte offset one past the end of the span.
    pub end: u32,
}

impl Span {
    /// Span used for synthesized nodes with no source location.
    pub const DUMMY: Span = Span {
        file: u32::MAX,
        start: 0,
        end: 0,
    };

    /// Creates a new span.
    pub fn new(file: u32, start: u32, end: u32) -> Self {
        Self { file, start, end }
    }

    /// Returns `true` for [`Span::DUMMY`].
    pub fn is_dummy(&self) -> bool {
        self.file == u32::MAX
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::DUMMY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dummy_is_default() {
        assert!(Span::default().is_dummy());
        assert!(!Span::new(0, 3, 9).is_dummy());
    }
}
