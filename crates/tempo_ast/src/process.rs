//! Concurrent processes (`initial`, `always`, `final` blocks).

use crate::ids::ScopeId;
use crate::stmt::{SenTree, Stmt};
use serde::{Deserialize, Serialize};
use tempo_common::Span;

/// The kind of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessKind {
    /// Runs once at time zero.
    Initial,
    /// Re-runs on its sensitivity, or every evaluation pass when it has none.
    Always,
    /// Runs once at the end of simulation.
    Final,
}

/// A concurrent process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Process {
    /// The scope the process belongs to.
    pub scope: ScopeId,
    /// Process kind.
    pub kind: ProcessKind,
    /// Sensitivity of an `always` process; `None` means continuously retriggered.
    pub sensitivity: Option<SenTree>,
    /// Process body.
    pub body: Vec<Stmt>,
    /// May yield control mid-execution.
    pub suspendable: bool,
    /// May be resumed at an arbitrary point within a time slot.
    pub dynamic: bool,
    /// Source location.
    pub span: Span,
}

impl Process {
    /// Creates a process with no sensitivity and cleared flags.
    pub fn new(scope: ScopeId, kind: ProcessKind, body: Vec<Stmt>) -> Self {
        Self {
            scope,
            kind,
            sensitivity: None,
            body,
            suspendable: false,
            dynamic: false,
            span: Span::DUMMY,
        }
    }

    /// Sets the sensitivity list.
    pub fn with_sensitivity(mut self, sensitivity: SenTree) -> Self {
        self.sensitivity = Some(sensitivity);
        self
    }
}
