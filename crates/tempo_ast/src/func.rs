//! Functions, tasks, and compiler-synthesized routines.

use crate::ids::{ClassId, ScopeId, VarId};
use crate::stmt::Stmt;
use crate::var::DataType;
use serde::{Deserialize, Serialize};
use tempo_common::{Ident, Span};

/// What a routine was declared or synthesized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FuncKind {
    /// A user task.
    Task,
    /// A user function.
    Function,
    /// A class constructor.
    Constructor,
    /// A class destructor.
    Destructor,
    /// A fork branch moved into its own routine.
    ForkBranch,
    /// A routine cancelling the waiters of a class's events.
    EventCleanup,
}

/// How a routine is invoked by generated code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallConv {
    /// An ordinary call that runs to completion.
    #[default]
    Direct,
    /// A coroutine call returning an awaitable task.
    Coroutine,
}

/// A function or task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Func {
    /// Routine name.
    pub name: Ident,
    /// Scope the routine is declared in.
    pub scope: ScopeId,
    /// Owning class for methods.
    pub class: Option<ClassId>,
    /// Declared or synthesized kind.
    pub kind: FuncKind,
    /// Participates in virtual dispatch.
    pub is_virtual: bool,
    /// Callable from outside the design.
    pub is_public: bool,
    /// Parameters, in order.
    pub args: Vec<VarId>,
    /// Return type of value-returning functions.
    pub return_type: Option<DataType>,
    /// Routine body.
    pub body: Vec<Stmt>,
    /// May yield control mid-execution.
    pub suspendable: bool,
    /// May be resumed at an arbitrary point within a time slot.
    pub dynamic: bool,
    /// Calling convention chosen for code generation.
    pub call_conv: CallConv,
    /// Source location.
    pub span: Span,
}

impl Func {
    /// Creates an empty, non-virtual, non-public routine.
    pub fn new(name: Ident, scope: ScopeId, kind: FuncKind) -> Self {
        Self {
            name,
            scope,
            class: None,
            kind,
            is_virtual: false,
            is_public: false,
            args: Vec::new(),
            return_type: None,
            body: Vec::new(),
            suspendable: false,
            dynamic: false,
            call_conv: CallConv::Direct,
            span: Span::DUMMY,
        }
    }

    /// Returns `true` if generated code calls this routine as a coroutine.
    pub fn is_coroutine(&self) -> bool {
        self.call_conv == CallConv::Coroutine
    }
}
