//! The elaborated netlist the Tempo scheduling passes operate on.
//!
//! Every reference is already bound: expressions name variables and routines
//! by ID, classes record their base class, and scopes record their time
//! scale. Passes rewrite statement bodies in place and append new entities
//! to the arenas.

#![warn(missing_docs)]

pub mod arena;
pub mod class;
pub mod expr;
pub mod func;
pub mod ids;
pub mod netlist;
pub mod process;
pub mod scope;
pub mod stmt;
pub mod var;
pub mod visit;

pub use arena::{Arena, ArenaId};
pub use class::Class;
pub use expr::{BinaryOp, Expr, UnaryOp};
pub use func::{CallConv, Func, FuncKind};
pub use ids::{ClassId, FuncId, ProcessId, ScopeId, VarId};
pub use netlist::{ContinuousAssign, Hook, JoinClass, Netlist, UnitId};
pub use process::{Process, ProcessKind};
pub use scope::{Scope, ScopeKind};
pub use stmt::{EdgeKind, JoinKind, SenItem, SenTree, Statement, Stmt, TimingControl};
pub use var::{DataType, Var, VarKind};
