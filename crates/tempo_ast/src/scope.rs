//! Scopes: module instances and class bodies.

use crate::ids::{ClassId, ScopeId, VarId};
use crate::stmt::SenItem;
use serde::{Deserialize, Serialize};
use tempo_common::{Ident, TimeScale};

/// What a scope was elaborated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeKind {
    /// A module instance.
    Module,
    /// The member scope of a class.
    Class(ClassId),
}

/// A named scope holding variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scope {
    /// Local name; the full path is formed by joining ancestors with `.`.
    pub name: Ident,
    /// What this scope belongs to.
    pub kind: ScopeKind,
    /// Enclosing scope.
    pub parent: Option<ScopeId>,
    /// Time scale declared by the design unit, if any.
    pub timescale: Option<TimeScale>,
    /// Clock declared by a `default clocking` block, used by unclocked assertions.
    pub default_clocking: Option<SenItem>,
    /// Variables declared in this scope, in declaration order.
    pub vars: Vec<VarId>,
}
