//! Class declarations.

use crate::ids::{ClassId, FuncId, ScopeId};
use serde::{Deserialize, Serialize};
use tempo_common::Ident;

/// A class with single inheritance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    /// Class name.
    pub name: Ident,
    /// Scope holding the class members.
    pub scope: ScopeId,
    /// Base class.
    pub extends: Option<ClassId>,
    /// Constructor routine, if declared.
    pub constructor: Option<FuncId>,
    /// Destructor routine, if declared or synthesized.
    pub destructor: Option<FuncId>,
}
