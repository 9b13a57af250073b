//! Variable declarations and their data types.

use crate::ids::{ClassId, FuncId, ScopeId};
use serde::{Deserialize, Serialize};
use tempo_common::{Ident, Span};

/// The storage class of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarKind {
    /// A net driven by continuous assignments.
    Net,
    /// A procedurally assigned variable.
    Reg,
    /// A temporary local to one block or routine.
    BlockTemp,
    /// A compiler-created variable living for the whole scope.
    ModuleTemp,
    /// A class member.
    Member,
    /// A routine parameter.
    Arg,
}

/// The resolved data type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// A packed bit vector.
    Bit {
        /// Number of bits.
        width: u32,
    },
    /// A signed 32-bit integer.
    Int,
    /// A double-precision real.
    Real,
    /// A named event.
    Event,
    /// A handle to an instance of a class.
    Class(ClassId),
}

impl DataType {
    /// A single bit.
    pub const BIT: DataType = DataType::Bit { width: 1 };
}

/// A declared or synthesized variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Var {
    /// Local name within the owning scope.
    pub name: Ident,
    /// The owning scope.
    pub scope: ScopeId,
    /// Storage class.
    pub kind: VarKind,
    /// Data type.
    pub ty: DataType,
    /// Visible to the outside world (ports, public signals).
    pub is_public: bool,
    /// Used as a clock by some clocked block.
    pub is_clock: bool,
    /// The routine this variable is local to, if any.
    pub func: Option<FuncId>,
    /// Source location.
    pub span: Span,
}

impl Var {
    /// Returns `true` if this variable is an event.
    pub fn is_event(&self) -> bool {
        self.ty == DataType::Event
    }

    /// Returns `true` if this variable is a real.
    pub fn is_real(&self) -> bool {
        self.ty == DataType::Real
    }
}
