//! Opaque ID newtypes for netlist entities.
//!
//! IDs are ordered so they can serve as nodes of a `petgraph` graph map and
//! as keys of ordered maps, which keeps synthesized names deterministic.

use crate::arena::ArenaId;
use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl ArenaId for $name {
            fn from_raw(index: u32) -> Self {
                Self(index)
            }

            fn as_raw(self) -> u32 {
                self.0
            }
        }
    };
}

define_id!(
    /// ID of a scope (module instance or class body).
    ScopeId
);

define_id!(
    /// ID of a variable, net, event, or temporary.
    VarId
);

define_id!(
    /// ID of a function, task, or synthesized routine.
    FuncId
);

define_id!(
    /// ID of an initial/always/final process.
    ProcessId
);

define_id!(
    /// ID of a class declaration.
    ClassId
);
