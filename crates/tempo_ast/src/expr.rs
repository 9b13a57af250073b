//! Expressions appearing in statements, sensitivity items, and delays.

use crate::ids::{ClassId, FuncId, VarId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Bitwise negation (`~`).
    Not,
    /// Logical negation (`!`).
    LogNot,
    /// Arithmetic negation (`-`).
    Neg,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    /// Integer addition.
    Add,
    /// Integer subtraction.
    Sub,
    /// Integer multiplication.
    Mul,
    /// Real-valued multiplication.
    MulReal,
    /// Bitwise and.
    And,
    /// Bitwise or.
    Or,
    /// Logical and.
    LogAnd,
    /// Logical or.
    LogOr,
    /// Equality.
    Eq,
    /// Inequality.
    Neq,
    /// Less than.
    Lt,
    /// Greater than.
    Gt,
}

/// A type-resolved expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// A reference to a variable.
    Var(VarId),
    /// An unsized 64-bit integer constant.
    Int(u64),
    /// A real constant.
    Real(f64),
    /// A unary operation.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        operand: Box<Expr>,
    },
    /// A binary operation.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// The left operand.
        lhs: Box<Expr>,
        /// The right operand.
        rhs: Box<Expr>,
    },
    /// Selection of a class member through a handle (`base.member`).
    Member {
        /// Expression yielding the object handle.
        base: Box<Expr>,
        /// The selected member variable.
        member: VarId,
    },
    /// A call to a function returning a value.
    Call {
        /// The callee.
        func: FuncId,
        /// Call arguments.
        args: Vec<Expr>,
    },
    /// Construction of a new class instance.
    New {
        /// The class being instantiated.
        class: ClassId,
    },
}

impl Expr {
    /// Creates a variable reference.
    pub fn var(var: VarId) -> Self {
        Expr::Var(var)
    }

    /// Creates a unary operation.
    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// Creates a binary operation.
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Creates a member selection.
    pub fn member(base: Expr, member: VarId) -> Self {
        Expr::Member {
            base: Box::new(base),
            member,
        }
    }

    /// Returns the variable an assignment to this expression writes.
    ///
    /// For `handle.member` this is the member, for a plain reference the
    /// variable itself. Other expressions are not assignable.
    pub fn target_var(&self) -> Option<VarId> {
        match self {
            Expr::Var(v) => Some(*v),
            Expr::Member { member, .. } => Some(*member),
            _ => None,
        }
    }

    /// Calls `f` on every variable referenced directly by a `Var` node.
    ///
    /// Member selections report their base handle, not the member.
    pub fn for_each_var_ref(&self, f: &mut impl FnMut(VarId)) {
        match self {
            Expr::Var(v) => f(*v),
            Expr::Int(_) | Expr::Real(_) | Expr::New { .. } => {}
            Expr::Unary { operand, .. } => operand.for_each_var_ref(f),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.for_each_var_ref(f);
                rhs.for_each_var_ref(f);
            }
            Expr::Member { base, .. } => base.for_each_var_ref(f),
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.for_each_var_ref(f);
                }
            }
        }
    }

    /// Calls `f` on every signal whose value this expression observes.
    ///
    /// Unlike [`for_each_var_ref`](Self::for_each_var_ref), a member
    /// selection reports the member itself, since that is the storage whose
    /// changes an observer cares about.
    pub fn for_each_signal(&self, f: &mut impl FnMut(VarId)) {
        match self {
            Expr::Var(v) => f(*v),
            Expr::Int(_) | Expr::Real(_) | Expr::New { .. } => {}
            Expr::Unary { operand, .. } => operand.for_each_signal(f),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.for_each_signal(f);
                rhs.for_each_signal(f);
            }
            Expr::Member { member, .. } => f(*member),
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.for_each_signal(f);
                }
            }
        }
    }

    /// Returns the distinct signal references (`Var` or member selections)
    /// this expression observes, in first-occurrence order.
    ///
    /// Member selections are returned whole so the object handle is kept.
    pub fn signal_refs(&self) -> Vec<Expr> {
        fn collect(expr: &Expr, out: &mut Vec<Expr>) {
            match expr {
                Expr::Var(_) | Expr::Member { .. } => {
                    if !out.contains(expr) {
                        out.push(expr.clone());
                    }
                }
                Expr::Int(_) | Expr::Real(_) | Expr::New { .. } => {}
                Expr::Unary { operand, .. } => collect(operand, out),
                Expr::Binary { lhs, rhs, .. } => {
                    collect(lhs, out);
                    collect(rhs, out);
                }
                Expr::Call { args, .. } => {
                    for arg in args {
                        collect(arg, out);
                    }
                }
            }
        }
        let mut out = Vec::new();
        collect(self, &mut out);
        out
    }

    /// Calls `f` on every function called from within this expression.
    pub fn for_each_call(&self, f: &mut impl FnMut(FuncId)) {
        match self {
            Expr::Var(_) | Expr::Int(_) | Expr::Real(_) | Expr::New { .. } => {}
            Expr::Unary { operand, .. } => operand.for_each_call(f),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.for_each_call(f);
                rhs.for_each_call(f);
            }
            Expr::Member { base, .. } => base.for_each_call(f),
            Expr::Call { func, args } => {
                f(*func);
                for arg in args {
                    arg.for_each_call(f);
                }
            }
        }
    }

    /// Replaces every `Var` reference found in `map`.
    pub fn remap_vars(&mut self, map: &BTreeMap<VarId, VarId>) {
        match self {
            Expr::Var(v) => {
                if let Some(new) = map.get(v) {
                    *v = *new;
                }
            }
            Expr::Int(_) | Expr::Real(_) | Expr::New { .. } => {}
            Expr::Unary { operand, .. } => operand.remap_vars(map),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.remap_vars(map);
                rhs.remap_vars(map);
            }
            Expr::Member { base, .. } => base.remap_vars(map),
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.remap_vars(map);
                }
            }
        }
    }
}
