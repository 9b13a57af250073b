//! Pre-order traversal helpers over statement trees.

use crate::expr::Expr;
use crate::stmt::Stmt;

/// Calls `f` on every statement in `stmts`, parents before children.
pub fn walk_stmts<'a>(stmts: &'a [Stmt], f: &mut impl FnMut(&'a Stmt)) {
    for stmt in stmts {
        f(stmt);
        for body in stmt.bodies() {
            walk_stmts(body, f);
        }
    }
}

/// Calls `f` on every statement in `stmts`, parents before children.
///
/// Children are visited after `f` returns, so `f` may rewrite a statement's
/// nested bodies and the walk will descend into the rewritten ones.
pub fn walk_stmts_mut(stmts: &mut [Stmt], f: &mut impl FnMut(&mut Stmt)) {
    for stmt in stmts {
        f(stmt);
        for body in stmt.bodies_mut() {
            walk_stmts_mut(body, f);
        }
    }
}

/// Calls `f` on every expression owned by any statement in `stmts`.
pub fn walk_exprs<'a>(stmts: &'a [Stmt], f: &mut impl FnMut(&'a Expr)) {
    walk_stmts(stmts, &mut |stmt| {
        for expr in stmt.exprs() {
            f(expr);
        }
    });
}

/// Calls `f` on every expression owned by any statement in `stmts`, mutably.
pub fn walk_exprs_mut(stmts: &mut [Stmt], f: &mut impl FnMut(&mut Expr)) {
    walk_stmts_mut(stmts, &mut |stmt| {
        for expr in stmt.exprs_mut() {
            f(expr);
        }
    });
}
