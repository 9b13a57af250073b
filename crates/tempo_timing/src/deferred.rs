//! Deferred (non-blocking) assignment rewriting for suspendable code.
//!
//! Statically scheduled code commits deferred assignments in the NBA region.
//! Suspendable code may run at any point of a time slot, so there each
//! deferred assignment captures its value and spawns a detached waiter that
//! performs the write when the scope's deferred event is driven:
//!
//! ```text
//! lhs <= rhs;   =>   __Vdlyval__0 = rhs;
//!                    fork @(__VdlyEvent__) lhs = __Vdlyval__0; join_none
//! ```
//!
//! The same holds inside fork branches. A deferred assignment that is the
//! only statement of a fork branch is rewritten in place without a new fork.

use crate::context::{rewrite_stmts, TimingContext, TimingPass};
use crate::errors;
use tempo_ast::visit::walk_stmts;
use tempo_ast::{EdgeKind, Expr, JoinKind, SenItem, Stmt, UnitId, VarKind};
use tempo_common::{Span, TempoResult};

const PREFIX: &str = "__Vdlyval__";

/// Reports deferred assignments inside public routines.
///
/// Those routines are left untouched by the rewrite.
pub(crate) fn check_public(cx: &TimingContext<'_>) {
    for (id, func) in cx.netlist.funcs.iter() {
        if !func.is_public {
            continue;
        }
        walk_stmts(&func.body, &mut |stmt| {
            if let Stmt::AssignDeferred { span, .. } = stmt {
                cx.sink
                    .emit(errors::error_deferred_in_public(cx.netlist.func_name(id), *span));
            }
        });
    }
}

/// Rewrites deferred assignments in suspendable units and fork branches.
pub(crate) struct DeferredAssignPass;

impl TimingPass for DeferredAssignPass {
    fn name(&self) -> &'static str {
        "deferred"
    }

    fn run(&self, cx: &mut TimingContext<'_>) -> TempoResult<bool> {
        let mut rewrites = 0usize;
        for unit in cx.netlist.units() {
            if let UnitId::Func(f) = unit {
                if cx.netlist.funcs[f].is_public {
                    continue;
                }
            }
            let suspendable = cx.netlist.is_suspendable(unit);
            let mut body = cx.netlist.take_unit_body(unit);
            let result = rewrite_unit(cx, unit, &mut body, suspendable, &mut rewrites);
            *cx.netlist.unit_body_mut(unit) = body;
            result?;
        }
        if rewrites > 0 {
            log::debug!("deferred: rewrote {rewrites} deferred assignments");
        }
        Ok(rewrites > 0)
    }
}

fn rewrite_unit(
    cx: &mut TimingContext<'_>,
    unit: UnitId,
    body: &mut Vec<Stmt>,
    suspendable: bool,
    rewrites: &mut usize,
) -> TempoResult<()> {
    let scope = cx.netlist.unit_scope(unit);
    if suspendable {
        return rewrite_stmts(body, false, &mut |stmt, under_fork| {
            Ok(rewrite_one(cx, scope, stmt, under_fork, rewrites))
        });
    }
    // Only the fork branches of a static unit run as suspendable code.
    for stmt in body.iter_mut() {
        rewrite_forks_in(cx, scope, stmt, rewrites)?;
    }
    Ok(())
}

fn rewrite_forks_in(
    cx: &mut TimingContext<'_>,
    scope: tempo_ast::ScopeId,
    stmt: &mut Stmt,
    rewrites: &mut usize,
) -> TempoResult<()> {
    if let Stmt::Fork { branches, .. } = stmt {
        for branch in branches.iter_mut() {
            let sole = branch.len() == 1;
            rewrite_stmts(branch, sole, &mut |stmt, under_fork| {
                Ok(rewrite_one(cx, scope, stmt, under_fork, rewrites))
            })?;
        }
        return Ok(());
    }
    for body in stmt.bodies_mut() {
        for inner in body.iter_mut() {
            rewrite_forks_in(cx, scope, inner, rewrites)?;
        }
    }
    Ok(())
}

fn rewrite_one(
    cx: &mut TimingContext<'_>,
    scope: tempo_ast::ScopeId,
    stmt: Stmt,
    under_fork: bool,
    rewrites: &mut usize,
) -> Vec<Stmt> {
    let (lhs, rhs, span) = match stmt {
        Stmt::AssignDeferred {
            lhs,
            rhs,
            timing: None,
            span,
        } => (lhs, rhs, span),
        other => return vec![other],
    };
    *rewrites += 1;
    let ty = cx.value_type(&lhs);
    let tmp = cx.new_temp(scope, PREFIX, VarKind::BlockTemp, ty);
    let event = cx.deferred_event(scope);
    let capture = Stmt::Assign {
        lhs: Expr::var(tmp),
        rhs,
        timing: None,
        span,
    };
    let commit = Stmt::EventControl {
        senses: vec![SenItem::new(EdgeKind::AnyEdge, Expr::var(event))],
        body: vec![Stmt::Assign {
            lhs,
            rhs: Expr::var(tmp),
            timing: None,
            span,
        }],
        span,
    };
    if under_fork {
        vec![capture, commit]
    } else {
        vec![capture, detached(commit, span)]
    }
}

fn detached(stmt: Stmt, span: Span) -> Stmt {
    Stmt::Fork {
        name: None,
        join: JoinKind::JoinNone,
        branches: vec![vec![stmt]],
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_ast::{DataType, Func, FuncKind, Netlist, Process, ProcessKind, ScopeId};
    use tempo_config::TimingConfig;
    use tempo_diagnostics::DiagnosticSink;

    fn setup() -> (Netlist, ScopeId, Expr, Expr) {
        let mut n = Netlist::new();
        let top = n.add_scope("top", None);
        let a = n.add_var(top, "a", VarKind::Reg, DataType::Bit { width: 4 });
        let b = n.add_var(top, "b", VarKind::Reg, DataType::Bit { width: 4 });
        (n, top, Expr::var(a), Expr::var(b))
    }

    #[test]
    fn suspendable_unit_spawns_detached_writer() {
        let (mut n, top, a, b) = setup();
        let mut process = Process::new(
            top,
            ProcessKind::Initial,
            vec![Stmt::assign_deferred(a.clone(), b.clone())],
        );
        process.suspendable = true;
        let p = n.add_process(process);

        let config = TimingConfig::default();
        let sink = DiagnosticSink::new();
        let mut cx = TimingContext::new(&mut n, &config, &sink);
        assert!(DeferredAssignPass.run(&mut cx).unwrap());
        let event = cx.deferred_events[&top];
        // A second run finds nothing left to rewrite.
        assert!(!DeferredAssignPass.run(&mut cx).unwrap());
        drop(cx);

        let tmp = n.find_var(top, "__Vdlyval__0").unwrap();
        assert_eq!(n.var_name(event), "__VdlyEvent__");
        assert_eq!(
            n.processes[p].body,
            vec![
                Stmt::assign(Expr::var(tmp), b),
                Stmt::fork(
                    JoinKind::JoinNone,
                    vec![vec![Stmt::event_control(
                        vec![SenItem::new(EdgeKind::AnyEdge, Expr::var(event))],
                        vec![Stmt::assign(a, Expr::var(tmp))],
                    )]]
                ),
            ]
        );
    }

    #[test]
    fn static_unit_is_untouched_outside_forks() {
        let (mut n, top, a, b) = setup();
        let body = vec![
            Stmt::assign_deferred(a.clone(), b.clone()),
            Stmt::fork(JoinKind::JoinNone, vec![vec![Stmt::assign_deferred(b, a)]]),
        ];
        let p = n.add_process(Process::new(top, ProcessKind::Initial, body));
        let config = TimingConfig::default();
        let sink = DiagnosticSink::new();
        let mut cx = TimingContext::new(&mut n, &config, &sink);
        assert!(DeferredAssignPass.run(&mut cx).unwrap());
        drop(cx);

        let body = &n.processes[p].body;
        assert!(matches!(body[0], Stmt::AssignDeferred { .. }));
        let Stmt::Fork { branches, .. } = &body[1] else {
            panic!("expected fork");
        };
        // Sole statement of the branch: no nested fork.
        assert_eq!(branches[0].len(), 2);
        assert!(matches!(branches[0][1], Stmt::EventControl { .. }));
    }

    #[test]
    fn public_routines_are_reported_and_skipped() {
        let (mut n, top, a, b) = setup();
        let mut poke = Func::new(n.intern("poke"), top, FuncKind::Task);
        poke.is_public = true;
        poke.suspendable = true;
        poke.body = vec![Stmt::assign_deferred(a, b)];
        let f = n.add_func(poke);

        let config = TimingConfig::default();
        let sink = DiagnosticSink::new();
        let mut cx = TimingContext::new(&mut n, &config, &sink);
        check_public(&cx);
        assert!(!DeferredAssignPass.run(&mut cx).unwrap());
        drop(cx);
        assert_eq!(sink.diagnostics()[0].code, errors::E303);
        assert!(matches!(n.funcs[f].body[0], Stmt::AssignDeferred { .. }));
    }
}
