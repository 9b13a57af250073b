//! Intra-assignment timing control rewriting.
//!
//! The right-hand side of `a = #d b` is sampled when the statement starts,
//! so the value is captured in a temporary before the delay:
//!
//! ```text
//! a = #d b;      =>  __Vintraval__0 = b; #d a = __Vintraval__0;
//! a <= #d b;     =>  __Vintraval__1 = b; fork #d a <= __Vintraval__1; join_none
//! ```
//!
//! A deferred assignment that is already the only statement of a fork
//! branch needs no extra fork. Event controls are handled like delays.
//! Continuous assignments with a delay become `always @*` processes.

use crate::context::{for_each_unit_body, rewrite_stmts, TimingContext, TimingPass};
use tempo_ast::{
    ContinuousAssign, DataType, Expr, JoinKind, Process, ProcessKind, ScopeId, SenTree, Stmt,
    TimingControl, VarKind,
};
use tempo_common::{Span, TempoResult};

const PREFIX: &str = "__Vintraval__";

/// Moves intra-assignment timing controls out of assignments.
pub(crate) struct IntraAssignPass;

impl TimingPass for IntraAssignPass {
    fn name(&self) -> &'static str {
        "intra"
    }

    fn run(&self, cx: &mut TimingContext<'_>) -> TempoResult<bool> {
        let mut rewrites = 0usize;
        let mut pending = Vec::new();
        {
            let names = &mut cx.names;
            for_each_unit_body(cx.netlist, |netlist, unit, body| {
                let scope = netlist.unit_scope(unit);
                rewrite_stmts(body, false, &mut |stmt, under_fork| {
                    let out = rewrite_assign(netlist, names, scope, stmt, under_fork);
                    if out.len() > 1 {
                        rewrites += 1;
                    }
                    Ok(out)
                })
            })?;
        }

        let assigns = std::mem::take(&mut cx.netlist.assigns);
        for assign in assigns {
            if assign.timing.is_some() {
                pending.push(assign);
            } else {
                cx.netlist.assigns.push(assign);
            }
        }
        for assign in pending {
            lower_continuous(cx, assign);
            rewrites += 1;
        }

        log::debug!("intra: rewrote {rewrites} timed assignments");
        Ok(rewrites > 0)
    }
}

/// Wraps `body` in the statement form of a timing control.
fn control(timing: TimingControl, body: Vec<Stmt>, span: Span) -> Stmt {
    match timing {
        TimingControl::Delay(amount) => Stmt::Delay { amount, body, span },
        TimingControl::Event(senses) => Stmt::EventControl { senses, body, span },
    }
}

fn temp_type(netlist: &tempo_ast::Netlist, lhs: &Expr) -> DataType {
    match lhs.target_var() {
        Some(var) => netlist.vars[var].ty,
        None => DataType::Int,
    }
}

fn new_temp(
    netlist: &mut tempo_ast::Netlist,
    names: &mut crate::context::UniqueNames,
    scope: ScopeId,
    lhs: &Expr,
) -> tempo_ast::VarId {
    let ty = temp_type(netlist, lhs);
    let name = names.next(PREFIX);
    netlist.add_var(scope, &name, VarKind::BlockTemp, ty)
}

fn rewrite_assign(
    netlist: &mut tempo_ast::Netlist,
    names: &mut crate::context::UniqueNames,
    scope: ScopeId,
    stmt: Stmt,
    under_fork: bool,
) -> Vec<Stmt> {
    match stmt {
        Stmt::Assign {
            lhs,
            rhs,
            timing: Some(timing),
            span,
        } => {
            let tmp = new_temp(netlist, names, scope, &lhs);
            let capture = Stmt::Assign {
                lhs: Expr::var(tmp),
                rhs,
                timing: None,
                span,
            };
            let write = Stmt::Assign {
                lhs,
                rhs: Expr::var(tmp),
                timing: None,
                span,
            };
            vec![capture, control(timing, vec![write], span)]
        }
        Stmt::AssignDeferred {
            lhs,
            rhs,
            timing: Some(timing),
            span,
        } => {
            let tmp = new_temp(netlist, names, scope, &lhs);
            let capture = Stmt::Assign {
                lhs: Expr::var(tmp),
                rhs,
                timing: None,
                span,
            };
            let write = Stmt::AssignDeferred {
                lhs,
                rhs: Expr::var(tmp),
                timing: None,
                span,
            };
            let delayed = control(timing, vec![write], span);
            if under_fork {
                vec![capture, delayed]
            } else {
                let fork = Stmt::Fork {
                    name: None,
                    join: JoinKind::JoinNone,
                    branches: vec![vec![delayed]],
                    span,
                };
                vec![capture, fork]
            }
        }
        other => vec![other],
    }
}

/// Turns `assign a = #d b` into `always @* begin tmp = b; #d a = tmp; end`.
fn lower_continuous(cx: &mut TimingContext<'_>, assign: ContinuousAssign) {
    let ContinuousAssign {
        scope,
        lhs,
        rhs,
        timing,
        span,
    } = assign;
    let ty = temp_type(cx.netlist, &lhs);
    let tmp = cx.new_temp(scope, PREFIX, VarKind::BlockTemp, ty);
    let capture = Stmt::Assign {
        lhs: Expr::var(tmp),
        rhs,
        timing: None,
        span,
    };
    let write = Stmt::Assign {
        lhs,
        rhs: Expr::var(tmp),
        timing: None,
        span,
    };
    let mut body = vec![capture];
    match timing {
        Some(timing) => body.push(control(timing, vec![write], span)),
        None => body.push(write),
    }
    let mut process = Process::new(scope, ProcessKind::Always, body).with_sensitivity(SenTree::Combo);
    process.span = span;
    let id = cx.netlist.add_process(process);
    log::debug!("intra: continuous assignment lowered to process {}", id.as_raw());
}
