//! Trigger injection.
//!
//! Edge events only work if something fires them. Every blocking write to a
//! signal with edge events is wrapped so the events fire right after the new
//! value is stored:
//!
//! ```text
//! sig = v;   =>   __Vprevval__0 = sig;
//!                 sig = v;
//!                 if (!__Vprevval__0 && sig) -> <posedge event>;
//!                 if (__Vprevval__0 && !sig) -> <negedge event>;
//!                 if (__Vprevval__0 != sig) -> <anyedge event>;
//! ```
//!
//! Signals written where no injection is possible (from outside the design,
//! or by statically scheduled deferred assignments) get small fallback
//! processes `always @(edge sig) -> event;` instead.

use crate::context::{rewrite_stmts, TimingContext, TimingPass};
use crate::edge_events::event_expr;
use std::collections::BTreeSet;
use tempo_ast::visit::{walk_stmts, walk_stmts_mut};
use tempo_ast::{
    BinaryOp, EdgeKind, Expr, Process, ProcessKind, SenItem, SenTree, Stmt, UnaryOp, VarId, VarKind,
};
use tempo_common::{Span, TempoResult};

const PREFIX: &str = "__Vprevval__";

/// Fires edge events after every write to their signals.
pub(crate) struct TriggerPass;

impl TimingPass for TriggerPass {
    fn name(&self) -> &'static str {
        "triggers"
    }

    fn run(&self, cx: &mut TimingContext<'_>) -> TempoResult<bool> {
        let converted = convert_continuous(cx);
        let injected = inject(cx)?;
        let fallbacks = add_fallbacks(cx);
        log::debug!(
            "triggers: {converted} continuous assignments converted, \
             {injected} writes instrumented, {fallbacks} fallback processes"
        );
        Ok(converted + injected + fallbacks > 0)
    }
}

/// Turns continuous assignments to tracked signals into `always @*`
/// processes so their writes can be instrumented.
fn convert_continuous(cx: &mut TimingContext<'_>) -> usize {
    let assigns = std::mem::take(&mut cx.netlist.assigns);
    let mut converted = 0;
    for assign in assigns {
        let tracked = assign
            .lhs
            .target_var()
            .is_some_and(|var| cx.edge_events.has_any(var));
        if !tracked {
            cx.netlist.assigns.push(assign);
            continue;
        }
        let body = vec![Stmt::Assign {
            lhs: assign.lhs,
            rhs: assign.rhs,
            timing: assign.timing,
            span: assign.span,
        }];
        let mut process =
            Process::new(assign.scope, ProcessKind::Always, body).with_sensitivity(SenTree::Combo);
        process.span = assign.span;
        cx.netlist.add_process(process);
        converted += 1;
    }
    converted
}

fn inject(cx: &mut TimingContext<'_>) -> TempoResult<usize> {
    let mut injected = 0;
    for unit in cx.netlist.units() {
        let scope = cx.netlist.unit_scope(unit);
        let mut body = cx.netlist.take_unit_body(unit);
        let result = rewrite_stmts(&mut body, false, &mut |stmt, _| {
            let signal = match &stmt {
                Stmt::Assign {
                    lhs, timing: None, ..
                } => lhs.target_var().filter(|&var| cx.edge_events.has_any(var)),
                _ => None,
            };
            let Some(signal) = signal else {
                return Ok(vec![stmt]);
            };
            injected += 1;
            Ok(instrument(cx, scope, signal, stmt))
        });
        *cx.netlist.unit_body_mut(unit) = body;
        result?;
    }
    Ok(injected)
}

fn instrument(cx: &mut TimingContext<'_>, scope: tempo_ast::ScopeId, signal: VarId, assign: Stmt) -> Vec<Stmt> {
    let (lhs, span) = match &assign {
        Stmt::Assign { lhs, span, .. } => (lhs.clone(), *span),
        _ => return vec![assign],
    };
    let ty = cx.value_type(&lhs);
    let prev = Expr::var(cx.new_temp(scope, PREFIX, VarKind::BlockTemp, ty));
    let mut out = vec![
        Stmt::Assign {
            lhs: prev.clone(),
            rhs: lhs.clone(),
            timing: None,
            span,
        },
        assign,
    ];
    for (edge, event) in cx.edge_events.events_of(signal) {
        let cond = match edge {
            EdgeKind::Posedge => Expr::binary(
                BinaryOp::LogAnd,
                Expr::unary(UnaryOp::LogNot, prev.clone()),
                lhs.clone(),
            ),
            EdgeKind::Negedge => Expr::binary(
                BinaryOp::LogAnd,
                prev.clone(),
                Expr::unary(UnaryOp::LogNot, lhs.clone()),
            ),
            _ => Expr::binary(BinaryOp::Neq, prev.clone(), lhs.clone()),
        };
        out.push(fire_if(cond, event_expr(&lhs, event), span));
    }
    out
}

fn fire_if(cond: Expr, event: Expr, span: Span) -> Stmt {
    Stmt::If {
        cond,
        then_body: vec![Stmt::EventTrigger { event, span }],
        else_body: Vec::new(),
        span,
    }
}

/// Adds `always @(edge sig) -> event;` for signals whose writes are not
/// instrumented.
fn add_fallbacks(cx: &mut TimingContext<'_>) -> usize {
    let mut deferred_targets = BTreeSet::new();
    for unit in cx.netlist.units() {
        walk_stmts(cx.netlist.unit_body(unit), &mut |stmt| {
            if let Stmt::AssignDeferred { lhs, .. } = stmt {
                if let Some(var) = lhs.target_var() {
                    deferred_targets.insert(var);
                }
            }
        });
    }

    let mut added = 0;
    for signal in cx.edge_events.signals() {
        let var = &cx.netlist.vars[signal];
        if var.kind == VarKind::Member {
            continue;
        }
        if !(var.is_public || var.is_clock || deferred_targets.contains(&signal)) {
            continue;
        }
        let scope = var.scope;
        for (edge, event) in cx.edge_events.events_of(signal) {
            let watched = match edge {
                EdgeKind::AnyEdge => EdgeKind::BothEdge,
                other => other,
            };
            let sensitivity = SenTree::Items(vec![SenItem::new(watched, Expr::var(signal))]);
            let body = vec![Stmt::trigger(Expr::var(event))];
            cx.netlist
                .add_process(Process::new(scope, ProcessKind::Always, body).with_sensitivity(sensitivity));
            added += 1;
        }
    }
    added
}

/// Lowers every event trigger to a plain `event = 1` write.
///
/// Used when nothing in the design suspends: events are then only observed
/// by statically scheduled code, which reads them like any other signal.
pub(crate) struct CleanTriggersPass;

impl TimingPass for CleanTriggersPass {
    fn name(&self) -> &'static str {
        "clean-triggers"
    }

    fn run(&self, cx: &mut TimingContext<'_>) -> TempoResult<bool> {
        let mut lowered = 0usize;
        for unit in cx.netlist.units() {
            walk_stmts_mut(cx.netlist.unit_body_mut(unit), &mut |stmt| {
                if let Stmt::EventTrigger { event, span } = stmt {
                    *stmt = Stmt::Assign {
                        lhs: std::mem::replace(event, Expr::Int(0)),
                        rhs: Expr::Int(1),
                        timing: None,
                        span: *span,
                    };
                    lowered += 1;
                }
            });
        }
        if lowered > 0 {
            log::debug!("clean-triggers: lowered {lowered} event triggers");
        }
        Ok(lowered > 0)
    }
}
