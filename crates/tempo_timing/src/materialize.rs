//! Edge-event materialization.
//!
//! After this pass no dynamically scheduled code waits on a raw signal:
//! event controls wait on edge events, and `wait (cond)` statements become
//! loops re-checking the condition whenever a signal it reads changes.
//!
//! ```text
//! @(posedge clk) s;   =>  @(__VedgeEvent__top__posedge__clk) s;
//! wait (a == b) s;    =>  while (!(a == b)) @(<anyedge a>, <anyedge b>); s;
//! ```

use crate::context::{rewrite_stmts, TimingContext, TimingPass};
use crate::edge_events::{event_expr, translate_senses};
use tempo_ast::{EdgeKind, Expr, SenItem, Stmt, UnaryOp};
use tempo_common::TempoResult;

/// Rewrites event controls and waits to use edge events.
pub(crate) struct MaterializePass;

impl TimingPass for MaterializePass {
    fn name(&self) -> &'static str {
        "materialize"
    }

    fn run(&self, cx: &mut TimingContext<'_>) -> TempoResult<bool> {
        let mut changed = false;
        for unit in cx.netlist.units() {
            let mut body = cx.netlist.take_unit_body(unit);
            let result = rewrite_stmts(&mut body, false, &mut |stmt, _| match stmt {
                Stmt::EventControl { senses, body, span } => {
                    let before = senses.clone();
                    let senses = translate_senses(&mut cx.edge_events, cx.netlist, senses)?;
                    changed |= senses != before;
                    Ok(vec![Stmt::EventControl { senses, body, span }])
                }
                Stmt::Wait { cond, body, span } => {
                    changed = true;
                    lower_wait(cx, cond, body, span)
                }
                other => Ok(vec![other]),
            });
            *cx.netlist.unit_body_mut(unit) = body;
            result?;
        }
        log::debug!("materialize: {} edge events in use", cx.edge_events.len());
        Ok(changed)
    }
}

fn lower_wait(
    cx: &mut TimingContext<'_>,
    cond: Expr,
    mut body: Vec<Stmt>,
    span: tempo_common::Span,
) -> TempoResult<Vec<Stmt>> {
    let refs = cond.signal_refs();
    if refs.is_empty() {
        // A constant condition never changes, so there is nothing to wait for.
        return Ok(body);
    }
    let mut senses = Vec::with_capacity(refs.len());
    for signal_ref in refs {
        let Some(var) = signal_ref.target_var() else {
            continue;
        };
        if cx.netlist.vars[var].is_event() {
            senses.push(SenItem::new(EdgeKind::AnyEdge, signal_ref));
            continue;
        }
        let event = cx.edge_events.get_or_create(cx.netlist, var, EdgeKind::AnyEdge)?;
        senses.push(SenItem::new(EdgeKind::AnyEdge, event_expr(&signal_ref, event)));
    }
    let mut out = vec![Stmt::While {
        cond: Expr::unary(UnaryOp::LogNot, cond),
        body: vec![Stmt::EventControl {
            senses,
            body: Vec::new(),
            span,
        }],
        span,
    }];
    out.append(&mut body);
    Ok(out)
}
