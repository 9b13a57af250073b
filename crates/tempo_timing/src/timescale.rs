//! Delay scaling.
//!
//! Delay amounts are written in the time unit of their scope, while the
//! runtime counts in ticks of the scope's precision. Every delay is
//! multiplied by `10^(unit - precision)`; literal amounts are folded.

use crate::context::{TimingContext, TimingPass};
use crate::errors;
use std::collections::BTreeSet;
use tempo_ast::visit::walk_stmts_mut;
use tempo_ast::{BinaryOp, Expr, Netlist, Stmt};
use tempo_common::{Span, TempoResult};
use tempo_diagnostics::DiagnosticSink;

/// Scales every delay to precision ticks.
pub(crate) struct TimescalePass;

impl TimingPass for TimescalePass {
    fn name(&self) -> &'static str {
        "timescale"
    }

    fn run(&self, cx: &mut TimingContext<'_>) -> TempoResult<bool> {
        let mut reported = BTreeSet::new();
        let mut scaled = 0usize;
        for unit in cx.netlist.units() {
            let scope = cx.netlist.unit_scope(unit);
            let timescale = cx.netlist.timescale_of(scope);
            let Some(factor) = timescale.scale_factor() else {
                if reported.insert(scope) {
                    let path = cx.netlist.scope_path(scope);
                    cx.sink
                        .emit(errors::error_coarse_precision(&path, timescale, Span::DUMMY));
                }
                continue;
            };
            let mut body = cx.netlist.take_unit_body(unit);
            let netlist: &Netlist = cx.netlist;
            let sink = cx.sink;
            walk_stmts_mut(&mut body, &mut |stmt| {
                if let Stmt::Delay { amount, span, .. } = stmt {
                    scale_amount(netlist, sink, amount, factor, *span);
                    scaled += 1;
                }
            });
            *cx.netlist.unit_body_mut(unit) = body;
        }
        log::debug!("timescale: scaled {scaled} delays");
        Ok(scaled > 0)
    }
}

/// Multiplies `amount` by `factor` in place.
fn scale_amount(netlist: &Netlist, sink: &DiagnosticSink, amount: &mut Expr, factor: u64, span: Span) {
    match amount {
        Expr::Int(value) => match value.checked_mul(factor) {
            Some(product) => *value = product,
            None => sink.emit(errors::error_delay_overflow(*value, factor, span)),
        },
        Expr::Real(value) => *value *= factor as f64,
        _ => {
            let original = std::mem::replace(amount, Expr::Int(0));
            *amount = if netlist.is_real_expr(&original) {
                Expr::binary(BinaryOp::MulReal, original, Expr::Real(factor as f64))
            } else {
                Expr::binary(BinaryOp::Mul, original, Expr::Int(factor))
            };
        }
    }
}
