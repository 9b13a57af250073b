//! Clock resolution for concurrent assertions.
//!
//! An assertion without an explicit clock takes the `default clocking` of
//! its scope, else the first sensitivity item of the enclosing `always`
//! process. Assertions that end up with no clock, or that name several,
//! are reported; an unclocked one gets a placeholder clock that never fires
//! so later stages always see exactly one.

use crate::context::{TimingContext, TimingPass};
use crate::errors;
use tempo_ast::visit::walk_stmts_mut;
use tempo_ast::{EdgeKind, Expr, SenItem, SenTree, Stmt, UnitId};
use tempo_common::TempoResult;

/// Attaches a clock to every assertion.
pub(crate) struct ClockingPass;

impl TimingPass for ClockingPass {
    fn name(&self) -> &'static str {
        "clocking"
    }

    fn run(&self, cx: &mut TimingContext<'_>) -> TempoResult<bool> {
        let mut changed = false;
        for unit in cx.netlist.units() {
            let fallback = fallback_clock(cx, unit);
            let sink = cx.sink;
            walk_stmts_mut(cx.netlist.unit_body_mut(unit), &mut |stmt| {
                let Stmt::Assertion { clocks, span, .. } = stmt else {
                    return;
                };
                match clocks.len() {
                    0 => match &fallback {
                        Some(clock) => {
                            clocks.push(clock.clone());
                            changed = true;
                        }
                        None => {
                            sink.emit(errors::error_unclocked_assertion(*span));
                            clocks.push(placeholder_clock());
                            changed = true;
                        }
                    },
                    1 => {}
                    n => {
                        sink.emit(errors::error_multiple_clocks(n, *span));
                        clocks.truncate(1);
                        changed = true;
                    }
                }
            });
        }
        Ok(changed)
    }
}

/// A constant under `@(*)`: never changes, so never fires.
fn placeholder_clock() -> SenItem {
    SenItem::new(EdgeKind::AnyEdge, Expr::Int(0))
}

/// The clock an unclocked assertion in `unit` falls back to.
fn fallback_clock(cx: &TimingContext<'_>, unit: UnitId) -> Option<SenItem> {
    let scope = cx.netlist.unit_scope(unit);
    if let Some(clock) = &cx.netlist.scopes[scope].default_clocking {
        return Some(clock.clone());
    }
    let UnitId::Process(process) = unit else {
        return None;
    };
    match &cx.netlist.processes[process].sensitivity {
        Some(SenTree::Items(items)) => items.first().cloned(),
        _ => None,
    }
}
