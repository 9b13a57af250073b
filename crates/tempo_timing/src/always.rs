//! Always-to-initial conversion.
//!
//! A statically scheduled `always` block runs its body once per trigger. Two
//! kinds cannot be scheduled that way and become `initial` loops instead:
//!
//! - without sensitivity but suspendable (`always #1 clk = ~clk;`):
//!   `initial while (1) body`
//! - waiting on a dynamically written signal or an event:
//!   `initial while (1) @(edge events) body`

use crate::classify::waits_on_dynamic;
use crate::context::{TimingContext, TimingPass};
use crate::edge_events::translate_senses;
use tempo_ast::{Expr, ProcessKind, SenTree, Stmt};
use tempo_common::{Span, TempoResult};

/// Turns always blocks that need dynamic scheduling into initial loops.
pub(crate) struct AlwaysToInitialPass;

impl TimingPass for AlwaysToInitialPass {
    fn name(&self) -> &'static str {
        "always"
    }

    fn run(&self, cx: &mut TimingContext<'_>) -> TempoResult<bool> {
        let mut changed = false;
        for id in cx.netlist.processes.ids() {
            let process = &cx.netlist.processes[id];
            if process.kind != ProcessKind::Always {
                continue;
            }
            let convert = match &process.sensitivity {
                None => process.suspendable,
                Some(SenTree::Items(_)) => waits_on_dynamic(cx, id),
                Some(SenTree::Combo) => false,
            };
            if !convert {
                continue;
            }

            let process = &mut cx.netlist.processes[id];
            let span = process.span;
            let mut body = std::mem::take(&mut process.body);
            if let Some(SenTree::Items(items)) = process.sensitivity.take() {
                let senses = translate_senses(&mut cx.edge_events, cx.netlist, items)?;
                body = vec![Stmt::EventControl { senses, body, span }];
            }
            let process = &mut cx.netlist.processes[id];
            process.kind = ProcessKind::Initial;
            process.body = vec![forever(body, span)];
            log::debug!("always: process {} became an initial loop", id.as_raw());
            changed = true;
        }
        Ok(changed)
    }
}

fn forever(body: Vec<Stmt>, span: Span) -> Stmt {
    Stmt::While {
        cond: Expr::Int(1),
        body,
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_ast::{DataType, EdgeKind, Netlist, Process, SenItem, UnaryOp, VarKind};
    use tempo_config::TimingConfig;
    use tempo_diagnostics::DiagnosticSink;

    #[test]
    fn suspendable_always_without_senses_loops() {
        let mut n = Netlist::new();
        let top = n.add_scope("top", None);
        let clk = n.add_var(top, "clk", VarKind::Reg, DataType::BIT);
        let toggle = Stmt::delay(
            Expr::Int(1),
            vec![Stmt::assign(Expr::var(clk), Expr::unary(UnaryOp::Not, Expr::var(clk)))],
        );
        let mut process = Process::new(top, ProcessKind::Always, vec![toggle.clone()]);
        process.suspendable = true;
        let p = n.add_process(process);

        let config = TimingConfig::default();
        let sink = DiagnosticSink::new();
        let mut cx = TimingContext::new(&mut n, &config, &sink);
        assert!(AlwaysToInitialPass.run(&mut cx).unwrap());
        drop(cx);
        assert_eq!(n.processes[p].kind, ProcessKind::Initial);
        assert_eq!(n.processes[p].body, vec![Stmt::while_loop(Expr::Int(1), vec![toggle])]);
    }

    #[test]
    fn waiting_on_event_translates_senses() {
        let mut n = Netlist::new();
        let top = n.add_scope("top", None);
        let ev = n.add_var(top, "ev", VarKind::Reg, DataType::Event);
        let clk = n.add_var(top, "clk", VarKind::Net, DataType::BIT);
        let body = vec![Stmt::trigger(Expr::var(ev))];
        let p = n.add_process(
            Process::new(top, ProcessKind::Always, body.clone()).with_sensitivity(SenTree::Items(vec![
                SenItem::new(EdgeKind::AnyEdge, Expr::var(ev)),
                SenItem::new(EdgeKind::BothEdge, Expr::var(clk)),
            ])),
        );

        let config = TimingConfig::default();
        let sink = DiagnosticSink::new();
        let mut cx = TimingContext::new(&mut n, &config, &sink);
        assert!(AlwaysToInitialPass.run(&mut cx).unwrap());
        let pos = cx.edge_events.get(clk, EdgeKind::Posedge).unwrap();
        let neg = cx.edge_events.get(clk, EdgeKind::Negedge).unwrap();
        drop(cx);

        let expected = Stmt::while_loop(
            Expr::Int(1),
            vec![Stmt::event_control(
                vec![
                    SenItem::new(EdgeKind::AnyEdge, Expr::var(ev)),
                    SenItem::new(EdgeKind::AnyEdge, Expr::var(pos)),
                    SenItem::new(EdgeKind::AnyEdge, Expr::var(neg)),
                ],
                body,
            )],
        );
        assert_eq!(n.processes[p].kind, ProcessKind::Initial);
        assert_eq!(n.processes[p].sensitivity, None);
        assert_eq!(n.processes[p].body, vec![expected]);
    }

    #[test]
    fn static_always_is_kept() {
        let mut n = Netlist::new();
        let top = n.add_scope("top", None);
        let clk = n.add_var(top, "clk", VarKind::Net, DataType::BIT);
        let p = n.add_process(
            Process::new(top, ProcessKind::Always, vec![])
                .with_sensitivity(SenTree::Items(vec![SenItem::new(EdgeKind::Posedge, Expr::var(clk))])),
        );
        let config = TimingConfig::default();
        let sink = DiagnosticSink::new();
        let mut cx = TimingContext::new(&mut n, &config, &sink);
        assert!(!AlwaysToInitialPass.run(&mut cx).unwrap());
        drop(cx);
        assert_eq!(n.processes[p].kind, ProcessKind::Always);
    }
}
