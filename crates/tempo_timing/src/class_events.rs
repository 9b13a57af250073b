//! Class-event cleanup.
//!
//! Coroutines waiting on an event owned by an object must not outlive the
//! object. Every class declaring (or inheriting) events gets a
//! `_cancel_events` method withdrawing all waiters, called first thing from
//! the destructor.

use crate::context::{TimingContext, TimingPass};
use tempo_ast::{ClassId, Expr, Func, FuncId, FuncKind, Netlist, Stmt, VarId};
use tempo_common::TempoResult;

const CANCEL: &str = "_cancel_events";
const DESTRUCT: &str = "_destruct";

/// Synthesizes event cleanup for classes with events.
pub(crate) struct ClassEventsPass;

impl TimingPass for ClassEventsPass {
    fn name(&self) -> &'static str {
        "class-events"
    }

    fn run(&self, cx: &mut TimingContext<'_>) -> TempoResult<bool> {
        let mut changed = false;
        for class in cx.netlist.classes.ids() {
            let events = class_events(cx.netlist, class);
            if events.is_empty() {
                continue;
            }
            let name = cx.netlist.intern(CANCEL);
            if cx.netlist.find_method(class, name).is_some() {
                continue;
            }
            let cancel = add_cancel(cx.netlist, class, &events);
            let destructor = destructor_of(cx.netlist, class);
            cx.netlist.funcs[destructor]
                .body
                .insert(0, Stmt::call(cancel, Vec::new()));
            log::debug!(
                "class-events: `{}` cancels {} events on destruction",
                cx.netlist.resolve(cx.netlist.classes[class].name),
                events.len()
            );
            changed = true;
        }
        Ok(changed)
    }
}

/// Returns the events declared in `class` and its ancestors.
fn class_events(netlist: &Netlist, class: ClassId) -> Vec<VarId> {
    netlist
        .class_lineage(class)
        .into_iter()
        .flat_map(|c| netlist.scopes[netlist.classes[c].scope].vars.iter().copied())
        .filter(|&var| netlist.vars[var].is_event())
        .collect()
}

fn add_cancel(netlist: &mut Netlist, class: ClassId, events: &[VarId]) -> FuncId {
    let scope = netlist.classes[class].scope;
    let mut func = Func::new(netlist.intern(CANCEL), scope, FuncKind::EventCleanup);
    func.class = Some(class);
    func.body = events
        .iter()
        .map(|&event| Stmt::CancelEvent {
            event: Expr::var(event),
            span: tempo_common::Span::DUMMY,
        })
        .collect();
    netlist.add_func(func)
}

fn destructor_of(netlist: &mut Netlist, class: ClassId) -> FuncId {
    if let Some(destructor) = netlist.classes[class].destructor {
        return destructor;
    }
    let scope = netlist.classes[class].scope;
    let mut func = Func::new(netlist.intern(DESTRUCT), scope, FuncKind::Destructor);
    func.class = Some(class);
    netlist.add_func(func)
}
