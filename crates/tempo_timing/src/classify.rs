//! Suspendable and dynamic classification.
//!
//! A unit (process or routine) is *suspendable* if it can yield control
//! mid-execution, and *dynamic* if it can be resumed at an arbitrary point of
//! a time slot rather than only at its own scheduled edge. The classifier
//! seeds both flags from the statements of each unit, propagates them
//! through calls and override sets, and records which variables are written
//! by suspendable or dynamic code. The facts only ever grow, so the
//! surrounding fixpoint loop terminates.
//!
//! Fork branches are classified as units of their own that are always
//! suspendable and dynamic. A fork that is waited on makes its parent
//! dynamic; a `join_none` fork does not affect its parent at all.

use crate::context::{Facts, TimingContext, TimingPass};
use petgraph::graphmap::UnGraphMap;
use tempo_ast::{CallConv, FuncId, JoinKind, Netlist, ProcessKind, SenTree, Stmt, UnitId, VarId};
use tempo_common::{InternalError, TempoResult};

/// Flags accumulated while walking one unit or fork branch.
#[derive(Debug, Clone, Copy, Default)]
struct Frame {
    suspendable: bool,
    dynamic: bool,
}

impl Frame {
    const FORK: Frame = Frame {
        suspendable: true,
        dynamic: true,
    };

    fn suspend(&mut self) {
        self.suspendable = true;
    }

    fn make_dynamic(&mut self) {
        self.suspendable = true;
        self.dynamic = true;
    }
}

/// Builds the undirected override relation between virtual methods.
///
/// A virtual method is connected to every same-named method of its class's
/// ancestors.
pub(crate) fn build_overrides(netlist: &Netlist) -> UnGraphMap<FuncId, ()> {
    let mut graph = UnGraphMap::new();
    for (id, func) in netlist.funcs.iter() {
        if !func.is_virtual {
            continue;
        }
        let Some(class) = func.class else {
            continue;
        };
        graph.add_node(id);
        for ancestor in netlist.class_lineage(class).into_iter().skip(1) {
            if let Some(base) = netlist.find_method(ancestor, func.name) {
                graph.add_edge(id, base, ());
            }
        }
    }
    graph
}

/// One round of classification over every unit.
pub(crate) struct ClassifyPass;

impl TimingPass for ClassifyPass {
    fn name(&self) -> &'static str {
        "classify"
    }

    fn run(&self, cx: &mut TimingContext<'_>) -> TempoResult<bool> {
        let mut changed = false;
        for unit in cx.netlist.units() {
            changed |= classify_unit(cx.netlist, &mut cx.facts, unit);
        }
        changed |= propagate_sensitivity(cx);
        changed |= propagate_overrides(cx);
        for (_, func) in cx.netlist.funcs.iter_mut() {
            if func.suspendable {
                func.call_conv = CallConv::Coroutine;
            }
        }
        log::trace!("classify: round changed = {changed}");
        Ok(changed)
    }
}

/// Walks one unit and updates its flags and the write facts.
fn classify_unit(netlist: &mut Netlist, facts: &mut Facts, unit: UnitId) -> bool {
    // Flags raised earlier (through overrides or sensitivity) still govern
    // how this unit's writes are recorded.
    let mut frame = Frame {
        suspendable: netlist.is_suspendable(unit),
        dynamic: netlist.is_dynamic(unit),
    };
    let mut writes = Vec::new();
    let mut changed = walk(netlist, facts, netlist.unit_body(unit), &mut frame, &mut writes);

    if frame.suspendable {
        facts.timing_used = true;
    }
    changed |= record_writes(facts, &writes, frame);
    match unit {
        UnitId::Process(id) => {
            let process = &mut netlist.processes[id];
            changed |= raise(&mut process.suspendable, frame.suspendable);
            changed |= raise(&mut process.dynamic, frame.dynamic);
        }
        UnitId::Func(id) => {
            let func = &mut netlist.funcs[id];
            changed |= raise(&mut func.suspendable, frame.suspendable);
            changed |= raise(&mut func.dynamic, frame.dynamic);
        }
    }
    changed
}

/// Sets `flag` if `value` is set, returning `true` if that changed it.
fn raise(flag: &mut bool, value: bool) -> bool {
    if value && !*flag {
        *flag = true;
        true
    } else {
        false
    }
}

fn record_writes(facts: &mut Facts, writes: &[VarId], frame: Frame) -> bool {
    let mut changed = false;
    for &var in writes {
        if frame.suspendable {
            changed |= facts.written_by_suspendable.insert(var);
        }
        if frame.dynamic {
            changed |= facts.written_by_dynamic.insert(var);
        }
    }
    changed
}

/// Seeds `frame` from `stmts` and collects the variables they write.
///
/// Fork branches are walked in frames of their own; their writes are
/// recorded immediately. Returns `true` if any fact changed.
fn walk(netlist: &Netlist, facts: &mut Facts, stmts: &[Stmt], frame: &mut Frame, writes: &mut Vec<VarId>) -> bool {
    let mut changed = false;
    for stmt in stmts {
        for expr in stmt.exprs() {
            expr.for_each_call(&mut |callee| seed_call(netlist, callee, frame));
        }
        match stmt {
            Stmt::Assign { lhs, timing, .. } | Stmt::AssignDeferred { lhs, timing, .. } => {
                if timing.is_some() {
                    frame.suspend();
                }
                if let Some(var) = lhs.target_var() {
                    writes.push(var);
                }
            }
            Stmt::Delay { .. } => frame.suspend(),
            Stmt::EventControl { .. } | Stmt::Wait { .. } => frame.make_dynamic(),
            Stmt::Call { func, .. } => seed_call(netlist, *func, frame),
            Stmt::Fork { join, branches, .. } => {
                if *join != JoinKind::JoinNone {
                    frame.make_dynamic();
                }
                facts.timing_used = true;
                for branch in branches {
                    let mut branch_frame = Frame::FORK;
                    let mut branch_writes = Vec::new();
                    changed |= walk(netlist, facts, branch, &mut branch_frame, &mut branch_writes);
                    changed |= record_writes(facts, &branch_writes, Frame::FORK);
                }
                continue;
            }
            _ => {}
        }
        for body in stmt.bodies() {
            changed |= walk(netlist, facts, body, frame, writes);
        }
    }
    changed
}

fn seed_call(netlist: &Netlist, callee: FuncId, frame: &mut Frame) {
    let func = &netlist.funcs[callee];
    if func.dynamic {
        frame.make_dynamic();
    } else if func.suspendable {
        frame.suspend();
    }
}

/// Marks `always` processes waiting on dynamically written signals or on
/// events as dynamic.
fn propagate_sensitivity(cx: &mut TimingContext<'_>) -> bool {
    let mut changed = false;
    for id in cx.netlist.processes.ids() {
        if waits_on_dynamic(cx, id) {
            let process = &mut cx.netlist.processes[id];
            changed |= raise(&mut process.suspendable, true);
            changed |= raise(&mut process.dynamic, true);
        }
    }
    changed
}

/// Returns `true` if an `always` process waits on a dynamically written
/// variable or on an event.
pub(crate) fn waits_on_dynamic(cx: &TimingContext<'_>, id: tempo_ast::ProcessId) -> bool {
    let process = &cx.netlist.processes[id];
    if process.kind != ProcessKind::Always {
        return false;
    }
    let Some(SenTree::Items(items)) = &process.sensitivity else {
        return false;
    };
    items.iter().any(|item| {
        item.expr.target_var().is_some_and(|var| {
            cx.facts.written_by_dynamic.contains(&var) || cx.netlist.vars[var].is_event()
        })
    })
}

/// Makes every override pair agree on both flags.
fn propagate_overrides(cx: &mut TimingContext<'_>) -> bool {
    let mut changed = false;
    let edges: Vec<(FuncId, FuncId)> = cx.overrides.all_edges().map(|(a, b, _)| (a, b)).collect();
    for (a, b) in edges {
        let suspendable = cx.netlist.funcs[a].suspendable || cx.netlist.funcs[b].suspendable;
        let dynamic = cx.netlist.funcs[a].dynamic || cx.netlist.funcs[b].dynamic;
        for id in [a, b] {
            let func = &mut cx.netlist.funcs[id];
            changed |= raise(&mut func.suspendable, suspendable);
            changed |= raise(&mut func.dynamic, dynamic);
        }
    }
    changed
}

/// Checks that every base/override pair ended up with the same calling
/// convention.
pub(crate) fn check_overrides(cx: &TimingContext<'_>) -> TempoResult<()> {
    for (a, b, _) in cx.overrides.all_edges() {
        let (fa, fb) = (&cx.netlist.funcs[a], &cx.netlist.funcs[b]);
        if fa.call_conv != fb.call_conv {
            return Err(InternalError::new(format!(
                "override pair `{}`/`{}` disagrees on calling convention",
                cx.netlist.func_name(a),
                cx.netlist.func_name(b)
            )));
        }
    }
    Ok(())
}

/// Returns `true` if running `stmts` can suspend the code running them.
///
/// Branches of `join_none` forks run detached and do not count.
pub(crate) fn body_suspends(netlist: &Netlist, stmts: &[Stmt]) -> bool {
    stmts.iter().any(|stmt| {
        let mut calls_suspendable = false;
        for expr in stmt.exprs() {
            expr.for_each_call(&mut |callee| calls_suspendable |= netlist.funcs[callee].suspendable);
        }
        if calls_suspendable {
            return true;
        }
        match stmt {
            Stmt::Assign { timing, .. } | Stmt::AssignDeferred { timing, .. } => timing.is_some(),
            Stmt::Delay { .. } | Stmt::EventControl { .. } | Stmt::Wait { .. } => true,
            Stmt::Call { func, .. } => netlist.funcs[*func].suspendable,
            Stmt::Fork { join, .. } => *join != JoinKind::JoinNone,
            _ => stmt.bodies().into_iter().any(|body| body_suspends(netlist, body)),
        }
    })
}
