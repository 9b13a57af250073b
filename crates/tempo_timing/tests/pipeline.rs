//! End-to-end runs of the scheduling pipeline on small designs.

use tempo_ast::visit::walk_stmts;
use tempo_ast::{
    BinaryOp, CallConv, DataType, EdgeKind, Expr, Func, FuncKind, Hook, JoinKind, Netlist,
    Process, ProcessKind, ScopeId, SenItem, SenTree, Stmt, UnaryOp, VarId, VarKind,
};
use tempo_config::TimingConfig;
use tempo_diagnostics::DiagnosticSink;
use tempo_timing::{errors, run_timing, TimingSummary};

fn module() -> (Netlist, ScopeId) {
    let mut netlist = Netlist::new();
    let top = netlist.add_scope("top", None);
    (netlist, top)
}

fn run(netlist: &mut Netlist) -> (TimingSummary, DiagnosticSink) {
    let sink = DiagnosticSink::new();
    let summary = run_timing(netlist, &TimingConfig::default(), &sink).unwrap();
    (summary, sink)
}

fn count_stmts(stmts: &[Stmt], pred: impl Fn(&Stmt) -> bool) -> usize {
    let mut count = 0;
    walk_stmts(stmts, &mut |stmt| {
        if pred(stmt) {
            count += 1;
        }
    });
    count
}

#[test]
fn always_with_delay_becomes_forever_loop() {
    let (mut n, top) = module();
    let clk = n.add_var(top, "clk", VarKind::Reg, DataType::BIT);
    let toggle = Stmt::assign(Expr::var(clk), Expr::unary(UnaryOp::Not, Expr::var(clk)));
    let p = n.add_process(Process::new(
        top,
        ProcessKind::Always,
        vec![Stmt::delay(Expr::Int(5), vec![toggle.clone()])],
    ));

    let (summary, sink) = run(&mut n);
    assert!(summary.timing_used);
    assert_eq!(sink.error_count(), 0);

    let process = &n.processes[p];
    assert_eq!(process.kind, ProcessKind::Initial);
    assert!(process.suspendable);
    // 5 in the default 1ns/1ps time scale is 5000 precision ticks.
    assert_eq!(
        process.body,
        vec![Stmt::while_loop(
            Expr::Int(1),
            vec![Stmt::delay(Expr::Int(5000), vec![toggle])]
        )]
    );
}

#[test]
fn suspension_propagates_through_calls() {
    let (mut n, top) = module();
    let mut leaf = Func::new(n.intern("leaf"), top, FuncKind::Task);
    leaf.body = vec![Stmt::delay(Expr::Int(1), vec![])];
    let leaf = n.add_func(leaf);
    let mut middle = Func::new(n.intern("middle"), top, FuncKind::Task);
    middle.body = vec![Stmt::call(leaf, vec![])];
    let middle = n.add_func(middle);
    let mut pure = Func::new(n.intern("pure"), top, FuncKind::Function);
    pure.return_type = Some(DataType::Int);
    let pure = n.add_func(pure);
    let p = n.add_process(Process::new(
        top,
        ProcessKind::Initial,
        vec![Stmt::call(middle, vec![])],
    ));

    let (summary, _) = run(&mut n);
    for f in [leaf, middle] {
        assert!(n.funcs[f].suspendable);
        assert_eq!(n.funcs[f].call_conv, CallConv::Coroutine);
    }
    assert!(!n.funcs[pure].suspendable);
    assert_eq!(n.funcs[pure].call_conv, CallConv::Direct);
    assert!(n.processes[p].suspendable);
    assert_eq!(summary.coroutines, 2);
}

#[test]
fn overrides_share_calling_convention() {
    let (mut n, top) = module();
    let base = n.add_class("Base", top, None);
    let derived = n.add_class("Derived", top, Some(base));
    let name = n.intern("step");

    let mut base_step = Func::new(name, n.classes[base].scope, FuncKind::Task);
    base_step.class = Some(base);
    base_step.is_virtual = true;
    let base_step = n.add_func(base_step);

    let mut derived_step = Func::new(name, n.classes[derived].scope, FuncKind::Task);
    derived_step.class = Some(derived);
    derived_step.is_virtual = true;
    derived_step.body = vec![Stmt::delay(Expr::Int(1), vec![])];
    let derived_step = n.add_func(derived_step);

    run(&mut n);
    assert!(n.funcs[base_step].suspendable);
    assert_eq!(n.funcs[base_step].call_conv, n.funcs[derived_step].call_conv);
    assert!(n.funcs[base_step].is_coroutine());
}

#[test]
fn reader_of_override_writes_becomes_dynamic_loop() {
    let (mut n, top) = module();
    let base = n.add_class("Base", top, None);
    let derived = n.add_class("Derived", top, Some(base));
    let x = n.add_var(top, "x", VarKind::Reg, DataType::BIT);
    let y = n.add_var(top, "y", VarKind::Reg, DataType::BIT);
    let ev = n.add_var(top, "ev", VarKind::Reg, DataType::Event);
    let name = n.intern("run");

    // Base::run never waits itself; only its override does.
    let mut base_run = Func::new(name, n.classes[base].scope, FuncKind::Task);
    base_run.class = Some(base);
    base_run.is_virtual = true;
    base_run.body = vec![Stmt::assign(Expr::var(x), Expr::Int(1))];
    let base_run = n.add_func(base_run);

    let mut derived_run = Func::new(name, n.classes[derived].scope, FuncKind::Task);
    derived_run.class = Some(derived);
    derived_run.is_virtual = true;
    derived_run.body = vec![Stmt::event_control(
        vec![SenItem::new(EdgeKind::AnyEdge, Expr::var(ev))],
        vec![],
    )];
    n.add_func(derived_run);

    let reader = n.add_process(
        Process::new(top, ProcessKind::Always, vec![Stmt::assign(Expr::var(y), Expr::var(x))])
            .with_sensitivity(SenTree::Items(vec![SenItem::new(EdgeKind::Posedge, Expr::var(x))])),
    );

    let (summary, sink) = run(&mut n);
    assert_eq!(sink.error_count(), 0);
    assert!(summary.timing_used);
    assert!(n.funcs[base_run].dynamic);
    let process = &n.processes[reader];
    assert_eq!(process.kind, ProcessKind::Initial);
    assert!(process.dynamic);
    let Stmt::While { body, .. } = &process.body[0] else {
        panic!("expected forever loop");
    };
    assert!(matches!(body[0], Stmt::EventControl { .. }));
}

#[test]
fn fork_join_waits_for_both_branches() {
    let (mut n, top) = module();
    let a = n.add_var(top, "a", VarKind::Reg, DataType::BIT);
    let b = n.add_var(top, "b", VarKind::Reg, DataType::BIT);
    let c = n.add_var(top, "c", VarKind::Reg, DataType::BIT);
    let after = Stmt::assign(Expr::var(c), Expr::Int(1));
    let p = n.add_process(Process::new(
        top,
        ProcessKind::Initial,
        vec![
            Stmt::fork(
                JoinKind::Join,
                vec![
                    vec![Stmt::delay(Expr::Int(1), vec![Stmt::assign(Expr::var(a), Expr::Int(1))])],
                    vec![Stmt::delay(Expr::Int(2), vec![Stmt::assign(Expr::var(b), Expr::Int(1))])],
                ],
            ),
            after.clone(),
        ],
    ));

    let (summary, _) = run(&mut n);
    assert_eq!(summary.fork_branches, 2);
    let jc = n.join_class.expect("join class synthesized");
    let body = &n.processes[p].body;
    // join = new; counter = 2; fork; wait loop; c = 1
    assert_eq!(body.len(), 5);
    assert_eq!(body[4], after);
    let Stmt::Assign { rhs, .. } = &body[1] else {
        panic!("expected counter initialization");
    };
    assert_eq!(rhs, &Expr::Int(2));
    let Stmt::While { cond, body: wait, .. } = &body[3] else {
        panic!("expected join loop");
    };
    let Expr::Binary { op, .. } = cond else {
        panic!("expected comparison");
    };
    assert_eq!(*op, BinaryOp::Gt);
    let Stmt::EventControl { senses, .. } = &wait[0] else {
        panic!("expected wait on wake event");
    };
    assert!(matches!(&senses[0].expr, Expr::Member { member, .. } if *member == jc.wake_event));

    // The join class got its event cleanup.
    let dtor = n.classes[jc.class].destructor.expect("destructor synthesized");
    assert!(matches!(n.funcs[dtor].body[0], Stmt::Call { .. }));
}

#[test]
fn join_any_counts_one_completion() {
    let (mut n, top) = module();
    let ev = n.add_var(top, "ev", VarKind::Reg, DataType::Event);
    let p = n.add_process(Process::new(
        top,
        ProcessKind::Initial,
        vec![Stmt::fork(
            JoinKind::JoinAny,
            vec![
                vec![Stmt::event_control(vec![SenItem::new(EdgeKind::AnyEdge, Expr::var(ev))], vec![])],
                vec![Stmt::delay(Expr::Int(3), vec![])],
                vec![Stmt::delay(Expr::Int(4), vec![])],
            ],
        )],
    ));
    run(&mut n);
    let Stmt::Assign { rhs, .. } = &n.processes[p].body[1] else {
        panic!("expected counter initialization");
    };
    assert_eq!(rhs, &Expr::Int(1));
}

#[test]
fn waiter_on_signal_gets_triggered_by_writer() {
    let (mut n, top) = module();
    let clk = n.add_var(top, "clk", VarKind::Reg, DataType::BIT);
    let q = n.add_var(top, "q", VarKind::Reg, DataType::BIT);
    let waiter = n.add_process(Process::new(
        top,
        ProcessKind::Initial,
        vec![Stmt::event_control(
            vec![SenItem::new(EdgeKind::Posedge, Expr::var(clk))],
            vec![Stmt::assign(Expr::var(q), Expr::Int(1))],
        )],
    ));
    let writer = n.add_process(Process::new(
        top,
        ProcessKind::Initial,
        vec![Stmt::delay(Expr::Int(1), vec![Stmt::assign(Expr::var(clk), Expr::Int(1))])],
    ));

    let (summary, _) = run(&mut n);
    assert_eq!(summary.edge_events, 1);
    let event = n.find_var(top, "__VedgeEvent__top__posedge__clk").unwrap();

    let Stmt::EventControl { senses, .. } = &n.processes[waiter].body[0] else {
        panic!("expected event control");
    };
    assert_eq!(senses, &vec![SenItem::new(EdgeKind::AnyEdge, Expr::var(event))]);

    let fires = count_stmts(&n.processes[writer].body, |s| {
        matches!(s, Stmt::EventTrigger { event: e, .. } if *e == Expr::var(event))
    });
    assert_eq!(fires, 1);
}

#[test]
fn always_on_event_becomes_dynamic_loop() {
    let (mut n, top) = module();
    let ev = n.add_var(top, "ev", VarKind::Reg, DataType::Event);
    let x = n.add_var(top, "x", VarKind::Reg, DataType::Int);
    let p = n.add_process(
        Process::new(top, ProcessKind::Always, vec![Stmt::assign(Expr::var(x), Expr::Int(1))])
            .with_sensitivity(SenTree::Items(vec![SenItem::new(EdgeKind::AnyEdge, Expr::var(ev))])),
    );
    n.add_process(Process::new(
        top,
        ProcessKind::Initial,
        vec![Stmt::delay(Expr::Int(1), vec![Stmt::trigger(Expr::var(ev))])],
    ));
    run(&mut n);
    let process = &n.processes[p];
    assert_eq!(process.kind, ProcessKind::Initial);
    assert!(process.dynamic);
    assert!(matches!(process.body[0], Stmt::While { .. }));
}

#[test]
fn wait_is_lowered_to_loop() {
    let (mut n, top) = module();
    let ready = n.add_var(top, "ready", VarKind::Reg, DataType::BIT);
    let p = n.add_process(Process::new(
        top,
        ProcessKind::Initial,
        vec![Stmt::wait(Expr::var(ready), vec![])],
    ));
    run(&mut n);
    assert_eq!(count_stmts(&n.processes[p].body, |s| matches!(s, Stmt::Wait { .. })), 0);
    let Stmt::While { cond, .. } = &n.processes[p].body[0] else {
        panic!("expected loop");
    };
    assert_eq!(cond, &Expr::unary(UnaryOp::LogNot, Expr::var(ready)));
}

#[test]
fn deferred_assignment_in_timed_code_uses_deferred_event() {
    let (mut n, top) = module();
    let q = n.add_var(top, "q", VarKind::Reg, DataType::BIT);
    let p = n.add_process(Process::new(
        top,
        ProcessKind::Initial,
        vec![
            Stmt::delay(Expr::Int(1), vec![]),
            Stmt::assign_deferred(Expr::var(q), Expr::Int(1)),
        ],
    ));

    let (summary, _) = run(&mut n);
    assert_eq!(summary.deferred_events, 1);
    let event = n.find_var(top, "__VdlyEvent__").unwrap();
    assert_eq!(n.hooks, vec![Hook::ResumeTriggered { deferred_events: vec![event] }]);
    let body = &n.processes[p].body;
    assert_eq!(count_stmts(body, |s| matches!(s, Stmt::AssignDeferred { .. })), 0);
    // The detached writer became a fork branch routine waiting on the event.
    let branch = n.find_func("__Vfork__0__0").unwrap();
    let Stmt::EventControl { senses, .. } = &n.funcs[branch].body[0] else {
        panic!("expected wait on deferred event");
    };
    assert_eq!(senses[0].expr, Expr::var(event));
}

#[test]
fn deferred_swap_captures_both_values_before_committing() {
    let (mut n, top) = module();
    let a = n.add_var(top, "a", VarKind::Reg, DataType::BIT);
    let b = n.add_var(top, "b", VarKind::Reg, DataType::BIT);
    let p = n.add_process(Process::new(
        top,
        ProcessKind::Initial,
        vec![
            Stmt::delay(Expr::Int(1), vec![]),
            Stmt::assign_deferred(Expr::var(a), Expr::var(b)),
            Stmt::assign_deferred(Expr::var(b), Expr::var(a)),
        ],
    ));

    let (summary, sink) = run(&mut n);
    assert_eq!(sink.error_count(), 0);
    assert_eq!(summary.deferred_events, 1);
    let event = n.find_var(top, "__VdlyEvent__").unwrap();

    // Both right-hand sides are read into temporaries in the process itself,
    // before either detached write can run.
    let mut captures = Vec::new();
    walk_stmts(&n.processes[p].body, &mut |stmt| {
        if let Stmt::Assign {
            lhs: Expr::Var(tmp),
            rhs: Expr::Var(src),
            ..
        } = stmt
        {
            if n.var_name(*tmp).starts_with("__Vdlyval__") {
                captures.push((n.var_name(*tmp).to_string(), *src));
            }
        }
    });
    assert_eq!(captures.len(), 2);
    assert_eq!(captures[0].1, b);
    assert_eq!(captures[1].1, a);

    // Each write waits for the deferred event, then stores its own capture.
    for (branch, target, capture) in [
        ("__Vfork__0__0", a, &captures[0].0),
        ("__Vfork__1__0", b, &captures[1].0),
    ] {
        let func = n.find_func(branch).unwrap();
        let Stmt::EventControl { senses, body, .. } = &n.funcs[func].body[0] else {
            panic!("expected wait on deferred event in `{branch}`");
        };
        assert_eq!(senses[0].expr, Expr::var(event));
        let Stmt::Assign {
            lhs,
            rhs: Expr::Var(value),
            ..
        } = &body[0]
        else {
            panic!("expected commit in `{branch}`");
        };
        assert_eq!(*lhs, Expr::var(target));
        assert_eq!(n.var_name(*value), capture.as_str());
        assert_eq!(n.vars[*value].kind, VarKind::Arg);
    }
}

#[test]
fn diagnostics_name_the_reporting_stage() {
    let (mut n, top) = module();
    let q = n.add_var(top, "q", VarKind::Reg, DataType::BIT);
    let mut export = Func::new(n.intern("export_set"), top, FuncKind::Task);
    export.is_public = true;
    export.body = vec![Stmt::assign_deferred(Expr::var(q), Expr::Int(1))];
    n.add_func(export);
    let p = n.add_process(Process::new(
        top,
        ProcessKind::Initial,
        vec![Stmt::Assertion {
            clocks: vec![],
            cond: Expr::var(q),
            span: tempo_common::Span::DUMMY,
        }],
    ));

    let (_, sink) = run(&mut n);
    let clocking: Vec<_> = sink.from_stage("clocking").iter().map(|d| d.code).collect();
    assert_eq!(clocking, vec![errors::E301]);
    let deferred: Vec<_> = sink.from_stage("deferred").iter().map(|d| d.code).collect();
    assert_eq!(deferred, vec![errors::E303]);
    assert_eq!(sink.error_count(), 2);

    // The unclocked assertion still leaves with exactly one clock.
    let Stmt::Assertion { clocks, .. } = &n.processes[p].body[0] else {
        panic!("expected assertion");
    };
    assert_eq!(clocks.len(), 1);
}

#[test]
fn untimed_design_lowers_triggers() {
    let (mut n, top) = module();
    let ev = n.add_var(top, "ev", VarKind::Reg, DataType::Event);
    let p = n.add_process(Process::new(
        top,
        ProcessKind::Initial,
        vec![Stmt::trigger(Expr::var(ev))],
    ));
    let (summary, _) = run(&mut n);
    assert!(!summary.timing_used);
    assert!(n.hooks.is_empty());
    assert_eq!(n.processes[p].body, vec![Stmt::assign(Expr::var(ev), Expr::Int(1))]);
}

#[test]
fn disabled_timing_skips_analysis() {
    let (mut n, top) = module();
    let ev = n.add_var(top, "ev", VarKind::Reg, DataType::Event);
    let p = n.add_process(Process::new(
        top,
        ProcessKind::Initial,
        vec![Stmt::delay(Expr::Int(2), vec![Stmt::trigger(Expr::var(ev))])],
    ));
    let config = TimingConfig {
        enabled: false,
        ..TimingConfig::default()
    };
    let sink = DiagnosticSink::new();
    let summary = run_timing(&mut n, &config, &sink).unwrap();
    assert!(!summary.timing_used);
    assert!(!n.processes[p].suspendable);
    assert_eq!(
        n.processes[p].body,
        vec![Stmt::delay(Expr::Int(2), vec![Stmt::assign(Expr::var(ev), Expr::Int(1))])]
    );
}

#[test]
fn object_events_are_cancelled_on_destruction() {
    let (mut n, top) = module();
    let class = n.add_class("Mailbox", top, None);
    let members = n.classes[class].scope;
    let got: VarId = n.add_var(members, "got", VarKind::Member, DataType::Event);
    n.add_process(Process::new(
        top,
        ProcessKind::Initial,
        vec![Stmt::delay(Expr::Int(1), vec![])],
    ));
    run(&mut n);
    let cancel = n.find_method(class, n.intern("_cancel_events")).unwrap();
    assert_eq!(
        n.funcs[cancel].body,
        vec![Stmt::CancelEvent {
            event: Expr::var(got),
            span: tempo_common::Span::DUMMY
        }]
    );
    let dtor = n.classes[class].destructor.unwrap();
    assert_eq!(n.funcs[dtor].body, vec![Stmt::call(cancel, vec![])]);
}

#[test]
fn summary_serializes() {
    let (mut n, top) = module();
    n.add_process(Process::new(
        top,
        ProcessKind::Initial,
        vec![Stmt::delay(Expr::Int(1), vec![])],
    ));
    let (summary, _) = run(&mut n);
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["timing_used"], true);
    assert_eq!(json["suspendable_units"], 1);
}
