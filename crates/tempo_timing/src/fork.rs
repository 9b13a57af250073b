//! Fork splitting.
//!
//! Every fork branch moves into its own `ForkBranch` routine so the runtime
//! can start it as an independent coroutine. Locals of the enclosing block
//! that a branch reads or writes become parameters passed by value:
//!
//! ```text
//! fork                        __Vjoin__ j = new; j.counter = 2;
//!   #1 a = x;                 fork
//!   @(ev) b = 1;       =>       __Vfork__0__0(x, j);
//! join                          __Vfork__0__1(j);
//!                             join
//!                             while (j.counter > 0) @(j.wakeEvent);
//! ```
//!
//! The join object is only needed when the fork waits for its branches and
//! at least one of them can suspend. Every synchronized branch ends by
//! decrementing the counter and firing the wake event.

use crate::classify::body_suspends;
use crate::context::{rewrite_stmts, TimingContext, TimingPass};
use crate::errors;
use std::collections::{BTreeMap, BTreeSet};
use tempo_ast::visit::{walk_exprs, walk_exprs_mut};
use tempo_ast::{
    BinaryOp, CallConv, ClassId, DataType, EdgeKind, Expr, Func, FuncId, FuncKind, JoinClass,
    JoinKind, Netlist, ScopeId, ScopeKind, SenItem, Stmt, VarId, VarKind,
};
use tempo_common::{Ident, Span, TempoResult};

const PREFIX: &str = "__Vfork__";

/// Moves fork branches into separate routines and synchronizes joins.
pub(crate) struct ForkSplitPass;

impl TimingPass for ForkSplitPass {
    fn name(&self) -> &'static str {
        "fork"
    }

    fn run(&self, cx: &mut TimingContext<'_>) -> TempoResult<bool> {
        let mut split = 0usize;
        for unit in cx.netlist.units() {
            let scope = cx.netlist.unit_scope(unit);
            let mut body = cx.netlist.take_unit_body(unit);
            let result = rewrite_stmts(&mut body, false, &mut |stmt, _| match stmt {
                Stmt::Fork {
                    name,
                    join,
                    branches,
                    span,
                } => {
                    split += 1;
                    Ok(split_fork(cx, scope, name, join, branches, span))
                }
                other => Ok(vec![other]),
            });
            *cx.netlist.unit_body_mut(unit) = body;
            result?;
        }
        if split > 0 {
            log::debug!("fork: split {split} forks");
        }
        Ok(split > 0)
    }
}

/// Splits one fork whose nested forks have already been split.
fn split_fork(
    cx: &mut TimingContext<'_>,
    scope: ScopeId,
    name: Option<Ident>,
    join: JoinKind,
    branches: Vec<Vec<Stmt>>,
    span: Span,
) -> Vec<Stmt> {
    if branches.is_empty() {
        cx.sink.emit(errors::warn_empty_fork(span));
        return vec![Stmt::Fork {
            name,
            join,
            branches,
            span,
        }];
    }

    let index = cx.names.next_index(PREFIX);
    let fork_name = match name {
        Some(label) => format!("{PREFIX}{}__{index}", cx.netlist.resolve(label)),
        None => format!("{PREFIX}{index}"),
    };

    let synchronized =
        join != JoinKind::JoinNone && branches.iter().any(|b| body_suspends(cx.netlist, b));
    let join_object = if synchronized {
        let class = join_class(cx.netlist);
        let var = cx.netlist.add_var(
            scope,
            &format!("{fork_name}__join"),
            VarKind::BlockTemp,
            DataType::Class(class.class),
        );
        Some((class, var))
    } else {
        None
    };

    let count = match join {
        JoinKind::JoinAny => 1,
        _ => branches.len() as u64,
    };
    let mut calls = Vec::with_capacity(branches.len());
    for (i, branch) in branches.into_iter().enumerate() {
        let branch_name = format!("{fork_name}__{i}");
        let (func, args) = extract_branch(cx, scope, &branch_name, branch, join_object);
        calls.push(vec![Stmt::Call { func, args, span }]);
    }

    let mut out = Vec::new();
    if let Some((class, var)) = join_object {
        out.push(Stmt::Assign {
            lhs: Expr::var(var),
            rhs: Expr::New { class: class.class },
            timing: None,
            span,
        });
        out.push(Stmt::Assign {
            lhs: Expr::member(Expr::var(var), class.counter),
            rhs: Expr::Int(count),
            timing: None,
            span,
        });
    }
    out.push(Stmt::Fork {
        name,
        join,
        branches: calls,
        span,
    });
    if let Some((class, var)) = join_object {
        out.push(Stmt::While {
            cond: Expr::binary(
                BinaryOp::Gt,
                Expr::member(Expr::var(var), class.counter),
                Expr::Int(0),
            ),
            body: vec![Stmt::EventControl {
                senses: vec![SenItem::new(
                    EdgeKind::AnyEdge,
                    Expr::member(Expr::var(var), class.wake_event),
                )],
                body: Vec::new(),
                span,
            }],
            span,
        });
    }
    out
}

/// Moves `branch` into a new routine and returns it with the call arguments.
fn extract_branch(
    cx: &mut TimingContext<'_>,
    scope: ScopeId,
    name: &str,
    branch: Vec<Stmt>,
    join_object: Option<(JoinClass, VarId)>,
) -> (FuncId, Vec<Expr>) {
    let mut body = match <[Stmt; 1]>::try_from(branch) {
        Ok([Stmt::Block { stmts, .. }]) => stmts,
        Ok([single]) => vec![single],
        Err(branch) => branch,
    };

    let mut locals = BTreeSet::new();
    walk_exprs(&body, &mut |expr| {
        expr.for_each_var_ref(&mut |var| {
            if cx.netlist.vars[var].kind == VarKind::BlockTemp {
                locals.insert(var);
            }
        })
    });

    let mut func = Func::new(cx.netlist.intern(name), scope, FuncKind::ForkBranch);
    func.class = class_of_scope(cx.netlist, scope);
    func.suspendable = true;
    func.dynamic = true;
    func.call_conv = CallConv::Coroutine;
    func.span = body.first().map_or(Span::DUMMY, Stmt::span);
    let id = cx.netlist.add_func(func);

    let mut params = BTreeMap::new();
    let mut args = Vec::with_capacity(locals.len() + 1);
    for local in locals {
        let param = new_param(cx.netlist, id, local);
        params.insert(local, param);
        args.push(Expr::var(local));
    }
    if let Some((class, join_var)) = join_object {
        let param = new_param(cx.netlist, id, join_var);
        args.push(Expr::var(join_var));
        body.extend(branch_done(class, param));
    }
    walk_exprs_mut(&mut body, &mut |expr| expr.remap_vars(&params));

    cx.netlist.funcs[id].body = body;
    log::debug!("fork: extracted branch `{name}` with {} arguments", args.len());
    (id, args)
}

/// Declares a parameter of `func` mirroring the local `var`.
fn new_param(netlist: &mut Netlist, func: FuncId, var: VarId) -> VarId {
    let (scope, ty) = (netlist.vars[var].scope, netlist.vars[var].ty);
    let name = netlist.var_name(var).to_string();
    let param = netlist.add_var(scope, &name, VarKind::Arg, ty);
    netlist.vars[param].func = Some(func);
    netlist.funcs[func].args.push(param);
    param
}

/// `join.counter = join.counter - 1; -> join.wakeEvent;`
fn branch_done(class: JoinClass, join: VarId) -> [Stmt; 2] {
    let counter = Expr::member(Expr::var(join), class.counter);
    [
        Stmt::assign(
            counter.clone(),
            Expr::binary(BinaryOp::Sub, counter, Expr::Int(1)),
        ),
        Stmt::trigger(Expr::member(Expr::var(join), class.wake_event)),
    ]
}

fn class_of_scope(netlist: &Netlist, scope: ScopeId) -> Option<ClassId> {
    match netlist.scopes[scope].kind {
        ScopeKind::Class(class) => Some(class),
        ScopeKind::Module => None,
    }
}

/// Returns the join-object class, synthesizing it on first use.
///
/// The class lives under the first top-level scope and has a wake event,
/// a counter and an empty constructor.
fn join_class(netlist: &mut Netlist) -> JoinClass {
    if let Some(class) = netlist.join_class {
        return class;
    }
    let root = netlist
        .scopes
        .iter()
        .find(|(_, scope)| scope.parent.is_none())
        .map(|(id, _)| id);
    let root = match root {
        Some(root) => root,
        None => netlist.add_scope("$root", None),
    };
    let class = netlist.add_class("__Vjoin", root, None);
    let members = netlist.classes[class].scope;
    let wake_event = netlist.add_var(members, "wakeEvent", VarKind::Member, DataType::Event);
    let counter = netlist.add_var(members, "counter", VarKind::Member, DataType::Int);
    let mut ctor = Func::new(netlist.intern("new"), members, FuncKind::Constructor);
    ctor.class = Some(class);
    let constructor = netlist.add_func(ctor);
    let join = JoinClass {
        class,
        wake_event,
        counter,
        constructor,
    };
    netlist.join_class = Some(join);
    log::debug!("fork: synthesized join class");
    join
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_ast::{Process, ProcessKind};
    use tempo_config::TimingConfig;
    use tempo_diagnostics::DiagnosticSink;

    struct Design {
        netlist: Netlist,
        top: ScopeId,
        a: VarId,
        ev: VarId,
    }

    fn design() -> Design {
        let mut netlist = Netlist::new();
        let top = netlist.add_scope("top", None);
        let a = netlist.add_var(top, "a", VarKind::Reg, DataType::Int);
        let ev = netlist.add_var(top, "ev", VarKind::Reg, DataType::Event);
        Design {
            netlist,
            top,
            a,
            ev,
        }
    }

    fn run(netlist: &mut Netlist) -> DiagnosticSink {
        let config = TimingConfig::default();
        let sink = DiagnosticSink::new();
        let mut cx = TimingContext::new(netlist, &config, &sink);
        ForkSplitPass.run(&mut cx).unwrap();
        drop(cx);
        sink
    }

    fn wait_ev(ev: VarId) -> Stmt {
        Stmt::event_control(vec![SenItem::new(EdgeKind::AnyEdge, Expr::var(ev))], vec![])
    }

    #[test]
    fn synchronized_join_counts_every_branch() {
        let mut d = design();
        let body = vec![Stmt::fork(
            JoinKind::Join,
            vec![
                vec![Stmt::delay(Expr::Int(1), vec![])],
                vec![wait_ev(d.ev)],
                vec![Stmt::assign(Expr::var(d.a), Expr::Int(1))],
            ],
        )];
        let p = d.netlist.add_process(Process::new(d.top, ProcessKind::Initial, body));
        run(&mut d.netlist);

        let jc = d.netlist.join_class.unwrap();
        let join = d.netlist.find_var(d.top, "__Vfork__0__join").unwrap();
        let body = &d.netlist.processes[p].body;
        assert_eq!(body.len(), 4);
        assert_eq!(body[0], Stmt::assign(Expr::var(join), Expr::New { class: jc.class }));
        assert_eq!(
            body[1],
            Stmt::assign(Expr::member(Expr::var(join), jc.counter), Expr::Int(3))
        );
        let Stmt::Fork { branches, .. } = &body[2] else {
            panic!("expected fork");
        };
        assert_eq!(branches.len(), 3);
        for (i, branch) in branches.iter().enumerate() {
            let Stmt::Call { func, args, .. } = &branch[0] else {
                panic!("expected call");
            };
            assert_eq!(d.netlist.func_name(*func), format!("__Vfork__0__{i}"));
            assert_eq!(args, &vec![Expr::var(join)]);
            let f = &d.netlist.funcs[*func];
            assert_eq!(f.kind, FuncKind::ForkBranch);
            assert!(f.is_coroutine());
            // Every branch ends by signalling the join.
            assert!(matches!(f.body.last(), Some(Stmt::EventTrigger { .. })));
        }
        assert!(matches!(body[3], Stmt::While { .. }));
    }

    #[test]
    fn join_any_waits_for_one() {
        let mut d = design();
        let body = vec![Stmt::fork(
            JoinKind::JoinAny,
            vec![vec![wait_ev(d.ev)], vec![Stmt::delay(Expr::Int(2), vec![])]],
        )];
        let p = d.netlist.add_process(Process::new(d.top, ProcessKind::Initial, body));
        run(&mut d.netlist);
        let jc = d.netlist.join_class.unwrap();
        let Stmt::Assign { lhs, rhs, .. } = &d.netlist.processes[p].body[1] else {
            panic!("expected counter init");
        };
        assert!(matches!(lhs, Expr::Member { member, .. } if *member == jc.counter));
        assert_eq!(rhs, &Expr::Int(1));
    }

    #[test]
    fn join_none_passes_locals_without_join_object() {
        let mut d = design();
        let tmp = d.netlist.add_var(d.top, "tmp", VarKind::BlockTemp, DataType::Int);
        let body = vec![
            Stmt::assign(Expr::var(tmp), Expr::Int(4)),
            Stmt::Fork {
                name: Some(d.netlist.intern("worker")),
                join: JoinKind::JoinNone,
                branches: vec![vec![Stmt::Block {
                    stmts: vec![
                        Stmt::delay(Expr::Int(1), vec![]),
                        Stmt::assign(Expr::var(d.a), Expr::var(tmp)),
                    ],
                    span: Span::DUMMY,
                }]],
                span: Span::DUMMY,
            },
        ];
        let p = d.netlist.add_process(Process::new(d.top, ProcessKind::Initial, body));
        run(&mut d.netlist);

        assert!(d.netlist.join_class.is_none());
        let body = &d.netlist.processes[p].body;
        assert_eq!(body.len(), 2);
        let Stmt::Fork { branches, .. } = &body[1] else {
            panic!("expected fork");
        };
        let Stmt::Call { func, args, .. } = &branches[0][0] else {
            panic!("expected call");
        };
        assert_eq!(d.netlist.func_name(*func), "__Vfork__worker__0__0");
        assert_eq!(args, &vec![Expr::var(tmp)]);

        let f = &d.netlist.funcs[*func];
        let param = f.args[0];
        assert_eq!(d.netlist.vars[param].kind, VarKind::Arg);
        assert_eq!(d.netlist.vars[param].func, Some(*func));
        assert_eq!(d.netlist.var_name(param), "tmp");
        // The block was unwrapped and the local replaced by the parameter.
        assert_eq!(f.body.len(), 2);
        assert_eq!(f.body[1], Stmt::assign(Expr::var(d.a), Expr::var(param)));
    }

    #[test]
    fn non_suspending_join_needs_no_join_object() {
        let mut d = design();
        let body = vec![Stmt::fork(
            JoinKind::Join,
            vec![vec![Stmt::assign(Expr::var(d.a), Expr::Int(1))]],
        )];
        let p = d.netlist.add_process(Process::new(d.top, ProcessKind::Initial, body));
        run(&mut d.netlist);
        assert!(d.netlist.join_class.is_none());
        assert_eq!(d.netlist.processes[p].body.len(), 1);
    }

    #[test]
    fn nested_forks_split_inside_out() {
        let mut d = design();
        let inner = Stmt::fork(JoinKind::JoinNone, vec![vec![wait_ev(d.ev)]]);
        let outer = Stmt::fork(JoinKind::JoinNone, vec![vec![inner]]);
        d.netlist
            .add_process(Process::new(d.top, ProcessKind::Initial, vec![outer]));
        run(&mut d.netlist);
        let inner_branch = d.netlist.find_func("__Vfork__0__0").unwrap();
        let outer_branch = d.netlist.find_func("__Vfork__1__0").unwrap();
        assert!(matches!(d.netlist.funcs[inner_branch].body[0], Stmt::EventControl { .. }));
        assert!(matches!(d.netlist.funcs[outer_branch].body[0], Stmt::Fork { .. }));
    }

    #[test]
    fn empty_fork_is_kept_with_warning() {
        let mut d = design();
        let p = d.netlist.add_process(Process::new(
            d.top,
            ProcessKind::Initial,
            vec![Stmt::fork(JoinKind::Join, vec![])],
        ));
        let sink = run(&mut d.netlist);
        assert_eq!(sink.diagnostics()[0].code, errors::W301);
        assert_eq!(sink.error_count(), 0);
        assert_eq!(d.netlist.processes[p].body, vec![Stmt::fork(JoinKind::Join, vec![])]);
    }

    #[test]
    fn join_class_is_created_once() {
        let mut n = Netlist::new();
        n.add_scope("top", None);
        let a = join_class(&mut n);
        let b = join_class(&mut n);
        assert_eq!(a, b);
        assert_eq!(n.classes.len(), 1);
        assert_eq!(n.classes[a.class].constructor, Some(a.constructor));
        assert_eq!(n.var_name(a.wake_event), "wakeEvent");
    }
}
