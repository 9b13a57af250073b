//! Procedural statements, timing controls, and sensitivity items.

use crate::expr::Expr;
use crate::ids::FuncId;
use serde::{Deserialize, Serialize};
use std::fmt;
use tempo_common::{Ident, Span};

/// The transition a sensitivity item reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// A falsy-to-truthy transition.
    Posedge,
    /// A truthy-to-falsy transition.
    Negedge,
    /// Either a posedge or a negedge.
    BothEdge,
    /// Any change of value (or, for an event, being triggered).
    AnyEdge,
}

impl EdgeKind {
    /// The edge kinds that an edge event can be materialized for.
    pub const EVENT_KINDS: [EdgeKind; 3] = [EdgeKind::Posedge, EdgeKind::Negedge, EdgeKind::AnyEdge];

    /// Returns the keyword used in synthesized names.
    pub fn keyword(self) -> &'static str {
        match self {
            EdgeKind::Posedge => "posedge",
            EdgeKind::Negedge => "negedge",
            EdgeKind::BothEdge => "bothedge",
            EdgeKind::AnyEdge => "anyedge",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// One entry of a sensitivity list: `posedge clk`, `ev`, `negedge rst`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SenItem {
    /// The transition waited for.
    pub edge: EdgeKind,
    /// The observed expression, usually a variable or member reference.
    pub expr: Expr,
}

impl SenItem {
    /// Creates a sensitivity item.
    pub fn new(edge: EdgeKind, expr: Expr) -> Self {
        Self { edge, expr }
    }
}

/// The sensitivity of an `always` process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SenTree {
    /// `@*`: re-run whenever anything read by the body changes.
    Combo,
    /// An explicit sensitivity list.
    Items(Vec<SenItem>),
}

/// An intra-assignment timing control (`a = #5 b`, `a <= @(posedge clk) b`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TimingControl {
    /// A delay by the given amount.
    Delay(Expr),
    /// A wait for the given sensitivity items.
    Event(Vec<SenItem>),
}

/// How a fork waits for its branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinKind {
    /// Wait for every branch.
    Join,
    /// Wait for the first branch to finish.
    JoinAny,
    /// Do not wait (fire-and-forget).
    JoinNone,
}

/// A procedural statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// A blocking assignment, optionally with an intra-assignment timing control.
    Assign {
        /// Assignment target.
        lhs: Expr,
        /// Assigned value.
        rhs: Expr,
        /// Intra-assignment delay or event control.
        timing: Option<TimingControl>,
        /// Source location.
        span: Span,
    },
    /// A deferred (non-blocking) assignment.
    AssignDeferred {
        /// Assignment target.
        lhs: Expr,
        /// Assigned value.
        rhs: Expr,
        /// Intra-assignment delay or event control.
        timing: Option<TimingControl>,
        /// Source location.
        span: Span,
    },
    /// Conditional execution.
    If {
        /// The condition.
        cond: Expr,
        /// Executed when the condition holds.
        then_body: Vec<Statement>,
        /// Executed otherwise.
        else_body: Vec<Statement>,
        /// Source location.
        span: Span,
    },
    /// A loop re-evaluating `cond` before every iteration.
    While {
        /// The loop condition.
        cond: Expr,
        /// The loop body.
        body: Vec<Statement>,
        /// Source location.
        span: Span,
    },
    /// A sequential block.
    Block {
        /// The statements in execution order.
        stmts: Vec<Statement>,
        /// Source location.
        span: Span,
    },
    /// `#amount body`: suspend for `amount` time units, then run `body`.
    Delay {
        /// The delay amount.
        amount: Expr,
        /// Statements run after the delay.
        body: Vec<Statement>,
        /// Source location.
        span: Span,
    },
    /// `@(senses) body`: suspend until a sensitivity item fires.
    EventControl {
        /// The awaited sensitivity items.
        senses: Vec<SenItem>,
        /// Statements run after the wake-up.
        body: Vec<Statement>,
        /// Source location.
        span: Span,
    },
    /// `wait (cond) body`: suspend until `cond` holds.
    Wait {
        /// The awaited condition.
        cond: Expr,
        /// Statements run once the condition holds.
        body: Vec<Statement>,
        /// Source location.
        span: Span,
    },
    /// `fork ... join*`: run each branch concurrently.
    Fork {
        /// Optional block label.
        name: Option<Ident>,
        /// Join semantics.
        join: JoinKind,
        /// One statement list per concurrent branch.
        branches: Vec<Vec<Statement>>,
        /// Source location.
        span: Span,
    },
    /// A task or void function call.
    Call {
        /// The callee.
        func: FuncId,
        /// Call arguments.
        args: Vec<Expr>,
        /// Source location.
        span: Span,
    },
    /// `-> event`: fire an event.
    EventTrigger {
        /// The fired event.
        event: Expr,
        /// Source location.
        span: Span,
    },
    /// Withdraw every waiter registered on an event.
    CancelEvent {
        /// The cancelled event.
        event: Expr,
        /// Source location.
        span: Span,
    },
    /// A concurrent assertion with its explicit clocks.
    Assertion {
        /// Explicit clock sensitivity; empty when unclocked.
        clocks: Vec<SenItem>,
        /// The asserted property.
        cond: Expr,
        /// Source location.
        span: Span,
    },
}

/// Short alias used throughout the passes.
pub type Stmt = Statement;

impl Statement {
    /// Creates a blocking assignment without timing control.
    pub fn assign(lhs: Expr, rhs: Expr) -> Self {
        Statement::Assign {
            lhs,
            rhs,
            timing: None,
            span: Span::DUMMY,
        }
    }

    /// Creates a deferred assignment without timing control.
    pub fn assign_deferred(lhs: Expr, rhs: Expr) -> Self {
        Statement::AssignDeferred {
            lhs,
            rhs,
            timing: None,
            span: Span::DUMMY,
        }
    }

    /// Creates `if (cond) then_body`.
    pub fn if_then(cond: Expr, then_body: Vec<Statement>) -> Self {
        Statement::If {
            cond,
            then_body,
            else_body: Vec::new(),
            span: Span::DUMMY,
        }
    }

    /// Creates `while (cond) body`.
    pub fn while_loop(cond: Expr, body: Vec<Statement>) -> Self {
        Statement::While {
            cond,
            body,
            span: Span::DUMMY,
        }
    }

    /// Creates `#amount body`.
    pub fn delay(amount: Expr, body: Vec<Statement>) -> Self {
        Statement::Delay {
            amount,
            body,
            span: Span::DUMMY,
        }
    }

    /// Creates `@(senses) body`.
    pub fn event_control(senses: Vec<SenItem>, body: Vec<Statement>) -> Self {
        Statement::EventControl {
            senses,
            body,
            span: Span::DUMMY,
        }
    }

    /// Creates `wait (cond) body`.
    pub fn wait(cond: Expr, body: Vec<Statement>) -> Self {
        Statement::Wait {
            cond,
            body,
            span: Span::DUMMY,
        }
    }

    /// Creates an unnamed fork.
    pub fn fork(join: JoinKind, branches: Vec<Vec<Statement>>) -> Self {
        Statement::Fork {
            name: None,
            join,
            branches,
            span: Span::DUMMY,
        }
    }

    /// Creates a call statement.
    pub fn call(func: FuncId, args: Vec<Expr>) -> Self {
        Statement::Call {
            func,
            args,
            span: Span::DUMMY,
        }
    }

    /// Creates `-> event`.
    pub fn trigger(event: Expr) -> Self {
        Statement::EventTrigger {
            event,
            span: Span::DUMMY,
        }
    }

    /// Returns the source location of this statement.
    pub fn span(&self) -> Span {
        match self {
            Statement::Assign { span, .. }
            | Statement::AssignDeferred { span, .. }
            | Statement::If { span, .. }
            | Statement::While { span, .. }
            | Statement::Block { span, .. }
            | Statement::Delay { span, .. }
            | Statement::EventControl { span, .. }
            | Statement::Wait { span, .. }
            | Statement::Fork { span, .. }
            | Statement::Call { span, .. }
            | Statement::EventTrigger { span, .. }
            | Statement::CancelEvent { span, .. }
            | Statement::Assertion { span, .. } => *span,
        }
    }

    /// Returns the nested statement lists of this statement.
    pub fn bodies(&self) -> Vec<&Vec<Statement>> {
        match self {
            Statement::If {
                then_body,
                else_body,
                ..
            } => vec![then_body, else_body],
            Statement::While { body, .. }
            | Statement::Delay { body, .. }
            | Statement::EventControl { body, .. }
            | Statement::Wait { body, .. } => vec![body],
            Statement::Block { stmts, .. } => vec![stmts],
            Statement::Fork { branches, .. } => branches.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Returns the nested statement lists of this statement, mutably.
    pub fn bodies_mut(&mut self) -> Vec<&mut Vec<Statement>> {
        match self {
            Statement::If {
                then_body,
                else_body,
                ..
            } => vec![then_body, else_body],
            Statement::While { body, .. }
            | Statement::Delay { body, .. }
            | Statement::EventControl { body, .. }
            | Statement::Wait { body, .. } => vec![body],
            Statement::Block { stmts, .. } => vec![stmts],
            Statement::Fork { branches, .. } => branches.iter_mut().collect(),
            _ => Vec::new(),
        }
    }

    /// Returns the expressions owned directly by this statement.
    ///
    /// Expressions of nested statements are not included.
    pub fn exprs(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        match self {
            Statement::Assign {
                lhs, rhs, timing, ..
            }
            | Statement::AssignDeferred {
                lhs, rhs, timing, ..
            } => {
                out.push(lhs);
                out.push(rhs);
                match timing {
                    Some(TimingControl::Delay(amount)) => out.push(amount),
                    Some(TimingControl::Event(senses)) => out.extend(senses.iter().map(|s| &s.expr)),
                    None => {}
                }
            }
            Statement::If { cond, .. }
            | Statement::While { cond, .. }
            | Statement::Wait { cond, .. } => out.push(cond),
            Statement::Delay { amount, .. } => out.push(amount),
            Statement::EventControl { senses, .. } => out.extend(senses.iter().map(|s| &s.expr)),
            Statement::Call { args, .. } => out.extend(args.iter()),
            Statement::EventTrigger { event, .. } | Statement::CancelEvent { event, .. } => {
                out.push(event)
            }
            Statement::Assertion { clocks, cond, .. } => {
                out.extend(clocks.iter().map(|s| &s.expr));
                out.push(cond);
            }
            Statement::Block { .. } | Statement::Fork { .. } => {}
        }
        out
    }

    /// Returns the expressions owned directly by this statement, mutably.
    pub fn exprs_mut(&mut self) -> Vec<&mut Expr> {
        let mut out = Vec::new();
        match self {
            Statement::Assign {
                lhs, rhs, timing, ..
            }
            | Statement::AssignDeferred {
                lhs, rhs, timing, ..
            } => {
                out.push(lhs);
                out.push(rhs);
                match timing {
                    Some(TimingControl::Delay(amount)) => out.push(amount),
                    Some(TimingControl::Event(senses)) => {
                        out.extend(senses.iter_mut().map(|s| &mut s.expr))
                    }
                    None => {}
                }
            }
            Statement::If { cond, .. }
            | Statement::While { cond, .. }
            | Statement::Wait { cond, .. } => out.push(cond),
            Statement::Delay { amount, .. } => out.push(amount),
            Statement::EventControl { senses, .. } => {
                out.extend(senses.iter_mut().map(|s| &mut s.expr))
            }
            Statement::Call { args, .. } => out.extend(args.iter_mut()),
            Statement::EventTrigger { event, .. } | Statement::CancelEvent { event, .. } => {
                out.push(event)
            }
            Statement::Assertion { clocks, cond, .. } => {
                out.extend(clocks.iter_mut().map(|s| &mut s.expr));
                out.push(cond);
            }
            Statement::Block { .. } | Statement::Fork { .. } => {}
        }
        out
    }
}
