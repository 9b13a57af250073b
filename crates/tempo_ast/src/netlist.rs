//! The elaborated design consumed and rewritten by the scheduling passes.

use crate::arena::Arena;
use crate::class::Class;
use crate::expr::{BinaryOp, Expr, UnaryOp};
use crate::func::{Func, FuncKind};
use crate::ids::{ClassId, FuncId, ProcessId, ScopeId, VarId};
use crate::process::Process;
use crate::scope::{Scope, ScopeKind};
use crate::stmt::{Stmt, TimingControl};
use crate::var::{DataType, Var, VarKind};
use serde::{Deserialize, Serialize};
use tempo_common::{Ident, Interner, Span, TimeScale};

/// A continuous assignment (`assign lhs = #delay rhs`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuousAssign {
    /// The scope the assignment belongs to.
    pub scope: ScopeId,
    /// Driven net.
    pub lhs: Expr,
    /// Driving expression.
    pub rhs: Expr,
    /// Optional intra-assignment timing control.
    pub timing: Option<TimingControl>,
    /// Source location.
    pub span: Span,
}

/// A call-out registered with the evaluation-cycle driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Hook {
    /// Resume every triggered waiter and drive the deferred-assignment
    /// events until nothing is left to resume.
    ResumeTriggered {
        /// The per-scope deferred events to drive.
        deferred_events: Vec<VarId>,
    },
}

/// The synthesized class backing join objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinClass {
    /// The class.
    pub class: ClassId,
    /// Member event fired whenever a branch finishes.
    pub wake_event: VarId,
    /// Member counting branches still to finish.
    pub counter: VarId,
    /// The class constructor.
    pub constructor: FuncId,
}

/// Either kind of schedulable unit of code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UnitId {
    /// A process.
    Process(ProcessId),
    /// A function or task.
    Func(FuncId),
}

/// An elaborated, type-resolved design.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Netlist {
    /// Interner for every name in the design.
    #[serde(skip)]
    pub interner: Interner,
    /// All scopes.
    pub scopes: Arena<ScopeId, Scope>,
    /// All variables.
    pub vars: Arena<VarId, Var>,
    /// All routines.
    pub funcs: Arena<FuncId, Func>,
    /// All processes.
    pub processes: Arena<ProcessId, Process>,
    /// All classes.
    pub classes: Arena<ClassId, Class>,
    /// Continuous assignments.
    pub assigns: Vec<ContinuousAssign>,
    /// Time scale for scopes declaring none.
    pub default_timescale: TimeScale,
    /// Registered evaluation-cycle hooks.
    pub hooks: Vec<Hook>,
    /// The join-object class, once synthesized.
    pub join_class: Option<JoinClass>,
}

impl Netlist {
    /// Creates an empty netlist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a name.
    pub fn intern(&self, name: &str) -> Ident {
        self.interner.intern(name)
    }

    /// Resolves an interned name.
    pub fn resolve(&self, ident: Ident) -> &str {
        self.interner.resolve(ident)
    }

    /// Adds a module scope.
    pub fn add_scope(&mut self, name: &str, parent: Option<ScopeId>) -> ScopeId {
        let name = self.intern(name);
        self.scopes.alloc(Scope {
            name,
            kind: ScopeKind::Module,
            parent,
            timescale: None,
            default_clocking: None,
            vars: Vec::new(),
        })
    }

    /// Adds a class whose member scope is nested in `parent`.
    pub fn add_class(&mut self, name: &str, parent: ScopeId, extends: Option<ClassId>) -> ClassId {
        let ident = self.intern(name);
        let class_id = self.classes.next_id();
        let scope = self.scopes.alloc(Scope {
            name: ident,
            kind: ScopeKind::Class(class_id),
            parent: Some(parent),
            timescale: None,
            default_clocking: None,
            vars: Vec::new(),
        });
        self.classes.alloc(Class {
            name: ident,
            scope,
            extends,
            constructor: None,
            destructor: None,
        })
    }

    /// Adds a variable to `scope`.
    pub fn add_var(&mut self, scope: ScopeId, name: &str, kind: VarKind, ty: DataType) -> VarId {
        let name = self.intern(name);
        let id = self.vars.alloc(Var {
            name,
            scope,
            kind,
            ty,
            is_public: false,
            is_clock: false,
            func: None,
            span: Span::DUMMY,
        });
        self.scopes[scope].vars.push(id);
        id
    }

    /// Adds a routine, registering it as its class's constructor or destructor
    /// where applicable.
    pub fn add_func(&mut self, func: Func) -> FuncId {
        let kind = func.kind;
        let class = func.class;
        let id = self.funcs.alloc(func);
        if let Some(class) = class {
            match kind {
                FuncKind::Constructor => self.classes[class].constructor = Some(id),
                FuncKind::Destructor => self.classes[class].destructor = Some(id),
                _ => {}
            }
        }
        id
    }

    /// Adds a process.
    pub fn add_process(&mut self, process: Process) -> ProcessId {
        self.processes.alloc(process)
    }

    /// Returns the name of a variable.
    pub fn var_name(&self, var: VarId) -> &str {
        self.resolve(self.vars[var].name)
    }

    /// Returns the name of a routine.
    pub fn func_name(&self, func: FuncId) -> &str {
        self.resolve(self.funcs[func].name)
    }

    /// Returns the dotted hierarchical path of a scope, e.g. `top.dut`.
    pub fn scope_path(&self, scope: ScopeId) -> String {
        let mut names = Vec::new();
        let mut cur = Some(scope);
        while let Some(id) = cur {
            names.push(self.resolve(self.scopes[id].name));
            cur = self.scopes[id].parent;
        }
        names.reverse();
        names.join(".")
    }

    /// Finds a variable by name in `scope` (not its ancestors).
    pub fn find_var(&self, scope: ScopeId, name: &str) -> Option<VarId> {
        let ident = self.interner.lookup(name)?;
        self.scopes[scope]
            .vars
            .iter()
            .copied()
            .find(|&v| self.vars[v].name == ident)
    }

    /// Finds a routine by name anywhere in the design.
    pub fn find_func(&self, name: &str) -> Option<FuncId> {
        let ident = self.interner.lookup(name)?;
        self.funcs
            .iter()
            .find(|(_, f)| f.name == ident)
            .map(|(id, _)| id)
    }

    /// Finds a method declared directly in `class`.
    pub fn find_method(&self, class: ClassId, name: Ident) -> Option<FuncId> {
        self.funcs
            .iter()
            .find(|(_, f)| f.class == Some(class) && f.name == name)
            .map(|(id, _)| id)
    }

    /// Returns `class` followed by its ancestors, nearest first.
    pub fn class_lineage(&self, class: ClassId) -> Vec<ClassId> {
        let mut lineage = Vec::new();
        let mut cur = Some(class);
        while let Some(id) = cur {
            if lineage.contains(&id) {
                break;
            }
            lineage.push(id);
            cur = self.classes[id].extends;
        }
        lineage
    }

    /// Returns the time scale in effect for `scope`.
    pub fn timescale_of(&self, scope: ScopeId) -> TimeScale {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            if let Some(ts) = self.scopes[id].timescale {
                return ts;
            }
            cur = self.scopes[id].parent;
        }
        self.default_timescale
    }

    /// Returns `true` if `expr` evaluates to a real value.
    pub fn is_real_expr(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Real(_) => true,
            Expr::Int(_) | Expr::New { .. } => false,
            Expr::Var(v) => self.vars[*v].is_real(),
            Expr::Member { member, .. } => self.vars[*member].is_real(),
            Expr::Unary { op, operand } => *op == UnaryOp::Neg && self.is_real_expr(operand),
            Expr::Binary { op, lhs, rhs } => match op {
                BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => {
                    self.is_real_expr(lhs) || self.is_real_expr(rhs)
                }
                BinaryOp::MulReal => true,
                _ => false,
            },
            Expr::Call { func, .. } => self.funcs[*func].return_type == Some(DataType::Real),
        }
    }

    /// Returns every process and routine, processes first.
    pub fn units(&self) -> Vec<UnitId> {
        self.processes
            .ids()
            .map(UnitId::Process)
            .chain(self.funcs.ids().map(UnitId::Func))
            .collect()
    }

    /// Returns the scope a unit belongs to.
    pub fn unit_scope(&self, unit: UnitId) -> ScopeId {
        match unit {
            UnitId::Process(p) => self.processes[p].scope,
            UnitId::Func(f) => self.funcs[f].scope,
        }
    }

    /// Returns the body of a unit.
    pub fn unit_body(&self, unit: UnitId) -> &Vec<Stmt> {
        match unit {
            UnitId::Process(p) => &self.processes[p].body,
            UnitId::Func(f) => &self.funcs[f].body,
        }
    }

    /// Returns the body of a unit, mutably.
    pub fn unit_body_mut(&mut self, unit: UnitId) -> &mut Vec<Stmt> {
        match unit {
            UnitId::Process(p) => &mut self.processes[p].body,
            UnitId::Func(f) => &mut self.funcs[f].body,
        }
    }

    /// Returns `true` if the unit is flagged suspendable.
    pub fn is_suspendable(&self, unit: UnitId) -> bool {
        match unit {
            UnitId::Process(p) => self.processes[p].suspendable,
            UnitId::Func(f) => self.funcs[f].suspendable,
        }
    }

    /// Returns `true` if the unit is flagged dynamic.
    pub fn is_dynamic(&self, unit: UnitId) -> bool {
        match unit {
            UnitId::Process(p) => self.processes[p].dynamic,
            UnitId::Func(f) => self.funcs[f].dynamic,
        }
    }

    /// Takes the body out of a unit, leaving it empty.
    pub fn take_unit_body(&mut self, unit: UnitId) -> Vec<Stmt> {
        std::mem::take(self.unit_body_mut(unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessKind;

    #[test]
    fn scope_path_joins_ancestors() {
        let mut n = Netlist::new();
        let top = n.add_scope("top", None);
        let dut = n.add_scope("dut", Some(top));
        assert_eq!(n.scope_path(dut), "top.dut");
    }

    #[test]
    fn find_var_by_name() {
        let mut n = Netlist::new();
        let top = n.add_scope("top", None);
        let clk = n.add_var(top, "clk", VarKind::Net, DataType::BIT);
        assert_eq!(n.find_var(top, "clk"), Some(clk));
        assert_eq!(n.find_var(top, "rst"), None);
        assert_eq!(n.var_name(clk), "clk");
    }

    #[test]
    fn class_destructor_registered() {
        let mut n = Netlist::new();
        let top = n.add_scope("top", None);
        let base = n.add_class("Base", top, None);
        let derived = n.add_class("Derived", top, Some(base));
        let mut dtor = Func::new(n.intern("_destruct"), n.classes[derived].scope, FuncKind::Destructor);
        dtor.class = Some(derived);
        let id = n.add_func(dtor);
        assert_eq!(n.classes[derived].destructor, Some(id));
        assert_eq!(n.class_lineage(derived), vec![derived, base]);
        assert_eq!(n.scope_path(n.classes[derived].scope), "top.Derived");
    }

    #[test]
    fn timescale_inherited_from_parent() {
        let mut n = Netlist::new();
        let top = n.add_scope("top", None);
        let sub = n.add_scope("sub", Some(top));
        let ts: TimeScale = "10ns/1ns".parse().unwrap();
        n.scopes[top].timescale = Some(ts);
        assert_eq!(n.timescale_of(sub), ts);
        let other = n.add_scope("other", None);
        assert_eq!(n.timescale_of(other), TimeScale::default());
    }

    #[test]
    fn real_expressions() {
        let mut n = Netlist::new();
        let top = n.add_scope("top", None);
        let r = n.add_var(top, "r", VarKind::Reg, DataType::Real);
        let i = n.add_var(top, "i", VarKind::Reg, DataType::Int);
        assert!(n.is_real_expr(&Expr::binary(BinaryOp::Add, Expr::var(i), Expr::var(r))));
        assert!(!n.is_real_expr(&Expr::var(i)));
        assert!(n.is_real_expr(&Expr::Real(1.5)));
    }

    #[test]
    fn units_cover_processes_and_funcs() {
        let mut n = Netlist::new();
        let top = n.add_scope("top", None);
        n.add_process(Process::new(top, ProcessKind::Initial, vec![]));
        n.add_func(Func::new(n.intern("t"), top, FuncKind::Task));
        let units = n.units();
        assert_eq!(units.len(), 2);
        assert!(matches!(units[0], UnitId::Process(_)));
        assert!(matches!(units[1], UnitId::Func(_)));
    }
}
