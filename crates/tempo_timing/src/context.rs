//! State shared by every scheduling pass during one compilation run.

use crate::edge_events::EdgeEventRegistry;
use petgraph::graphmap::UnGraphMap;
use std::collections::{BTreeMap, BTreeSet};
use tempo_ast::{DataType, Expr, FuncId, Netlist, ScopeId, Stmt, UnitId, VarId, VarKind};
use tempo_common::TempoResult;
use tempo_config::TimingConfig;
use tempo_diagnostics::DiagnosticSink;

/// A single transformation over the whole netlist.
///
/// Each pass inspects and rewrites the netlist, returning `true` if it
/// changed anything (which may enable further work in an iterated group).
pub(crate) trait TimingPass {
    /// Short name used in log messages and stage dumps.
    fn name(&self) -> &'static str;

    /// Runs the pass, returning `true` if it made changes.
    fn run(&self, cx: &mut TimingContext<'_>) -> TempoResult<bool>;
}

/// Facts about variables gathered by the classifier.
#[derive(Debug, Default)]
pub(crate) struct Facts {
    /// Variables written from a dynamically scheduled unit.
    pub written_by_dynamic: BTreeSet<VarId>,
    /// Variables written from a suspendable unit.
    pub written_by_suspendable: BTreeSet<VarId>,
    /// Set once any unit (or fork) has been found to suspend.
    pub timing_used: bool,
}

/// Per-prefix counters for synthesized names.
#[derive(Debug, Default)]
pub(crate) struct UniqueNames {
    counters: BTreeMap<String, u32>,
}

impl UniqueNames {
    /// Returns the next index for `prefix`, starting at zero.
    pub fn next_index(&mut self, prefix: &str) -> u32 {
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        let index = *counter;
        *counter += 1;
        index
    }

    /// Returns `prefix` followed by its next index, e.g. `__Vintraval__3`.
    pub fn next(&mut self, prefix: &str) -> String {
        let index = self.next_index(prefix);
        format!("{prefix}{index}")
    }
}

/// Mutable state threaded through the pipeline.
pub(crate) struct TimingContext<'a> {
    pub netlist: &'a mut Netlist,
    pub sink: &'a DiagnosticSink,
    pub config: &'a TimingConfig,
    pub edge_events: EdgeEventRegistry,
    pub names: UniqueNames,
    pub facts: Facts,
    /// Undirected override relation between virtual methods.
    pub overrides: UnGraphMap<FuncId, ()>,
    /// The lazily created deferred-assignment event of each scope.
    pub deferred_events: BTreeMap<ScopeId, VarId>,
    /// Number of analysis rounds run by the fixpoint loop.
    pub iterations: usize,
}

impl<'a> TimingContext<'a> {
    pub fn new(netlist: &'a mut Netlist, config: &'a TimingConfig, sink: &'a DiagnosticSink) -> Self {
        let overrides = crate::classify::build_overrides(netlist);
        Self {
            netlist,
            sink,
            config,
            edge_events: EdgeEventRegistry::new(),
            names: UniqueNames::default(),
            facts: Facts::default(),
            overrides,
            deferred_events: BTreeMap::new(),
            iterations: 0,
        }
    }

    /// Adds a compiler temporary named `<prefix><n>` to `scope`.
    pub fn new_temp(&mut self, scope: ScopeId, prefix: &str, kind: VarKind, ty: DataType) -> VarId {
        let name = self.names.next(prefix);
        self.netlist.add_var(scope, &name, kind, ty)
    }

    /// Returns the type a temporary holding the value of `lhs` needs.
    pub fn value_type(&self, lhs: &Expr) -> DataType {
        match lhs.target_var() {
            Some(var) => self.netlist.vars[var].ty,
            None if self.netlist.is_real_expr(lhs) => DataType::Real,
            None => DataType::Int,
        }
    }

    /// Returns the deferred-assignment event of `scope`, creating it on first use.
    pub fn deferred_event(&mut self, scope: ScopeId) -> VarId {
        if let Some(&event) = self.deferred_events.get(&scope) {
            return event;
        }
        let event = self
            .netlist
            .add_var(scope, "__VdlyEvent__", VarKind::ModuleTemp, DataType::Event);
        log::debug!("created deferred event in `{}`", self.netlist.scope_path(scope));
        self.deferred_events.insert(scope, event);
        event
    }

    /// Logs a JSON dump of the netlist when stage dumps are enabled.
    pub fn dump_stage(&self, stage: &str) {
        if !self.config.dump_stages {
            return;
        }
        match serde_json::to_string(&*self.netlist) {
            Ok(json) => log::trace!("after {stage}: {json}"),
            Err(err) => log::warn!("could not dump netlist after {stage}: {err}"),
        }
    }
}

/// Rewrites every statement of `stmts`, children before parents.
///
/// `f` receives each statement by value together with whether it sits
/// directly under a fork, and returns the statements replacing it. A
/// statement is directly under a fork when it is the only statement of a
/// fork branch, or the only statement of a nested body that is itself
/// directly under a fork. Sequential blocks always clear the flag.
pub(crate) fn rewrite_stmts<F>(stmts: &mut Vec<Stmt>, under_fork: bool, f: &mut F) -> TempoResult<()>
where
    F: FnMut(Stmt, bool) -> TempoResult<Vec<Stmt>>,
{
    let old = std::mem::take(stmts);
    for mut stmt in old {
        let is_fork = matches!(stmt, Stmt::Fork { .. });
        let is_block = matches!(stmt, Stmt::Block { .. });
        for body in stmt.bodies_mut() {
            let child_under_fork = if is_fork {
                body.len() == 1
            } else {
                !is_block && under_fork && body.len() == 1
            };
            rewrite_stmts(body, child_under_fork, f)?;
        }
        stmts.extend(f(stmt, under_fork)?);
    }
    Ok(())
}

/// Applies `f` to the body of every unit, passing the unit along.
pub(crate) fn for_each_unit_body<F>(netlist: &mut Netlist, mut f: F) -> TempoResult<()>
where
    F: FnMut(&mut Netlist, UnitId, &mut Vec<Stmt>) -> TempoResult<()>,
{
    for unit in netlist.units() {
        let mut body = netlist.take_unit_body(unit);
        let result = f(netlist, unit, &mut body);
        *netlist.unit_body_mut(unit) = body;
        result?;
    }
    Ok(())
}
