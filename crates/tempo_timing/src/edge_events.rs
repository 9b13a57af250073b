//! Registry of synthesized edge events.
//!
//! An edge event is an `event` variable that fires whenever a tracked signal
//! makes a given transition. Dynamically scheduled code waits on these
//! events instead of on raw signals, and every write to a tracked signal is
//! followed by code that fires the matching events (see `triggers`).
//!
//! Events are created on first request and live in the same scope as their
//! signal, so there is exactly one event per `(signal, edge)` pair.

use std::collections::BTreeMap;
use tempo_ast::{DataType, EdgeKind, Expr, Netlist, SenItem, VarId, VarKind};
use tempo_common::{InternalError, TempoResult};

/// Maps `(signal, edge)` pairs to their edge-event variables.
#[derive(Debug, Default)]
pub struct EdgeEventRegistry {
    events: BTreeMap<(VarId, EdgeKind), VarId>,
    signals: BTreeMap<VarId, VarId>,
}

impl EdgeEventRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the event for `signal` and `edge`, creating it if needed.
    ///
    /// The event is declared in the signal's scope and named
    /// `__VedgeEvent__<scope path without dots>__<edge>__<signal>`. Calling
    /// this twice with the same arguments returns the same variable.
    ///
    /// Both-edge requests are rejected; callers split them into a posedge
    /// and a negedge request first.
    pub fn get_or_create(
        &mut self,
        netlist: &mut Netlist,
        signal: VarId,
        edge: EdgeKind,
    ) -> TempoResult<VarId> {
        if edge == EdgeKind::BothEdge {
            return Err(InternalError::new(format!(
                "both-edge event requested for `{}`",
                netlist.var_name(signal)
            )));
        }
        if let Some(&event) = self.events.get(&(signal, edge)) {
            return Ok(event);
        }
        let var = &netlist.vars[signal];
        let scope = var.scope;
        let kind = if var.kind == VarKind::Member {
            VarKind::Member
        } else {
            VarKind::ModuleTemp
        };
        let name = format!(
            "__VedgeEvent__{}__{}__{}",
            netlist.scope_path(scope).replace('.', ""),
            edge.keyword(),
            netlist.var_name(signal)
        );
        let event = netlist.add_var(scope, &name, kind, DataType::Event);
        log::debug!("created edge event `{name}`");
        self.events.insert((signal, edge), event);
        self.signals.insert(event, signal);
        Ok(event)
    }

    /// Returns the event for `signal` and `edge` if it exists.
    pub fn get(&self, signal: VarId, edge: EdgeKind) -> Option<VarId> {
        self.events.get(&(signal, edge)).copied()
    }

    /// Returns `true` if an event exists for `signal` and `edge`.
    pub fn has(&self, signal: VarId, edge: EdgeKind) -> bool {
        self.events.contains_key(&(signal, edge))
    }

    /// Returns `true` if any edge event exists for `signal`.
    pub fn has_any(&self, signal: VarId) -> bool {
        EdgeKind::EVENT_KINDS.iter().any(|&edge| self.has(signal, edge))
    }

    /// Returns the existing events of `signal` as `(edge, event)` pairs.
    pub fn events_of(&self, signal: VarId) -> Vec<(EdgeKind, VarId)> {
        EdgeKind::EVENT_KINDS
            .iter()
            .filter_map(|&edge| self.get(signal, edge).map(|event| (edge, event)))
            .collect()
    }

    /// Returns the signal an edge event tracks.
    pub fn signal_of(&self, event: VarId) -> Option<VarId> {
        self.signals.get(&event).copied()
    }

    /// Returns every signal that has at least one edge event, in ID order.
    pub fn signals(&self) -> Vec<VarId> {
        let mut out: Vec<VarId> = self.events.keys().map(|&(signal, _)| signal).collect();
        out.dedup();
        out
    }

    /// Returns the number of events created so far.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if no event has been created.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Builds the expression referring to `event` the way `signal_expr` refers
/// to its signal: a member selection keeps its object handle.
pub(crate) fn event_expr(signal_expr: &Expr, event: VarId) -> Expr {
    match signal_expr {
        Expr::Member { base, .. } => Expr::member((**base).clone(), event),
        _ => Expr::var(event),
    }
}

/// Splits both-edge items into a posedge and a negedge item.
pub(crate) fn split_both_edges(senses: Vec<SenItem>) -> Vec<SenItem> {
    let mut out = Vec::with_capacity(senses.len());
    for item in senses {
        if item.edge == EdgeKind::BothEdge {
            out.push(SenItem::new(EdgeKind::Posedge, item.expr.clone()));
            out.push(SenItem::new(EdgeKind::Negedge, item.expr));
        } else {
            out.push(item);
        }
    }
    out
}

/// Rewrites sensitivity items on raw signals into any-edge waits on the
/// signals' edge events.
///
/// Items already naming an event are kept. Items on expressions that are
/// not a plain signal or member reference are kept as written.
pub(crate) fn translate_senses(
    registry: &mut EdgeEventRegistry,
    netlist: &mut Netlist,
    senses: Vec<SenItem>,
) -> TempoResult<Vec<SenItem>> {
    let mut out = Vec::with_capacity(senses.len());
    for item in split_both_edges(senses) {
        let Some(signal) = item.expr.target_var() else {
            out.push(item);
            continue;
        };
        if netlist.vars[signal].is_event() {
            out.push(item);
            continue;
        }
        let event = registry.get_or_create(netlist, signal, item.edge)?;
        out.push(SenItem::new(EdgeKind::AnyEdge, event_expr(&item.expr, event)));
    }
    Ok(out)
}
