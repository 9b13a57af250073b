//! Scheduling transformations for timed and concurrent code.
//!
//! This crate takes an elaborated [`Netlist`] and rewrites it so that every
//! construct that can suspend (delays, event controls, waits, forks) is
//! expressed in terms the runtime understands: coroutine routines, edge
//! events that are explicitly fired after each write, and join objects.
//!
//! The pipeline runs in three phases:
//! 1. **Normalization**: assertion clocks, intra-assignment delays, and delay
//!    scaling to precision ticks
//! 2. **Analysis**: suspendable/dynamic classification, iterated together
//!    with the deferred-assignment and always-to-initial rewrites
//! 3. **Lowering**: fork splitting, edge-event materialization, trigger
//!    injection, and class-event cleanup
//!
//! A design in which nothing suspends skips the lowering phase; its event
//! triggers become plain writes.
//!
//! # Usage
//!
//! ```ignore
//! use tempo_timing::run_timing;
//! let summary = run_timing(&mut netlist, &config.timing, &sink)?;
//! ```

#![warn(missing_docs)]

mod always;
mod class_events;
mod classify;
mod clocking;
mod context;
mod deferred;
mod edge_events;
pub mod errors;
mod fork;
mod intra;
mod materialize;
mod pipeline;
mod timescale;
mod triggers;

pub use edge_events::EdgeEventRegistry;

use context::TimingContext;
use serde::{Deserialize, Serialize};
use tempo_ast::{FuncKind, Netlist, UnitId};
use tempo_common::TempoResult;
use tempo_config::TimingConfig;
use tempo_diagnostics::DiagnosticSink;

/// What the scheduling passes found and produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingSummary {
    /// Whether any code in the design can suspend.
    pub timing_used: bool,
    /// Analysis rounds until the classification converged.
    pub iterations: usize,
    /// Processes and routines flagged suspendable.
    pub suspendable_units: usize,
    /// Processes and routines flagged dynamic.
    pub dynamic_units: usize,
    /// Routines compiled as coroutines.
    pub coroutines: usize,
    /// Routines synthesized from fork branches.
    pub fork_branches: usize,
    /// Edge events created.
    pub edge_events: usize,
    /// Per-scope deferred-assignment events created.
    pub deferred_events: usize,
}

/// Runs every scheduling pass over `netlist`.
///
/// User-facing problems are reported to `sink` and do not stop the run.
/// An `Err` means the netlist was found in an inconsistent state and must
/// not be used further.
pub fn run_timing(
    netlist: &mut Netlist,
    config: &TimingConfig,
    sink: &DiagnosticSink,
) -> TempoResult<TimingSummary> {
    let mut cx = TimingContext::new(netlist, config, sink);
    pipeline::run_pipeline(&mut cx)?;

    let units = cx.netlist.units();
    let summary = TimingSummary {
        timing_used: cx.facts.timing_used,
        iterations: cx.iterations,
        suspendable_units: units.iter().filter(|&&u| cx.netlist.is_suspendable(u)).count(),
        dynamic_units: units.iter().filter(|&&u| cx.netlist.is_dynamic(u)).count(),
        coroutines: cx.netlist.funcs.values().filter(|f| f.is_coroutine()).count(),
        fork_branches: units
            .iter()
            .filter(|u| matches!(u, UnitId::Func(f) if cx.netlist.funcs[*f].kind == FuncKind::ForkBranch))
            .count(),
        edge_events: cx.edge_events.len(),
        deferred_events: cx.deferred_events.len(),
    };
    log::info!(
        "timing: {} suspendable units, {} coroutines, {} edge events",
        summary.suspendable_units,
        summary.coroutines,
        summary.edge_events
    );
    Ok(summary)
}
