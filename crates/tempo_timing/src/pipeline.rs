//! Pass ordering.
//!
//! The stages run in a fixed order. Classification and the rewrites that
//! depend on it (deferred assignments, always-to-initial) feed each other,
//! so they iterate until nothing changes. Everything after that only
//! consumes the final flags.

use crate::always::AlwaysToInitialPass;
use crate::class_events::ClassEventsPass;
use crate::classify::{check_overrides, ClassifyPass};
use crate::clocking::ClockingPass;
use crate::context::{TimingContext, TimingPass};
use crate::deferred::{check_public, DeferredAssignPass};
use crate::fork::ForkSplitPass;
use crate::intra::IntraAssignPass;
use crate::materialize::MaterializePass;
use crate::timescale::TimescalePass;
use crate::triggers::{CleanTriggersPass, TriggerPass};
use tempo_ast::Hook;
use tempo_common::{InternalError, TempoResult};

/// Runs one stage, logging it and dumping the netlist afterwards.
fn run_stage(cx: &mut TimingContext<'_>, pass: &dyn TimingPass) -> TempoResult<bool> {
    log::info!("timing: running {}", pass.name());
    cx.sink.enter_stage(pass.name());
    let changed = pass.run(cx)?;
    cx.dump_stage(pass.name());
    Ok(changed)
}

/// Runs every scheduling stage over the netlist in `cx`.
pub(crate) fn run_pipeline(cx: &mut TimingContext<'_>) -> TempoResult<()> {
    cx.netlist.default_timescale = cx.config.default_timescale();

    run_stage(cx, &ClockingPass)?;
    cx.sink.enter_stage(DeferredAssignPass.name());
    check_public(cx);
    if !cx.config.enabled {
        log::info!("timing: disabled, lowering event triggers only");
        run_stage(cx, &CleanTriggersPass)?;
        return Ok(());
    }

    run_stage(cx, &IntraAssignPass)?;
    run_stage(cx, &TimescalePass)?;
    analyze(cx)?;

    if !cx.facts.timing_used {
        log::info!("timing: no suspendable code, lowering event triggers");
        run_stage(cx, &CleanTriggersPass)?;
        return Ok(());
    }
    register_resume_hook(cx);

    let stages: [&dyn TimingPass; 4] = [
        &ForkSplitPass,
        &MaterializePass,
        &TriggerPass,
        &ClassEventsPass,
    ];
    for pass in stages {
        run_stage(cx, pass)?;
    }
    Ok(())
}

/// Alternates classification with the rewrites it enables until none of
/// them changes anything.
fn analyze(cx: &mut TimingContext<'_>) -> TempoResult<()> {
    let group: [&dyn TimingPass; 3] = [&ClassifyPass, &DeferredAssignPass, &AlwaysToInitialPass];
    loop {
        if cx.iterations >= cx.config.max_fixpoint_iterations {
            return Err(InternalError::new(format!(
                "timing analysis did not converge after {} iterations",
                cx.iterations
            )));
        }
        cx.iterations += 1;
        log::trace!("timing: analysis round {}", cx.iterations);
        let mut changed = false;
        for pass in group {
            changed |= run_stage(cx, pass)?;
        }
        if !changed {
            break;
        }
    }
    log::info!("timing: analysis converged after {} rounds", cx.iterations);
    cx.sink.enter_stage(ClassifyPass.name());
    check_overrides(cx)
}

/// Registers the hook driving the deferred events, once per program.
fn register_resume_hook(cx: &mut TimingContext<'_>) {
    let deferred_events = cx.deferred_events.values().copied().collect();
    let hook = Hook::ResumeTriggered { deferred_events };
    let hooks = &mut cx.netlist.hooks;
    match hooks
        .iter_mut()
        .find(|h| matches!(h, Hook::ResumeTriggered { .. }))
    {
        Some(existing) => *existing = hook,
        None => hooks.push(hook),
    }
}
