//! Diagnostic codes and helper functions for the scheduling passes.
//!
//! Error codes `E301`--`E305` cover timing constructs that cannot be
//! scheduled as written (unclocked assertions, bad time scales, deferred
//! assignments in exported routines). Warning `W301` flags a fork with no
//! branches.

use tempo_common::{Span, TimeScale};
use tempo_diagnostics::{Category, Diagnostic, DiagnosticCode};

/// Assertion with no clock and no default clock to fall back on.
pub const E301: DiagnosticCode = DiagnosticCode::new(Category::Error, 301);

/// Assertion with more than one explicit clock.
pub const E302: DiagnosticCode = DiagnosticCode::new(Category::Error, 302);

/// Deferred assignment inside a public function or task.
pub const E303: DiagnosticCode = DiagnosticCode::new(Category::Error, 303);

/// Time precision coarser than the time unit.
pub const E304: DiagnosticCode = DiagnosticCode::new(Category::Error, 304);

/// Delay too large for the 64-bit time range after scaling.
pub const E305: DiagnosticCode = DiagnosticCode::new(Category::Error, 305);

/// Fork without any branches.
pub const W301: DiagnosticCode = DiagnosticCode::new(Category::Warning, 301);

/// Creates a diagnostic for an assertion that has no clock.
pub fn error_unclocked_assertion(span: Span) -> Diagnostic {
    Diagnostic::error(E301, "unclocked assertion", span)
        .with_help("add an explicit clock or a `default clocking` block to the enclosing scope")
}

/// Creates a diagnostic for an assertion with several explicit clocks.
pub fn error_multiple_clocks(count: usize, span: Span) -> Diagnostic {
    Diagnostic::error(
        E302,
        format!("only one clock allowed per assertion, found {count}"),
        span,
    )
    .with_note("the first clock is used")
}

/// Creates a diagnostic for a deferred assignment in a public routine.
pub fn error_deferred_in_public(func: &str, span: Span) -> Diagnostic {
    Diagnostic::error(
        E303,
        format!("deferred assignment inside public routine `{func}`"),
        span,
    )
    .with_note("public routines may be called from outside the scheduler")
}

/// Creates a diagnostic for a time scale whose precision is coarser than its unit.
pub fn error_coarse_precision(scope: &str, timescale: TimeScale, span: Span) -> Diagnostic {
    Diagnostic::error(
        E304,
        format!("time precision coarser than time unit in `{scope}` ({timescale})"),
        span,
    )
    .with_note("delays in this scope are left unscaled")
}

/// Creates a diagnostic for a delay that overflows after scaling.
pub fn error_delay_overflow(value: u64, factor: u64, span: Span) -> Diagnostic {
    Diagnostic::error(
        E305,
        format!("delay {value} overflows the 64-bit time range when scaled by {factor}"),
        span,
    )
}

/// Creates a warning for a fork without branches.
pub fn warn_empty_fork(span: Span) -> Diagnostic {
    Diagnostic::warning(W301, "fork has no branches", span)
}
