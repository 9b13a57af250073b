//! Thread-safe diagnostic accumulator.

use crate::diagnostic::Diagnostic;
use crate::severity::Severity;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Collects diagnostics emitted by the scheduling stages.
///
/// The driver announces each stage with [`enter_stage`](Self::enter_stage);
/// diagnostics emitted afterwards are stamped with that stage's name unless
/// they already carry one. The error count is atomic so `has_errors` never
/// takes the lock.
#[derive(Default)]
pub struct DiagnosticSink {
    state: Mutex<SinkState>,
    error_count: AtomicUsize,
}

#[derive(Default)]
struct SinkState {
    diagnostics: Vec<Diagnostic>,
    stage: Option<&'static str>,
}

impl DiagnosticSink {
    /// An empty sink outside any stage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `stage` as the one now running.
    pub fn enter_stage(&self, stage: &'static str) {
        self.state.lock().unwrap().stage = Some(stage);
    }

    /// Records `diag`.
    pub fn emit(&self, mut diag: Diagnostic) {
        if diag.severity == Severity::Error {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        let mut state = self.state.lock().unwrap();
        if diag.stage.is_none() {
            diag.stage = state.stage.map(str::to_string);
        }
        state.diagnostics.push(diag);
    }

    /// Returns `true` if any error was emitted.
    pub fn has_errors(&self) -> bool {
        self.error_count.load(Ordering::Relaxed) > 0
    }

    /// Number of errors emitted so far.
    pub fn error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Everything emitted so far, in order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.state.lock().unwrap().diagnostics.clone()
    }

    /// What `stage` reported.
    pub fn from_stage(&self, stage: &str) -> Vec<Diagnostic> {
        self.state
            .lock()
            .unwrap()
            .diagnostics
            .iter()
            .filter(|d| d.stage.as_deref() == Some(stage))
            .cloned()
            .collect()
    }
}
