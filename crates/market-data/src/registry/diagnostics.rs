//! Attempt tracking for source fallback diagnostics.

use crate::models::ProviderId;

/// What happened when a source was asked for prices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The source returned rows.
    Success { records: usize },

    /// The source answered with nothing for the range.
    Empty,

    /// The source failed; the error was absorbed and the next source tried.
    Failed { message: String },
}

/// Record of a single source attempt during a fetch.
#[derive(Clone, Debug)]
pub struct SourceAttempt {
    pub source_id: ProviderId,
    pub outcome: AttemptOutcome,
    /// Time spent waiting for the rate limiter before the call
    pub waited_secs: f64,
}

/// Trail of attempts for one fetch.
#[derive(Clone, Debug, Default)]
pub struct FetchDiagnostics {
    pub attempts: Vec<SourceAttempt>,
}

impl FetchDiagnostics {
    pub fn new() -> Self {
        Self {
            attempts: Vec::new(),
        }
    }

    pub fn record(&mut self, source_id: ProviderId, outcome: AttemptOutcome, waited_secs: f64) {
        self.attempts.push(SourceAttempt {
            source_id,
            outcome,
            waited_secs,
        });
    }

    /// Summary for logging/debugging.
    pub fn summary(&self) -> String {
        if self.attempts.is_empty() {
            return "no sources tried".to_string();
        }

        self.attempts
            .iter()
            .map(|a| match &a.outcome {
                AttemptOutcome::Success { records } => {
                    format!("{}: SUCCESS ({} records)", a.source_id, records)
                }
                AttemptOutcome::Empty => format!("{}: EMPTY", a.source_id),
                AttemptOutcome::Failed { message } => format!("{}: ERROR ({})", a.source_id, message),
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}
