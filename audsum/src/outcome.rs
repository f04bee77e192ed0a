//! Per-item outcome type and per-stage aggregation.

use serde::{Deserialize, Serialize};

/// The result of processing one work item.
///
/// `Skipped` covers both "a valid prior result already exists" and "not
/// applicable to this item" (for example, an input that is already audio
/// passes through extraction untouched). Both carry the reusable value, so
/// downstream stages treat skips and successes identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Outcome<T> {
    /// The item was processed and produced a fresh result.
    Success(T),
    /// A prior valid result was reused, or the work did not apply.
    Skipped(T),
    /// Processing failed; the reason is reported and the item is dropped
    /// from the next stage's manifest.
    Failure(String),
}

impl<T> Outcome<T> {
    /// Returns true if the item was freshly processed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns true if a prior result was reused.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    /// Returns true if the item failed.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Returns the carried value for success and skip outcomes.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Success(value) | Self::Skipped(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// Consumes the outcome, returning the carried value if any.
    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Success(value) | Self::Skipped(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// Returns the failure reason, if this is a failure.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Failure(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Aggregate counts for one stage's executor run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    /// Items freshly processed.
    pub success_count: usize,
    /// Items that failed.
    pub failure_count: usize,
    /// Items whose prior result was reused.
    pub skipped_count: usize,
}

impl StageReport {
    /// Tallies one outcome into the report.
    pub fn record<T>(&mut self, outcome: &Outcome<T>) {
        match outcome {
            Outcome::Success(_) => self.success_count += 1,
            Outcome::Skipped(_) => self.skipped_count += 1,
            Outcome::Failure(_) => self.failure_count += 1,
        }
    }

    /// Builds a report from a slice of outcomes.
    #[must_use]
    pub fn from_outcomes<T>(outcomes: &[Outcome<T>]) -> Self {
        let mut report = Self::default();
        for outcome in outcomes {
            report.record(outcome);
        }
        report
    }

    /// Total number of items seen.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.success_count + self.failure_count + self.skipped_count
    }

    /// True when nothing succeeded and at least one item failed.
    ///
    /// All-skipped is NOT a total failure even though its success count is
    /// also zero; skips are not failures. The distinguishing condition is
    /// `failure_count > 0`. An empty stage is acceptable.
    #[must_use]
    pub const fn is_total_failure(&self) -> bool {
        self.success_count == 0 && self.failure_count > 0
    }

    /// True when the stage result allows the pipeline to advance.
    #[must_use]
    pub const fn is_acceptable(&self) -> bool {
        !self.is_total_failure()
    }
}

impl std::fmt::Display for StageReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed, {} skipped",
            self.success_count, self.failure_count, self.skipped_count
        )
    }
}
