//! Run report: the immutable artifact of one sampling run.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregator::ImbalanceBucket;
use crate::config::ScanConfig;
use crate::detector::LargeOrderFinding;
use crate::scheduler::FetchFailure;
use crate::{Underlying, UtcDateTime};

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every attempted instrument produced a snapshot.
    Complete,
    /// The run finished but some instruments failed or were cancelled.
    Partial,
    /// Nothing usable: catalog unavailable or cancelled with zero successes.
    Fatal,
}

impl RunStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::Fatal => "fatal",
        }
    }
}

/// Why a run was marked [`RunStatus::Fatal`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FatalError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub underlying: Underlying,
    pub captured_at: UtcDateTime,
    pub completed_at: UtcDateTime,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal: Option<FatalError>,
    pub total_attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: bool,
    /// Failure share above the configured tolerance.
    pub low_confidence: bool,
    pub malformed_levels: usize,
    pub crossed_books: usize,
    pub one_sided_books: usize,
    pub peak_in_flight: usize,
    pub findings: Vec<LargeOrderFinding>,
    pub buckets: Vec<ImbalanceBucket>,
    pub failures: Vec<FetchFailure>,
    pub config: ScanConfig,
    pub elapsed_ms: u64,
}

impl RunReport {
    /// A run that never reached the scheduler.
    pub fn aborted(
        run_id: Uuid,
        underlying: Underlying,
        captured_at: UtcDateTime,
        config: ScanConfig,
        fatal: FatalError,
    ) -> Self {
        Self {
            run_id,
            underlying,
            captured_at,
            completed_at: UtcDateTime::now(),
            status: RunStatus::Fatal,
            fatal: Some(fatal),
            total_attempted: 0,
            succeeded: 0,
            failed: 0,
            cancelled: false,
            low_confidence: true,
            malformed_levels: 0,
            crossed_books: 0,
            one_sided_books: 0,
            peak_in_flight: 0,
            findings: Vec::new(),
            buckets: Vec::new(),
            failures: Vec::new(),
            config,
            elapsed_ms: 0,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.status == RunStatus::Fatal
    }

    /// `failed / total_attempted`, `0` for an empty run.
    pub fn failure_ratio(&self) -> f64 {
        if self.total_attempted == 0 {
            0.0
        } else {
            self.failed as f64 / self.total_attempted as f64
        }
    }
}

/// Status for a run that reached the scheduler. A run with failures and no
/// successes is fatal whether or not it was cancelled.
pub fn classify(succeeded: usize, failed: usize, cancelled: bool) -> RunStatus {
    if succeeded == 0 && failed > 0 {
        RunStatus::Fatal
    } else if failed > 0 || cancelled {
        RunStatus::Partial
    } else {
        RunStatus::Complete
    }
}
