//! Run orchestration.
//!
//! `Catalog -> Scheduler -> Normalizer -> {Detector, Aggregator} -> RunReport`.
//! Only the catalog call and the scheduler fan-out suspend; the analytical
//! passes run single-threaded over the completed outcome set.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};
use uuid::Uuid;

use crate::aggregator::ImbalanceAggregator;
use crate::cancel::CancelToken;
use crate::config::{ScanConfig, SchedulerConfig};
use crate::detector::LargeOrderDetector;
use crate::normalizer::{normalize, normalize_depth, NormalizedBook};
use crate::report::{classify, FatalError, RunReport, RunStatus};
use crate::scheduler::{FailureReason, FetchOutcome, Scheduler};
use crate::venue::{DepthFetcher, InstrumentCatalog, VenueError, VenueErrorKind};
use crate::{InstrumentId, Underlying, UtcDateTime, ValidationError};

/// One configured scanner over a venue.
#[derive(Clone)]
pub struct Scanner {
    catalog: Arc<dyn InstrumentCatalog>,
    fetcher: Arc<dyn DepthFetcher>,
    scheduler: Scheduler,
    config: ScanConfig,
}

impl Scanner {
    pub fn new(
        catalog: Arc<dyn InstrumentCatalog>,
        fetcher: Arc<dyn DepthFetcher>,
        config: ScanConfig,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            catalog,
            fetcher,
            scheduler: Scheduler::new(config.scheduler.clone()),
            config,
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Sample every listed instrument of `underlying` once.
    ///
    /// Never fails: catalog outages and cancelled runs with nothing usable
    /// come back as a [`RunStatus::Fatal`] report.
    pub async fn run(&self, underlying: &Underlying, cancel: CancelToken) -> RunReport {
        let run_id = Uuid::new_v4();
        let captured_at = UtcDateTime::now();
        let started = Instant::now();
        let deadline = self.config.deadline.map(|deadline| cancel.cancel_after(deadline));

        info!(%run_id, %underlying, "starting scan");

        let report = match self.resolve_catalog(underlying, &cancel).await {
            Ok(instruments) => {
                self.sample(run_id, underlying, captured_at, instruments, &cancel)
                    .await
            }
            Err(error) => {
                warn!(%run_id, code = error.code(), error = error.message(), "catalog unavailable; aborting run");
                RunReport::aborted(
                    run_id,
                    underlying.clone(),
                    captured_at,
                    self.config.clone(),
                    FatalError {
                        code: error.code().to_owned(),
                        message: error.message().to_owned(),
                    },
                )
            }
        };

        if let Some(timer) = deadline {
            timer.abort();
        }

        let report = RunReport {
            elapsed_ms: started.elapsed().as_millis() as u64,
            ..report
        };
        info!(
            %run_id,
            status = report.status.as_str(),
            attempted = report.total_attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            findings = report.findings.len(),
            elapsed_ms = report.elapsed_ms,
            "scan finished"
        );
        report
    }

    /// Fetch and normalize a single instrument with the run's retry policy.
    pub async fn inspect(&self, instrument: &InstrumentId) -> Result<NormalizedBook, VenueError> {
        let scheduler = Scheduler::new(SchedulerConfig {
            max_concurrency: 1,
            ..self.config.scheduler.clone()
        });
        let schedule = scheduler
            .run(vec![instrument.clone()], Arc::clone(&self.fetcher), &CancelToken::new())
            .await;

        match schedule.outcomes.into_iter().next() {
            Some(FetchOutcome::Success { depth, .. }) => normalize_depth(depth, &self.config.normalize),
            Some(FetchOutcome::Failure(failure)) => Err(match failure.reason {
                FailureReason::Venue { kind, message } => VenueError::new(kind, message),
                other => VenueError::invalid_response(format!("fetch did not complete: {other:?}")),
            }),
            None => Err(VenueError::invalid_response("scheduler returned no outcome")),
        }
    }

    async fn resolve_catalog(
        &self,
        underlying: &Underlying,
        cancel: &CancelToken,
    ) -> Result<Vec<InstrumentId>, VenueError> {
        let listed = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(VenueError::catalog_unavailable("run cancelled before the catalog resolved"));
            }
            listed = tokio::time::timeout(
                self.config.scheduler.request_timeout,
                self.catalog.list_instruments(underlying),
            ) => listed,
        };

        let mut instruments = match listed {
            Ok(Ok(instruments)) => instruments,
            Ok(Err(error)) if error.kind() == VenueErrorKind::CatalogUnavailable => return Err(error),
            Ok(Err(error)) => return Err(VenueError::catalog_unavailable(error.message())),
            Err(_elapsed) => {
                return Err(VenueError::catalog_unavailable(format!(
                    "catalog did not respond within {}ms",
                    self.config.scheduler.request_timeout.as_millis()
                )))
            }
        };

        instruments.sort();
        instruments.dedup();
        info!(%underlying, instruments = instruments.len(), "catalog resolved");
        Ok(instruments)
    }

    async fn sample(
        &self,
        run_id: Uuid,
        underlying: &Underlying,
        captured_at: UtcDateTime,
        instruments: Vec<InstrumentId>,
        cancel: &CancelToken,
    ) -> RunReport {
        let schedule = self
            .scheduler
            .run(instruments, Arc::clone(&self.fetcher), cancel)
            .await;
        let total_attempted = schedule.attempted();
        let cancelled = schedule.cancelled;
        let peak_in_flight = schedule.peak_in_flight;

        let normalized = normalize(schedule.outcomes, &self.config.normalize);
        let findings = LargeOrderDetector::new(self.config.detector.clone()).detect(&normalized.snapshots);

        let mut aggregator = ImbalanceAggregator::new(self.config.aggregation.grouping);
        aggregator.extend(&normalized.snapshots);
        let buckets = aggregator.seal();
        for bucket in buckets.iter().filter(|bucket| bucket.low_confidence) {
            warn!(%run_id, key = ?bucket.key, "bucket holds no volume");
        }

        let succeeded = normalized.snapshots.len();
        let failed = normalized.failure_count();
        let status = classify(succeeded, failed, cancelled);
        let fatal = (status == RunStatus::Fatal).then(|| {
            if cancelled {
                FatalError {
                    code: String::from("run.cancelled"),
                    message: format!("run cancelled with no successful fetches out of {total_attempted}"),
                }
            } else {
                FatalError {
                    code: String::from("venue.unavailable"),
                    message: format!("all {total_attempted} fetches failed"),
                }
            }
        });

        let mut report = RunReport {
            run_id,
            underlying: underlying.clone(),
            captured_at,
            completed_at: UtcDateTime::now(),
            status,
            fatal,
            total_attempted,
            succeeded,
            failed,
            cancelled,
            low_confidence: false,
            malformed_levels: normalized.malformed_levels,
            crossed_books: normalized.crossed_books,
            one_sided_books: normalized.one_sided_books,
            peak_in_flight,
            findings,
            buckets,
            failures: normalized.failures,
            config: self.config.clone(),
            elapsed_ms: 0,
        };

        report.low_confidence = report.is_fatal() || report.failure_ratio() > self.config.max_failure_ratio;
        if report.low_confidence {
            warn!(%run_id, failed, total_attempted, "failure share exceeds tolerance; signals are low-confidence");
        }
        report
    }
}
