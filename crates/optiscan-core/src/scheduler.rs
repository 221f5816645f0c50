//! Bounded concurrent fetch scheduler.
//!
//! Drives a [`DepthFetcher`] across every instrument of a run with at most
//! `max_concurrency` fetches in flight, a per-request timeout, per-instrument
//! retry with backoff for transient errors, and failure isolation: one
//! instrument failing or panicking never affects the others.
//!
//! Outcomes are returned only once every instrument is terminal (succeeded,
//! exhausted its retries, failed permanently, or was cut short by
//! cancellation), so downstream passes always see the full run.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::config::SchedulerConfig;
use crate::throttling::RateBudget;
use crate::venue::{DepthFetcher, RawDepth, VenueError, VenueErrorKind};
use crate::InstrumentId;

/// Why an instrument produced no depth this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    /// Venue error after the retry policy gave up, or a permanent error.
    Venue { kind: VenueErrorKind, message: String },
    /// Cancelled before the first attempt was issued.
    NotStarted,
    /// Cancelled while an attempt or backoff was in progress.
    Abandoned,
    /// The worker task died without reporting an outcome.
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchFailure {
    pub instrument: InstrumentId,
    #[serde(flatten)]
    pub reason: FailureReason,
    pub attempts: u32,
}

/// Terminal result of one instrument fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success { depth: RawDepth, attempts: u32 },
    Failure(FetchFailure),
}

impl FetchOutcome {
    fn failure(instrument: InstrumentId, reason: FailureReason, attempts: u32) -> Self {
        Self::Failure(FetchFailure {
            instrument,
            reason,
            attempts,
        })
    }

    pub fn instrument(&self) -> &InstrumentId {
        match self {
            Self::Success { depth, .. } => &depth.instrument,
            Self::Failure(failure) => &failure.instrument,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. } => *attempts,
            Self::Failure(failure) => failure.attempts,
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Complete multiset of outcomes for one run, sorted by instrument.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub outcomes: Vec<FetchOutcome>,
    pub cancelled: bool,
    pub peak_in_flight: usize,
    pub elapsed: Duration,
}

impl Schedule {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.succeeded()
    }
}

/// The only state workers share: the outcome collector and in-flight counter.
#[derive(Debug, Default)]
struct Collector {
    outcomes: Vec<FetchOutcome>,
    in_flight: usize,
    peak_in_flight: usize,
}

type SharedCollector = Arc<Mutex<Collector>>;

/// Decrements the in-flight counter even when the fetch is abandoned.
struct InFlight<'a>(&'a Mutex<Collector>);

impl<'a> InFlight<'a> {
    fn enter(collector: &'a Mutex<Collector>) -> Self {
        let mut inner = collector.lock().expect("scheduler collector is not poisoned");
        inner.in_flight += 1;
        inner.peak_in_flight = inner.peak_in_flight.max(inner.in_flight);
        Self(collector)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.0.lock() {
            inner.in_flight = inner.in_flight.saturating_sub(1);
        }
    }
}

/// Worker-pool scheduler over a [`DepthFetcher`].
#[derive(Clone)]
pub struct Scheduler {
    config: SchedulerConfig,
    budget: Option<RateBudget>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let budget = config.rate_limit.map(RateBudget::new);
        Self { config, budget }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Fetch every instrument and return once all of them are terminal.
    pub async fn run(
        &self,
        instruments: Vec<InstrumentId>,
        fetcher: Arc<dyn DepthFetcher>,
        cancel: &CancelToken,
    ) -> Schedule {
        let started = Instant::now();
        let expected = instruments.clone();
        let permits = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let collector: SharedCollector = Arc::new(Mutex::new(Collector::default()));

        info!(
            instruments = instruments.len(),
            max_concurrency = self.config.max_concurrency,
            max_attempts = self.config.retry.max_attempts(),
            "scheduling depth fetches"
        );

        let mut workers = JoinSet::new();
        for instrument in instruments {
            let worker = Worker {
                config: self.config.clone(),
                budget: self.budget.clone(),
                fetcher: Arc::clone(&fetcher),
                cancel: cancel.clone(),
            };
            let permits = Arc::clone(&permits);
            let collector = Arc::clone(&collector);

            workers.spawn(async move {
                let outcome = worker.drive(instrument, permits, &collector).await;
                collector
                    .lock()
                    .expect("scheduler collector is not poisoned")
                    .outcomes
                    .push(outcome);
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(join_error) = joined {
                error!(%join_error, "depth fetch worker terminated abnormally");
            }
        }

        let Collector {
            mut outcomes,
            peak_in_flight,
            ..
        } = std::mem::take(&mut *collector.lock().expect("scheduler collector is not poisoned"));

        let reported = outcomes
            .iter()
            .map(|outcome| outcome.instrument().clone())
            .collect::<HashSet<_>>();
        for instrument in expected {
            if !reported.contains(&instrument) {
                outcomes.push(FetchOutcome::failure(instrument, FailureReason::Aborted, 0));
            }
        }
        outcomes.sort_by(|a, b| a.instrument().cmp(b.instrument()));

        let schedule = Schedule {
            outcomes,
            cancelled: cancel.is_cancelled(),
            peak_in_flight,
            elapsed: started.elapsed(),
        };

        info!(
            attempted = schedule.attempted(),
            succeeded = schedule.succeeded(),
            failed = schedule.failed(),
            cancelled = schedule.cancelled,
            peak_in_flight = schedule.peak_in_flight,
            elapsed_ms = schedule.elapsed.as_millis() as u64,
            "depth fetches complete"
        );

        schedule
    }
}

struct Worker {
    config: SchedulerConfig,
    budget: Option<RateBudget>,
    fetcher: Arc<dyn DepthFetcher>,
    cancel: CancelToken,
}

impl Worker {
    async fn drive(
        &self,
        instrument: InstrumentId,
        permits: Arc<Semaphore>,
        collector: &Mutex<Collector>,
    ) -> FetchOutcome {
        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return FetchOutcome::failure(instrument, FailureReason::NotStarted, 0);
            }
            permit = permits.acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return FetchOutcome::failure(instrument, FailureReason::NotStarted, 0),
            },
        };

        let retry = &self.config.retry;
        let max_attempts = retry.max_attempts();
        let mut attempts = 0_u32;

        loop {
            if let Some(budget) = &self.budget {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return self.cut_short(instrument, attempts),
                    _ = budget.acquire() => {}
                }
            }
            if self.cancel.is_cancelled() {
                return self.cut_short(instrument, attempts);
            }

            attempts += 1;
            debug!(instrument = %instrument, attempt = attempts, "fetching depth");

            let result = {
                let _in_flight = InFlight::enter(collector);
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => None,
                    result = tokio::time::timeout(
                        self.config.request_timeout,
                        self.fetcher.fetch(&instrument),
                    ) => Some(result),
                }
            };

            let error = match result {
                None => return self.cut_short(instrument, attempts),
                Some(Ok(Ok(depth))) => return FetchOutcome::Success { depth, attempts },
                Some(Ok(Err(error))) => error,
                Some(Err(_elapsed)) => VenueError::timeout(format!(
                    "no depth response within {}ms",
                    self.config.request_timeout.as_millis()
                )),
            };

            if !retry.should_retry(error.kind()) || attempts >= max_attempts {
                warn!(
                    instrument = %instrument,
                    attempts,
                    code = error.code(),
                    error = error.message(),
                    "depth fetch failed"
                );
                return FetchOutcome::failure(
                    instrument,
                    FailureReason::Venue {
                        kind: error.kind(),
                        message: error.message().to_owned(),
                    },
                    attempts,
                );
            }

            let delay = retry.delay_for_attempt(attempts - 1);
            debug!(
                instrument = %instrument,
                attempt = attempts,
                code = error.code(),
                delay_ms = delay.as_millis() as u64,
                "transient depth error; backing off"
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.cut_short(instrument, attempts),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn cut_short(&self, instrument: InstrumentId, attempts: u32) -> FetchOutcome {
        let reason = if attempts == 0 {
            FailureReason::NotStarted
        } else {
            FailureReason::Abandoned
        };
        FetchOutcome::failure(instrument, reason, attempts)
    }
}
