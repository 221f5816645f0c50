//! # Optiscan Core
//!
//! Snapshot-acquisition and aggregation pipeline for option order books.
//!
//! ## Overview
//!
//! One sampling run resolves the live option universe for an underlying,
//! fetches depth for every instrument under a bounded-concurrency schedule,
//! normalizes the responses, and derives two descriptive signals:
//!
//! - **Large resting orders**: levels whose size is a multiple of the
//!   instrument's own median level size
//! - **Bid/ask imbalance**: summed depth per option type, optionally per
//!   expiry and strike band
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Venue adapters (Deribit, synthetic) |
//! | [`aggregator`] | Imbalance buckets |
//! | [`cancel`] | Run-wide cancellation signal |
//! | [`config`] | Run configuration |
//! | [`detector`] | Large-order detection |
//! | [`domain`] | Instruments, depth levels, snapshots |
//! | [`error`] | Core error types |
//! | [`http_client`] | HTTP client abstraction |
//! | [`normalizer`] | Raw depth to strict snapshots |
//! | [`pipeline`] | Run orchestration |
//! | [`report`] | Run report |
//! | [`retry`] | Retry policy and backoff |
//! | [`scheduler`] | Bounded concurrent fetch scheduler |
//! | [`throttling`] | Shared request budget |
//! | [`venue`] | Catalog and depth fetcher contracts |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use optiscan_core::{CancelToken, ScanConfig, Scanner, SyntheticVenue, Underlying};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let venue = Arc::new(SyntheticVenue::new());
//!     let scanner = Scanner::new(venue.clone(), venue, ScanConfig::default())?;
//!
//!     let report = scanner.run(&Underlying::parse("BTC")?, CancelToken::new()).await;
//!     println!("{} of {} books sampled", report.succeeded, report.total_attempted);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ InstrumentCatalog│
//! └────────┬─────────┘
//!          │ instruments
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │ Scheduler (K)    │────▶│ DepthFetcher     │
//! │ retry / timeout  │     │ (adapter)        │
//! └────────┬─────────┘     └──────────────────┘
//!          │ all outcomes, once terminal
//!          ▼
//! ┌──────────────────┐
//! │ Normalizer       │
//! └───┬──────────┬───┘
//!     ▼          ▼
//! ┌────────┐ ┌──────────┐
//! │Detector│ │Aggregator│
//! └───┬────┘ └────┬─────┘
//!     └─────┬─────┘
//!           ▼
//!     ┌───────────┐
//!     │ RunReport │
//!     └───────────┘
//! ```
//!
//! ## Error Handling
//!
//! Per-instrument failures are recorded, never raised. The run itself never
//! fails past [`Scanner::run`]: a catalog outage yields a fatal report.
//!
//! ```rust
//! use optiscan_core::{VenueError, VenueErrorKind};
//!
//! fn is_worth_retrying(error: &VenueError) -> bool {
//!     matches!(error.kind(), VenueErrorKind::Timeout | VenueErrorKind::RateLimited)
//! }
//! ```

pub mod adapters;
pub mod aggregator;
pub mod cancel;
pub mod config;
pub mod detector;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod normalizer;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod scheduler;
pub mod throttling;
pub mod venue;

// Adapter implementations
pub use adapters::{DeribitAdapter, SyntheticVenue};

// Analytical passes
pub use aggregator::{BucketKey, ImbalanceAggregator, ImbalanceBucket};
pub use detector::{LargeOrderDetector, LargeOrderFinding};
pub use normalizer::{normalize, normalize_depth, NormalizedBook, NormalizedRun};

// Configuration
pub use config::{
    AggregationConfig, DetectorConfig, Grouping, NormalizeConfig, PriceUnit, RateLimit, ScanConfig,
    SchedulerConfig,
};

// Domain models
pub use domain::{DepthLevel, InstrumentId, OptionKind, OrderBookSnapshot, Side, Underlying, UtcDateTime};

// Error types
pub use error::{CoreError, ValidationError};

// HTTP client types
pub use http_client::{HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse, ReqwestHttpClient};

// Run orchestration
pub use cancel::CancelToken;
pub use pipeline::Scanner;
pub use report::{FatalError, RunReport, RunStatus};
pub use retry::{Backoff, RetryConfig};
pub use scheduler::{FailureReason, FetchFailure, FetchOutcome, Schedule, Scheduler};
pub use throttling::RateBudget;

// Venue contracts
pub use venue::{
    DepthFetcher, InstrumentCatalog, QuoteCurrency, RawDepth, RawLevel, VenueError, VenueErrorKind,
};
