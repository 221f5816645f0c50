//! Run configuration.
//!
//! Every knob of a sampling run lives in [`ScanConfig`]. The config is echoed
//! into the [`RunReport`](crate::report::RunReport) so a report carries the
//! parameters that produced it.

use std::num::NonZeroU32;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::retry::RetryConfig;
use crate::ValidationError;

/// Default venue REST base; overridable with `OPTISCAN_BASE_URL`.
pub const DEFAULT_BASE_URL: &str = "https://www.deribit.com/api/v2/public/";
pub const BASE_URL_ENV: &str = "OPTISCAN_BASE_URL";

/// Concurrency, timeout, retry and rate budget for the fetch fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum in-flight fetches (K).
    pub max_concurrency: usize,
    #[serde(rename = "request_timeout_ms", with = "duration_ms")]
    pub request_timeout: Duration,
    pub retry: RetryConfig,
    pub rate_limit: Option<RateLimit>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 16,
            request_timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
            rate_limit: Some(RateLimit::default()),
        }
    }
}

/// Token bucket shared by all workers: `per_second` sustained, `burst` peak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub per_second: NonZeroU32,
    pub burst: NonZeroU32,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            per_second: NonZeroU32::new(20).expect("non-zero literal"),
            burst: NonZeroU32::new(20).expect("non-zero literal"),
        }
    }
}

/// Price unit snapshots are normalized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceUnit {
    /// Quote currency (USD); inverse premiums are multiplied by the underlying price.
    Quote,
    /// Leave prices in whatever currency the venue quoted them in.
    Native,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizeConfig {
    pub price_unit: PriceUnit,
    /// Keep only the best `n` levels per side.
    pub depth_limit: Option<usize>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            price_unit: PriceUnit::Quote,
            depth_limit: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// A level is large when `size >= threshold_multiple * reference`.
    pub threshold_multiple: Decimal,
    /// Books with fewer levels never use a reference below `reference_floor`.
    pub min_levels: usize,
    /// Minimum reference size for thin books, in contracts.
    pub reference_floor: Decimal,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold_multiple: Decimal::TEN,
            min_levels: 4,
            reference_floor: Decimal::from(5),
        }
    }
}

/// Bucket granularity for imbalance aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Grouping {
    OptionType,
    Expiry,
    ExpiryStrike { strike_width: Decimal },
}

impl Default for Grouping {
    fn default() -> Self {
        Self::OptionType
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationConfig {
    pub grouping: Grouping,
}

/// Complete configuration of one sampling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub scheduler: SchedulerConfig,
    pub normalize: NormalizeConfig,
    pub detector: DetectorConfig,
    pub aggregation: AggregationConfig,
    /// Run-wide deadline; expiry cancels outstanding fetches.
    #[serde(rename = "deadline_ms", with = "option_duration_ms")]
    pub deadline: Option<Duration>,
    /// Above this failed/attempted share the report is marked low-confidence.
    pub max_failure_ratio: f64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            normalize: NormalizeConfig::default(),
            detector: DetectorConfig::default(),
            aggregation: AggregationConfig::default(),
            deadline: None,
            max_failure_ratio: 0.2,
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.scheduler.max_concurrency == 0 {
            return Err(invalid("max_concurrency", "must be at least 1"));
        }
        if self.scheduler.request_timeout.is_zero() {
            return Err(invalid("request_timeout", "must be greater than zero"));
        }
        if self.detector.threshold_multiple <= Decimal::ZERO {
            return Err(invalid("threshold_multiple", "must be positive"));
        }
        if self.detector.reference_floor <= Decimal::ZERO {
            return Err(invalid("reference_floor", "must be positive"));
        }
        if self.normalize.depth_limit == Some(0) {
            return Err(invalid("depth_limit", "must be at least 1 when set"));
        }
        if let Grouping::ExpiryStrike { strike_width } = self.aggregation.grouping {
            if strike_width <= Decimal::ZERO {
                return Err(invalid("strike_width", "must be positive"));
            }
        }
        if !(0.0..=1.0).contains(&self.max_failure_ratio) {
            return Err(invalid("max_failure_ratio", "must be within [0, 1]"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ValidationError {
    ValidationError::InvalidConfig {
        field,
        reason: reason.to_owned(),
    }
}

/// Resolve the venue base URL from the environment, falling back to the default.
pub fn base_url_from_env() -> String {
    std::env::var(BASE_URL_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| String::from(DEFAULT_BASE_URL))
}

/// Serialize a [`Duration`] as integer milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

pub(crate) mod option_duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|value| value.map(Duration::from_millis))
    }
}
