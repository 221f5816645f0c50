//! Venue contracts: instrument catalog and depth fetcher.
//!
//! Both are external collaborators. Adapters implement these traits and map
//! transport and schema failures into [`VenueError`]. Neither trait retries;
//! retry policy belongs to the [`Scheduler`](crate::scheduler::Scheduler).
//!
//! | Contract | Operation | Errors |
//! |----------|-----------|--------|
//! | [`InstrumentCatalog`] | `list_instruments(underlying)` | `CatalogUnavailable` |
//! | [`DepthFetcher`] | `fetch(instrument)` | `Timeout`, `RateLimited`, `InvalidResponse` |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::{InstrumentId, Underlying, UtcDateTime};

/// Venue-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueErrorKind {
    CatalogUnavailable,
    Timeout,
    RateLimited,
    InvalidResponse,
}

/// Structured venue error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueError {
    kind: VenueErrorKind,
    message: String,
}

impl VenueError {
    pub fn new(kind: VenueErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn catalog_unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: VenueErrorKind::CatalogUnavailable,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: VenueErrorKind::Timeout,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: VenueErrorKind::RateLimited,
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self {
            kind: VenueErrorKind::InvalidResponse,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> VenueErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn transient(&self) -> bool {
        matches!(self.kind, VenueErrorKind::Timeout | VenueErrorKind::RateLimited)
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            VenueErrorKind::CatalogUnavailable => "venue.catalog_unavailable",
            VenueErrorKind::Timeout => "venue.timeout",
            VenueErrorKind::RateLimited => "venue.rate_limited",
            VenueErrorKind::InvalidResponse => "venue.invalid_response",
        }
    }
}

impl Display for VenueError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for VenueError {}

/// One book level as the venue sent it.
///
/// Venues and API revisions disagree on the level shape; all of them decode
/// here and the normalizer coerces them into a [`DepthLevel`](crate::DepthLevel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawLevel {
    /// `[price, amount]`
    Pair([f64; 2]),
    /// `["0.0105", "12.5"]`
    Text([String; 2]),
    /// `{ "price": .., "amount": .. }`
    Object { price: f64, amount: f64 },
    /// Anything else; dropped by the normalizer as a malformed level.
    Unrecognized(serde_json::Value),
}

/// Currency the venue quotes option prices in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteCurrency {
    /// Inverse options: premium in units of the underlying coin.
    Underlying,
    /// Premium already in the quote currency (USD / USDC).
    Quote,
}

/// Loosely typed depth response for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDepth {
    pub instrument: InstrumentId,
    /// Venue timestamp, falling back to local receive time.
    pub captured_at: UtcDateTime,
    pub quoted_in: QuoteCurrency,
    pub bids: Vec<RawLevel>,
    pub asks: Vec<RawLevel>,
    pub underlying_price: Option<f64>,
    pub mark_price: Option<f64>,
}

/// Enumerates the tradable option universe for an underlying.
pub trait InstrumentCatalog: Send + Sync {
    /// Active, listed, unexpired option instruments.
    ///
    /// # Errors
    ///
    /// Returns a [`VenueError`] of kind `CatalogUnavailable` when the venue
    /// cannot enumerate instruments.
    fn list_instruments<'a>(
        &'a self,
        underlying: &'a Underlying,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<InstrumentId>, VenueError>> + Send + 'a>>;
}

/// Retrieves current depth for one instrument. A pure, idempotent read.
pub trait DepthFetcher: Send + Sync {
    /// # Errors
    ///
    /// Returns a [`VenueError`] of kind `Timeout`, `RateLimited` or
    /// `InvalidResponse`. Implementations must not retry internally.
    fn fetch<'a>(
        &'a self,
        instrument: &'a InstrumentId,
    ) -> Pin<Box<dyn Future<Output = Result<RawDepth, VenueError>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_every_level_shape() {
        let levels: Vec<RawLevel> = serde_json::from_str(
            r#"[[0.0105, 12.5], ["0.011", "3"], {"price": 0.012, "amount": 1.0}]"#,
        )
        .expect("all shapes decode");

        assert_eq!(levels[0], RawLevel::Pair([0.0105, 12.5]));
        assert_eq!(levels[1], RawLevel::Text([String::from("0.011"), String::from("3")]));
        assert_eq!(levels[2], RawLevel::Object { price: 0.012, amount: 1.0 });
    }

    #[test]
    fn odd_levels_decode_without_failing_the_side() {
        let levels: Vec<RawLevel> =
            serde_json::from_str(r#"[[0.0105, 12.5], [0.01, null], [0.01, "5"], [1, 2, 3]]"#)
                .expect("side still decodes");

        assert_eq!(levels.len(), 4);
        assert_eq!(levels[0], RawLevel::Pair([0.0105, 12.5]));
        assert!(levels[1..]
            .iter()
            .all(|level| matches!(level, RawLevel::Unrecognized(_))));
    }

    #[test]
    fn only_timeouts_and_rate_limits_are_transient() {
        assert!(VenueError::timeout("slow").transient());
        assert!(VenueError::rate_limited("429").transient());
        assert!(!VenueError::invalid_response("garbage").transient());
        assert_eq!(VenueError::invalid_response("x").code(), "venue.invalid_response");
    }
}
