//! Snapshot normalizer.
//!
//! Converts venue-shaped [`RawDepth`] into strict [`OrderBookSnapshot`]s:
//! every level shape is coerced to decimal price/size, inverse premiums are
//! converted to the quote currency, and non-positive levels are dropped as
//! malformed without failing the rest of the book.

use std::str::FromStr;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::warn;

use crate::config::{NormalizeConfig, PriceUnit};
use crate::scheduler::{FailureReason, FetchFailure, FetchOutcome};
use crate::venue::{QuoteCurrency, RawDepth, RawLevel, VenueError};
use crate::{DepthLevel, OrderBookSnapshot, Side};

/// Successful snapshots of a run plus everything that was not usable.
#[derive(Debug, Clone, Default)]
pub struct NormalizedRun {
    pub snapshots: Vec<OrderBookSnapshot>,
    pub failures: Vec<FetchFailure>,
    pub malformed_levels: usize,
    pub crossed_books: usize,
    pub one_sided_books: usize,
}

impl NormalizedRun {
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}

/// One normalized book and the number of levels dropped from it.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedBook {
    pub snapshot: OrderBookSnapshot,
    pub malformed_levels: usize,
}

pub fn normalize(outcomes: Vec<FetchOutcome>, config: &NormalizeConfig) -> NormalizedRun {
    let mut run = NormalizedRun::default();

    for outcome in outcomes {
        match outcome {
            FetchOutcome::Failure(failure) => run.failures.push(failure),
            FetchOutcome::Success { depth, attempts } => {
                let instrument = depth.instrument.clone();
                match normalize_depth(depth, config) {
                    Ok(book) => {
                        run.malformed_levels += book.malformed_levels;
                        if book.snapshot.is_crossed() {
                            warn!(instrument = %instrument, "crossed book kept as anomaly");
                            run.crossed_books += 1;
                        }
                        if book.snapshot.is_one_sided() {
                            run.one_sided_books += 1;
                        }
                        run.snapshots.push(book.snapshot);
                    }
                    Err(error) => {
                        warn!(instrument = %instrument, error = error.message(), "depth could not be normalized");
                        run.failures.push(FetchFailure {
                            instrument,
                            reason: FailureReason::Venue {
                                kind: error.kind(),
                                message: error.message().to_owned(),
                            },
                            attempts,
                        });
                    }
                }
            }
        }
    }

    run
}

/// Normalize a single depth response.
///
/// # Errors
///
/// Returns `InvalidResponse` when the book is quoted in the underlying, quote
/// currency output was requested, and the response carries no usable
/// underlying price to convert with.
pub fn normalize_depth(depth: RawDepth, config: &NormalizeConfig) -> Result<NormalizedBook, VenueError> {
    let conversion = match (depth.quoted_in, config.price_unit) {
        (QuoteCurrency::Underlying, PriceUnit::Quote) => {
            let rate = depth
                .underlying_price
                .and_then(Decimal::from_f64)
                .filter(|price| *price > Decimal::ZERO)
                .ok_or_else(|| {
                    VenueError::invalid_response(
                        "inverse premium without a positive underlying_price",
                    )
                })?;
            Some(rate)
        }
        _ => None,
    };

    let mut malformed = 0;
    let mut coerce_side = |side: Side, levels: &[RawLevel]| -> Vec<DepthLevel> {
        levels
            .iter()
            .filter_map(|raw| match coerce_level(raw, conversion) {
                Some(level) => Some(level),
                None => {
                    warn!(instrument = %depth.instrument, %side, level = ?raw, "dropping malformed level");
                    malformed += 1;
                    None
                }
            })
            .collect()
    };

    let bids = coerce_side(Side::Bid, &depth.bids);
    let asks = coerce_side(Side::Ask, &depth.asks);

    let mark_price = depth
        .mark_price
        .and_then(Decimal::from_f64)
        .map(|mark| conversion.map_or(mark, |rate| mark * rate));
    let underlying_price = depth.underlying_price.and_then(Decimal::from_f64);

    let mut snapshot = OrderBookSnapshot::new(depth.instrument, depth.captured_at, bids, asks)
        .with_prices(underlying_price, mark_price);
    if let Some(limit) = config.depth_limit {
        snapshot.truncate(limit);
    }

    Ok(NormalizedBook {
        snapshot,
        malformed_levels: malformed,
    })
}

/// `None` when the level is unparseable, non-finite, or non-positive.
fn coerce_level(raw: &RawLevel, conversion: Option<Decimal>) -> Option<DepthLevel> {
    let (price, size) = match raw {
        RawLevel::Pair([price, size]) | RawLevel::Object { price, amount: size } => {
            (Decimal::from_f64(*price)?, Decimal::from_f64(*size)?)
        }
        RawLevel::Text([price, size]) => (
            Decimal::from_str(price.trim()).ok()?,
            Decimal::from_str(size.trim()).ok()?,
        ),
        RawLevel::Unrecognized(_) => return None,
    };

    if size <= Decimal::ZERO {
        return None;
    }

    let price = match conversion {
        Some(rate) => price.checked_mul(rate)?,
        None => price,
    };
    DepthLevel::new(price, size).ok()
}
