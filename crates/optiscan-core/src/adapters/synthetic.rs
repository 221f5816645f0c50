use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use time::{Date, Duration as DateDuration, Weekday};

use crate::venue::{DepthFetcher, InstrumentCatalog, QuoteCurrency, RawDepth, RawLevel, VenueError};
use crate::{InstrumentId, OptionKind, Underlying, UtcDateTime};

const LEVELS_PER_SIDE: usize = 6;

/// Deterministic offline venue.
///
/// Lists a fixed strike ladder over the next few Friday expiries and serves
/// books derived from the instrument name, so repeated runs see the same
/// depth. Roughly one book in six carries an outsized resting order.
#[derive(Debug, Clone)]
pub struct SyntheticVenue {
    expiries: usize,
    strikes_per_side: usize,
    latency: Duration,
}

impl Default for SyntheticVenue {
    fn default() -> Self {
        Self {
            expiries: 3,
            strikes_per_side: 4,
            latency: Duration::ZERO,
        }
    }
}

impl SyntheticVenue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated per-request latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_ladder(mut self, expiries: usize, strikes_per_side: usize) -> Self {
        self.expiries = expiries;
        self.strikes_per_side = strikes_per_side;
        self
    }

    fn listing(&self, underlying: &Underlying, today: Date) -> Result<Vec<InstrumentId>, VenueError> {
        let spot = spot_price(underlying);
        let step = strike_step(spot);
        let atm = (spot / step).round() * step;

        let mut instruments = Vec::new();
        let mut expiry = next_friday(today);
        for _ in 0..self.expiries {
            for offset in -(self.strikes_per_side as i64)..=(self.strikes_per_side as i64) {
                let strike = atm + step * Decimal::from(offset);
                if strike <= Decimal::ZERO {
                    continue;
                }
                for kind in [OptionKind::Call, OptionKind::Put] {
                    let instrument = InstrumentId::new(underlying.clone(), expiry, strike, kind)
                        .map_err(|error| VenueError::catalog_unavailable(error.to_string()))?;
                    instruments.push(instrument);
                }
            }
            expiry += DateDuration::weeks(1);
        }

        Ok(instruments)
    }

    fn book(&self, instrument: &InstrumentId) -> RawDepth {
        let mut rng = fastrand::Rng::with_seed(instrument_seed(instrument));
        let spot = spot_price(instrument.underlying()).to_f64().unwrap_or(1.0);
        let strike = instrument.strike().to_f64().unwrap_or(1.0);

        let intrinsic = match instrument.kind() {
            OptionKind::Call => (spot - strike).max(0.0),
            OptionKind::Put => (strike - spot).max(0.0),
        };
        let fair = ((intrinsic + spot * 0.02) / spot).max(0.0005);
        let tick = 0.0005;
        let base_size = 1.0 + rng.f64() * 20.0;

        let level = |index: usize, sign: f64, rng: &mut fastrand::Rng| {
            let price = ((fair + sign * tick * (index as f64 + 1.0)) / tick).round() * tick;
            let size = (base_size * (0.5 + rng.f64())).round().max(1.0);
            RawLevel::Pair([price.max(tick), size])
        };

        let mut bids = (0..LEVELS_PER_SIDE).map(|i| level(i, -1.0, &mut rng)).collect::<Vec<_>>();
        let mut asks = (0..LEVELS_PER_SIDE).map(|i| level(i, 1.0, &mut rng)).collect::<Vec<_>>();

        if rng.u8(..6) == 0 {
            let side = if rng.bool() { &mut bids } else { &mut asks };
            let index = rng.usize(..side.len());
            if let RawLevel::Pair([_, size]) = &mut side[index] {
                *size *= 25.0;
            }
        }

        RawDepth {
            instrument: instrument.clone(),
            captured_at: UtcDateTime::now(),
            quoted_in: QuoteCurrency::Underlying,
            bids,
            asks,
            underlying_price: Some(spot),
            mark_price: Some(fair),
        }
    }
}

impl InstrumentCatalog for SyntheticVenue {
    fn list_instruments<'a>(
        &'a self,
        underlying: &'a Underlying,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<InstrumentId>, VenueError>> + Send + 'a>> {
        Box::pin(async move { self.listing(underlying, UtcDateTime::now().into_inner().date()) })
    }
}

impl DepthFetcher for SyntheticVenue {
    fn fetch<'a>(
        &'a self,
        instrument: &'a InstrumentId,
    ) -> Pin<Box<dyn Future<Output = Result<RawDepth, VenueError>> + Send + 'a>> {
        Box::pin(async move {
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            Ok(self.book(instrument))
        })
    }
}

fn spot_price(underlying: &Underlying) -> Decimal {
    match underlying.as_str() {
        "BTC" => Decimal::from(95_000),
        "ETH" => Decimal::from(3_300),
        "SOL_USDC" => Decimal::from(180),
        _ => Decimal::from(50 + underlying_seed(underlying) % 950),
    }
}

fn strike_step(spot: Decimal) -> Decimal {
    if spot >= Decimal::from(20_000) {
        Decimal::from(1_000)
    } else if spot >= Decimal::from(1_000) {
        Decimal::from(100)
    } else {
        Decimal::from(5)
    }
}

fn next_friday(today: Date) -> Date {
    let mut day = today + DateDuration::days(1);
    while day.weekday() != Weekday::Friday {
        day += DateDuration::days(1);
    }
    day
}

fn underlying_seed(underlying: &Underlying) -> u64 {
    underlying.as_str().bytes().fold(7_u64, |acc, byte| {
        acc.wrapping_mul(37).wrapping_add(byte as u64)
    })
}

fn instrument_seed(instrument: &InstrumentId) -> u64 {
    instrument.name().bytes().fold(11_u64, |acc, byte| {
        acc.wrapping_mul(31).wrapping_add(byte as u64)
    })
}
