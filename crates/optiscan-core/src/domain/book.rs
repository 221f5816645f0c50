use std::fmt::{Display, Formatter};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{InstrumentId, UtcDateTime, ValidationError};

/// Book side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bid => "bid",
            Self::Ask => "ask",
        }
    }
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One price level: positive price, non-negative size in contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl DepthLevel {
    pub fn new(price: Decimal, size: Decimal) -> Result<Self, ValidationError> {
        if price <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveValue { field: "price" });
        }
        if size < Decimal::ZERO {
            return Err(ValidationError::NegativeValue { field: "size" });
        }

        Ok(Self { price, size })
    }

    pub fn notional(&self) -> Decimal {
        self.price * self.size
    }
}

/// Point-in-time depth for one instrument.
///
/// Bids are held in descending price order and asks in ascending price order
/// regardless of the order the levels were supplied in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub instrument: InstrumentId,
    pub captured_at: UtcDateTime,
    bids: Vec<DepthLevel>,
    asks: Vec<DepthLevel>,
    pub underlying_price: Option<Decimal>,
    pub mark_price: Option<Decimal>,
}

impl OrderBookSnapshot {
    pub fn new(
        instrument: InstrumentId,
        captured_at: UtcDateTime,
        mut bids: Vec<DepthLevel>,
        mut asks: Vec<DepthLevel>,
    ) -> Self {
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));

        Self {
            instrument,
            captured_at,
            bids,
            asks,
            underlying_price: None,
            mark_price: None,
        }
    }

    pub fn with_prices(mut self, underlying_price: Option<Decimal>, mark_price: Option<Decimal>) -> Self {
        self.underlying_price = underlying_price;
        self.mark_price = mark_price;
        self
    }

    pub fn bids(&self) -> &[DepthLevel] {
        &self.bids
    }

    pub fn asks(&self) -> &[DepthLevel] {
        &self.asks
    }

    pub fn side(&self, side: Side) -> &[DepthLevel] {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    /// Every level tagged with its side, bids first.
    pub fn levels(&self) -> impl Iterator<Item = (Side, &DepthLevel)> {
        self.bids
            .iter()
            .map(|level| (Side::Bid, level))
            .chain(self.asks.iter().map(|level| (Side::Ask, level)))
    }

    pub fn level_count(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    pub fn best_bid(&self) -> Option<&DepthLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&DepthLevel> {
        self.asks.first()
    }

    pub fn mid(&self) -> Option<Decimal> {
        let bid = self.best_bid()?.price;
        let ask = self.best_ask()?.price;
        Some((bid + ask) / Decimal::TWO)
    }

    /// Best bid at or above best ask. A data anomaly, not a fatal condition.
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid.price >= ask.price,
            _ => false,
        }
    }

    pub fn is_one_sided(&self) -> bool {
        self.bids.is_empty() != self.asks.is_empty()
    }

    pub fn bid_volume(&self) -> Decimal {
        self.bids.iter().map(|level| level.size).sum()
    }

    pub fn ask_volume(&self) -> Decimal {
        self.asks.iter().map(|level| level.size).sum()
    }

    pub fn bid_notional(&self) -> Decimal {
        self.bids.iter().map(DepthLevel::notional).sum()
    }

    pub fn ask_notional(&self) -> Decimal {
        self.asks.iter().map(DepthLevel::notional).sum()
    }

    /// Keeps only the best `depth` levels per side.
    pub fn truncate(&mut self, depth: usize) {
        self.bids.truncate(depth);
        self.asks.truncate(depth);
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn level(price: Decimal, size: Decimal) -> DepthLevel {
        DepthLevel::new(price, size).expect("valid level")
    }

    fn snapshot(bids: Vec<DepthLevel>, asks: Vec<DepthLevel>) -> OrderBookSnapshot {
        OrderBookSnapshot::new(
            InstrumentId::parse("BTC-27DEC24-60000-C").expect("valid"),
            UtcDateTime::parse("2024-12-01T00:00:00Z").expect("valid"),
            bids,
            asks,
        )
    }

    #[test]
    fn rejects_non_positive_price_and_negative_size() {
        assert_eq!(
            DepthLevel::new(dec!(0), dec!(1)),
            Err(ValidationError::NonPositiveValue { field: "price" })
        );
        assert_eq!(
            DepthLevel::new(dec!(0.05), dec!(-1)),
            Err(ValidationError::NegativeValue { field: "size" })
        );
    }

    #[test]
    fn orders_sides_best_first() {
        let book = snapshot(
            vec![level(dec!(0.01), dec!(1)), level(dec!(0.03), dec!(2))],
            vec![level(dec!(0.06), dec!(1)), level(dec!(0.04), dec!(3))],
        );

        assert_eq!(book.best_bid().map(|l| l.price), Some(dec!(0.03)));
        assert_eq!(book.best_ask().map(|l| l.price), Some(dec!(0.04)));
        assert_eq!(book.mid(), Some(dec!(0.035)));
        assert!(!book.is_crossed());
        assert_eq!(book.bid_volume(), dec!(3));
        assert_eq!(book.ask_volume(), dec!(4));
        assert_eq!(book.ask_notional(), dec!(0.18));
    }

    #[test]
    fn flags_crossed_and_one_sided_books() {
        let crossed = snapshot(vec![level(dec!(0.05), dec!(1))], vec![level(dec!(0.04), dec!(1))]);
        assert!(crossed.is_crossed());

        let one_sided = snapshot(vec![level(dec!(0.05), dec!(1))], Vec::new());
        assert!(one_sided.is_one_sided());
        assert!(!one_sided.is_crossed());
        assert_eq!(one_sided.mid(), None);
    }

    #[test]
    fn truncate_keeps_best_levels() {
        let mut book = snapshot(
            vec![level(dec!(0.01), dec!(1)), level(dec!(0.02), dec!(1)), level(dec!(0.03), dec!(1))],
            vec![level(dec!(0.05), dec!(1)), level(dec!(0.04), dec!(1))],
        );
        book.truncate(1);

        assert_eq!(book.bids(), &[level(dec!(0.03), dec!(1))]);
        assert_eq!(book.asks(), &[level(dec!(0.04), dec!(1))]);
    }
}
