//! Bid/ask imbalance aggregation.
//!
//! Snapshots are rolled up into buckets keyed by option type and, depending
//! on [`Grouping`], expiry and strike band. Accumulation is plain decimal
//! addition into an ordered map, so the sealed buckets are identical for any
//! arrival order and any split of the input across merged aggregators.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;
use tracing::warn;

use crate::config::Grouping;
use crate::{InstrumentId, OptionKind, OrderBookSnapshot};

/// Grouping key. Fields not selected by the grouping are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    pub kind: OptionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<Date>,
    /// Lower bound of the strike band `[floor, floor + width)`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strike_floor: Option<Decimal>,
}

impl BucketKey {
    pub fn for_instrument(instrument: &InstrumentId, grouping: Grouping) -> Self {
        let kind = instrument.kind();
        match grouping {
            Grouping::OptionType => Self {
                kind,
                expiry: None,
                strike_floor: None,
            },
            Grouping::Expiry => Self {
                kind,
                expiry: Some(instrument.expiry()),
                strike_floor: None,
            },
            Grouping::ExpiryStrike { strike_width } => Self {
                kind,
                expiry: Some(instrument.expiry()),
                strike_floor: Some((instrument.strike() / strike_width).floor() * strike_width),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Totals {
    bid_volume: Decimal,
    ask_volume: Decimal,
    bid_notional: Decimal,
    ask_notional: Decimal,
    snapshot_count: usize,
}

impl Totals {
    fn absorb(&mut self, other: &Totals) {
        self.bid_volume += other.bid_volume;
        self.ask_volume += other.ask_volume;
        self.bid_notional += other.bid_notional;
        self.ask_notional += other.ask_notional;
        self.snapshot_count += other.snapshot_count;
    }
}

/// Mutable accumulator; [`seal`](Self::seal) turns it into immutable buckets.
#[derive(Debug, Clone, Default)]
pub struct ImbalanceAggregator {
    grouping: Grouping,
    buckets: BTreeMap<BucketKey, Totals>,
}

impl ImbalanceAggregator {
    pub fn new(grouping: Grouping) -> Self {
        Self {
            grouping,
            buckets: BTreeMap::new(),
        }
    }

    pub const fn grouping(&self) -> Grouping {
        self.grouping
    }

    pub fn add(&mut self, snapshot: &OrderBookSnapshot) {
        let key = BucketKey::for_instrument(&snapshot.instrument, self.grouping);
        self.buckets.entry(key).or_default().absorb(&Totals {
            bid_volume: snapshot.bid_volume(),
            ask_volume: snapshot.ask_volume(),
            bid_notional: snapshot.bid_notional(),
            ask_notional: snapshot.ask_notional(),
            snapshot_count: 1,
        });
    }

    pub fn extend<'a>(&mut self, snapshots: impl IntoIterator<Item = &'a OrderBookSnapshot>) {
        for snapshot in snapshots {
            self.add(snapshot);
        }
    }

    /// Folds `other` into `self`. Both sides must share a grouping for the
    /// keys to line up; a mismatch keeps both key sets side by side.
    pub fn merge(&mut self, other: ImbalanceAggregator) {
        if other.grouping != self.grouping {
            warn!(
                ours = ?self.grouping,
                theirs = ?other.grouping,
                "merging aggregators with different groupings"
            );
        }
        for (key, totals) in other.buckets {
            self.buckets.entry(key).or_default().absorb(&totals);
        }
    }

    /// Computes every bucket's imbalance; buckets come out in key order.
    pub fn seal(self) -> Vec<ImbalanceBucket> {
        self.buckets
            .into_iter()
            .map(|(key, totals)| ImbalanceBucket::seal(key, totals))
            .collect()
    }
}

/// Sealed aggregate for one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImbalanceBucket {
    pub key: BucketKey,
    pub bid_volume: Decimal,
    pub ask_volume: Decimal,
    pub bid_notional: Decimal,
    pub ask_notional: Decimal,
    pub snapshot_count: usize,
    /// `(bid - ask) / (bid + ask)` in `[-1, 1]`; `0` when the bucket is empty.
    pub imbalance: Decimal,
    /// Set when the bucket holds no volume at all.
    pub low_confidence: bool,
}

impl ImbalanceBucket {
    fn seal(key: BucketKey, totals: Totals) -> Self {
        let total = totals.bid_volume + totals.ask_volume;
        let (imbalance, low_confidence) = if total.is_zero() {
            (Decimal::ZERO, true)
        } else {
            ((totals.bid_volume - totals.ask_volume) / total, false)
        };

        Self {
            key,
            bid_volume: totals.bid_volume,
            ask_volume: totals.ask_volume,
            bid_notional: totals.bid_notional,
            ask_notional: totals.ask_notional,
            snapshot_count: totals.snapshot_count,
            imbalance,
            low_confidence,
        }
    }

    pub fn total_volume(&self) -> Decimal {
        self.bid_volume + self.ask_volume
    }
}
