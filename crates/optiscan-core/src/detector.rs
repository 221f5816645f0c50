//! Large-order detection.
//!
//! Each snapshot is judged against its own typical depth: the reference size
//! is the median level size across both sides of that snapshot, so a deep
//! at-the-money weekly and a thin far-out quarterly are never compared on the
//! same absolute scale.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DetectorConfig;
use crate::{InstrumentId, OrderBookSnapshot, Side};

/// One resting level whose size is anomalous relative to its book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LargeOrderFinding {
    pub instrument: InstrumentId,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub reference_size: Decimal,
    /// `size / reference_size`.
    pub ratio: Decimal,
    /// Absolute distance from the book mid; `None` for one-sided books.
    pub distance_to_mid: Option<Decimal>,
}

#[derive(Debug, Clone, Default)]
pub struct LargeOrderDetector {
    config: DetectorConfig,
}

impl LargeOrderDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Findings across every snapshot, strongest first.
    pub fn detect(&self, snapshots: &[OrderBookSnapshot]) -> Vec<LargeOrderFinding> {
        let mut findings = snapshots
            .iter()
            .flat_map(|snapshot| self.scan(snapshot))
            .collect::<Vec<_>>();
        findings.sort_by(rank);
        findings
    }

    /// Reference size for one snapshot, or `None` when the book is too thin
    /// to judge at all.
    ///
    /// Books with fewer than `min_levels` levels never drop below
    /// `reference_floor`, so a handful of similar lots cannot flag each other.
    pub fn reference_size(&self, snapshot: &OrderBookSnapshot) -> Option<Decimal> {
        let count = snapshot.level_count();
        if count < 2 {
            return None;
        }

        let mut sizes = snapshot.levels().map(|(_, level)| level.size).collect::<Vec<_>>();
        sizes.sort_unstable();
        let median = median_of_sorted(&sizes);

        if median <= Decimal::ZERO {
            Some(self.config.reference_floor)
        } else if count < self.config.min_levels {
            Some(median.max(self.config.reference_floor))
        } else {
            Some(median)
        }
    }

    fn scan(&self, snapshot: &OrderBookSnapshot) -> Vec<LargeOrderFinding> {
        let Some(reference) = self.reference_size(snapshot) else {
            return Vec::new();
        };
        let threshold = self.config.threshold_multiple * reference;
        let mid = snapshot.mid();

        let findings = snapshot
            .levels()
            .filter(|(_, level)| level.size >= threshold)
            .map(|(side, level)| LargeOrderFinding {
                instrument: snapshot.instrument.clone(),
                side,
                price: level.price,
                size: level.size,
                reference_size: reference,
                ratio: level.size / reference,
                distance_to_mid: mid.map(|mid| (level.price - mid).abs()),
            })
            .collect::<Vec<_>>();

        if !findings.is_empty() {
            debug!(
                instrument = %snapshot.instrument,
                reference = %reference,
                findings = findings.len(),
                "large resting orders detected"
            );
        }
        findings
    }
}

fn median_of_sorted(sizes: &[Decimal]) -> Decimal {
    let middle = sizes.len() / 2;
    if sizes.len() % 2 == 0 {
        (sizes[middle - 1] + sizes[middle]) / Decimal::TWO
    } else {
        sizes[middle]
    }
}

/// Ratio descending, then closer to mid first, then a stable identity order.
fn rank(a: &LargeOrderFinding, b: &LargeOrderFinding) -> Ordering {
    b.ratio
        .cmp(&a.ratio)
        .then_with(|| match (a.distance_to_mid, b.distance_to_mid) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.instrument.cmp(&b.instrument))
        .then_with(|| a.side.cmp(&b.side))
        .then_with(|| a.price.cmp(&b.price))
}
