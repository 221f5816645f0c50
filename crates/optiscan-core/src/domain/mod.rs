//! # Domain Models
//!
//! Canonical, venue-agnostic types for option order-book sampling.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Underlying`] | Validated underlying asset code |
//! | [`InstrumentId`] | One option contract (underlying, expiry, strike, type) |
//! | [`OptionKind`] | Call or put |
//! | [`DepthLevel`] | Price/size pair on one side of a book |
//! | [`OrderBookSnapshot`] | Point-in-time depth for one instrument |
//! | [`Side`] | Bid or ask |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! Prices and sizes are [`rust_decimal::Decimal`] so that volume sums are exact
//! and independent of summation order.

mod book;
mod instrument;
mod timestamp;
mod underlying;

pub use book::{DepthLevel, OrderBookSnapshot, Side};
pub use instrument::{InstrumentId, OptionKind};
pub use timestamp::UtcDateTime;
pub use underlying::Underlying;
