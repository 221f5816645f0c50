//! Venue adapters.
//!
//! | Adapter | Catalog | Depth |
//! |---------|---------|-------|
//! | [`DeribitAdapter`] | `public/get_instruments` | `public/get_order_book` |
//! | [`SyntheticVenue`] | deterministic strike ladder | seeded books |

mod deribit;
mod synthetic;

pub use deribit::DeribitAdapter;
pub use synthetic::SyntheticVenue;
