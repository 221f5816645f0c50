use std::sync::Arc;

use optiscan_core::{
    DepthFetcher, DepthLevel, InstrumentCatalog, InstrumentId, NormalizedBook, ScanConfig, Scanner,
    UtcDateTime,
};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::cli::BookArgs;
use crate::error::CliError;

use super::{normalize_config, scheduler_config};

/// One level with its running notional from the top of the book.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelRow {
    pub price: Decimal,
    pub size: Decimal,
    pub notional: Decimal,
    pub cumulative_notional: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookView {
    pub instrument: InstrumentId,
    pub captured_at: UtcDateTime,
    pub underlying_price: Option<Decimal>,
    pub mark_price: Option<Decimal>,
    pub mid: Option<Decimal>,
    pub crossed: bool,
    pub malformed_levels: usize,
    pub bid_notional: Decimal,
    pub ask_notional: Decimal,
    pub bids: Vec<LevelRow>,
    pub asks: Vec<LevelRow>,
}

impl From<NormalizedBook> for BookView {
    fn from(book: NormalizedBook) -> Self {
        let snapshot = book.snapshot;
        Self {
            mid: snapshot.mid(),
            crossed: snapshot.is_crossed(),
            bid_notional: snapshot.bid_notional(),
            ask_notional: snapshot.ask_notional(),
            bids: rows(snapshot.bids()),
            asks: rows(snapshot.asks()),
            malformed_levels: book.malformed_levels,
            underlying_price: snapshot.underlying_price,
            mark_price: snapshot.mark_price,
            captured_at: snapshot.captured_at,
            instrument: snapshot.instrument,
        }
    }
}

pub async fn run(
    args: &BookArgs,
    catalog: Arc<dyn InstrumentCatalog>,
    fetcher: Arc<dyn DepthFetcher>,
) -> Result<BookView, CliError> {
    let instrument = InstrumentId::parse(&args.instrument)?;
    let config = ScanConfig {
        scheduler: scheduler_config(&args.fetch, 1),
        normalize: normalize_config(&args.fetch),
        ..ScanConfig::default()
    };
    let scanner = Scanner::new(catalog, fetcher, config)?;

    let book = scanner.inspect(&instrument).await?;
    Ok(BookView::from(book))
}

fn rows(levels: &[DepthLevel]) -> Vec<LevelRow> {
    levels
        .iter()
        .scan(Decimal::ZERO, |cumulative, level| {
            *cumulative += level.notional();
            Some(LevelRow {
                price: level.price,
                size: level.size,
                notional: level.notional(),
                cumulative_notional: *cumulative,
            })
        })
        .collect()
}
