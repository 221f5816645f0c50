//! End-to-end behavior tests for a sampling run.
//!
//! A stub venue serves a small fixed option universe with hand-written books,
//! so report totals can be checked against numbers worked out by hand.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use optiscan_core::{
    CancelToken, DepthFetcher, FailureReason, InstrumentCatalog, InstrumentId, OptionKind,
    QuoteCurrency, RawDepth, RawLevel, RetryConfig, RunStatus, ScanConfig, Scanner, Side,
    SyntheticVenue, Underlying, UtcDateTime, VenueError, VenueErrorKind,
};
use rust_decimal_macros::dec;

#[derive(Clone)]
enum Book {
    Levels {
        bids: Vec<[f64; 2]>,
        asks: Vec<[f64; 2]>,
    },
    Hang,
    Garbage,
}

enum Listing {
    Instruments(Vec<InstrumentId>),
    Down,
    Hang,
}

struct StubVenue {
    listing: Listing,
    books: HashMap<InstrumentId, Book>,
}

impl InstrumentCatalog for StubVenue {
    fn list_instruments<'a>(
        &'a self,
        _underlying: &'a Underlying,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<InstrumentId>, VenueError>> + Send + 'a>> {
        Box::pin(async move {
            match &self.listing {
                Listing::Instruments(instruments) => Ok(instruments.clone()),
                Listing::Down => Err(VenueError::catalog_unavailable("exchange maintenance")),
                Listing::Hang => std::future::pending().await,
            }
        })
    }
}

impl DepthFetcher for StubVenue {
    fn fetch<'a>(
        &'a self,
        instrument: &'a InstrumentId,
    ) -> Pin<Box<dyn Future<Output = Result<RawDepth, VenueError>> + Send + 'a>> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            match self.books.get(instrument).cloned() {
                Some(Book::Levels { bids, asks }) => Ok(RawDepth {
                    instrument: instrument.clone(),
                    captured_at: UtcDateTime::now(),
                    quoted_in: QuoteCurrency::Quote,
                    bids: bids.into_iter().map(RawLevel::Pair).collect(),
                    asks: asks.into_iter().map(RawLevel::Pair).collect(),
                    underlying_price: Some(65_000.0),
                    mark_price: None,
                }),
                Some(Book::Hang) => std::future::pending().await,
                Some(Book::Garbage) | None => Err(VenueError::invalid_response("unexpected payload")),
            }
        })
    }
}

fn id(name: &str) -> InstrumentId {
    InstrumentId::parse(name).expect("valid instrument")
}

fn btc() -> Underlying {
    Underlying::parse("BTC").expect("valid underlying")
}

fn ordinary_call() -> Book {
    Book::Levels {
        bids: vec![[100.0, 2.0], [99.0, 1.0]],
        asks: vec![[101.0, 1.0], [102.0, 1.0]],
    }
}

fn ordinary_put() -> Book {
    Book::Levels {
        bids: vec![[50.0, 1.0]],
        asks: vec![[51.0, 3.0]],
    }
}

/// Two ordinary calls, one call with a 40-lot bid, two puts.
///
/// Calls: bid volume 2+1 + 2+1 + 2+40 = 48, ask volume 2 + 2 + 2 = 6.
/// Puts: bid volume 2, ask volume 6.
fn universe() -> StubVenue {
    let books = HashMap::from([
        (id("BTC-27DEC24-60000-C"), ordinary_call()),
        (id("BTC-27DEC24-70000-C"), ordinary_call()),
        (
            id("BTC-27DEC24-80000-C"),
            Book::Levels {
                bids: vec![[100.0, 2.0], [99.0, 40.0]],
                asks: vec![[101.0, 1.0], [102.0, 1.0]],
            },
        ),
        (id("BTC-27DEC24-60000-P"), ordinary_put()),
        (id("BTC-27DEC24-70000-P"), ordinary_put()),
    ]);
    StubVenue {
        listing: Listing::Instruments(books.keys().cloned().collect()),
        books,
    }
}

fn with_book(mut venue: StubVenue, name: &str, book: Book) -> StubVenue {
    venue.books.insert(id(name), book);
    venue
}

fn config() -> ScanConfig {
    let mut config = ScanConfig::default();
    config.scheduler.max_concurrency = 2;
    config.scheduler.request_timeout = Duration::from_millis(200);
    config.scheduler.retry = RetryConfig::fixed(Duration::from_millis(20), 1);
    config.scheduler.rate_limit = None;
    config
}

fn scanner(venue: StubVenue, config: ScanConfig) -> Scanner {
    let venue = Arc::new(venue);
    Scanner::new(venue.clone(), venue, config).expect("valid config")
}

// ============================================================================
// Complete runs
// ============================================================================

#[tokio::test(start_paused = true)]
async fn user_can_scan_an_underlying_and_get_imbalance_per_option_type() {
    // Given: a venue with five healthy books
    let scanner = scanner(universe(), config());

    // When: the user scans BTC
    let report = scanner.run(&btc(), CancelToken::new()).await;

    // Then: the run is complete and accounted for
    assert_eq!(report.status, RunStatus::Complete);
    assert_eq!(report.total_attempted, 5);
    assert_eq!(report.succeeded + report.failed, report.total_attempted);
    assert!(report.failures.is_empty());
    assert!(!report.low_confidence);
    assert!(report.peak_in_flight <= 2);

    // And: one bucket per option type with hand-computed totals
    assert_eq!(report.buckets.len(), 2);
    let calls = &report.buckets[0];
    assert_eq!(calls.key.kind, OptionKind::Call);
    assert_eq!(calls.bid_volume, dec!(48));
    assert_eq!(calls.ask_volume, dec!(6));
    assert_eq!(calls.snapshot_count, 3);
    let puts = &report.buckets[1];
    assert_eq!(puts.key.kind, OptionKind::Put);
    assert_eq!(puts.bid_volume, dec!(2));
    assert_eq!(puts.ask_volume, dec!(6));
    assert_eq!(puts.imbalance, dec!(-0.5));
}

#[tokio::test(start_paused = true)]
async fn user_can_see_the_outsized_resting_order() {
    // Given: a venue where one call carries a 40-lot bid among 1-2 lots
    let scanner = scanner(universe(), config());

    // When: the user scans BTC
    let report = scanner.run(&btc(), CancelToken::new()).await;

    // Then: exactly that level is reported
    assert_eq!(report.findings.len(), 1, "findings: {:?}", report.findings);
    let finding = &report.findings[0];
    assert_eq!(finding.instrument, id("BTC-27DEC24-80000-C"));
    assert_eq!(finding.side, Side::Bid);
    assert_eq!(finding.price, dec!(99));
    assert_eq!(finding.size, dec!(40));
    assert!(finding.ratio >= dec!(10));
    assert_eq!(finding.distance_to_mid, Some(dec!(1.5)));
}

#[tokio::test(start_paused = true)]
async fn user_can_group_imbalance_by_expiry() {
    // Given: calls across two expiries
    let venue = with_book(universe(), "BTC-31JAN25-60000-C", ordinary_call());
    let venue = StubVenue {
        listing: Listing::Instruments(venue.books.keys().cloned().collect()),
        ..venue
    };
    let mut config = config();
    config.aggregation.grouping = optiscan_core::Grouping::Expiry;

    // When: the user scans grouped by expiry
    let report = scanner(venue, config).run(&btc(), CancelToken::new()).await;

    // Then: calls split into two buckets, puts stay in one
    let call_buckets = report
        .buckets
        .iter()
        .filter(|bucket| bucket.key.kind == OptionKind::Call)
        .collect::<Vec<_>>();
    assert_eq!(call_buckets.len(), 2);
    assert_eq!(call_buckets[0].snapshot_count, 3);
    assert_eq!(call_buckets[1].snapshot_count, 1);
    assert!(call_buckets[0].key.expiry < call_buckets[1].key.expiry);
}

// ============================================================================
// Partial runs
// ============================================================================

#[tokio::test(start_paused = true)]
async fn when_an_instrument_times_out_system_excludes_it_from_the_signals() {
    // Given: one ordinary call never answers
    let venue = with_book(universe(), "BTC-27DEC24-70000-C", Book::Hang);
    let scanner = scanner(venue, config());

    // When: the user scans BTC
    let report = scanner.run(&btc(), CancelToken::new()).await;

    // Then: the run is partial and the silent instrument is listed as a timeout
    assert_eq!(report.status, RunStatus::Partial);
    assert_eq!(report.succeeded, 4);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.instrument, id("BTC-27DEC24-70000-C"));
    assert_eq!(failure.attempts, 2);
    assert!(matches!(
        failure.reason,
        FailureReason::Venue { kind: VenueErrorKind::Timeout, .. }
    ));

    // And: the call bucket only holds the books that arrived
    let calls = &report.buckets[0];
    assert_eq!(calls.snapshot_count, 2);
    assert_eq!(calls.bid_volume, dec!(45));
    assert_eq!(calls.ask_volume, dec!(4));

    // And: one failure in five sits exactly at the default tolerance
    assert!(!report.low_confidence);
}

#[tokio::test(start_paused = true)]
async fn when_too_many_instruments_fail_system_marks_the_report_low_confidence() {
    // Given: two of five books are undecodable
    let venue = with_book(universe(), "BTC-27DEC24-60000-C", Book::Garbage);
    let venue = with_book(venue, "BTC-27DEC24-60000-P", Book::Garbage);

    // When: the user scans BTC
    let report = scanner(venue, config()).run(&btc(), CancelToken::new()).await;

    // Then: the run is partial and flagged
    assert_eq!(report.status, RunStatus::Partial);
    assert_eq!(report.failed, 2);
    assert!(report.low_confidence);
    assert!(report.failures.iter().all(|failure| failure.attempts == 1));
}

#[tokio::test(start_paused = true)]
async fn when_the_deadline_passes_system_returns_what_it_has() {
    // Given: two calls that never answer and a 100ms run deadline
    let venue = with_book(universe(), "BTC-27DEC24-60000-C", Book::Hang);
    let venue = with_book(venue, "BTC-27DEC24-70000-C", Book::Hang);
    let mut config = config();
    config.scheduler.max_concurrency = 8;
    config.scheduler.request_timeout = Duration::from_secs(5);
    config.deadline = Some(Duration::from_millis(100));

    // When: the user scans BTC
    let report = scanner(venue, config).run(&btc(), CancelToken::new()).await;

    // Then: the answered books are kept and the silent ones abandoned
    assert!(report.cancelled);
    assert_eq!(report.status, RunStatus::Partial);
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed, 2);
    assert!(report
        .failures
        .iter()
        .all(|failure| failure.reason == FailureReason::Abandoned));
}

// ============================================================================
// Fatal runs
// ============================================================================

#[tokio::test(start_paused = true)]
async fn when_the_catalog_is_down_system_returns_a_fatal_report() {
    // Given: a venue that cannot list instruments
    let venue = StubVenue {
        listing: Listing::Down,
        books: HashMap::new(),
    };

    // When: the user scans BTC
    let report = scanner(venue, config()).run(&btc(), CancelToken::new()).await;

    // Then: nothing was attempted and the reason is recorded
    assert_eq!(report.status, RunStatus::Fatal);
    assert_eq!(report.total_attempted, 0);
    assert!(report.buckets.is_empty());
    assert!(report.findings.is_empty());
    let fatal = report.fatal.as_ref().expect("fatal reason present");
    assert_eq!(fatal.code, "venue.catalog_unavailable");
    assert!(fatal.message.contains("maintenance"));
}

#[tokio::test(start_paused = true)]
async fn when_the_catalog_hangs_system_times_it_out_as_unavailable() {
    // Given: a catalog that never answers
    let venue = StubVenue {
        listing: Listing::Hang,
        books: HashMap::new(),
    };

    // When: the user scans BTC
    let report = scanner(venue, config()).run(&btc(), CancelToken::new()).await;

    // Then: the run ends fatal instead of hanging
    assert!(report.is_fatal());
    assert_eq!(
        report.fatal.as_ref().map(|fatal| fatal.code.as_str()),
        Some("venue.catalog_unavailable")
    );
}

#[tokio::test(start_paused = true)]
async fn when_every_fetch_fails_system_reports_the_venue_unavailable() {
    // Given: every listed book is undecodable and nobody cancels
    let mut venue = universe();
    for book in venue.books.values_mut() {
        *book = Book::Garbage;
    }

    // When: the user scans BTC
    let report = scanner(venue, config()).run(&btc(), CancelToken::new()).await;

    // Then: the run is fatal rather than partial
    assert_eq!(report.status, RunStatus::Fatal);
    assert!(!report.cancelled);
    assert!(report.low_confidence);
    assert_eq!(report.total_attempted, 5);
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.failed, 5);
    assert!(report.buckets.is_empty());
    assert_eq!(
        report.fatal.as_ref().map(|fatal| fatal.code.as_str()),
        Some("venue.unavailable")
    );
}

#[tokio::test(start_paused = true)]
async fn when_the_run_is_cancelled_with_nothing_fetched_system_reports_fatal() {
    // Given: every book hangs and the user interrupts after 50ms
    let mut venue = universe();
    for book in venue.books.values_mut() {
        *book = Book::Hang;
    }
    let cancel = CancelToken::new();
    let _interrupt = cancel.cancel_after(Duration::from_millis(50));

    // When: the user scans BTC
    let report = scanner(venue, config()).run(&btc(), cancel).await;

    // Then: the run is fatal, every instrument still accounted for
    assert_eq!(report.status, RunStatus::Fatal);
    assert!(report.cancelled);
    assert!(report.low_confidence);
    assert_eq!(report.total_attempted, 5);
    assert_eq!(report.failed, 5);
    assert_eq!(
        report.fatal.as_ref().map(|fatal| fatal.code.as_str()),
        Some("run.cancelled")
    );
}

// ============================================================================
// Synthetic venue and single-book inspection
// ============================================================================

#[tokio::test]
async fn user_can_scan_the_synthetic_venue_reproducibly() {
    // Given: the offline synthetic venue
    let venue = Arc::new(SyntheticVenue::new());
    let mut config = ScanConfig::default();
    config.scheduler.rate_limit = None;
    let scanner = Scanner::new(venue.clone(), venue, config).expect("valid config");

    // When: the same underlying is scanned twice
    let first = scanner.run(&btc(), CancelToken::new()).await;
    let second = scanner.run(&btc(), CancelToken::new()).await;

    // Then: both runs complete with identical signals
    assert_eq!(first.status, RunStatus::Complete);
    assert!(first.total_attempted > 0);
    assert_eq!(first.succeeded, first.total_attempted);
    assert_eq!(first.buckets, second.buckets);
    assert_eq!(first.findings, second.findings);
    assert_ne!(first.run_id, second.run_id);
}

#[tokio::test(start_paused = true)]
async fn user_can_inspect_a_single_book() {
    // Given: a venue with a healthy call and a broken one
    let venue = with_book(universe(), "BTC-27DEC24-70000-C", Book::Garbage);
    let scanner = scanner(venue, config());

    // When: both are inspected
    let healthy = scanner
        .inspect(&id("BTC-27DEC24-60000-C"))
        .await
        .expect("healthy book normalizes");
    let broken = scanner
        .inspect(&id("BTC-27DEC24-70000-C"))
        .await
        .expect_err("broken book fails");

    // Then: the healthy book carries its levels and the broken one its error kind
    assert_eq!(healthy.snapshot.level_count(), 4);
    assert_eq!(healthy.snapshot.mid(), Some(dec!(100.5)));
    assert_eq!(broken.kind(), VenueErrorKind::InvalidResponse);
}
