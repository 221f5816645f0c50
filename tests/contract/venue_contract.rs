//! Contract tests for the Deribit adapter against canned venue payloads.
//!
//! A scripted transport stands in for the network so every catalog and depth
//! mapping rule is checked without leaving the process.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use optiscan_core::{
    DeribitAdapter, DepthFetcher, HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse,
    InstrumentCatalog, InstrumentId, NormalizeConfig, QuoteCurrency, RawLevel, Underlying,
    VenueErrorKind,
};

/// Far enough ahead that no listing in these payloads has expired.
const YEAR_2100_MS: i64 = 4_102_444_800_000;

/// Replies to every request with the same canned result and records the URLs.
struct CannedTransport {
    reply: Result<HttpResponse, HttpError>,
    requests: Mutex<Vec<String>>,
}

impl CannedTransport {
    fn replying(reply: Result<HttpResponse, HttpError>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn urls(&self) -> Vec<String> {
        self.requests.lock().expect("request log is not poisoned").clone()
    }
}

impl HttpClient for CannedTransport {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            self.requests
                .lock()
                .expect("request log is not poisoned")
                .push(request.url);
            self.reply.clone()
        })
    }
}

fn adapter(transport: &Arc<CannedTransport>) -> DeribitAdapter {
    let transport: Arc<dyn HttpClient> = transport.clone();
    DeribitAdapter::new(transport).with_base_url("https://venue.test/api/v2/public")
}

fn btc() -> Underlying {
    Underlying::parse("BTC").expect("valid underlying")
}

// ============================================================================
// Instrument catalog
// ============================================================================

#[tokio::test]
async fn catalog_lists_only_active_unexpired_options_of_the_underlying() {
    // Given: a listing with one live option, one inactive, one expired,
    // one not yet listed and one on a different underlying
    let body = format!(
        r#"{{"jsonrpc":"2.0","result":[
            {{"instrument_name":"BTC-27DEC99-60000-C","strike":60000.0,"option_type":"call","expiration_timestamp":{live},"creation_timestamp":1,"is_active":true}},
            {{"instrument_name":"BTC-27DEC99-70000-P","strike":70000.0,"option_type":"put","expiration_timestamp":{live},"creation_timestamp":1,"is_active":false}},
            {{"instrument_name":"BTC-27DEC19-8000-C","strike":8000.0,"option_type":"call","expiration_timestamp":1577404800000,"creation_timestamp":1,"is_active":true}},
            {{"instrument_name":"BTC-27DEC99-90000-C","strike":90000.0,"option_type":"call","expiration_timestamp":{live},"creation_timestamp":{live},"is_active":true}},
            {{"instrument_name":"ETH-27DEC99-3000-C","strike":3000.0,"option_type":"call","expiration_timestamp":{live},"creation_timestamp":1,"is_active":true}}
        ]}}"#,
        live = YEAR_2100_MS,
    );
    let transport = CannedTransport::replying(Ok(HttpResponse::ok_json(body)));

    // When: the catalog is listed
    let instruments = adapter(&transport)
        .list_instruments(&btc())
        .await
        .expect("catalog resolves");

    // Then: only the live BTC option survives
    assert_eq!(
        instruments,
        vec![InstrumentId::parse("BTC-27DEC99-60000-C").expect("valid")],
        "catalog must drop inactive, expired, unlisted and foreign options"
    );

    // And: the request asked for unexpired options of the underlying's currency
    let urls = transport.urls();
    assert_eq!(urls.len(), 1);
    assert!(urls[0].starts_with("https://venue.test/api/v2/public/get_instruments?"));
    assert!(urls[0].contains("currency=BTC"));
    assert!(urls[0].contains("expired=false"));
    assert!(urls[0].contains("kind=option"));
}

#[tokio::test]
async fn catalog_failures_surface_as_catalog_unavailable() {
    // Given: a venue that is down
    let transport = CannedTransport::replying(Ok(HttpResponse::with_status(503, "maintenance")));

    // When: the catalog is listed
    let error = adapter(&transport)
        .list_instruments(&btc())
        .await
        .expect_err("catalog must fail");

    // Then: whatever the transport said, the catalog reports itself unavailable
    assert_eq!(error.kind(), VenueErrorKind::CatalogUnavailable);
    assert!(error.message().contains("BTC"), "message names the underlying: {error}");
}

#[tokio::test]
async fn linear_underlyings_query_their_settlement_currency() {
    // Given: an empty listing for a USDC-settled underlying
    let transport = CannedTransport::replying(Ok(HttpResponse::ok_json(r#"{"result":[]}"#)));
    let sol = Underlying::parse("SOL_USDC").expect("valid underlying");

    // When: the catalog is listed
    let instruments = adapter(&transport)
        .list_instruments(&sol)
        .await
        .expect("empty catalog is not an error");

    // Then: the venue was asked for the USDC book family
    assert!(instruments.is_empty());
    assert!(transport.urls()[0].contains("currency=USDC"));
}

// ============================================================================
// Depth fetcher
// ============================================================================

#[tokio::test]
async fn depth_is_decoded_with_prices_and_venue_timestamp() {
    // Given: a canned order book for an inverse BTC option
    let body = r#"{"result":{
        "instrument_name":"BTC-27DEC24-60000-C",
        "timestamp":1733000000000,
        "bids":[[0.0105,12.5],[0.0100,3.0]],
        "asks":[[0.0110,4.0]],
        "underlying_price":95000.0,
        "mark_price":0.0107
    }}"#;
    let transport = CannedTransport::replying(Ok(HttpResponse::ok_json(body)));
    let instrument = InstrumentId::parse("BTC-27DEC24-60000-C").expect("valid");

    // When: depth is fetched
    let depth = adapter(&transport).fetch(&instrument).await.expect("depth decodes");

    // Then: levels, prices and timestamp come through untouched
    assert_eq!(depth.instrument, instrument);
    assert_eq!(depth.quoted_in, QuoteCurrency::Underlying);
    assert_eq!(depth.bids.len(), 2);
    assert_eq!(depth.bids[0], RawLevel::Pair([0.0105, 12.5]));
    assert_eq!(depth.asks, vec![RawLevel::Pair([0.0110, 4.0])]);
    assert_eq!(depth.underlying_price, Some(95_000.0));
    assert_eq!(depth.mark_price, Some(0.0107));
    assert_eq!(depth.captured_at.unix_millis(), 1_733_000_000_000);
    assert!(transport.urls()[0].contains("instrument_name=BTC-27DEC24-60000-C"));
}

#[tokio::test]
async fn one_odd_level_is_dropped_without_losing_the_book() {
    // Given: a canned order book where one bid has no size
    let body = r#"{"result":{
        "instrument_name":"BTC-27DEC24-60000-C",
        "timestamp":1733000000000,
        "bids":[[0.0105,12.5],[0.0100,null]],
        "asks":[[0.0110,4.0]],
        "underlying_price":95000.0,
        "mark_price":0.0107
    }}"#;
    let transport = CannedTransport::replying(Ok(HttpResponse::ok_json(body)));
    let instrument = InstrumentId::parse("BTC-27DEC24-60000-C").expect("valid");

    // When: depth is fetched and normalized
    let depth = adapter(&transport)
        .fetch(&instrument)
        .await
        .expect("book still decodes");
    assert_eq!(depth.bids.len(), 2);
    let book = optiscan_core::normalize_depth(depth, &NormalizeConfig::default())
        .expect("book normalizes");

    // Then: the good levels survive and the odd one is counted
    assert_eq!(book.malformed_levels, 1);
    assert_eq!(book.snapshot.bids().len(), 1);
    assert_eq!(book.snapshot.asks().len(), 1);
}

#[tokio::test]
async fn depth_for_a_different_instrument_is_an_invalid_response() {
    // Given: the venue answers with another instrument's book
    let body = r#"{"result":{"instrument_name":"BTC-27DEC24-70000-C","bids":[],"asks":[]}}"#;
    let transport = CannedTransport::replying(Ok(HttpResponse::ok_json(body)));
    let instrument = InstrumentId::parse("BTC-27DEC24-60000-C").expect("valid");

    // When: depth is fetched
    let error = adapter(&transport).fetch(&instrument).await.expect_err("mismatch");

    // Then: the response is rejected
    assert_eq!(error.kind(), VenueErrorKind::InvalidResponse);
}

#[tokio::test]
async fn venue_errors_map_onto_the_fetch_taxonomy() {
    let instrument = InstrumentId::parse("BTC-27DEC24-60000-C").expect("valid");
    let cases = [
        (
            Ok(HttpResponse::with_status(429, "")),
            VenueErrorKind::RateLimited,
        ),
        (
            Ok(HttpResponse::with_status(
                400,
                r#"{"error":{"code":10028,"message":"too_many_requests"}}"#,
            )),
            VenueErrorKind::RateLimited,
        ),
        (
            Ok(HttpResponse::with_status(502, "bad gateway")),
            VenueErrorKind::Timeout,
        ),
        (
            Err(HttpError::timeout("deadline elapsed")),
            VenueErrorKind::Timeout,
        ),
        (
            Err(HttpError::new(HttpErrorKind::Connect, "connection refused")),
            VenueErrorKind::Timeout,
        ),
        (
            Ok(HttpResponse::ok_json("<html>not json</html>")),
            VenueErrorKind::InvalidResponse,
        ),
        (
            Ok(HttpResponse::ok_json(
                r#"{"error":{"code":13020,"message":"not_found"}}"#,
            )),
            VenueErrorKind::InvalidResponse,
        ),
    ];

    for (reply, expected) in cases {
        let description = format!("{reply:?}");
        let transport = CannedTransport::replying(reply);

        let error = adapter(&transport)
            .fetch(&instrument)
            .await
            .expect_err("every case fails");

        assert_eq!(error.kind(), expected, "reply {description}");
    }
}
