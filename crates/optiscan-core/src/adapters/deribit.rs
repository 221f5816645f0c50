use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::base_url_from_env;
use crate::http_client::{HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse};
use crate::venue::{DepthFetcher, InstrumentCatalog, QuoteCurrency, RawDepth, RawLevel, VenueError};
use crate::{InstrumentId, OptionKind, Underlying, UtcDateTime};

/// JSON-RPC error code the venue uses for an exhausted request budget.
const TOO_MANY_REQUESTS: i64 = 10028;

/// Deribit public REST adapter for the option catalog and order books.
#[derive(Clone)]
pub struct DeribitAdapter {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    timeout_ms: u64,
}

impl DeribitAdapter {
    /// Adapter against `OPTISCAN_BASE_URL`, or the public endpoint when unset.
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            base_url: normalize_base(base_url_from_env()),
            timeout_ms: 5_000,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = normalize_base(base_url.into());
        self
    }

    /// Transport-level timeout; the scheduler applies its own on top.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn call<T>(&self, method: &str, query: &[(&str, &str)]) -> Result<T, VenueError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let query = query
            .iter()
            .map(|(name, value)| format!("{name}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        let url = format!("{}{method}?{query}", self.base_url);
        debug!(%url, "deribit request");

        let request = HttpRequest::get(url)
            .with_header("accept", "application/json")
            .with_timeout_ms(self.timeout_ms);
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(transport_error)?;

        decode_envelope(method, &response)
    }
}

impl InstrumentCatalog for DeribitAdapter {
    fn list_instruments<'a>(
        &'a self,
        underlying: &'a Underlying,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<InstrumentId>, VenueError>> + Send + 'a>> {
        Box::pin(async move {
            let listed = self
                .call::<Vec<DeribitInstrument>>(
                    "get_instruments",
                    &[
                        ("currency", underlying.currency()),
                        ("expired", "false"),
                        ("kind", "option"),
                    ],
                )
                .await
                .map_err(|error| {
                    VenueError::catalog_unavailable(format!(
                        "deribit catalog for {underlying}: {}",
                        error.message()
                    ))
                })?;

            let now_ms = UtcDateTime::now().unix_millis();
            let instruments = listed
                .iter()
                .filter_map(|entry| entry.tradable(underlying, now_ms))
                .collect::<Vec<_>>();

            debug!(%underlying, listed = listed.len(), tradable = instruments.len(), "deribit catalog");
            Ok(instruments)
        })
    }
}

impl DepthFetcher for DeribitAdapter {
    fn fetch<'a>(
        &'a self,
        instrument: &'a InstrumentId,
    ) -> Pin<Box<dyn Future<Output = Result<RawDepth, VenueError>> + Send + 'a>> {
        Box::pin(async move {
            let name = instrument.name();
            let book = self
                .call::<DeribitBook>("get_order_book", &[("instrument_name", name.as_str())])
                .await?;

            if book.instrument_name != name {
                return Err(VenueError::invalid_response(format!(
                    "asked for {name}, venue answered for {}",
                    book.instrument_name
                )));
            }

            let captured_at = book
                .timestamp
                .and_then(|millis| UtcDateTime::from_unix_millis(millis).ok())
                .unwrap_or_else(UtcDateTime::now);

            Ok(RawDepth {
                instrument: instrument.clone(),
                captured_at,
                quoted_in: quote_currency(instrument.underlying()),
                bids: book.bids,
                asks: book.asks,
                underlying_price: book.underlying_price,
                mark_price: book.mark_price,
            })
        })
    }
}

/// Inverse coin-margined options quote in the coin; `*_USDC` linear options
/// quote in USDC.
fn quote_currency(underlying: &Underlying) -> QuoteCurrency {
    if underlying.as_str().contains('_') {
        QuoteCurrency::Quote
    } else {
        QuoteCurrency::Underlying
    }
}

fn normalize_base(mut base_url: String) -> String {
    if !base_url.ends_with('/') {
        base_url.push('/');
    }
    base_url
}

fn transport_error(error: HttpError) -> VenueError {
    match error.kind() {
        HttpErrorKind::Timeout | HttpErrorKind::Connect | HttpErrorKind::Body => {
            VenueError::timeout(format!("deribit transport: {}", error.message()))
        }
        HttpErrorKind::Other => VenueError::invalid_response(format!("deribit transport: {}", error.message())),
    }
}

fn decode_envelope<T>(method: &str, response: &HttpResponse) -> Result<T, VenueError>
where
    T: for<'de> Deserialize<'de>,
{
    let envelope = serde_json::from_str::<Envelope<T>>(&response.body);

    if let Ok(Envelope { error: Some(error), .. }) = &envelope {
        return Err(if error.code == TOO_MANY_REQUESTS {
            VenueError::rate_limited(format!("{method}: {} ({})", error.message, error.code))
        } else {
            VenueError::invalid_response(format!("{method}: {} ({})", error.message, error.code))
        });
    }

    match response.status {
        429 => return Err(VenueError::rate_limited(format!("{method}: HTTP 429"))),
        408 | 500..=599 => {
            return Err(VenueError::timeout(format!("{method}: HTTP {}", response.status)))
        }
        status if !response.is_success() => {
            return Err(VenueError::invalid_response(format!("{method}: HTTP {status}")))
        }
        _ => {}
    }

    match envelope {
        Ok(Envelope { result: Some(result), .. }) => Ok(result),
        Ok(_) => Err(VenueError::invalid_response(format!("{method}: response has no result"))),
        Err(error) => Err(VenueError::invalid_response(format!("{method}: undecodable body: {error}"))),
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct DeribitInstrument {
    instrument_name: String,
    #[serde(default)]
    strike: Option<f64>,
    #[serde(default)]
    option_type: Option<String>,
    #[serde(default)]
    expiration_timestamp: Option<i64>,
    #[serde(default)]
    creation_timestamp: Option<i64>,
    #[serde(default = "listed_active")]
    is_active: bool,
}

fn listed_active() -> bool {
    true
}

impl DeribitInstrument {
    /// `Some` for an active, already-listed, unexpired option on `underlying`.
    fn tradable(&self, underlying: &Underlying, now_ms: i64) -> Option<InstrumentId> {
        if !self.is_active {
            return None;
        }
        if self.expiration_timestamp.is_some_and(|expiry| expiry <= now_ms) {
            return None;
        }
        if self.creation_timestamp.is_some_and(|created| created > now_ms) {
            return None;
        }

        // Depth is requested by the listed name, so a name that does not
        // parse cannot be rebuilt from the other fields.
        let instrument = match InstrumentId::parse(&self.instrument_name) {
            Ok(instrument) => instrument,
            Err(error) => {
                warn!(name = %self.instrument_name, %error, "skipping unrecognized instrument");
                return None;
            }
        };
        if instrument.underlying() != underlying {
            return None;
        }
        if !self.agrees_with(&instrument) {
            warn!(
                name = %self.instrument_name,
                strike = ?self.strike,
                option_type = ?self.option_type,
                "skipping instrument whose fields disagree with its name"
            );
            return None;
        }

        Some(instrument)
    }

    /// Structured fields, when present, must describe the same contract as the name.
    fn agrees_with(&self, instrument: &InstrumentId) -> bool {
        use rust_decimal::prelude::FromPrimitive;

        let strike_agrees = self
            .strike
            .map_or(true, |strike| rust_decimal::Decimal::from_f64(strike) == Some(instrument.strike()));
        let kind_agrees = self
            .option_type
            .as_deref()
            .map_or(true, |kind| kind.parse::<OptionKind>().ok() == Some(instrument.kind()));

        strike_agrees && kind_agrees
    }
}

#[derive(Debug, Deserialize)]
struct DeribitBook {
    instrument_name: String,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    bids: Vec<RawLevel>,
    #[serde(default)]
    asks: Vec<RawLevel>,
    #[serde(default)]
    underlying_price: Option<f64>,
    #[serde(default)]
    mark_price: Option<f64>,
}
