mod book;
mod scan;

use std::num::NonZeroU32;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use optiscan_core::{
    CancelToken, DeribitAdapter, DepthFetcher, InstrumentCatalog, NormalizeConfig, PriceUnit,
    RateLimit, ReqwestHttpClient, RetryConfig, RunReport, RunStatus, SchedulerConfig,
    SyntheticVenue,
};

pub use book::BookView;

use crate::cli::{Cli, Command, FetchArgs};
use crate::error::CliError;

/// Document a command produced, plus the exit status it implies.
#[derive(Debug)]
pub enum CommandOutput {
    Report(Box<RunReport>),
    Book(BookView),
}

impl CommandOutput {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Report(report) => match report.status {
                RunStatus::Complete => ExitCode::SUCCESS,
                RunStatus::Partial => ExitCode::from(3),
                RunStatus::Fatal => ExitCode::from(4),
            },
            Self::Book(_) => ExitCode::SUCCESS,
        }
    }
}

pub async fn run(cli: &Cli, cancel: CancelToken) -> Result<CommandOutput, CliError> {
    let (catalog, fetcher) = venue(cli);

    match &cli.command {
        Command::Scan(args) => scan::run(args, catalog, fetcher, cancel)
            .await
            .map(|report| CommandOutput::Report(Box::new(report))),
        Command::Book(args) => book::run(args, catalog, fetcher).await.map(CommandOutput::Book),
    }
}

fn venue(cli: &Cli) -> (Arc<dyn InstrumentCatalog>, Arc<dyn DepthFetcher>) {
    if cli.mock {
        let venue = Arc::new(SyntheticVenue::new().with_latency(Duration::from_millis(5)));
        let catalog: Arc<dyn InstrumentCatalog> = venue.clone();
        let fetcher: Arc<dyn DepthFetcher> = venue;
        return (catalog, fetcher);
    }

    let mut adapter = DeribitAdapter::new(Arc::new(ReqwestHttpClient::new()));
    if let Some(base_url) = &cli.base_url {
        adapter = adapter.with_base_url(base_url.clone());
    }
    let venue = Arc::new(adapter);
    let catalog: Arc<dyn InstrumentCatalog> = venue.clone();
    let fetcher: Arc<dyn DepthFetcher> = venue;
    (catalog, fetcher)
}

fn scheduler_config(args: &FetchArgs, max_concurrency: usize) -> SchedulerConfig {
    SchedulerConfig {
        max_concurrency,
        request_timeout: Duration::from_millis(args.timeout_ms),
        retry: RetryConfig::exponential(args.retries),
        rate_limit: NonZeroU32::new(args.rate_limit).map(|per_second| RateLimit {
            per_second,
            burst: per_second,
        }),
    }
}

fn normalize_config(args: &FetchArgs) -> NormalizeConfig {
    NormalizeConfig {
        price_unit: if args.native_prices {
            PriceUnit::Native
        } else {
            PriceUnit::Quote
        },
        depth_limit: args.depth_limit,
    }
}
