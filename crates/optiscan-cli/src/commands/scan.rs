use std::sync::Arc;
use std::time::Duration;

use optiscan_core::{
    AggregationConfig, CancelToken, DepthFetcher, DetectorConfig, Grouping, InstrumentCatalog,
    RunReport, ScanConfig, Scanner, Underlying,
};

use crate::cli::{GroupBy, ScanArgs};
use crate::error::CliError;

use super::{normalize_config, scheduler_config};

pub async fn run(
    args: &ScanArgs,
    catalog: Arc<dyn InstrumentCatalog>,
    fetcher: Arc<dyn DepthFetcher>,
    cancel: CancelToken,
) -> Result<RunReport, CliError> {
    let underlying = Underlying::parse(&args.underlying)?;
    let scanner = Scanner::new(catalog, fetcher, scan_config(args))?;

    Ok(scanner.run(&underlying, cancel).await)
}

fn scan_config(args: &ScanArgs) -> ScanConfig {
    let grouping = match args.group_by {
        GroupBy::OptionType => Grouping::OptionType,
        GroupBy::Expiry => Grouping::Expiry,
        GroupBy::ExpiryStrike => Grouping::ExpiryStrike {
            strike_width: args.strike_width,
        },
    };

    ScanConfig {
        scheduler: scheduler_config(&args.fetch, args.concurrency),
        normalize: normalize_config(&args.fetch),
        detector: DetectorConfig {
            threshold_multiple: args.threshold,
            min_levels: args.min_levels,
            reference_floor: args.reference_floor,
        },
        aggregation: AggregationConfig { grouping },
        deadline: args.deadline_ms.map(Duration::from_millis),
        max_failure_ratio: args.max_failure_ratio,
    }
}
