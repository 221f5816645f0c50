//! CLI argument definitions for optiscan.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scan` | Sample every listed option book of an underlying |
//! | `book` | Fetch and normalize a single instrument's book |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `json` | Output format (json, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--output` | stdout | Write the document to a file |
//! | `--mock` | `false` | Use the deterministic offline venue |
//! | `--log-json` | `false` | Emit logs as JSON lines on stderr |
//! | `--base-url` | `$OPTISCAN_BASE_URL` | Venue REST base URL |
//!
//! # Examples
//!
//! ```bash
//! optiscan scan BTC --pretty
//! optiscan scan ETH --group-by expiry-strike --strike-width 100 --format table
//! optiscan scan BTC --concurrency 8 --retries 5 --deadline-ms 60000
//! optiscan book BTC-27DEC24-100000-C --depth-limit 5
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;

/// Option order-book scanner
///
/// Samples every active option book for an underlying, flags outsized
/// resting orders and reports call/put bid-ask imbalance.
#[derive(Debug, Parser)]
#[command(name = "optiscan", author, version, about = "Option order-book scanner")]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Write the output document to this path instead of stdout.
    #[arg(long, global = true)]
    pub output: Option<PathBuf>,

    /// Use the deterministic synthetic venue instead of the network.
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,

    /// Venue REST base URL (overrides OPTISCAN_BASE_URL).
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned text tables for terminal display.
    Table,
    /// Single JSON document.
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sample every listed option book of an underlying.
    ///
    /// Exit status: 0 complete, 3 partial failures, 4 fatal.
    Scan(ScanArgs),

    /// Fetch and normalize one instrument's book.
    Book(BookArgs),
}

/// Imbalance bucket granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GroupBy {
    /// Calls vs puts.
    OptionType,
    /// Option type and expiry.
    Expiry,
    /// Option type, expiry and strike band.
    ExpiryStrike,
}

/// Fetch scheduling knobs shared by every command.
#[derive(Debug, Clone, Args)]
pub struct FetchArgs {
    /// Per-request timeout in milliseconds.
    #[arg(long, default_value_t = 5_000)]
    pub timeout_ms: u64,

    /// Retries per instrument for timeouts and rate limits.
    #[arg(long, default_value_t = 3)]
    pub retries: u32,

    /// Sustained request budget per second; 0 disables the budget.
    #[arg(long, default_value_t = 20)]
    pub rate_limit: u32,

    /// Keep only the best N levels per side.
    #[arg(long)]
    pub depth_limit: Option<usize>,

    /// Leave premiums in the venue's native currency.
    #[arg(long, default_value_t = false)]
    pub native_prices: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ScanArgs {
    /// Underlying code, e.g. BTC, ETH, SOL_USDC.
    pub underlying: String,

    /// Maximum concurrent depth fetches (K).
    #[arg(long, default_value_t = 16)]
    pub concurrency: usize,

    #[command(flatten)]
    pub fetch: FetchArgs,

    /// A level is large at this multiple of the book's median level size.
    #[arg(long, default_value = "10")]
    pub threshold: Decimal,

    /// Books with fewer levels never use a reference below --reference-floor.
    #[arg(long, default_value_t = 4)]
    pub min_levels: usize,

    /// Minimum reference size for thin books, in contracts.
    #[arg(long, default_value = "5")]
    pub reference_floor: Decimal,

    #[arg(long, value_enum, default_value_t = GroupBy::OptionType)]
    pub group_by: GroupBy,

    /// Strike band width for --group-by expiry-strike.
    #[arg(long, default_value = "5000")]
    pub strike_width: Decimal,

    /// Cancel outstanding fetches after this many milliseconds.
    #[arg(long)]
    pub deadline_ms: Option<u64>,

    /// Failure share above which the report is marked low-confidence.
    #[arg(long, default_value_t = 0.2)]
    pub max_failure_ratio: f64,
}

#[derive(Debug, Clone, Args)]
pub struct BookArgs {
    /// Instrument name, e.g. BTC-27DEC24-100000-C.
    pub instrument: String,

    #[command(flatten)]
    pub fetch: FetchArgs,
}
