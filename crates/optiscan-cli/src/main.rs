mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use std::process::ExitCode;

use optiscan_core::CancelToken;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    match run(&cli).await {
        Ok(code) => code,
        Err(error) => {
            tracing::error!(%error, "optiscan failed");
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run(cli: &Cli) -> Result<ExitCode, CliError> {
    let cancel = CancelToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; cancelling outstanding fetches");
                cancel.cancel();
            }
        })
    };

    let result = commands::run(cli, cancel).await;
    interrupt.abort();

    let output = result?;
    output::render(&output, cli.format, cli.pretty, cli.output.as_deref())?;

    Ok(output.exit_code())
}

/// Logs go to stderr so stdout stays a clean document.
fn init_logging(json: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
