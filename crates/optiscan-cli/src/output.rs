use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use optiscan_core::RunReport;

use crate::cli::OutputFormat;
use crate::commands::{BookView, CommandOutput};
use crate::error::CliError;

pub fn render(
    output: &CommandOutput,
    format: OutputFormat,
    pretty: bool,
    path: Option<&Path>,
) -> Result<(), CliError> {
    match path {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            write_document(&mut writer, output, format, pretty)?;
            writer.flush()?;
            tracing::info!(path = %path.display(), "output written");
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            write_document(&mut writer, output, format, pretty)?;
        }
    }

    Ok(())
}

fn write_document<W: Write>(
    writer: &mut W,
    output: &CommandOutput,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let payload = match output {
                CommandOutput::Report(report) if pretty => serde_json::to_string_pretty(report)?,
                CommandOutput::Report(report) => serde_json::to_string(report)?,
                CommandOutput::Book(book) if pretty => serde_json::to_string_pretty(book)?,
                CommandOutput::Book(book) => serde_json::to_string(book)?,
            };
            writeln!(writer, "{payload}")?;
        }
        OutputFormat::Table => match output {
            CommandOutput::Report(report) => write_report_table(writer, report)?,
            CommandOutput::Book(book) => write_book_table(writer, book)?,
        },
    }

    Ok(())
}

fn write_report_table<W: Write>(writer: &mut W, report: &RunReport) -> io::Result<()> {
    writeln!(writer, "run_id      : {}", report.run_id)?;
    writeln!(writer, "underlying  : {}", report.underlying)?;
    writeln!(writer, "captured_at : {}", report.captured_at)?;
    writeln!(writer, "status      : {}", report.status.as_str())?;
    if let Some(fatal) = &report.fatal {
        writeln!(writer, "fatal       : {}: {}", fatal.code, fatal.message)?;
    }
    writeln!(
        writer,
        "instruments : attempted={} succeeded={} failed={}{}",
        report.total_attempted,
        report.succeeded,
        report.failed,
        if report.low_confidence { " (low confidence)" } else { "" }
    )?;
    writeln!(
        writer,
        "anomalies   : malformed_levels={} crossed={} one_sided={}",
        report.malformed_levels, report.crossed_books, report.one_sided_books
    )?;
    writeln!(writer, "elapsed_ms  : {}", report.elapsed_ms)?;

    writeln!(writer)?;
    writeln!(writer, "imbalance:")?;
    writeln!(
        writer,
        "  {:<4} {:<10} {:>10} {:>14} {:>14} {:>10} {:>6}",
        "type", "expiry", "strike", "bid_vol", "ask_vol", "imbalance", "books"
    )?;
    for bucket in &report.buckets {
        writeln!(
            writer,
            "  {:<4} {:<10} {:>10} {:>14} {:>14} {:>10} {:>6}{}",
            bucket.key.kind.as_str(),
            bucket.key.expiry.map(|date| date.to_string()).unwrap_or_else(|| String::from("-")),
            bucket.key.strike_floor.map(|strike| strike.to_string()).unwrap_or_else(|| String::from("-")),
            bucket.bid_volume,
            bucket.ask_volume,
            bucket.imbalance.round_dp(4),
            bucket.snapshot_count,
            if bucket.low_confidence { " *" } else { "" }
        )?;
    }

    writeln!(writer)?;
    writeln!(writer, "large orders:")?;
    if report.findings.is_empty() {
        writeln!(writer, "  (none)")?;
    }
    for finding in &report.findings {
        writeln!(
            writer,
            "  {:<24} {:<3} price={} size={} ref={} ratio={}",
            finding.instrument.name(),
            finding.side.as_str(),
            finding.price.round_dp(2),
            finding.size,
            finding.reference_size,
            finding.ratio.round_dp(1)
        )?;
    }

    if !report.failures.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "failures:")?;
        for failure in &report.failures {
            writeln!(
                writer,
                "  {:<24} attempts={} {:?}",
                failure.instrument.name(),
                failure.attempts,
                failure.reason
            )?;
        }
    }

    Ok(())
}

fn write_book_table<W: Write>(writer: &mut W, book: &BookView) -> io::Result<()> {
    writeln!(writer, "instrument  : {}", book.instrument)?;
    writeln!(writer, "captured_at : {}", book.captured_at)?;
    if let Some(price) = book.underlying_price {
        writeln!(writer, "underlying  : {price}")?;
    }
    if let Some(price) = book.mark_price {
        writeln!(writer, "mark        : {}", price.round_dp(2))?;
    }
    if let Some(mid) = book.mid {
        writeln!(writer, "mid         : {}{}", mid.round_dp(2), if book.crossed { " (crossed)" } else { "" })?;
    }

    for (label, rows) in [("bids", &book.bids), ("asks", &book.asks)] {
        writeln!(writer)?;
        writeln!(writer, "{label}:")?;
        writeln!(writer, "  {:>14} {:>12} {:>16} {:>16}", "price", "size", "notional", "cumulative")?;
        for row in rows {
            writeln!(
                writer,
                "  {:>14} {:>12} {:>16} {:>16}",
                row.price.round_dp(2),
                row.size,
                row.notional.round_dp(2),
                row.cumulative_notional.round_dp(2)
            )?;
        }
    }

    Ok(())
}
