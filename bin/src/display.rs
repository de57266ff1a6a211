//! Display utilities and output formatting for the odfce CLI.

use anyhow::Result;
use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressStyle};
use odfce_lib::{CsvFormatter, Decimal, Formatter, JsonFormatter, Record};
use std::io::{BufWriter, Write as _};

/// Output format of the `print` command.
#[derive(Clone, Copy, ValueEnum)]
pub(crate) enum Format {
    Csv,
    Json,
    Ndjson,
}

/// Writes records to stdout in the specified format.
pub(crate) fn print_records(records: &[Record], format: Format) -> Result<()> {
    let mut writer = BufWriter::new(std::io::stdout());
    match format {
        Format::Csv => CsvFormatter::new().write_records(records, &mut writer)?,
        Format::Json => JsonFormatter::new().write_records(records, &mut writer)?,
        Format::Ndjson => JsonFormatter::ndjson().write_records(records, &mut writer)?,
    }
    writer.flush()?;
    Ok(())
}

/// Writes named scalars to stdout in the specified format.
pub(crate) fn print_scalars(scalars: &[(&str, Decimal)], format: Format) -> Result<()> {
    let mut writer = BufWriter::new(std::io::stdout());
    match format {
        Format::Csv => CsvFormatter::new().write_scalars(scalars, &mut writer)?,
        Format::Json => JsonFormatter::new().write_scalars(scalars, &mut writer)?,
        Format::Ndjson => JsonFormatter::ndjson().write_scalars(scalars, &mut writer)?,
    }
    writer.flush()?;
    Ok(())
}

/// Progress bar over `len` items, hidden in quiet mode.
pub(crate) fn progress_bar(len: usize, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb
}
