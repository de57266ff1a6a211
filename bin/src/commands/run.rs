//! Run command.
//!
//! Enumerates the binary ODFs of the data root and runs one pass per ODF.
//! The ODFs of one symbol share a lock and feed each other's headers, so
//! they run in epoch order on one blocking task; distinct symbols run
//! concurrently.

use crate::display::progress_bar;
use crate::setup::Stores;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use inquire::Confirm;
use odfce_lib::{OdfName, PassReport, PassStatus, Processor, Settings};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Options of the run command.
pub(crate) struct RunOptions {
    pub(crate) group: Option<String>,
    pub(crate) ask: bool,
    pub(crate) show: bool,
    pub(crate) print_fifo: bool,
    pub(crate) parallel_symbols: usize,
    pub(crate) kv: bool,
    pub(crate) quiet: bool,
}

/// Execute the run command.
pub(crate) async fn run(settings: Settings, options: RunOptions) -> Result<()> {
    let stores = Arc::new(Stores::open(&settings)?);
    let settings = Arc::new(settings);
    let now = Utc::now();

    let odfs = {
        let processor = Processor::new(&stores.local, &stores.remote, &settings, now)?;
        let odfs = processor
            .list_odfs(options.group.as_deref())
            .context("Failed to list ODFs")?;

        if odfs.is_empty() {
            if !options.quiet {
                println!("No ODFs found under {}", stores.local.root().display());
            }
            return Ok(());
        }

        if options.print_fifo {
            for (group, name) in &odfs {
                let text = processor
                    .fifo_text(group, name)
                    .with_context(|| format!("Failed to read the FIFO of {group}/{name}"))?;
                println!("{group}/{name}\n{text}");
            }
            return Ok(());
        }
        odfs
    };

    if !settings.process_data {
        for (group, name) in &odfs {
            println!("{group}/{name}");
        }
        if !options.quiet {
            println!("process_data is off; {} ODFs not processed", odfs.len());
        }
        return Ok(());
    }

    if options.ask && !options.quiet {
        let proceed = Confirm::new(&format!("Process {} ODFs?", odfs.len()))
            .with_default(false)
            .prompt()?;
        if !proceed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let total = odfs.len();
    let batches = batch_by_symbol(odfs);
    let progress = progress_bar(total, options.quiet);
    progress.set_prefix("odfce");

    let batches: Vec<_> = stream::iter(batches)
        .map(|batch| {
            let stores = Arc::clone(&stores);
            let settings = Arc::clone(&settings);
            let kv = options.kv;
            if options.show {
                progress.suspend(|| {
                    for name in &batch.names {
                        println!("{}/{name}", batch.group);
                    }
                });
            }
            async move {
                let task = batch.clone();
                match tokio::task::spawn_blocking(move || run_batch(&stores, &settings, now, kv, &task))
                    .await
                {
                    Ok(results) => (batch.group, results),
                    Err(e) => {
                        let message = format!("{e}");
                        let results = batch
                            .names
                            .into_iter()
                            .map(|name| (name, Err(anyhow::anyhow!("symbol task failed: {message}"))))
                            .collect();
                        (batch.group, results)
                    }
                }
            }
        })
        .buffer_unordered(options.parallel_symbols.max(1))
        .inspect(|(_, results)| {
            if let Some((name, _)) = results.last() {
                progress.set_message(name.symbol().to_string());
            }
            progress.inc(results.len() as u64);
        })
        .collect()
        .await;
    progress.finish_and_clear();
    let results = batches
        .into_iter()
        .flat_map(|(group, results)| {
            results
                .into_iter()
                .map(move |(name, result)| (group.clone(), name, result))
        });

    let mut counts = [0usize; 3];
    let mut failures = Vec::new();
    for (group, name, result) in results {
        match result {
            Ok(report) => {
                info!(
                    group = %report.group,
                    odf = %report.name,
                    status = %report.status,
                    records = report.records,
                    gap_filled = report.gap_filled,
                    chunks = report.chunks,
                    "pass finished"
                );
                counts[status_slot(report.status)] += 1;
            }
            Err(e) => {
                let message = format!("{e:#}");
                error!(group = %group, odf = %name, error = %message, "pass aborted");
                failures.push((group, name, e));
            }
        }
    }

    if !options.quiet {
        println!("Run complete:");
        println!("  Processed: {}", counts[status_slot(PassStatus::Processed)]);
        println!("  Up to date: {}", counts[status_slot(PassStatus::UpToDate)]);
        println!("  Archived: {}", counts[status_slot(PassStatus::Archived)]);
        if !failures.is_empty() {
            println!("  Failed: {}", failures.len());
            for (group, name, e) in &failures {
                println!("    {group}/{name}: {e:#}");
            }
        }
    }

    if !failures.is_empty() {
        anyhow::bail!("{} out of {} symbols failed", failures.len(), total);
    }
    Ok(())
}

const fn status_slot(status: PassStatus) -> usize {
    match status {
        PassStatus::Processed => 0,
        PassStatus::UpToDate => 1,
        PassStatus::Archived => 2,
    }
}

/// The ODFs of one symbol, oldest week first.
#[derive(Debug, Clone)]
struct SymbolBatch {
    group: String,
    names: Vec<OdfName>,
}

/// Groups ODFs by `(group, symbol)` and orders each group by epoch.
fn batch_by_symbol(odfs: Vec<(String, OdfName)>) -> Vec<SymbolBatch> {
    let mut by_symbol: BTreeMap<(String, String), Vec<OdfName>> = BTreeMap::new();
    for (group, name) in odfs {
        by_symbol
            .entry((group, name.symbol().to_string()))
            .or_default()
            .push(name);
    }
    by_symbol
        .into_iter()
        .map(|((group, _), mut names)| {
            names.sort_by_key(OdfName::epoch);
            SymbolBatch { group, names }
        })
        .collect()
}

/// Runs the batch's ODFs in order. After a failure the symbol's later
/// weeks are skipped, since they would start from missing headers.
fn run_batch(
    stores: &Stores,
    settings: &Settings,
    now: DateTime<Utc>,
    kv: bool,
    batch: &SymbolBatch,
) -> Vec<(OdfName, Result<PassReport>)> {
    let mut results = Vec::with_capacity(batch.names.len());
    let mut failed: Option<&OdfName> = None;
    for name in &batch.names {
        let result = match failed {
            Some(earlier) => {
                warn!(group = %batch.group, odf = %name, after = %earlier, "skipped");
                Err(anyhow::anyhow!("skipped after {earlier} failed"))
            }
            None => process_symbol(stores, settings, now, kv, &batch.group, name),
        };
        if result.is_err() && failed.is_none() {
            failed = Some(name);
        }
        results.push((name.clone(), result));
    }
    results
}

/// Runs one ODF's pass against the shared stores.
fn process_symbol(
    stores: &Stores,
    settings: &Settings,
    now: DateTime<Utc>,
    kv: bool,
    group: &str,
    name: &OdfName,
) -> Result<PassReport> {
    let processor = Processor::new(&stores.local, &stores.remote, settings, now)?;
    let processor = if kv {
        processor.with_kv(&stores.kv)
    } else {
        processor
    };
    processor
        .process(group, name)
        .with_context(|| format!("Pass over {group}/{name} failed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use odfce_lib::{
        BlobLayout, BlobStore, Decimal, Epoch, HeaderField, OdfExtension, Record, RecordStore,
    };

    fn odf(name: &str) -> OdfName {
        OdfName::parse(name).unwrap()
    }

    fn seed(stores: &Stores, name: &OdfName) {
        let mut store = RecordStore::new();
        for (field, value) in [
            (HeaderField::GmtOffset, 0),
            (HeaderField::TradingStartRecno, 60),
            (HeaderField::TradingRecsPerday, 1440),
            (HeaderField::IdfCurrency, 840),
            (HeaderField::IdfCurrencyMaxDecimals, 5),
            (HeaderField::SplitFactor, 1),
            (HeaderField::CurrencyValueOfPoint, 1),
        ] {
            store.set_header(field, Decimal::from(value));
        }
        let price = Decimal::new(11_001, 4);
        store.insert(Record::new(100, price, price, price, price, Decimal::from(7)));
        let path = BlobLayout::new("FX").odf(name, OdfExtension::Binary);
        stores.local.write(&path, &store.encode().unwrap()).unwrap();
    }

    #[test]
    fn test_batch_by_symbol() {
        let batches = batch_by_symbol(vec![
            ("FX".into(), odf("EURUSD-1856460")),
            ("FX".into(), odf("GBPUSD-1856460")),
            ("FX".into(), odf("EURUSD-1856453")),
            ("IDX".into(), odf("EURUSD-1856446")),
        ]);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].group, "FX");
        let weeks: Vec<&str> = batches[0].names.iter().map(OdfName::basename).collect();
        assert_eq!(weeks, ["EURUSD-1856453", "EURUSD-1856460"]);
        assert_eq!(batches[1].names[0].symbol(), "GBPUSD");
        assert_eq!(batches[2].group, "IDX");
    }

    #[test]
    fn test_run_batch_processes_weeks_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings {
            data_root: Some(dir.path().to_path_buf()),
            ..Settings::default()
        };
        // a trading start of 60 keeps the shifted hourly bars addressable
        settings.intervals.set(32, false);
        let stores = Stores::open(&settings).unwrap();
        let (older, newer) = (odf("EURUSD-1856453"), odf("EURUSD-1856460"));
        seed(&stores, &older);
        seed(&stores, &newer);

        let date = Epoch::new(56460).to_date() + chrono::Days::new(2);
        let now = Utc.from_utc_datetime(&date.and_hms_opt(12, 0, 0).unwrap());
        let batch = SymbolBatch {
            group: "FX".into(),
            names: vec![older.clone(), newer.clone()],
        };

        let results = run_batch(&stores, &settings, now, false, &batch);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, older);
        assert_eq!(results[1].0, newer);
        for (_, result) in &results {
            assert_eq!(result.as_ref().unwrap().status, PassStatus::Processed);
        }
        let lock = BlobLayout::new("FX").lock("EURUSD");
        assert!(!stores.local.exists(&lock).unwrap());
    }

    #[test]
    fn test_run_batch_skips_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            data_root: Some(dir.path().to_path_buf()),
            ..Settings::default()
        };
        let stores = Stores::open(&settings).unwrap();
        let newer = odf("EURUSD-1856460");
        seed(&stores, &newer);
        let batch = SymbolBatch {
            group: "FX".into(),
            // the older week has no ODF on disk
            names: vec![odf("EURUSD-1856453"), newer],
        };

        let results = run_batch(&stores, &settings, Utc::now(), false, &batch);
        assert!(results[0].1.is_err());
        let skipped = results[1].1.as_ref().unwrap_err().to_string();
        assert!(skipped.starts_with("skipped after EURUSD-1856453"));
    }
}
