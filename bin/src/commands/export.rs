//! Export command.
//!
//! Converts the text ODFs (`.rs4`) of the data root to their binary form,
//! or uploads their rows to the key-value store.

use crate::display::progress_bar;
use crate::setup::Stores;
use anyhow::{Context, Result};
use odfce_lib::{OdfExtension, Settings, convert_text_odf, find_odfs, upload_text_odf};
use tracing::error;

/// Execute the export command.
pub(crate) fn export(
    settings: &Settings,
    group: Option<&str>,
    kv: bool,
    force: bool,
    quiet: bool,
) -> Result<()> {
    let stores = Stores::open(settings)?;
    let odfs = find_odfs(&stores.local, group, OdfExtension::Text)
        .context("Failed to list text ODFs")?;
    if odfs.is_empty() {
        if !quiet {
            println!("No text ODFs found under {}", stores.local.root().display());
        }
        return Ok(());
    }

    let progress = progress_bar(odfs.len(), quiet);
    progress.set_prefix(if kv { "upload" } else { "convert" });

    let mut written = 0usize;
    let mut skipped = 0usize;
    let mut failures = 0usize;
    for (group, name) in &odfs {
        progress.set_message(name.to_string());
        let result = if kv {
            upload_text_odf(&stores.local, &stores.kv, group, name)
        } else {
            convert_text_odf(&stores.local, group, name, force).map(usize::from)
        };
        match result {
            Ok(0) => skipped += 1,
            Ok(count) => written += count,
            Err(e) => {
                error!(group = %group, odf = %name, error = %e, "export failed");
                failures += 1;
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    if !quiet {
        if kv {
            println!("Uploaded {written} rows from {} ODFs", odfs.len() - failures);
        } else {
            println!("Converted {written} ODFs, skipped {skipped} existing");
        }
    }
    if failures > 0 {
        anyhow::bail!("{failures} out of {} exports failed", odfs.len());
    }
    Ok(())
}
