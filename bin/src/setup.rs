//! Logging, settings and store setup shared by the commands.

use anyhow::{Context, Result};
use odfce_lib::{FsBlobStore, FsKvStore, Settings, default_data_root};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Installs the tracing subscriber. `RUST_LOG` overrides the verbosity flag.
pub(crate) fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the settings file, or the defaults when none is given.
pub(crate) fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => Ok(Settings::default()),
    }
}

/// The filesystem stores a run works against.
#[derive(Debug)]
pub(crate) struct Stores {
    /// ODFs, FIFOs and long chunks.
    pub(crate) local: FsBlobStore,
    /// Short chunks and FCE headers.
    pub(crate) remote: FsBlobStore,
    /// Key-value tables.
    pub(crate) kv: FsKvStore,
}

impl Stores {
    /// Opens the stores under the settings' roots.
    pub(crate) fn open(settings: &Settings) -> Result<Self> {
        let data_root = settings.data_root.clone().unwrap_or_else(default_data_root);
        let archive_root = settings
            .archive_root()
            .map_or_else(|| data_root.clone(), Path::to_path_buf);
        let kv_root: PathBuf = data_root.join("kv");

        Ok(Self {
            local: FsBlobStore::new(data_root.clone())
                .with_context(|| format!("Failed to open data root {}", data_root.display()))?,
            remote: FsBlobStore::new(archive_root.clone()).with_context(|| {
                format!("Failed to open archive root {}", archive_root.display())
            })?,
            kv: FsKvStore::new(kv_root).context("Failed to open the key-value store")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odfce_lib::BlobStore;

    #[test]
    fn test_load_settings() {
        assert_eq!(load_settings(None).unwrap(), Settings::default());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odfce.yaml");
        std::fs::write(&path, "chunk_size: 720\nintervals:\n  L32: false\n").unwrap();
        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.chunk_size, 720);
        assert!(!settings.intervals.is_enabled(32));

        assert!(load_settings(Some(&dir.path().join("missing.yaml"))).is_err());
    }

    #[test]
    fn test_stores_share_root_without_archive() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            data_root: Some(dir.path().join("data")),
            ..Settings::default()
        };
        let stores = Stores::open(&settings).unwrap();
        stores.remote.write("FX/fce/x.fce", b"x").unwrap();
        assert!(stores.local.exists("FX/fce/x.fce").unwrap());
        assert!(dir.path().join("data/kv").is_dir());
    }
}
