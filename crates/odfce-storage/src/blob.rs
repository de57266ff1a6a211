//! Path-addressed blob storage.

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::{IoOp, Result, StorageError};

/// A store of byte blobs addressed by `/`-separated paths.
pub trait BlobStore: Send + Sync + std::fmt::Debug {
    /// Returns true if a blob exists at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn exists(&self, path: &str) -> Result<bool>;

    /// Reads the blob at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if there is no such blob.
    fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Writes `bytes` to `path`, replacing any existing blob.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob cannot be written.
    fn write(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// Writes `bytes` to `path` only if no blob exists there yet.
    ///
    /// Returns false if the path was already taken.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob cannot be written.
    fn create_new(&self, path: &str, bytes: &[u8]) -> Result<bool>;

    /// Moves the blob at `from` to `to`, replacing any blob at `to`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if `from` does not exist.
    fn move_blob(&self, from: &str, to: &str) -> Result<()>;

    /// Lists every blob path starting with `prefix`, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Last modification time of the blob at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if there is no such blob.
    fn modified(&self, path: &str) -> Result<DateTime<Utc>>;

    /// Removes the blob at `path`. Removing a missing blob is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob cannot be removed.
    fn remove(&self, path: &str) -> Result<()>;
}

/// Returns the default root for odfce data.
///
/// Uses the platform data directory (`~/.local/share/odfce/` on Linux) and
/// falls back to `~/.odfce/`.
#[must_use]
pub fn default_data_root() -> PathBuf {
    ProjectDirs::from("", "", "odfce").map_or_else(dirs_fallback, |proj_dirs| {
        proj_dirs.data_dir().to_path_buf()
    })
}

fn dirs_fallback() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".odfce")
}

/// Blob store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Creates a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(root: PathBuf) -> Result<Self> {
        if !root.exists() {
            fs::create_dir_all(&root).map_err(StorageError::io(IoOp::CreateDir, &root))?;
        }
        Ok(Self { root })
    }

    /// Creates a store at [`default_data_root`].
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn with_default_root() -> Result<Self> {
        Self::new(default_data_root())
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a blob path onto the filesystem, rejecting paths that leave the root.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let clean = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || !clean {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(StorageError::io(IoOp::CreateDir, parent))?;
        }
        Ok(())
    }

    fn walk(&self, dir: &Path, out: &mut Vec<String>) -> Result<()> {
        let entries = fs::read_dir(dir).map_err(StorageError::io(IoOp::ListDir, dir))?;
        for entry in entries {
            let entry = entry.map_err(StorageError::io(IoOp::ListDir, dir))?;
            let path = entry.path();
            if path.is_dir() {
                self.walk(&path, out)?;
            } else if let Ok(relative) = path.strip_prefix(&self.root) {
                let key: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                out.push(key.join("/"));
            }
        }
        Ok(())
    }
}

impl BlobStore for FsBlobStore {
    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.resolve(path)?.is_file())
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path)?;
        fs::read(&full).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::NotFound(path.to_string())
            } else {
                StorageError::io(IoOp::Read, &full)(e)
            }
        })
    }

    fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;
        Self::ensure_parent(&full)?;
        fs::write(&full, bytes).map_err(StorageError::io(IoOp::Write, &full))
    }

    fn create_new(&self, path: &str, bytes: &[u8]) -> Result<bool> {
        let full = self.resolve(path)?;
        Self::ensure_parent(&full)?;
        match OpenOptions::new().write(true).create_new(true).open(&full) {
            Ok(mut file) => {
                file.write_all(bytes)
                    .map_err(StorageError::io(IoOp::Write, &full))?;
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(StorageError::io(IoOp::Write, &full)(e)),
        }
    }

    fn move_blob(&self, from: &str, to: &str) -> Result<()> {
        let src = self.resolve(from)?;
        let dst = self.resolve(to)?;
        if !src.is_file() {
            return Err(StorageError::NotFound(from.to_string()));
        }
        Self::ensure_parent(&dst)?;
        debug!(from, to, "moving blob");
        fs::rename(&src, &dst).map_err(StorageError::io(IoOp::Rename, &src))
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let dir_part = prefix.rsplit_once('/').map_or("", |(dir, _)| dir);
        let base = if dir_part.is_empty() {
            self.root.clone()
        } else {
            self.resolve(dir_part)?
        };
        if !base.is_dir() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        self.walk(&base, &mut out)?;
        out.retain(|key| key.starts_with(prefix));
        out.sort();
        Ok(out)
    }

    fn modified(&self, path: &str) -> Result<DateTime<Utc>> {
        let full = self.resolve(path)?;
        let meta = fs::metadata(&full).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::NotFound(path.to_string())
            } else {
                StorageError::io(IoOp::Read, &full)(e)
            }
        })?;
        let modified = meta.modified().map_err(StorageError::io(IoOp::Read, &full))?;
        Ok(DateTime::<Utc>::from(modified))
    }

    fn remove(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        match fs::remove_file(&full) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(IoOp::Remove, &full)(e)),
        }
    }
}

#[derive(Debug, Clone)]
struct MemoryBlob {
    bytes: Vec<u8>,
    modified: DateTime<Utc>,
}

/// In-memory blob store.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<String, MemoryBlob>>,
}

impl MemoryBlobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn blobs(&self) -> MutexGuard<'_, BTreeMap<String, MemoryBlob>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overrides the modification time of an existing blob.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if there is no such blob.
    pub fn set_modified(&self, path: &str, modified: DateTime<Utc>) -> Result<()> {
        let mut blobs = self.blobs();
        let blob = blobs
            .get_mut(path)
            .ok_or_else(|| StorageError::NotFound(path.to_string()))?;
        blob.modified = modified;
        Ok(())
    }

    /// Number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs().len()
    }

    /// Returns true if the store holds no blobs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs().is_empty()
    }
}

impl BlobStore for MemoryBlobStore {
    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.blobs().contains_key(path))
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.blobs()
            .get(path)
            .map(|b| b.bytes.clone())
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.blobs().insert(
            path.to_string(),
            MemoryBlob {
                bytes: bytes.to_vec(),
                modified: Utc::now(),
            },
        );
        Ok(())
    }

    fn create_new(&self, path: &str, bytes: &[u8]) -> Result<bool> {
        let mut blobs = self.blobs();
        if blobs.contains_key(path) {
            return Ok(false);
        }
        blobs.insert(
            path.to_string(),
            MemoryBlob {
                bytes: bytes.to_vec(),
                modified: Utc::now(),
            },
        );
        Ok(true)
    }

    fn move_blob(&self, from: &str, to: &str) -> Result<()> {
        let mut blobs = self.blobs();
        let blob = blobs
            .remove(from)
            .ok_or_else(|| StorageError::NotFound(from.to_string()))?;
        blobs.insert(to.to_string(), blob);
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .blobs()
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn modified(&self, path: &str) -> Result<DateTime<Utc>> {
        self.blobs()
            .get(path)
            .map(|b| b.modified)
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    fn remove(&self, path: &str) -> Result<()> {
        self.blobs().remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn exercise(store: &dyn BlobStore) {
        assert!(!store.exists("FX/odf/A-1861332.rs3").unwrap());
        store.write("FX/odf/A-1861332.rs3", b"abc").unwrap();
        store.write("FX/odf/B-1861332.rs3", b"de").unwrap();
        store.write("FX/fifo/A-1861332.fif", b"f").unwrap();

        assert!(store.exists("FX/odf/A-1861332.rs3").unwrap());
        assert_eq!(store.read("FX/odf/A-1861332.rs3").unwrap(), b"abc");
        assert_eq!(
            store.list("FX/odf/").unwrap(),
            vec!["FX/odf/A-1861332.rs3", "FX/odf/B-1861332.rs3"]
        );
        assert_eq!(store.list("FX/").unwrap().len(), 3);
        assert!(store.list("GOLD/").unwrap().is_empty());

        store
            .move_blob("FX/odf/B-1861332.rs3", "FX/archive/B-1861332.rs3")
            .unwrap();
        assert!(!store.exists("FX/odf/B-1861332.rs3").unwrap());
        assert_eq!(store.read("FX/archive/B-1861332.rs3").unwrap(), b"de");

        assert!(store.create_new("FX/lock/A.lock", b"1").unwrap());
        assert!(!store.create_new("FX/lock/A.lock", b"2").unwrap());
        store.remove("FX/lock/A.lock").unwrap();
        store.remove("FX/lock/A.lock").unwrap();
        assert!(store.create_new("FX/lock/A.lock", b"3").unwrap());

        assert!(store.modified("FX/fifo/A-1861332.fif").is_ok());
        assert!(matches!(
            store.read("FX/odf/missing.rs3"),
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            store.move_blob("FX/odf/missing.rs3", "FX/odf/x.rs3"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryBlobStore::new());
    }

    #[test]
    fn test_fs_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path().join("data")).unwrap();
        exercise(&store);
        assert!(temp_dir.path().join("data/FX/archive/B-1861332.rs3").exists());
    }

    #[test]
    fn test_fs_rejects_escaping_paths() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path().to_path_buf()).unwrap();
        assert!(matches!(
            store.write("../outside", b"x"),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(store.read(""), Err(StorageError::InvalidPath(_))));
    }

    #[test]
    fn test_memory_set_modified() {
        let store = MemoryBlobStore::new();
        store.write("a", b"1").unwrap();
        let then = Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap();
        store.set_modified("a", then).unwrap();
        assert_eq!(store.modified("a").unwrap(), then);
        assert!(store.set_modified("b", then).is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_default_data_root() {
        let root = default_data_root();
        assert!(root.ends_with("odfce") || root.ends_with(".odfce"));
    }
}
