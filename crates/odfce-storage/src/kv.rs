//! Record key-value store.
//!
//! Tables hold scalar rows (JSON objects) addressed by a hash key and an
//! optional range key. Each symbol group owns one ODF table keyed by
//! `ODF_NAME`/`ODF_RECNO`; FCE headers live in a separate table keyed by
//! `FCE_NAME`.

use odfce_types::OdfName;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::{IoOp, Result, StorageError};

/// One row: attribute name to scalar value.
pub type ScalarRow = serde_json::Map<String, Value>;

/// Key attributes of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Partition key attribute.
    pub hash_key: String,
    /// Optional sort key attribute.
    pub range_key: Option<String>,
}

impl TableSchema {
    /// Hash key attribute of ODF tables.
    pub const ODF_HASH_KEY: &'static str = "ODF_NAME";
    /// Range key attribute of ODF tables.
    pub const ODF_RANGE_KEY: &'static str = "ODF_RECNO";
    /// Hash key attribute of the FCE table.
    pub const FCE_HASH_KEY: &'static str = "FCE_NAME";

    /// Schema of a symbol group's ODF table.
    #[must_use]
    pub fn odf() -> Self {
        Self {
            hash_key: Self::ODF_HASH_KEY.into(),
            range_key: Some(Self::ODF_RANGE_KEY.into()),
        }
    }

    /// Schema of the FCE header table.
    #[must_use]
    pub fn fce() -> Self {
        Self {
            hash_key: Self::FCE_HASH_KEY.into(),
            range_key: None,
        }
    }

    /// Composite key of `row`, or `None` if a key attribute is missing.
    fn key_of(&self, row: &ScalarRow) -> Option<String> {
        let hash = scalar_key(row.get(&self.hash_key)?)?;
        match &self.range_key {
            Some(range) => Some(format!("{hash}#{}", scalar_key(row.get(range)?)?)),
            None => Some(hash),
        }
    }
}

fn scalar_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Provisioned throughput of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Throughput {
    /// Read units.
    pub read: u32,
    /// Write units.
    pub write: u32,
}

impl Default for Throughput {
    fn default() -> Self {
        Self { read: 1, write: 2 }
    }
}

/// Tables of scalar rows.
pub trait RecordKvStore: Send + Sync + std::fmt::Debug {
    /// Names of the symbol groups (tables keyed by `ODF_NAME`).
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn list_symbol_groups(&self) -> Result<Vec<String>>;

    /// Distinct symbols with rows in `group`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TableNotFound`] if the group has no table.
    fn list_symbols(&self, group: &str) -> Result<Vec<String>>;

    /// Reads one row by key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TableNotFound`] if the table does not exist.
    fn read_scalar_row(&self, table: &str, hash: &str, range: Option<&str>)
    -> Result<Option<ScalarRow>>;

    /// Writes a batch of rows, returning the rows the store rejected.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::MissingKey`] for rows without key attributes.
    fn write_scalar_rows_batch(&self, table: &str, rows: &[ScalarRow]) -> Result<Vec<ScalarRow>>;

    /// Creates `name` if absent and returns its schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be created.
    fn create_or_get_table(
        &self,
        name: &str,
        schema: &TableSchema,
        throughput: Throughput,
    ) -> Result<TableSchema>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Table {
    schema: Option<TableSchema>,
    throughput: Throughput,
    rows: BTreeMap<String, ScalarRow>,
}

impl Table {
    fn schema(&self, name: &str) -> Result<&TableSchema> {
        self.schema
            .as_ref()
            .ok_or_else(|| StorageError::TableNotFound(name.to_string()))
    }

    fn is_group(&self) -> bool {
        self.schema
            .as_ref()
            .is_some_and(|s| s.hash_key == TableSchema::ODF_HASH_KEY)
    }

    fn symbols(&self) -> Vec<String> {
        let symbols: BTreeSet<String> = self
            .rows
            .values()
            .filter_map(|row| row.get(TableSchema::ODF_HASH_KEY)?.as_str().map(str::to_owned))
            .filter_map(|name| OdfName::parse(&name).ok())
            .map(|name| name.symbol().to_string())
            .collect();
        symbols.into_iter().collect()
    }

    fn read(&self, name: &str, hash: &str, range: Option<&str>) -> Result<Option<ScalarRow>> {
        let schema = self.schema(name)?;
        let key = match (&schema.range_key, range) {
            (Some(_), Some(range)) => format!("{hash}#{range}"),
            _ => hash.to_string(),
        };
        Ok(self.rows.get(&key).cloned())
    }

    fn put(&mut self, name: &str, row: ScalarRow) -> Result<()> {
        let schema = self.schema(name)?;
        let key = schema.key_of(&row).ok_or_else(|| StorageError::MissingKey {
            table: name.to_string(),
            key: schema.hash_key.clone(),
        })?;
        self.rows.insert(key, row);
        Ok(())
    }
}

/// In-memory key-value store.
///
/// [`MemoryKvStore::reject_rows`] makes the next writes reject rows, the way
/// a throttled remote table drops part of a batch.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    tables: Mutex<BTreeMap<String, Table>>,
    pending_rejections: Mutex<usize>,
}

impl MemoryKvStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, BTreeMap<String, Table>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rejects the next `count` rows written, across batches.
    pub fn reject_rows(&self, count: usize) {
        *self
            .pending_rejections
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = count;
    }

    /// Number of rows in `table`.
    #[must_use]
    pub fn row_count(&self, table: &str) -> usize {
        self.tables().get(table).map_or(0, |t| t.rows.len())
    }
}

impl RecordKvStore for MemoryKvStore {
    fn list_symbol_groups(&self) -> Result<Vec<String>> {
        Ok(self
            .tables()
            .iter()
            .filter(|(_, t)| t.is_group())
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn list_symbols(&self, group: &str) -> Result<Vec<String>> {
        self.tables()
            .get(group)
            .map(Table::symbols)
            .ok_or_else(|| StorageError::TableNotFound(group.to_string()))
    }

    fn read_scalar_row(
        &self,
        table: &str,
        hash: &str,
        range: Option<&str>,
    ) -> Result<Option<ScalarRow>> {
        self.tables()
            .get(table)
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))?
            .read(table, hash, range)
    }

    fn write_scalar_rows_batch(&self, table: &str, rows: &[ScalarRow]) -> Result<Vec<ScalarRow>> {
        let mut pending = self
            .pending_rejections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let reject = (*pending).min(rows.len());
        *pending -= reject;

        let accepted = rows.len() - reject;
        let mut tables = self.tables();
        let target = tables
            .get_mut(table)
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))?;
        for row in &rows[..accepted] {
            target.put(table, row.clone())?;
        }
        Ok(rows[accepted..].to_vec())
    }

    fn create_or_get_table(
        &self,
        name: &str,
        schema: &TableSchema,
        throughput: Throughput,
    ) -> Result<TableSchema> {
        let mut tables = self.tables();
        let table = tables.entry(name.to_string()).or_insert_with(|| Table {
            schema: Some(schema.clone()),
            throughput,
            rows: BTreeMap::new(),
        });
        table.schema(name).cloned()
    }
}

/// Key-value store persisted as one JSON file per table.
#[derive(Debug)]
pub struct FsKvStore {
    root: PathBuf,
    guard: Mutex<()>,
}

impl FsKvStore {
    /// Creates a store under `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(root: PathBuf) -> Result<Self> {
        if !root.exists() {
            fs::create_dir_all(&root).map_err(StorageError::io(IoOp::CreateDir, &root))?;
        }
        Ok(Self {
            root,
            guard: Mutex::new(()),
        })
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.json"))
    }

    fn load(&self, name: &str) -> Result<Option<Table>> {
        let path = self.table_path(name);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path).map_err(StorageError::io(IoOp::Read, &path))?;
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|source| StorageError::CorruptTable { path, source })
    }

    fn save(&self, name: &str, table: &Table) -> Result<()> {
        let path = self.table_path(name);
        let json = serde_json::to_string_pretty(table)?;
        fs::write(&path, json).map_err(StorageError::io(IoOp::Write, &path))
    }

    fn load_existing(&self, name: &str) -> Result<Table> {
        self.load(name)?
            .ok_or_else(|| StorageError::TableNotFound(name.to_string()))
    }

    fn table_names(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(StorageError::io(IoOp::ListDir, &self.root))?;
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        Ok(names)
    }
}

impl RecordKvStore for FsKvStore {
    fn list_symbol_groups(&self) -> Result<Vec<String>> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let mut groups = Vec::new();
        for name in self.table_names()? {
            if self.load(&name)?.is_some_and(|t| t.is_group()) {
                groups.push(name);
            }
        }
        Ok(groups)
    }

    fn list_symbols(&self, group: &str) -> Result<Vec<String>> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load_existing(group)?.symbols())
    }

    fn read_scalar_row(
        &self,
        table: &str,
        hash: &str,
        range: Option<&str>,
    ) -> Result<Option<ScalarRow>> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        self.load_existing(table)?.read(table, hash, range)
    }

    fn write_scalar_rows_batch(&self, table: &str, rows: &[ScalarRow]) -> Result<Vec<ScalarRow>> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let mut target = self.load_existing(table)?;
        for row in rows {
            target.put(table, row.clone())?;
        }
        self.save(table, &target)?;
        debug!(table, rows = rows.len(), "batch written");
        Ok(Vec::new())
    }

    fn create_or_get_table(
        &self,
        name: &str,
        schema: &TableSchema,
        throughput: Throughput,
    ) -> Result<TableSchema> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = self.load(name)? {
            return existing.schema(name).cloned();
        }
        let table = Table {
            schema: Some(schema.clone()),
            throughput,
            rows: BTreeMap::new(),
        };
        self.save(name, &table)?;
        Ok(schema.clone())
    }
}
