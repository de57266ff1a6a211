//! Per-symbol processing against the blob and key-value stores.
//!
//! The local store holds ODFs, FIFOs, long chunks and lock files; the remote
//! store receives short chunks and FCE headers. A processed pass stages
//! every blob first and moves them into place only once all of them are
//! written, the ODF last, so a failed flush leaves neither the watermark nor
//! the cached chunks advanced.

use chrono::{DateTime, Utc};
use odfce_codec::Cipher;
use odfce_format::{BlobLayout, ChunkExtension, CsvFormatter, Formatter, OdfExtension};
use odfce_odf::{Fifo, RecordStore, TradingLimits};
use odfce_storage::{
    BatchWriter, BlobStore, RecordKvStore, SymbolLock, TableSchema, Throughput,
};
use odfce_types::{
    Decimal, Epoch, HeaderField, IntervalTable, OdfName, OdfceError, RecordField, Settings,
};
use tracing::{debug, info, warn};

use crate::{
    Chunk, ChunkId, ChunkSource, FCE_TABLE, Fce, FinishedChunk, PassContext, PassOutcome,
    PassResult, ShortChunk, run_pass,
};

/// ODFs of storage form `ext` under `{group}/odf/`, as `(group, name)`
/// pairs in path order.
///
/// # Errors
///
/// Returns a storage error if the store cannot be listed.
pub fn find_odfs(
    store: &dyn BlobStore,
    group: Option<&str>,
    ext: OdfExtension,
) -> PassResult<Vec<(String, OdfName)>> {
    let prefix = group.map(|g| BlobLayout::new(g).odf_prefix()).unwrap_or_default();
    let mut found = Vec::new();
    for path in store.list(&prefix)? {
        let Some((name, found_ext)) = BlobLayout::parse_odf_path(&path) else {
            continue;
        };
        let Some(group) = path.split('/').next() else {
            continue;
        };
        if found_ext == ext && BlobLayout::new(group).odf(&name, ext) == path {
            found.push((group.to_string(), name));
        }
    }
    Ok(found)
}

/// Final state of one symbol's pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStatus {
    /// The ODF was moved to the archive.
    Archived,
    /// Nothing new to aggregate.
    UpToDate,
    /// New records were aggregated and flushed.
    Processed,
}

impl std::fmt::Display for PassStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Archived => "archived",
            Self::UpToDate => "up to date",
            Self::Processed => "processed",
        })
    }
}

/// Summary of one symbol's pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    /// Group the ODF belongs to.
    pub group: String,
    /// The processed ODF.
    pub name: OdfName,
    /// Final state.
    pub status: PassStatus,
    /// Records aggregated.
    pub records: usize,
    /// Records gap-filled.
    pub gap_filled: usize,
    /// Chunks flushed.
    pub chunks: usize,
}

/// Runs passes for the ODFs of one data root.
#[derive(Debug)]
pub struct Processor<'a> {
    local: &'a dyn BlobStore,
    remote: &'a dyn BlobStore,
    kv: Option<&'a dyn RecordKvStore>,
    settings: &'a Settings,
    cipher: Cipher,
    now: DateTime<Utc>,
}

impl<'a> Processor<'a> {
    /// Creates a processor.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings' cipher key is invalid.
    pub fn new(
        local: &'a dyn BlobStore,
        remote: &'a dyn BlobStore,
        settings: &'a Settings,
        now: DateTime<Utc>,
    ) -> PassResult<Self> {
        let key = settings.cipher_key_bytes().map_err(OdfceError::from)?;
        Ok(Self {
            local,
            remote,
            kv: None,
            settings,
            cipher: Cipher::new(key)?,
            now,
        })
    }

    /// Publishes FCE rows to `kv` after every processed pass.
    #[must_use]
    pub fn with_kv(mut self, kv: &'a dyn RecordKvStore) -> Self {
        self.kv = Some(kv);
        self
    }

    /// Epoch of the current calendar week.
    #[must_use]
    pub fn current_epoch(&self) -> Epoch {
        Epoch::current(self.now)
    }

    /// Cipher applied to FCE headers.
    #[must_use]
    pub const fn cipher(&self) -> &Cipher {
        &self.cipher
    }

    fn chunk_cipher(&self) -> Option<&Cipher> {
        self.settings.encrypt_chunks.then_some(&self.cipher)
    }

    /// Binary ODFs in the local store as `(group, name)` pairs, optionally
    /// restricted to one group.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store cannot be listed.
    pub fn list_odfs(&self, group: Option<&str>) -> PassResult<Vec<(String, OdfName)>> {
        find_odfs(self.local, group, OdfExtension::Binary)
    }

    fn load_store(&self, layout: &BlobLayout, name: &OdfName) -> PassResult<(RecordStore, Vec<u8>)> {
        let bytes = self.local.read(&layout.odf(name, OdfExtension::Binary))?;
        let store = RecordStore::load(&mut bytes.as_slice())?;
        Ok((store, bytes))
    }

    fn stage_write(
        &self,
        store: &dyn BlobStore,
        layout: &BlobLayout,
        path: &str,
        bytes: &[u8],
    ) -> PassResult<()> {
        let staging = layout.staging(path);
        store.write(&staging, bytes)?;
        store.move_blob(&staging, path)?;
        Ok(())
    }

    /// Returns the ODF's FIFO, building or refreshing it as needed.
    ///
    /// An absent FIFO is built from the store; one older than
    /// `fifo_max_age_days` is merged with the current window and its header
    /// recomputed; a fresh one is reused as is.
    ///
    /// # Errors
    ///
    /// Returns a storage or decode error.
    pub fn refresh_fifo(
        &self,
        layout: &BlobLayout,
        name: &OdfName,
        store: &RecordStore,
        limits: &TradingLimits,
    ) -> PassResult<Fifo> {
        let path = layout.fifo(name);
        let count = self.settings.fifo_count;
        if !self.local.exists(&path)? {
            let fifo = Fifo::build_from_window(store, count, limits);
            debug!(fifo = %path, records = fifo.len(), "built FIFO");
            self.stage_write(self.local, layout, &path, &fifo.encode()?)?;
            return Ok(fifo);
        }

        let mut fifo = Fifo::load(&mut self.local.read(&path)?.as_slice())?;
        let modified = self.local.modified(&path)?;
        if Fifo::is_stale(modified, self.now, self.settings.fifo_max_age_days) {
            warn!(fifo = %path, %modified, "stale FIFO, refreshing");
            fifo.update_from_list(Fifo::window(store, count, limits).into_values());
            self.stage_write(self.local, layout, &path, &fifo.encode()?)?;
        }
        Ok(fifo)
    }

    /// Refreshes the derived headers before a pass.
    ///
    /// TICK and OHLC_DIVIDER come from the FIFO when missing, a missing
    /// LAST_FCED_RECNO starts at 0, HIGHEST_RECNO and HIGHEST_RECNO_CLOSE are
    /// recomputed every time, and a missing PREV_HIGHEST_RECNO_CLOSE is taken
    /// from the previous week's FCE or else the first OPEN of the week.
    ///
    /// # Errors
    ///
    /// Returns an error if the previous FCE exists but cannot be read.
    pub fn backfill_headers(
        &self,
        layout: &BlobLayout,
        name: &OdfName,
        store: &mut RecordStore,
        fifo: &Fifo,
        limits: &TradingLimits,
    ) -> PassResult<()> {
        store.add_missing_header(HeaderField::Tick, Decimal::from(fifo.tick()));
        store.add_missing_header(HeaderField::OhlcDivider, Decimal::from(fifo.divider()));
        if store.header(HeaderField::LastFcedRecno).is_none() {
            store.set_header(HeaderField::LastFcedRecno, Decimal::ZERO);
        }

        let highest = store.find_highest_valid_recno(limits).unwrap_or(0);
        store.set_header(HeaderField::HighestRecno, Decimal::from(highest));
        store.set_header(
            HeaderField::HighestRecnoClose,
            store.value(highest, RecordField::Close),
        );

        if store
            .header(HeaderField::PrevHighestRecnoClose)
            .is_none_or(|v| v.is_zero())
        {
            let prev_path = layout.fce_header(name.symbol(), name.epoch().previous_week());
            let prev = Fce::load_or_create(self.remote, &prev_path, &self.cipher)?
                .get(HeaderField::HighestRecnoClose);
            let value = if prev.is_zero() {
                store.find_first_non_zero_open(limits).unwrap_or_default()
            } else {
                prev
            };
            store.add_missing_header(HeaderField::PrevHighestRecnoClose, value);
        }
        Ok(())
    }

    /// Renders the ODF's FIFO as text without writing anything.
    ///
    /// # Errors
    ///
    /// Returns a storage or decode error.
    pub fn fifo_text(&self, group: &str, name: &OdfName) -> PassResult<String> {
        let layout = BlobLayout::new(group);
        let path = layout.fifo(name);
        let fifo = if self.local.exists(&path)? {
            Fifo::load(&mut self.local.read(&path)?.as_slice())?
        } else {
            let (store, _) = self.load_store(&layout, name)?;
            let limits = store.limits(self.settings.recno_cycle)?;
            Fifo::build_from_window(&store, self.settings.fifo_count, &limits)
        };
        Ok(fifo.to_text())
    }

    /// Runs one pass for the ODF `name` of `group` and flushes the results.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::PassError`] if the symbol is locked, any blob is
    /// unreadable or the pass aborts; in that case the ODF is not rewritten.
    pub fn process(&self, group: &str, name: &OdfName) -> PassResult<PassReport> {
        let layout = BlobLayout::new(group);
        let _lock = SymbolLock::acquire(self.local, layout.lock(name.symbol()))?;

        let (mut store, original) = self.load_store(&layout, name)?;
        let limits = store.limits(self.settings.recno_cycle)?;
        let fifo = self.refresh_fifo(&layout, name, &store, &limits)?;
        self.backfill_headers(&layout, name, &mut store, &fifo, &limits)?;

        let intervals = IntervalTable::standard(limits.trading_start, &self.settings.intervals);
        let ctx = PassContext {
            name,
            current_epoch: self.current_epoch(),
            settings: self.settings,
            intervals: &intervals,
        };
        let mut source = BlobChunkSource {
            processor: self,
            layout: &layout,
            symbol: name.symbol(),
            tick: fifo.tick(),
            divider: fifo.divider(),
        };
        let outcome = run_pass(&mut store, &ctx, &mut source)?;

        let odf_path = layout.odf(name, OdfExtension::Binary);
        let mut report = PassReport {
            group: group.to_string(),
            name: name.clone(),
            status: PassStatus::UpToDate,
            records: 0,
            gap_filled: 0,
            chunks: 0,
        };
        match outcome {
            PassOutcome::Archived => {
                self.stage_write(self.local, &layout, &odf_path, &store.encode()?)?;
                let archived = layout.archived_odf(name);
                self.local.move_blob(&odf_path, &archived)?;
                info!(odf = %name, to = %archived, "archived");
                report.status = PassStatus::Archived;
            }
            PassOutcome::UpToDate => {
                let encoded = store.encode()?;
                if encoded != original {
                    self.stage_write(self.local, &layout, &odf_path, &encoded)?;
                }
                debug!(odf = %name, "up to date");
            }
            PassOutcome::Processed {
                records,
                gap_filled,
                chunks,
            } => {
                let fce = Fce::from_store(&store);
                let mut staged = StagedWrites::new(&layout);
                if let Err(e) = self.stage_pass(&mut staged, name, &store, &fce, &chunks) {
                    staged.discard();
                    return Err(e);
                }
                let moved = staged.commit()?;
                debug!(odf = %name, blobs = moved, "flushed");
                self.publish_fce(name, &fce)?;

                report.status = PassStatus::Processed;
                report.records = records;
                report.gap_filled = gap_filled;
                report.chunks = chunks.len();
            }
        }
        Ok(report)
    }

    /// Stages every blob of a processed pass, the ODF last.
    fn stage_pass(
        &self,
        staged: &mut StagedWrites<'a, '_>,
        name: &OdfName,
        store: &RecordStore,
        fce: &Fce,
        chunks: &[FinishedChunk],
    ) -> PassResult<()> {
        let symbol = name.symbol();
        let layout = staged.layout;
        for chunk in chunks {
            let id = chunk.long.id();
            let path = |ext| layout.chunk(symbol, id.l_code, id.epoch, id.chunk_no, ext);

            let short = chunk.short.encode(self.chunk_cipher())?;
            staged.stage(self.remote, path(ChunkExtension::Short), &short)?;

            let mut long = chunk.long.encode_long()?;
            if let Some(cipher) = self.chunk_cipher() {
                cipher.apply(&mut long);
            }
            staged.stage(self.local, path(ChunkExtension::Long), &long)?;

            if self.settings.do_csv_chunk {
                let mut csv = Vec::new();
                CsvFormatter::new().write_records(chunk.long.filled().cells(), &mut csv)?;
                staged.stage(self.local, path(ChunkExtension::Csv), &csv)?;
            }
        }
        staged.stage(
            self.remote,
            layout.fce_header(symbol, name.epoch()),
            &fce.encode(&self.cipher)?,
        )?;
        staged.stage(self.local, layout.odf(name, OdfExtension::Binary), &store.encode()?)?;
        Ok(())
    }

    fn publish_fce(&self, name: &OdfName, fce: &Fce) -> PassResult<()> {
        let Some(kv) = self.kv else {
            return Ok(());
        };
        kv.create_or_get_table(FCE_TABLE, &TableSchema::fce(), Throughput::default())?;
        BatchWriter::new(kv).write_all(FCE_TABLE, &[fce.to_row(name.basename())])?;
        debug!(odf = %name, "published FCE row");
        Ok(())
    }
}

/// Blobs written to staging paths, waiting to be moved into place together.
struct StagedWrites<'a, 'l> {
    layout: &'l BlobLayout,
    staged: Vec<(&'a dyn BlobStore, String, String)>,
}

impl<'a, 'l> StagedWrites<'a, 'l> {
    const fn new(layout: &'l BlobLayout) -> Self {
        Self {
            layout,
            staged: Vec::new(),
        }
    }

    fn stage(&mut self, store: &'a dyn BlobStore, path: String, bytes: &[u8]) -> PassResult<()> {
        let staging = self.layout.staging(&path);
        store.write(&staging, bytes)?;
        self.staged.push((store, staging, path));
        Ok(())
    }

    /// Moves every staged blob into place in staging order.
    fn commit(self) -> PassResult<usize> {
        for (store, staging, path) in &self.staged {
            store.move_blob(staging, path)?;
        }
        Ok(self.staged.len())
    }

    /// Drops the staged copies; the live blobs are untouched.
    fn discard(self) {
        for (store, staging, _) in self.staged {
            if let Err(e) = store.remove(&staging) {
                warn!(blob = %staging, error = %e, "failed to remove staged blob");
            }
        }
    }
}

/// Loads chunks from the local long cache, then the remote short store.
#[derive(Debug)]
struct BlobChunkSource<'p, 'a> {
    processor: &'p Processor<'a>,
    layout: &'p BlobLayout,
    symbol: &'p str,
    tick: u32,
    divider: u32,
}

impl ChunkSource for BlobChunkSource<'_, '_> {
    fn load(&mut self, id: ChunkId, size: u32) -> PassResult<Chunk> {
        let p = self.processor;
        let path = |ext| {
            self.layout
                .chunk(self.symbol, id.l_code, id.epoch, id.chunk_no, ext)
        };

        let long_path = path(ChunkExtension::Long);
        if p.local.exists(&long_path)? {
            let mut bytes = p.local.read(&long_path)?;
            if let Some(cipher) = p.chunk_cipher() {
                cipher.apply(&mut bytes);
            }
            return Ok(Chunk::decode_long(id, size, &bytes)?);
        }

        let short_path = path(ChunkExtension::Short);
        if p.remote.exists(&short_path)? {
            let bytes = p.remote.read(&short_path)?;
            let short = ShortChunk::decode(id, size, &bytes, p.chunk_cipher())?;
            debug!(chunk = %id, "restored from short chunk");
            return Ok(short.dequantize_to_long(self.tick, self.divider));
        }
        Ok(Chunk::new(id, size))
    }
}
