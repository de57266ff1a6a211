//! Rust library for turning minute-resolution ODF market data into quantized
//! FCE chunks.
//!
//! This is a facade crate that re-exports functionality from the odfce
//! workspace crates for convenient access.
//!
//! # Quick Start
//!
//! ```ignore
//! use odfce_lib::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::default();
//!     let local = FsBlobStore::with_default_root()?;
//!     let processor = Processor::new(&local, &local, &settings, chrono::Utc::now())?;
//!
//!     for (group, name) in processor.list_odfs(None)? {
//!         let report = processor.process(&group, &name)?;
//!         println!("{group}/{name}: {}", report.status);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/odfce/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use odfce_types::*;

// Re-export the codec
pub use odfce_codec::{Cipher, Codec, Field, FieldKind, Schema, Value, layout};

// Re-export the record store and FIFO
pub use odfce_odf::{Fifo, RecordStore, TradingLimits};

// Re-export storage collaborators
#[cfg(feature = "storage")]
pub use odfce_storage::{
    BatchWriter, BlobStore, FsBlobStore, FsKvStore, MemoryBlobStore, MemoryKvStore,
    RecordKvStore, StorageError, SymbolLock, TableSchema, default_data_root,
};

// Re-export path layout and formatters
#[cfg(feature = "format")]
pub use odfce_format::{
    BlobLayout, ChunkExtension, CsvFormatter, FormatError, Formatter, JsonFormatter,
    OdfExtension,
};

// Re-export aggregation
#[cfg(feature = "aggregate")]
pub use odfce_aggregate::{
    Chunk, ChunkAddress, ChunkId, ChunkSource, Fce, PassContext, PassError, PassOutcome,
    PassReport, PassStatus, Processor, ShortChunk, ZeroChunks, convert_text_odf, find_odfs,
    run_pass, upload_text_odf,
};

/// Prelude module for convenient imports.
///
/// ```
/// use odfce_lib::prelude::*;
/// ```
pub mod prelude {
    pub use odfce_types::{
        Decimal, Epoch, HeaderField, IntervalTable, OdfName, OdfceError, Record, RecordField,
        Result, Settings,
    };

    pub use odfce_odf::{Fifo, RecordStore};

    #[cfg(feature = "storage")]
    pub use odfce_storage::{BlobStore, FsBlobStore, MemoryBlobStore, RecordKvStore};

    #[cfg(feature = "format")]
    pub use odfce_format::{BlobLayout, CsvFormatter, Formatter};

    #[cfg(feature = "aggregate")]
    pub use odfce_aggregate::{Fce, PassReport, PassStatus, Processor};
}
