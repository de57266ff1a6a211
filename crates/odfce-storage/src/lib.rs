//! Persistence collaborators for odfce.
//!
//! - [`BlobStore`] - Path-addressed byte blobs ([`FsBlobStore`], [`MemoryBlobStore`])
//! - [`SymbolLock`] - Per-symbol lock file held for the length of a pass
//! - [`RecordKvStore`] - Tables of scalar rows ([`FsKvStore`], [`MemoryKvStore`])
//! - [`BatchWriter`] - Chunked batch writes with retry of rejected rows

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/odfce/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod batch;
mod blob;
mod error;
mod kv;
mod lock;

pub use batch::{BATCH_SIZE, BatchWriter, RetryPolicy};
pub use blob::{BlobStore, FsBlobStore, MemoryBlobStore, default_data_root};
pub use error::{IoOp, Result, StorageError};
pub use kv::{FsKvStore, MemoryKvStore, RecordKvStore, ScalarRow, TableSchema, Throughput};
pub use lock::SymbolLock;
