//! Chunk aggregation and the per-symbol pass for odfce.
//!
//! - [`ChunkAddress`] - Maps an ODF recno to its chunk and cell for one interval
//! - [`Chunk`] / [`ShortChunk`] - Long decimal chunks and their quantized 16-bit form
//! - [`Fce`] - The encrypted thirteen-scalar header published per symbol and week
//! - [`run_pass`] - Routes the unprocessed records of an ODF into every interval's chunks
//! - [`Processor`] - Loads, locks, passes and persists one symbol against the stores
//! - [`convert_text_odf`] / [`upload_text_odf`] - Text ODF import

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/odfce/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod address;
mod chunk;
mod engine;
mod error;
mod export;
mod fce;
mod processor;

pub use address::{ChunkAddress, ChunkId};
pub use chunk::{
    CellUpdate, Chunk, ChunkHeader, ShortCell, ShortChunk, ShortHeader, dequantize, quantize,
};
pub use engine::{
    ChunkSource, FinishedChunk, PassContext, PassOutcome, ZeroChunks, adjust_record, run_pass,
};
pub use error::{PassError, PassResult};
pub use export::{convert_text_odf, odf_rows, upload_text_odf};
pub use fce::{FCE_TABLE, Fce};
pub use processor::{PassReport, PassStatus, Processor, find_odfs};
