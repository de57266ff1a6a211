//! Blob naming and output formatters for odfce.
//!
//! - [`BlobLayout`] - Maps ODF, FIFO, FCE and chunk identities to blob paths
//! - [`CsvFormatter`] - CSV rendering of records and scalars
//! - [`JsonFormatter`] - JSON array or NDJSON rendering

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/odfce/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod csv;
mod formatter;
mod json;
mod naming;

pub use crate::csv::CsvFormatter;
pub use formatter::{FormatError, Formatter};
pub use json::JsonFormatter;
pub use naming::{BlobLayout, ChunkExtension, OdfExtension};
