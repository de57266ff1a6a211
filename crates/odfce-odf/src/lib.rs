//! ODF record store and FIFO window for odfce.
//!
//! - [`RecordStore`] - Recno-indexed records and header scalars, binary and text forms
//! - [`TradingLimits`] - The repeating trading window inside the recno space
//! - [`Fifo`] - Most recent records of an ODF and the tick/divider derived from them

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/odfce/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod fifo;
mod limits;
mod store;
mod text;

pub use fifo::Fifo;
pub use limits::{RecnosWithinLimits, TradingLimits};
pub use store::{FIRST_BODY_RECNO, RecordStore};
