//! Core types for the odfce ODF to FCE chunk generator.
//!
//! This crate provides the fundamental data structures used throughout odfce:
//!
//! - [`Record`] - A single tick-level OHLCV record addressed by recno
//! - [`HeaderField`] - The thirteen ODF header scalars and their storlocs
//! - [`IntervalDefinition`] / [`IntervalTable`] - Resampling interval table
//! - [`Epoch`] / [`OdfName`] - Sunday-noon calendar epochs and ODF naming
//! - [`Settings`] - Pipeline settings loaded from YAML
//! - [`OdfceError`] - The error taxonomy shared by the core crates

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/odfce/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod epoch;
mod error;
mod header;
mod interval;
mod record;
mod settings;

pub use epoch::{Epoch, OdfName};
pub use error::{OdfceError, Result};
pub use header::{HEADER_COUNT, HeaderField, TEXT_HEADER_COUNT, is_header_recno};
pub use interval::{
    INTERVAL_TABLE, IntervalDefinition, IntervalTable, IntervalToggles, MINUTES_PER_DAY,
    MINUTES_PER_WEEK,
};
pub use record::{Record, RecordField};
pub use settings::{AdjustmentSettings, AdjustmentSign, Settings, SettingsError};

/// Re-exported so downstream crates agree on one decimal type.
pub use rust_decimal::Decimal;
