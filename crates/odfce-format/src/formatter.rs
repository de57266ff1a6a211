//! Renderer abstraction shared by the CSV and JSON outputs.

use odfce_types::{Decimal, Record};
use std::io::Write;
use thiserror::Error;

/// Errors raised while rendering.
#[derive(Error, Debug)]
pub enum FormatError {
    /// Unknown chunk extension.
    #[error("Unknown chunk extension: {0}")]
    UnknownExtension(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Renders records and named scalars.
///
/// Records are ODF bodies, FIFO windows or chunk cells; scalars are the
/// matching headers. Writers are passed by value so `&mut W` works as well.
pub trait Formatter: Send + Sync {
    /// Writes OHLCV records.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_records<W: Write + Send>(
        &self,
        records: &[Record],
        writer: W,
    ) -> Result<(), FormatError>;

    /// Writes named scalars.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_scalars<W: Write + Send>(
        &self,
        scalars: &[(&str, Decimal)],
        writer: W,
    ) -> Result<(), FormatError>;
}
