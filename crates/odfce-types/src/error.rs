//! Error types for odfce.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::SettingsError;

/// Result type alias for odfce operations.
pub type Result<T> = std::result::Result<T, OdfceError>;

/// Errors raised by the codec, record store and aggregation core.
///
/// Every variant is fatal for the symbol being processed. End of stream is
/// not represented here: readers return `Ok(None)` instead.
#[derive(Error, Debug)]
pub enum OdfceError {
    /// Fewer bytes were available than the record's declared width.
    #[error("Short read in {schema}: expected {expected} bytes, got {actual}")]
    ShortRead {
        /// Schema being decoded.
        schema: &'static str,
        /// Declared record width.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// A record's computed width disagrees with its declared width.
    #[error("Size mismatch in {schema}: declared {declared} bytes, computed {computed}")]
    SizeMismatch {
        /// Schema being checked.
        schema: &'static str,
        /// Declared record width.
        declared: usize,
        /// Sum of the schema's field widths.
        computed: usize,
    },

    /// Value kind does not match the field it is packed into.
    #[error("Type mismatch for field {field}: expected {expected}")]
    TypeMismatch {
        /// Field name.
        field: &'static str,
        /// Expected value kind.
        expected: &'static str,
    },

    /// Integer value does not fit the field width.
    #[error("Value {value} out of range for field {field}")]
    ValueOutOfRange {
        /// Field name.
        field: &'static str,
        /// Rejected value.
        value: String,
    },

    /// Unsupported padding size.
    #[error("Invalid padding: {0} bytes (supported: 6, 16, 24, 28, 32, 36)")]
    InvalidPadding(usize),

    /// Cipher key is empty or all zero.
    #[error("Invalid cipher key: {0}")]
    InvalidKey(String),

    /// Malformed or reordered header block.
    #[error("Header integrity error: {0}")]
    HeaderIntegrity(String),

    /// A computed chunk recno was not positive.
    #[error(
        "Chunk addressing error: L{l_code} (bar {bar_minutes}m, {weeks_per_epoch} weeks/epoch, \
         shift {time_shift}) recno {recno} odf epoch {odf_epoch} fce epoch {fce_epoch} \
         gave fce recno {fce_recno}"
    )]
    ChunkAddressing {
        /// Interval L-code.
        l_code: u16,
        /// Bar length in minutes.
        bar_minutes: u32,
        /// Weeks per FCE epoch.
        weeks_per_epoch: u32,
        /// Time shift in minutes.
        time_shift: u32,
        /// Source ODF recno.
        recno: u32,
        /// ODF calendar epoch.
        odf_epoch: u32,
        /// FCE epoch start.
        fce_epoch: u32,
        /// The offending fce recno.
        fce_recno: i64,
    },

    /// The OHLCV adjustment produced a negative value.
    #[error("Invalid adjustment at recno {recno}: {field} became {value}")]
    InvalidAdjustment {
        /// Source recno.
        recno: u32,
        /// Field name.
        field: &'static str,
        /// Negative result.
        value: Decimal,
    },

    /// Access to an undeclared field name.
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// ODF basename does not follow the `{SYMBOL}-18{epoch}` convention.
    #[error("Invalid ODF name: {0}")]
    InvalidOdfName(String),

    /// Invalid text input.
    #[error("Parse error at line {line}: {message}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// Invalid settings.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
