//! Pipeline settings.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::{Epoch, IntervalToggles};

/// Settings errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("Failed to read settings file '{path}': {source}")]
    Read {
        /// Path of the settings file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid YAML for [`Settings`].
    #[error("Failed to parse settings YAML: {0}")]
    Parse(#[from] serde_yaml_bw::Error),

    /// A value failed validation.
    #[error("Settings validation failed: {0}")]
    Invalid(String),
}

/// Sign applied to even recnos by the OHLC adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentSign {
    /// Even recnos move up by one tick, odd recnos down.
    #[default]
    Plus,
    /// Even recnos move down by one tick, odd recnos up.
    Minus,
}

impl AdjustmentSign {
    /// Returns +1 or -1 for `recno` under this rule.
    #[must_use]
    pub const fn factor(&self, recno: u32) -> i64 {
        let even = recno % 2 == 0;
        match (self, even) {
            (Self::Plus, true) | (Self::Minus, false) => 1,
            (Self::Plus, false) | (Self::Minus, true) => -1,
        }
    }
}

/// Deterministic OHLCV adjustment applied before aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjustmentSettings {
    /// Whether the adjustment runs at all.
    pub enabled: bool,
    /// Fraction added to every volume.
    pub volume_inflation: Decimal,
    /// Direction of the price shift for even recnos.
    pub even_recno_sign: AdjustmentSign,
}

impl Default for AdjustmentSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            volume_inflation: Decimal::new(2, 2),
            even_recno_sign: AdjustmentSign::Plus,
        }
    }
}

/// Settings for one odfce run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of the local blob store. `None` selects the platform data directory.
    pub data_root: Option<PathBuf>,
    /// Root of the store receiving short chunks and FCE headers.
    /// `None` shares `data_root`.
    pub archive_root: Option<PathBuf>,
    /// Master switch; when false `run` only lists what it would process.
    pub process_data: bool,
    /// Cells per chunk.
    pub chunk_size: u32,
    /// First Sunday of the epoch grid.
    pub first_jsunnoon: Epoch,
    /// XOR key as a string of binary digits.
    pub encr_key: String,
    /// Also encrypt chunk blobs.
    pub encrypt_chunks: bool,
    /// Write CSV renderings next to the binary chunks.
    pub do_csv_chunk: bool,
    /// FIFO window length.
    pub fifo_count: u32,
    /// Age after which a persisted FIFO is refreshed.
    pub fifo_max_age_days: u32,
    /// Recno cycle subtracted by the trading-window limit check.
    pub recno_cycle: u32,
    /// OHLCV adjustment.
    pub adjustment: AdjustmentSettings,
    /// Per-interval enable flags.
    pub intervals: IntervalToggles,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_root: None,
            archive_root: None,
            process_data: true,
            chunk_size: 1440,
            first_jsunnoon: Epoch::new(56460),
            encr_key: "10110101".to_string(),
            encrypt_chunks: false,
            do_csv_chunk: false,
            fifo_count: 500,
            fifo_max_age_days: 25,
            recno_cycle: 1400,
            adjustment: AdjustmentSettings::default(),
            intervals: IntervalToggles::default(),
        }
    }
}

impl Settings {
    /// Loads and validates settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] if the file cannot be read, parsed, or
    /// validated.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Parses and validates settings from YAML text.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] if the YAML cannot be parsed or validated.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_yaml_bw::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks value ranges and cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.chunk_size == 0 {
            return Err(SettingsError::Invalid("chunk_size must be positive".into()));
        }
        if self.fifo_count == 0 || self.fifo_count >= u32::from(u16::MAX) {
            return Err(SettingsError::Invalid(format!(
                "fifo_count must be in 1..{}, got {}",
                u16::MAX,
                self.fifo_count
            )));
        }
        if self.recno_cycle == 0 {
            return Err(SettingsError::Invalid("recno_cycle must be positive".into()));
        }
        if !self.first_jsunnoon.is_sunday() {
            return Err(SettingsError::Invalid(format!(
                "first_jsunnoon {} is not a Sunday",
                self.first_jsunnoon
            )));
        }
        if self.adjustment.volume_inflation.is_sign_negative() {
            return Err(SettingsError::Invalid(
                "adjustment.volume_inflation must not be negative".into(),
            ));
        }
        if let Some(key) = self.intervals.unknown_keys().next() {
            return Err(SettingsError::Invalid(format!(
                "unknown interval toggle '{key}' (expected L31..L69)"
            )));
        }
        self.cipher_key_bytes()?;
        Ok(())
    }

    /// Decodes `encr_key` into big-endian key bytes without leading zeros.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Invalid`] if the key is not a binary number of
    /// at most 128 bits, or is zero.
    pub fn cipher_key_bytes(&self) -> Result<Vec<u8>, SettingsError> {
        let digits = self.encr_key.trim();
        let value = u128::from_str_radix(digits, 2).map_err(|e| {
            SettingsError::Invalid(format!("encr_key '{digits}' is not a binary number: {e}"))
        })?;
        if value == 0 {
            return Err(SettingsError::Invalid("encr_key must not be zero".into()));
        }
        let bytes = value.to_be_bytes();
        let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
        Ok(bytes[first..].to_vec())
    }

    /// Root the short store uses, falling back to `data_root`.
    #[must_use]
    pub fn archive_root(&self) -> Option<&Path> {
        self.archive_root.as_deref().or(self.data_root.as_deref())
    }
}
