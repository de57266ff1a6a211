//! Identity-to-path mapping.
//!
//! Paths are `/`-separated blob keys relative to a store root:
//!
//! ```text
//! {group}/odf/{odf}.rs3                                  binary ODF
//! {group}/odf/{odf}.rs4                                  text ODF
//! {group}/archive/{odf}.rs3                              archived ODF
//! {group}/fifo/{odf}.fif                                 FIFO
//! {group}/fce/{sym}/18/{epoch}/{sym}-18{epoch:05}01.fce  FCE header
//! {group}/fce/{sym}/{L}/{epoch}/{sym}-{L}{epoch:05}{chunk:02}.fcs|fcl|csv
//! ```

use odfce_types::{Epoch, OdfName};
use std::str::FromStr;

use crate::FormatError;

/// L-code reserved for the FCE header blob.
const FCE_HEADER_CODE: u16 = 18;

/// Storage form of an ODF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OdfExtension {
    /// Binary form (`.rs3`).
    Binary,
    /// Text form (`.rs4`).
    Text,
}

impl OdfExtension {
    /// Returns the file extension.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Binary => "rs3",
            Self::Text => "rs4",
        }
    }
}

/// Storage form of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkExtension {
    /// Quantized binary chunk (`.fcs`).
    Short,
    /// Unquantized binary chunk (`.fcl`).
    Long,
    /// CSV debug rendering (`.csv`).
    Csv,
}

impl ChunkExtension {
    /// Returns the file extension.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "fcs",
            Self::Long => "fcl",
            Self::Csv => "csv",
        }
    }
}

impl std::fmt::Display for ChunkExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ChunkExtension {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fcs" | "short" => Ok(Self::Short),
            "fcl" | "long" => Ok(Self::Long),
            "csv" => Ok(Self::Csv),
            _ => Err(FormatError::UnknownExtension(s.to_string())),
        }
    }
}

/// Blob paths of one symbol group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobLayout {
    group: String,
}

impl BlobLayout {
    /// Creates the layout of `group`.
    #[must_use]
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
        }
    }

    /// Returns the group name.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Prefix under which the group's ODFs live.
    #[must_use]
    pub fn odf_prefix(&self) -> String {
        format!("{}/odf/", self.group)
    }

    /// Path of an ODF.
    #[must_use]
    pub fn odf(&self, name: &OdfName, ext: OdfExtension) -> String {
        format!("{}/odf/{}.{}", self.group, name.basename(), ext.as_str())
    }

    /// Path of an archived binary ODF.
    #[must_use]
    pub fn archived_odf(&self, name: &OdfName) -> String {
        format!(
            "{}/archive/{}.{}",
            self.group,
            name.basename(),
            OdfExtension::Binary.as_str()
        )
    }

    /// Path of an ODF's FIFO.
    #[must_use]
    pub fn fifo(&self, name: &OdfName) -> String {
        format!("{}/fifo/{}.fif", self.group, name.basename())
    }

    /// Path of the FCE header of `symbol` for the ODF week `epoch`.
    #[must_use]
    pub fn fce_header(&self, symbol: &str, epoch: Epoch) -> String {
        format!(
            "{group}/fce/{symbol}/{FCE_HEADER_CODE}/{day}/{symbol}-{FCE_HEADER_CODE}{day:05}01.fce",
            group = self.group,
            day = epoch.day(),
        )
    }

    /// Path of chunk `chunk_no` of interval `l_code` in FCE epoch `epoch`.
    #[must_use]
    pub fn chunk(
        &self,
        symbol: &str,
        l_code: u16,
        epoch: Epoch,
        chunk_no: u32,
        ext: ChunkExtension,
    ) -> String {
        format!(
            "{group}/fce/{symbol}/{l_code}/{day}/{symbol}-{l_code}{day:05}{chunk_no:02}.{ext}",
            group = self.group,
            day = epoch.day(),
        )
    }

    /// Per-symbol lock path.
    #[must_use]
    pub fn lock(&self, symbol: &str) -> String {
        format!("{}/lock/{symbol}.lock", self.group)
    }

    /// Staging path a blob is written to before being moved to `path`.
    #[must_use]
    pub fn staging(&self, path: &str) -> String {
        let rest = path
            .strip_prefix(self.group.as_str())
            .map_or(path, |p| p.trim_start_matches('/'));
        format!("{}/staging/{rest}", self.group)
    }

    /// Splits an ODF path into its parsed name and storage form.
    ///
    /// Returns `None` for paths that are not ODFs.
    #[must_use]
    pub fn parse_odf_path(path: &str) -> Option<(OdfName, OdfExtension)> {
        let file = path.rsplit('/').next()?;
        let (stem, ext) = file.rsplit_once('.')?;
        let ext = match ext {
            "rs3" => OdfExtension::Binary,
            "rs4" => OdfExtension::Text,
            _ => return None,
        };
        OdfName::parse(stem).ok().map(|name| (name, ext))
    }
}
