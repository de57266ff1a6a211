//! The per-symbol FCE header.

use odfce_codec::{Cipher, Codec, Value, layout};
use odfce_odf::RecordStore;
use odfce_storage::{BlobStore, ScalarRow, TableSchema};
use odfce_types::{Decimal, HEADER_COUNT, HeaderField, OdfceError, Result};
use serde_json::Value as Json;
use tracing::debug;

use crate::PassResult;

/// Key-value table holding one row per published FCE.
pub const FCE_TABLE: &str = "FCE";

/// Thirteen scalars mirroring the ODF headers, stored encrypted per symbol
/// and ODF week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fce {
    values: [Decimal; HEADER_COUNT as usize],
}

const fn slot(field: HeaderField) -> usize {
    field.storloc() as usize - 1
}

impl Fce {
    /// An all-zero FCE.
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    /// Copies the header scalars of `store`; absent headers are zero.
    #[must_use]
    pub fn from_store(store: &RecordStore) -> Self {
        let mut fce = Self::zero();
        for (field, value) in store.headers() {
            fce.set(field, value);
        }
        fce
    }

    /// Returns one scalar.
    #[must_use]
    pub const fn get(&self, field: HeaderField) -> Decimal {
        self.values[slot(field)]
    }

    /// Sets one scalar.
    pub const fn set(&mut self, field: HeaderField, value: Decimal) {
        self.values[slot(field)] = value;
    }

    /// Scalars in storloc order.
    pub fn fields(&self) -> impl Iterator<Item = (HeaderField, Decimal)> + '_ {
        HeaderField::ALL.into_iter().zip(self.values.iter().copied())
    }

    /// Packs every scalar as an `(ordinal, value)` record and encrypts the
    /// buffer.
    ///
    /// # Errors
    ///
    /// Returns a codec error; every value fits by construction.
    pub fn encode(&self, cipher: &Cipher) -> Result<Vec<u8>> {
        let codec = Codec::new(layout::FCE_FIELD)?;
        let mut out = Vec::with_capacity(codec.size() * HEADER_COUNT as usize);
        for (field, value) in self.fields() {
            out.extend(codec.encode(&[
                Value::Int(u64::from(field.storloc())),
                Value::from_decimal(value),
            ])?);
        }
        cipher.apply(&mut out);
        Ok(out)
    }

    /// Decrypts and unpacks an encoded FCE.
    ///
    /// # Errors
    ///
    /// Returns [`OdfceError::ShortRead`] or [`OdfceError::SizeMismatch`] for
    /// a buffer of the wrong length and [`OdfceError::HeaderIntegrity`] if the
    /// ordinals are not 1..=13 in order (usually a wrong key).
    pub fn decode(bytes: &[u8], cipher: &Cipher) -> Result<Self> {
        let codec = Codec::new(layout::FCE_FIELD)?;
        let expected = codec.size() * HEADER_COUNT as usize;
        if bytes.len() < expected {
            return Err(OdfceError::ShortRead {
                schema: "FCE",
                expected,
                actual: bytes.len(),
            });
        }
        if bytes.len() > expected {
            return Err(OdfceError::SizeMismatch {
                schema: "FCE",
                declared: expected,
                computed: bytes.len(),
            });
        }

        let mut buf = bytes.to_vec();
        cipher.apply(&mut buf);
        let mut fce = Self::zero();
        for (field, frame) in HeaderField::ALL.into_iter().zip(buf.chunks_exact(codec.size())) {
            let values = codec.decode(frame)?;
            let ordinal = values.first().and_then(Value::as_int).unwrap_or_default();
            if ordinal != u64::from(field.storloc()) {
                return Err(OdfceError::HeaderIntegrity(format!(
                    "FCE field {} carries ordinal {ordinal}",
                    field.storloc()
                )));
            }
            fce.set(field, values.get(1).map(Value::to_decimal).unwrap_or_default());
        }
        Ok(fce)
    }

    /// Reads the FCE at `path`, or returns a zero FCE when there is none.
    ///
    /// # Errors
    ///
    /// Returns a storage error or a decode error for a corrupt blob.
    pub fn load_or_create(store: &dyn BlobStore, path: &str, cipher: &Cipher) -> PassResult<Self> {
        if !store.exists(path)? {
            debug!(path, "no FCE yet, starting from zero");
            return Ok(Self::zero());
        }
        Ok(Self::decode(&store.read(path)?, cipher)?)
    }

    /// Key-value row keyed by `fce_name`; scalars are written as decimal
    /// strings.
    #[must_use]
    pub fn to_row(&self, fce_name: &str) -> ScalarRow {
        let mut row = ScalarRow::new();
        row.insert(TableSchema::FCE_HASH_KEY.into(), Json::String(fce_name.into()));
        for (field, value) in self.fields() {
            row.insert(field.as_str().into(), Json::String(value.normalize().to_string()));
        }
        row
    }
}
