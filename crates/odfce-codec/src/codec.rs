//! Packing and unpacking of fixed-width records.

use byteorder::{ByteOrder, LittleEndian};
use odfce_types::{OdfceError, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use std::io::{ErrorKind, Read};

use crate::schema::{FieldKind, Schema};

/// A decoded field value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Unsigned integer.
    Int(u64),
    /// Double.
    Float(f64),
}

impl Value {
    /// Converts a decimal to a float value.
    #[must_use]
    pub fn from_decimal(value: Decimal) -> Self {
        Self::Float(value.to_f64().unwrap_or_default())
    }

    /// Returns the integer payload.
    #[must_use]
    pub const fn as_int(&self) -> Option<u64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(_) => None,
        }
    }

    /// Returns the float payload.
    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(_) => None,
        }
    }

    /// Converts the value to a decimal.
    ///
    /// Floats go through their shortest round-trip text form so that a value
    /// written from `1.105` reads back as `1.105`, not as its binary expansion.
    #[must_use]
    pub fn to_decimal(&self) -> Decimal {
        match self {
            Self::Int(v) => Decimal::from(*v),
            Self::Float(v) => float_to_decimal(*v),
        }
    }
}

/// Converts a float to a decimal via its shortest text form.
#[must_use]
pub fn float_to_decimal(value: f64) -> Decimal {
    if !value.is_finite() {
        return Decimal::ZERO;
    }
    format!("{value}")
        .parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_f64(value))
        .unwrap_or_default()
}

/// Packs and unpacks records of one [`Schema`].
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    schema: Schema,
}

impl Codec {
    /// Creates a codec after validating the schema.
    ///
    /// # Errors
    ///
    /// Returns the schema's validation error.
    pub fn new(schema: Schema) -> Result<Self> {
        schema.validate()?;
        Ok(Self { schema })
    }

    /// The schema this codec packs.
    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Record width in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.schema.size()
    }

    /// Packs one value per value-carrying field; padding is zero-filled.
    ///
    /// # Errors
    ///
    /// Returns [`OdfceError::TypeMismatch`] if a value's kind does not match
    /// its field, [`OdfceError::ValueOutOfRange`] if an integer does not fit,
    /// or [`OdfceError::SizeMismatch`] if the value count is wrong.
    pub fn encode(&self, values: &[Value]) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.schema.size()];
        self.encode_into(values, &mut out)?;
        Ok(out)
    }

    /// Packs into a caller-provided buffer of exactly [`Codec::size`] bytes.
    ///
    /// # Errors
    ///
    /// See [`Codec::encode`].
    pub fn encode_into(&self, values: &[Value], out: &mut [u8]) -> Result<()> {
        if values.len() != self.schema.value_count() {
            return Err(OdfceError::SizeMismatch {
                schema: self.schema.name(),
                declared: self.schema.value_count(),
                computed: values.len(),
            });
        }
        if out.len() != self.schema.size() {
            return Err(OdfceError::ShortRead {
                schema: self.schema.name(),
                expected: self.schema.size(),
                actual: out.len(),
            });
        }

        let mut offset = 0;
        let mut values = values.iter();
        for field in self.schema.fields() {
            let width = field.kind.width();
            let slot = &mut out[offset..offset + width];
            offset += width;
            if field.kind.is_pad() {
                slot.fill(0);
                continue;
            }
            let value = values.next().ok_or(OdfceError::SizeMismatch {
                schema: self.schema.name(),
                declared: self.schema.value_count(),
                computed: 0,
            })?;
            match (field.kind, value) {
                (FieldKind::F64, Value::Float(v)) => LittleEndian::write_f64(slot, *v),
                (FieldKind::F64, Value::Int(_)) => {
                    return Err(OdfceError::TypeMismatch {
                        field: field.name,
                        expected: "float",
                    });
                }
                (kind, Value::Int(v)) => {
                    if *v > kind.max_int().unwrap_or(u64::MAX) {
                        return Err(OdfceError::ValueOutOfRange {
                            field: field.name,
                            value: v.to_string(),
                        });
                    }
                    write_uint(kind, slot, *v);
                }
                (_, Value::Float(_)) => {
                    return Err(OdfceError::TypeMismatch {
                        field: field.name,
                        expected: "integer",
                    });
                }
            }
        }
        Ok(())
    }

    /// Unpacks one record; padding is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`OdfceError::ShortRead`] if `bytes` is shorter than the record
    /// width, or the schema's validation error.
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<Value>> {
        self.schema.validate()?;
        if bytes.len() < self.schema.size() {
            return Err(OdfceError::ShortRead {
                schema: self.schema.name(),
                expected: self.schema.size(),
                actual: bytes.len(),
            });
        }

        let mut values = Vec::with_capacity(self.schema.value_count());
        let mut offset = 0;
        for field in self.schema.fields() {
            let width = field.kind.width();
            let slot = &bytes[offset..offset + width];
            match field.kind {
                FieldKind::Pad(_) => {}
                FieldKind::F64 => values.push(Value::Float(LittleEndian::read_f64(slot))),
                kind => values.push(Value::Int(read_uint(kind, slot))),
            }
            offset += width;
        }
        Ok(values)
    }

    /// Reads the next frame from `reader`.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly on a frame boundary.
    ///
    /// # Errors
    ///
    /// Returns [`OdfceError::ShortRead`] if the stream ends inside a frame.
    pub fn read_frame<R: Read>(&self, reader: &mut R) -> Result<Option<Vec<u8>>> {
        let mut frame = vec![0u8; self.schema.size()];
        let mut filled = 0;
        while filled < frame.len() {
            match reader.read(&mut frame[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        match filled {
            0 => Ok(None),
            n if n == frame.len() => Ok(Some(frame)),
            n => Err(OdfceError::ShortRead {
                schema: self.schema.name(),
                expected: frame.len(),
                actual: n,
            }),
        }
    }

    /// Reads and decodes the next frame.
    ///
    /// # Errors
    ///
    /// See [`Codec::read_frame`] and [`Codec::decode`].
    pub fn read_values<R: Read>(&self, reader: &mut R) -> Result<Option<Vec<Value>>> {
        self.read_frame(reader)?
            .map(|frame| self.decode(&frame))
            .transpose()
    }
}

fn write_uint(kind: FieldKind, slot: &mut [u8], value: u64) {
    match kind {
        FieldKind::U8 => slot[0] = value as u8,
        FieldKind::U16 => LittleEndian::write_u16(slot, value as u16),
        FieldKind::U32 => LittleEndian::write_u32(slot, value as u32),
        _ => LittleEndian::write_u64(slot, value),
    }
}

fn read_uint(kind: FieldKind, slot: &[u8]) -> u64 {
    match kind {
        FieldKind::U8 => u64::from(slot[0]),
        FieldKind::U16 => u64::from(LittleEndian::read_u16(slot)),
        FieldKind::U32 => u64::from(LittleEndian::read_u32(slot)),
        _ => LittleEndian::read_u64(slot),
    }
}
