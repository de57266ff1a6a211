//! Static field layouts.

use odfce_types::{OdfceError, Result};

/// Padding widths a layout may declare.
pub const SUPPORTED_PADDING: [usize; 6] = [6, 16, 24, 28, 32, 36];

/// Storage kind of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Unsigned 8-bit integer.
    U8,
    /// Unsigned 16-bit integer.
    U16,
    /// Unsigned 32-bit integer.
    U32,
    /// Unsigned 64-bit integer.
    U64,
    /// IEEE-754 double.
    F64,
    /// Zero filler of the given width.
    Pad(usize),
}

impl FieldKind {
    /// Width of the field in bytes.
    #[must_use]
    pub const fn width(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::U64 | Self::F64 => 8,
            Self::Pad(n) => *n,
        }
    }

    /// Largest value an integer field can hold.
    #[must_use]
    pub const fn max_int(&self) -> Option<u64> {
        match self {
            Self::U8 => Some(u8::MAX as u64),
            Self::U16 => Some(u16::MAX as u64),
            Self::U32 => Some(u32::MAX as u64),
            Self::U64 => Some(u64::MAX),
            Self::F64 | Self::Pad(_) => None,
        }
    }

    /// Returns true for padding.
    #[must_use]
    pub const fn is_pad(&self) -> bool {
        matches!(self, Self::Pad(_))
    }
}

/// A named field of a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Field name.
    pub name: &'static str,
    /// Storage kind.
    pub kind: FieldKind,
}

impl Field {
    /// Creates a field.
    #[must_use]
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }

    /// Creates a padding field.
    #[must_use]
    pub const fn pad(width: usize) -> Self {
        Self::new("PAD", FieldKind::Pad(width))
    }
}

/// An ordered list of fields with a declared total width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    name: &'static str,
    fields: &'static [Field],
    size: usize,
}

impl Schema {
    /// Declares a layout. Call [`Schema::validate`] before use.
    #[must_use]
    pub const fn new(name: &'static str, fields: &'static [Field], size: usize) -> Self {
        Self { name, fields, size }
    }

    /// Layout name used in error messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Declared record width in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Fields in storage order, padding included.
    #[must_use]
    pub const fn fields(&self) -> &'static [Field] {
        self.fields
    }

    /// Iterates over the value-carrying fields.
    pub fn value_fields(&self) -> impl Iterator<Item = &'static Field> {
        self.fields.iter().filter(|f| !f.kind.is_pad())
    }

    /// Number of value-carrying fields.
    #[must_use]
    pub fn value_count(&self) -> usize {
        self.value_fields().count()
    }

    /// Sum of the field widths.
    #[must_use]
    pub const fn computed_size(&self) -> usize {
        let mut total = 0;
        let mut i = 0;
        while i < self.fields.len() {
            total += self.fields[i].kind.width();
            i += 1;
        }
        total
    }

    /// Position of a value-carrying field.
    ///
    /// # Errors
    ///
    /// Returns [`OdfceError::UnknownField`] if no such field exists.
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.value_fields()
            .position(|f| f.name == name)
            .ok_or_else(|| OdfceError::UnknownField(format!("{}.{name}", self.name)))
    }

    /// Checks padding widths and the declared total width.
    ///
    /// # Errors
    ///
    /// Returns [`OdfceError::InvalidPadding`] or [`OdfceError::SizeMismatch`].
    pub fn validate(&self) -> Result<()> {
        for field in self.fields {
            if let FieldKind::Pad(width) = field.kind
                && !SUPPORTED_PADDING.contains(&width)
            {
                return Err(OdfceError::InvalidPadding(width));
            }
        }
        let computed = self.computed_size();
        if computed != self.size {
            return Err(OdfceError::SizeMismatch {
                schema: self.name,
                declared: self.size,
                computed,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static GOOD: [Field; 3] = [
        Field::new("RECNO", FieldKind::U16),
        Field::new("VALUE", FieldKind::F64),
        Field::pad(6),
    ];

    #[test]
    fn test_validate_ok() {
        let schema = Schema::new("good", &GOOD, 16);
        schema.validate().unwrap();
        assert_eq!(schema.value_count(), 2);
        assert_eq!(schema.index_of("VALUE").unwrap(), 1);
        assert!(matches!(schema.index_of("PAD"), Err(OdfceError::UnknownField(_))));
    }

    #[test]
    fn test_size_mismatch() {
        let schema = Schema::new("bad", &GOOD, 18);
        assert!(matches!(
            schema.validate(),
            Err(OdfceError::SizeMismatch {
                declared: 18,
                computed: 16,
                ..
            })
        ));
    }

    #[test]
    fn test_unsupported_padding() {
        static ODD: [Field; 2] = [Field::new("X", FieldKind::U8), Field::pad(5)];
        let schema = Schema::new("odd", &ODD, 6);
        assert!(matches!(schema.validate(), Err(OdfceError::InvalidPadding(5))));
    }
}
