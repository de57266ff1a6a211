//! Record layouts of every odfce binary format.

use crate::schema::{Field, FieldKind, Schema};

const fn int16(name: &'static str) -> Field {
    Field::new(name, FieldKind::U16)
}

const fn int32(name: &'static str) -> Field {
    Field::new(name, FieldKind::U32)
}

const fn int64(name: &'static str) -> Field {
    Field::new(name, FieldKind::U64)
}

const fn float(name: &'static str) -> Field {
    Field::new(name, FieldKind::F64)
}

const ODF_BODY_FIELDS: [Field; 6] = [
    int16("RECNO"),
    float("ODF_OPEN"),
    float("ODF_HIGH"),
    float("ODF_LOW"),
    float("ODF_CLOSE"),
    float("ODF_VOLUME"),
];

const ODF_HEADER_FLOAT_FIELDS: [Field; 3] = [int16("STORLOC"), float("VALUE"), Field::pad(32)];

const ODF_HEADER_INT_FIELDS: [Field; 3] = [int16("STORLOC"), int32("VALUE"), Field::pad(36)];

const FIFO_BODY_FIELDS: [Field; 5] = [
    int16("RECNO"),
    float("ODF_OPEN"),
    float("ODF_HIGH"),
    float("ODF_LOW"),
    float("ODF_CLOSE"),
];

const FIFO_HEADER_FIELDS: [Field; 4] = [
    int16("RECNO"),
    int32("TICK"),
    int32("OHLC_DIVIDER"),
    Field::pad(24),
];

const FCE_FIELD_FIELDS: [Field; 2] = [int16("ORDINAL"), float("VALUE")];

const CHUNK_LONG_CELL_FIELDS: [Field; 5] = [
    float("OPEN"),
    float("HIGH"),
    float("LOW"),
    float("CLOSE"),
    float("VOLUME"),
];

const CHUNK_LONG_HEADER_FIELDS: [Field; 5] = [
    float("LOWEST_LOW"),
    int64("VOLUME_TICK"),
    int32("CHUNK_OPEN_RECNO"),
    int32("CHUNK_CLOSE_RECNO"),
    Field::pad(16),
];

const CHUNK_SHORT_CELL_FIELDS: [Field; 5] = [
    int16("OPEN"),
    int16("HIGH"),
    int16("LOW"),
    int16("CLOSE"),
    int16("VOLUME"),
];

const CHUNK_SHORT_HEADER_FIELDS: [Field; 4] = [
    int32("LOWEST_LOW"),
    int16("VOLUME_TICK"),
    int16("CHUNK_OPEN_RECNO"),
    int16("CHUNK_CLOSE_RECNO"),
];

/// ODF body frame: recno and OHLCV.
pub const ODF_BODY: Schema = Schema::new("ODF_BODY", &ODF_BODY_FIELDS, 42);

/// ODF header frame for float scalars (storlocs 1-7, 12, 13).
pub const ODF_HEADER_FLOAT: Schema = Schema::new("ODF_HEADER_FLOAT", &ODF_HEADER_FLOAT_FIELDS, 42);

/// ODF header frame for integer scalars (storlocs 8-11).
pub const ODF_HEADER_INT: Schema = Schema::new("ODF_HEADER_INT", &ODF_HEADER_INT_FIELDS, 42);

/// FIFO body frame: recno and OHLC.
pub const FIFO_BODY: Schema = Schema::new("FIFO_BODY", &FIFO_BODY_FIELDS, 34);

/// FIFO header frame: tick and divider.
pub const FIFO_HEADER: Schema = Schema::new("FIFO_HEADER", &FIFO_HEADER_FIELDS, 34);

/// One FCE scalar: ordinal and value.
pub const FCE_FIELD: Schema = Schema::new("FCE_FIELD", &FCE_FIELD_FIELDS, 10);

/// Unquantized chunk cell.
pub const CHUNK_LONG_CELL: Schema = Schema::new("CHUNK_LONG_CELL", &CHUNK_LONG_CELL_FIELDS, 40);

/// Unquantized chunk header.
pub const CHUNK_LONG_HEADER: Schema =
    Schema::new("CHUNK_LONG_HEADER", &CHUNK_LONG_HEADER_FIELDS, 40);

/// Quantized chunk cell.
pub const CHUNK_SHORT_CELL: Schema = Schema::new("CHUNK_SHORT_CELL", &CHUNK_SHORT_CELL_FIELDS, 10);

/// Quantized chunk header.
pub const CHUNK_SHORT_HEADER: Schema =
    Schema::new("CHUNK_SHORT_HEADER", &CHUNK_SHORT_HEADER_FIELDS, 10);

/// Every layout, for validation and inspection.
pub const ALL: [Schema; 10] = [
    ODF_BODY,
    ODF_HEADER_FLOAT,
    ODF_HEADER_INT,
    FIFO_BODY,
    FIFO_HEADER,
    FCE_FIELD,
    CHUNK_LONG_CELL,
    CHUNK_LONG_HEADER,
    CHUNK_SHORT_CELL,
    CHUNK_SHORT_HEADER,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_layouts_validate() {
        for schema in ALL {
            schema.validate().unwrap();
        }
    }

    #[test]
    fn test_frame_widths_agree() {
        assert_eq!(ODF_BODY.size(), ODF_HEADER_FLOAT.size());
        assert_eq!(ODF_BODY.size(), ODF_HEADER_INT.size());
        assert_eq!(FIFO_BODY.size(), FIFO_HEADER.size());
        assert_eq!(CHUNK_LONG_CELL.size(), CHUNK_LONG_HEADER.size());
        assert_eq!(CHUNK_SHORT_CELL.size(), CHUNK_SHORT_HEADER.size());
    }
}
