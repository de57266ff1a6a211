//! JSON rendering keyed by ODF wire names.

use odfce_types::{Decimal, Record};
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use std::io::Write;

use crate::{FormatError, Formatter};

/// Writes a JSON array, or one object per line in NDJSON mode.
///
/// Records become `{"ODF_RECNO": .., "ODF_OPEN": .., ...}` objects. Scalars
/// become a single ordered object in array mode and `{"NAME": value}` lines
/// in NDJSON mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter {
    lines: bool,
}

#[derive(Serialize)]
struct Row<'a> {
    #[serde(rename = "ODF_RECNO")]
    recno: u32,
    #[serde(rename = "ODF_OPEN")]
    open: &'a Decimal,
    #[serde(rename = "ODF_HIGH")]
    high: &'a Decimal,
    #[serde(rename = "ODF_LOW")]
    low: &'a Decimal,
    #[serde(rename = "ODF_CLOSE")]
    close: &'a Decimal,
    #[serde(rename = "ODF_VOLUME")]
    volume: &'a Decimal,
}

impl<'a> From<&'a Record> for Row<'a> {
    fn from(r: &'a Record) -> Self {
        Self {
            recno: r.recno,
            open: &r.open,
            high: &r.high,
            low: &r.low,
            close: &r.close,
            volume: &r.volume,
        }
    }
}

/// Ordered `name -> value` object.
struct Scalars<'a>(&'a [(&'a str, Decimal)]);

impl Serialize for Scalars<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in self.0 {
            map.serialize_entry(name, &value.normalize())?;
        }
        map.end()
    }
}

impl JsonFormatter {
    /// Array formatter.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: false }
    }

    /// Newline-delimited formatter.
    #[must_use]
    pub const fn ndjson() -> Self {
        Self { lines: true }
    }
}

impl Formatter for JsonFormatter {
    fn write_records<W: Write + Send>(
        &self,
        records: &[Record],
        mut writer: W,
    ) -> Result<(), FormatError> {
        let rows = records.iter().map(Row::from);
        if self.lines {
            for row in rows {
                serde_json::to_writer(&mut writer, &row)?;
                writeln!(writer)?;
            }
        } else {
            serde_json::to_writer(&mut writer, &rows.collect::<Vec<_>>())?;
            writeln!(writer)?;
        }
        Ok(())
    }

    fn write_scalars<W: Write + Send>(
        &self,
        scalars: &[(&str, Decimal)],
        mut writer: W,
    ) -> Result<(), FormatError> {
        if self.lines {
            for scalar in scalars {
                serde_json::to_writer(&mut writer, &Scalars(std::slice::from_ref(scalar)))?;
                writeln!(writer)?;
            }
        } else {
            serde_json::to_writer(&mut writer, &Scalars(scalars))?;
            writeln!(writer)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(recno: u32) -> Record {
        Record::flat(recno, Decimal::new(125, 2), Decimal::from(7))
    }

    #[test]
    fn test_json_array_of_rows() {
        let mut out = Vec::new();
        JsonFormatter::new()
            .write_records(&[record(1), record(2)], &mut out)
            .unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let rows = value.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["ODF_RECNO"], 2);
        assert!(rows[0]["ODF_OPEN"].to_string().contains("1.25"));
    }

    #[test]
    fn test_ndjson_rows() {
        let mut out = Vec::new();
        JsonFormatter::ndjson()
            .write_records(&[record(1), record(2)], &mut out)
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("{\"ODF_RECNO\":1,"));
    }

    #[test]
    fn test_scalars_keep_order() {
        let scalars = [("TICK", Decimal::from(5)), ("HIGHEST_RECNO", Decimal::from(3))];

        let mut out = Vec::new();
        JsonFormatter::new().write_scalars(&scalars, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.find("TICK").unwrap() < text.find("HIGHEST_RECNO").unwrap());

        let mut out = Vec::new();
        JsonFormatter::ndjson().write_scalars(&scalars, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);
    }
}
