//! CSV rendering using the ODF wire column names.

use odfce_types::{Decimal, Record, RecordField};
use std::io::Write;

use crate::{FormatError, Formatter};

/// Writes records as `ODF_RECNO,ODF_OPEN,...` rows and scalars as `NAME,VALUE`.
#[derive(Debug, Clone, Copy)]
pub struct CsvFormatter {
    header: bool,
}

impl Default for CsvFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvFormatter {
    /// Formatter that starts with a column header line.
    #[must_use]
    pub const fn new() -> Self {
        Self { header: true }
    }

    /// Formatter that writes data lines only.
    #[must_use]
    pub const fn without_header() -> Self {
        Self { header: false }
    }
}

impl Formatter for CsvFormatter {
    fn write_records<W: Write + Send>(
        &self,
        records: &[Record],
        mut writer: W,
    ) -> Result<(), FormatError> {
        if self.header {
            let columns: Vec<&str> = std::iter::once("ODF_RECNO")
                .chain(RecordField::PRICES.iter().map(RecordField::as_str))
                .chain(std::iter::once(RecordField::Volume.as_str()))
                .collect();
            writeln!(writer, "{}", columns.join(","))?;
        }
        for r in records {
            write!(writer, "{}", r.recno)?;
            for field in RecordField::PRICES {
                write!(writer, ",{}", r.get(field).normalize())?;
            }
            writeln!(writer, ",{}", r.volume.normalize())?;
        }
        Ok(())
    }

    fn write_scalars<W: Write + Send>(
        &self,
        scalars: &[(&str, Decimal)],
        mut writer: W,
    ) -> Result<(), FormatError> {
        if self.header {
            writeln!(writer, "NAME,VALUE")?;
        }
        for (name, value) in scalars {
            writeln!(writer, "{name},{}", value.normalize())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(formatter: CsvFormatter, records: &[Record]) -> String {
        let mut out = Vec::new();
        formatter.write_records(records, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_csv_records_use_wire_names() {
        let record = Record::new(
            3,
            Decimal::new(110, 2),
            Decimal::new(112, 2),
            Decimal::new(109, 2),
            Decimal::new(111, 2),
            Decimal::from(40),
        );
        assert_eq!(
            render(CsvFormatter::new(), &[record]),
            "ODF_RECNO,ODF_OPEN,ODF_HIGH,ODF_LOW,ODF_CLOSE,ODF_VOLUME\n3,1.1,1.12,1.09,1.11,40\n"
        );
    }

    #[test]
    fn test_csv_without_header() {
        let out = render(CsvFormatter::without_header(), &[Record::zero(9)]);
        assert_eq!(out, "9,0,0,0,0,0\n");
    }

    #[test]
    fn test_csv_scalars() {
        let mut out = Vec::new();
        CsvFormatter::new()
            .write_scalars(
                &[("TICK", Decimal::from(5)), ("OHLC_DIVIDER", Decimal::from(100_000))],
                &mut out,
            )
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "NAME,VALUE\nTICK,5\nOHLC_DIVIDER,100000\n"
        );
    }
}
