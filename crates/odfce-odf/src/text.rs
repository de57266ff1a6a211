//! Plain-text ODF form.
//!
//! One header value per line (the seven mandatory scalars, optionally followed
//! by the six derived ones), then `recno,open,high,low,close,volume` lines.
//! A blank line or the end of input ends the body.

use odfce_types::{
    Decimal, HEADER_COUNT, HeaderField, OdfceError, Record, Result, TEXT_HEADER_COUNT,
};
use std::fmt::Write as _;
use std::io::BufRead;
use std::str::FromStr;

use crate::RecordStore;

fn parse_decimal(text: &str, line: usize) -> Result<Decimal> {
    let text = text.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|e| OdfceError::Parse {
            line,
            message: format!("invalid number '{text}': {e}"),
        })
}

impl RecordStore {
    /// Parses the text form.
    ///
    /// Decimals keep the precision they were written with. Later duplicates
    /// replace earlier ones and recno 0 is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`OdfceError::Parse`] for malformed lines or fewer than seven
    /// header lines, or an I/O error.
    pub fn load_text<R: BufRead>(reader: R) -> Result<Self> {
        let mut store = Self::new();
        let mut headers_read = 0;

        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                break;
            }

            if !line.contains(',') && headers_read < HEADER_COUNT {
                headers_read += 1;
                let field = HeaderField::from_storloc(headers_read).ok_or_else(|| {
                    OdfceError::Parse {
                        line: line_no,
                        message: "too many header lines".into(),
                    }
                })?;
                store.set_header(field, parse_decimal(line, line_no)?);
                continue;
            }

            if headers_read < TEXT_HEADER_COUNT {
                return Err(OdfceError::Parse {
                    line: line_no,
                    message: format!(
                        "expected {TEXT_HEADER_COUNT} header lines, found {headers_read}"
                    ),
                });
            }

            let parts: Vec<&str> = line.split(',').collect();
            if parts.len() != 6 {
                return Err(OdfceError::Parse {
                    line: line_no,
                    message: format!("expected 6 comma-separated values, found {}", parts.len()),
                });
            }
            let recno = parts[0].trim().parse::<u32>().map_err(|e| OdfceError::Parse {
                line: line_no,
                message: format!("invalid recno '{}': {e}", parts[0].trim()),
            })?;
            if recno == 0 {
                continue;
            }
            store.insert(Record::new(
                recno,
                parse_decimal(parts[1], line_no)?,
                parse_decimal(parts[2], line_no)?,
                parse_decimal(parts[3], line_no)?,
                parse_decimal(parts[4], line_no)?,
                parse_decimal(parts[5], line_no)?,
            ));
        }

        if headers_read < TEXT_HEADER_COUNT {
            return Err(OdfceError::Parse {
                line: headers_read as usize + 1,
                message: format!("expected {TEXT_HEADER_COUNT} header lines, found {headers_read}"),
            });
        }
        Ok(store)
    }

    /// Renders the text form.
    ///
    /// All thirteen header lines are written when any derived header is
    /// present; absent headers render as `0`.
    #[must_use]
    pub fn to_text(&self) -> String {
        let header_count = if self.has_derived_headers() {
            HEADER_COUNT
        } else {
            TEXT_HEADER_COUNT
        };
        let mut out = String::new();
        for field in HeaderField::ALL.iter().take(header_count as usize) {
            let _ = writeln!(out, "{}", self.header(*field).unwrap_or_default());
        }
        for r in self.records() {
            let _ = writeln!(
                out,
                "{},{},{},{},{},{}",
                r.recno, r.open, r.high, r.low, r.close, r.volume
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "0\n1\n1440\n840\n5\n1\n1\n\
        14,1.10,1.12,1.09,1.105,100\n\
        15,1.105,1.11,1.1,1.1,50\n\
        14,1.10,1.13,1.09,1.11,120\n";

    #[test]
    fn test_parse_text() {
        let store = RecordStore::load_text(Cursor::new(SAMPLE)).unwrap();
        assert_eq!(store.header(HeaderField::TradingRecsPerday), Some(Decimal::from(1440)));
        assert_eq!(store.len(), 2);
        let rec = store.get(14).unwrap();
        assert_eq!(rec.close.to_string(), "1.11");
        assert_eq!(rec.open.to_string(), "1.10");
    }

    #[test]
    fn test_text_round_trip() {
        let store = RecordStore::load_text(Cursor::new(SAMPLE)).unwrap();
        let text = store.to_text();
        assert!(text.starts_with("0\n1\n1440\n"));
        let reparsed = RecordStore::load_text(Cursor::new(text)).unwrap();
        assert_eq!(reparsed, store);
    }

    #[test]
    fn test_derived_headers_in_text() {
        let mut store = RecordStore::load_text(Cursor::new(SAMPLE)).unwrap();
        store.set_header(HeaderField::LastFcedRecno, Decimal::from(15));
        let text = store.to_text();
        assert_eq!(text.lines().take_while(|l| !l.contains(',')).count(), 13);
        let reparsed = RecordStore::load_text(Cursor::new(text)).unwrap();
        assert_eq!(reparsed.header_u32(HeaderField::LastFcedRecno), Some(15));
        assert_eq!(reparsed.header(HeaderField::Tick), Some(Decimal::ZERO));
    }

    #[test]
    fn test_blank_line_ends_body() {
        let text = format!("{SAMPLE}\n16,1,1,1,1,1\n");
        let store = RecordStore::load_text(Cursor::new(text)).unwrap();
        assert!(store.get(16).is_none());
    }

    #[test]
    fn test_parse_errors() {
        let short = "0\n1\n1440\n14,1,1,1,1,1\n";
        assert!(matches!(
            RecordStore::load_text(Cursor::new(short)),
            Err(OdfceError::Parse { line: 4, .. })
        ));
        let bad = "0\n1\n1440\n840\n5\n1\n1\n14,1,x,1,1,1\n";
        assert!(matches!(
            RecordStore::load_text(Cursor::new(bad)),
            Err(OdfceError::Parse { line: 8, .. })
        ));
        let wide = "0\n1\n1440\n840\n5\n1\n1\n14,1,1,1\n";
        assert!(RecordStore::load_text(Cursor::new(wide)).is_err());
    }
}
