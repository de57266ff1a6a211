//! Text ODF import: conversion to the binary form and upload to the
//! key-value store.

use odfce_format::{BlobLayout, OdfExtension};
use odfce_odf::RecordStore;
use odfce_storage::{BatchWriter, BlobStore, RecordKvStore, ScalarRow, TableSchema, Throughput};
use odfce_types::{Decimal, OdfName, RecordField};
use serde_json::Value as Json;
use tracing::{debug, info};

use crate::PassResult;

fn decimal(value: Decimal) -> Json {
    Json::String(value.normalize().to_string())
}

fn row(name: &OdfName, recno: u32, values: [Decimal; 5]) -> ScalarRow {
    let mut row = ScalarRow::new();
    row.insert(TableSchema::ODF_HASH_KEY.into(), Json::String(name.basename().into()));
    row.insert(TableSchema::ODF_RANGE_KEY.into(), Json::from(recno));
    for (field, value) in [
        RecordField::Open,
        RecordField::High,
        RecordField::Low,
        RecordField::Close,
        RecordField::Volume,
    ]
    .into_iter()
    .zip(values)
    {
        row.insert(field.as_str().into(), decimal(value));
    }
    row
}

/// One key-value row per header and body record of `store`.
///
/// Header rows use their storloc as ODF_RECNO and carry the scalar in
/// ODF_OPEN with the other fields zero.
#[must_use]
pub fn odf_rows(name: &OdfName, store: &RecordStore) -> Vec<ScalarRow> {
    let zero = Decimal::ZERO;
    let headers = store
        .headers()
        .map(|(field, value)| row(name, field.storloc(), [value, zero, zero, zero, zero]));
    let body = store
        .records()
        .map(|r| row(name, r.recno, [r.open, r.high, r.low, r.close, r.volume]));
    headers.chain(body).collect()
}

fn load_text(store: &dyn BlobStore, layout: &BlobLayout, name: &OdfName) -> PassResult<RecordStore> {
    let bytes = store.read(&layout.odf(name, OdfExtension::Text))?;
    Ok(RecordStore::load_text(bytes.as_slice())?)
}

/// Converts the text ODF `name` of `group` to its binary form.
///
/// An existing binary ODF is kept unless `overwrite` is set, since it may
/// already carry a watermark. Returns true if the binary form was written.
///
/// # Errors
///
/// Returns a storage error or a parse error for a malformed text ODF.
pub fn convert_text_odf(
    store: &dyn BlobStore,
    group: &str,
    name: &OdfName,
    overwrite: bool,
) -> PassResult<bool> {
    let layout = BlobLayout::new(group);
    let target = layout.odf(name, OdfExtension::Binary);
    if !overwrite && store.exists(&target)? {
        info!(odf = %name, "binary ODF exists, skipping");
        return Ok(false);
    }

    let odf = load_text(store, &layout, name)?;
    let staging = layout.staging(&target);
    store.write(&staging, &odf.encode()?)?;
    store.move_blob(&staging, &target)?;
    debug!(odf = %name, records = odf.len(), "converted text ODF");
    Ok(true)
}

/// Uploads the text ODF `name` of `group` to the group's key-value table.
/// Returns the number of rows written.
///
/// # Errors
///
/// Returns a storage error, including rows still rejected after retries, or
/// a parse error.
pub fn upload_text_odf(
    store: &dyn BlobStore,
    kv: &dyn RecordKvStore,
    group: &str,
    name: &OdfName,
) -> PassResult<usize> {
    let odf = load_text(store, &BlobLayout::new(group), name)?;
    kv.create_or_get_table(group, &TableSchema::odf(), Throughput::default())?;
    let written = BatchWriter::new(kv).write_all(group, &odf_rows(name, &odf))?;
    debug!(odf = %name, rows = written, "uploaded text ODF");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::find_odfs;
    use odfce_storage::{MemoryBlobStore, MemoryKvStore};

    const TEXT: &str = "0\n60\n1440\n840\n5\n1\n1\n100,1.1001,1.1005,1.0998,1.1002,12\n101,1.1002,1.1004,1.1,1.1003,3.5\n";

    fn name() -> OdfName {
        OdfName::parse("EURUSD-1856460").unwrap()
    }

    #[test]
    fn test_odf_rows() {
        let odf = RecordStore::load_text(TEXT.as_bytes()).unwrap();
        let rows = odf_rows(&name(), &odf);
        assert_eq!(rows.len(), 9);

        let header = &rows[1];
        assert_eq!(header["ODF_NAME"], "EURUSD-1856460");
        assert_eq!(header["ODF_RECNO"], 2);
        assert_eq!(header["ODF_OPEN"], "60");
        assert_eq!(header["ODF_VOLUME"], "0");

        let last = &rows[8];
        assert_eq!(last["ODF_RECNO"], 101);
        assert_eq!(last["ODF_LOW"], "1.1");
        assert_eq!(last["ODF_VOLUME"], "3.5");
    }

    #[test]
    fn test_convert_text_odf() {
        let store = MemoryBlobStore::new();
        store.write("FX/odf/EURUSD-1856460.rs4", TEXT.as_bytes()).unwrap();

        let found = find_odfs(&store, Some("FX"), OdfExtension::Text).unwrap();
        assert_eq!(found, vec![("FX".to_string(), name())]);
        assert!(convert_text_odf(&store, "FX", &name(), false).unwrap());

        let bytes = store.read("FX/odf/EURUSD-1856460.rs3").unwrap();
        let odf = RecordStore::load(&mut bytes.as_slice()).unwrap();
        assert_eq!(odf.get(101).unwrap().volume, "3.5".parse::<Decimal>().unwrap());
        assert!(store.list("FX/staging/").unwrap().is_empty());

        assert!(!convert_text_odf(&store, "FX", &name(), false).unwrap());
        assert!(convert_text_odf(&store, "FX", &name(), true).unwrap());
    }

    #[test]
    fn test_upload_text_odf() {
        let store = MemoryBlobStore::new();
        store.write("FX/odf/EURUSD-1856460.rs4", TEXT.as_bytes()).unwrap();
        let kv = MemoryKvStore::new();

        assert_eq!(upload_text_odf(&store, &kv, "FX", &name()).unwrap(), 9);
        assert_eq!(kv.row_count("FX"), 9);
        assert_eq!(kv.list_symbol_groups().unwrap(), vec!["FX".to_string()]);
        assert_eq!(kv.list_symbols("FX").unwrap(), vec!["EURUSD".to_string()]);
        let row = kv.read_scalar_row("FX", "EURUSD-1856460", Some("100")).unwrap().unwrap();
        assert_eq!(row["ODF_CLOSE"], "1.1002");
    }
}
