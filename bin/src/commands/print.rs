//! Print command.

use crate::display::{Format, print_records, print_scalars};
use crate::setup::Stores;
use anyhow::{Context, Result};
use odfce_lib::{
    BlobLayout, BlobStore, Chunk, ChunkExtension, ChunkId, Cipher, Epoch, Fce, Fifo,
    OdfExtension, OdfName, Record, RecordStore, Settings, ShortChunk,
};

/// Address and dequantization parameters of the chunk to print.
pub(crate) struct ChunkArgs {
    pub(crate) group: String,
    pub(crate) symbol: String,
    pub(crate) l_code: u16,
    pub(crate) epoch: u32,
    pub(crate) chunk: u32,
    pub(crate) short: bool,
    pub(crate) tick: u32,
    pub(crate) divider: u32,
}

fn cipher(settings: &Settings) -> Result<Cipher> {
    Ok(Cipher::new(settings.cipher_key_bytes()?)?)
}

fn read(store: &dyn BlobStore, path: &str) -> Result<Vec<u8>> {
    store.read(path).with_context(|| format!("Failed to read {path}"))
}

/// Loads the binary ODF, falling back to the text form.
fn load_odf(stores: &Stores, layout: &BlobLayout, name: &OdfName) -> Result<RecordStore> {
    let binary = layout.odf(name, OdfExtension::Binary);
    if stores.local.exists(&binary)? {
        return Ok(RecordStore::load(&mut read(&stores.local, &binary)?.as_slice())?);
    }
    let text = layout.odf(name, OdfExtension::Text);
    Ok(RecordStore::load_text(read(&stores.local, &text)?.as_slice())?)
}

/// Prints an ODF. CSV output is the ODF text form.
pub(crate) fn print_odf(settings: &Settings, group: &str, name: &str, format: Format) -> Result<()> {
    let stores = Stores::open(settings)?;
    let name = OdfName::parse(name)?;
    let store = load_odf(&stores, &BlobLayout::new(group), &name)?;

    if matches!(format, Format::Csv) {
        print!("{}", store.to_text());
        return Ok(());
    }
    let headers: Vec<_> = store.headers().map(|(f, v)| (f.as_str(), v)).collect();
    print_scalars(&headers, format)?;
    let records: Vec<Record> = store.records().copied().collect();
    print_records(&records, format)
}

/// Prints the persisted FIFO of an ODF, or the one a pass would build.
pub(crate) fn print_fifo(settings: &Settings, group: &str, name: &str, format: Format) -> Result<()> {
    let stores = Stores::open(settings)?;
    let name = OdfName::parse(name)?;
    let layout = BlobLayout::new(group);
    let path = layout.fifo(&name);

    let fifo = if stores.local.exists(&path)? {
        Fifo::load(&mut read(&stores.local, &path)?.as_slice())?
    } else {
        let store = load_odf(&stores, &layout, &name)?;
        let limits = store.limits(settings.recno_cycle)?;
        Fifo::build_from_window(&store, settings.fifo_count, &limits)
    };

    if matches!(format, Format::Csv) {
        print!("{}", fifo.to_text());
        return Ok(());
    }
    print_scalars(
        &[
            ("TICK", fifo.tick().into()),
            ("OHLC_DIVIDER", fifo.divider().into()),
        ],
        format,
    )?;
    let records: Vec<Record> = fifo.records().copied().collect();
    print_records(&records, format)
}

/// Prints the decrypted scalars of an FCE header.
pub(crate) fn print_fce(
    settings: &Settings,
    group: &str,
    symbol: &str,
    epoch: u32,
    format: Format,
) -> Result<()> {
    let stores = Stores::open(settings)?;
    let path = BlobLayout::new(group).fce_header(symbol, Epoch::new(epoch));
    let fce = Fce::decode(&read(&stores.remote, &path)?, &cipher(settings)?)
        .with_context(|| format!("Failed to decode {path}"))?;
    let scalars: Vec<_> = fce.fields().map(|(f, v)| (f.as_str(), v)).collect();
    print_scalars(&scalars, format)
}

/// Prints the gap-filled cells of a long chunk, or of a dequantized short one.
pub(crate) fn print_chunk(settings: &Settings, args: &ChunkArgs, format: Format) -> Result<()> {
    let stores = Stores::open(settings)?;
    let layout = BlobLayout::new(args.group.as_str());
    let id = ChunkId {
        l_code: args.l_code,
        epoch: Epoch::new(args.epoch),
        chunk_no: args.chunk,
    };
    let path = |ext| layout.chunk(&args.symbol, id.l_code, id.epoch, id.chunk_no, ext);
    let cipher = cipher(settings)?;
    let chunk_cipher = settings.encrypt_chunks.then_some(&cipher);

    let chunk = if args.short {
        let path = path(ChunkExtension::Short);
        let bytes = read(&stores.remote, &path)?;
        ShortChunk::decode(id, settings.chunk_size, &bytes, chunk_cipher)
            .with_context(|| format!("Failed to decode {path}"))?
            .dequantize_to_long(args.tick, args.divider)
    } else {
        let path = path(ChunkExtension::Long);
        let mut bytes = read(&stores.local, &path)?;
        if let Some(cipher) = chunk_cipher {
            cipher.apply(&mut bytes);
        }
        Chunk::decode_long(id, settings.chunk_size, &bytes)
            .with_context(|| format!("Failed to decode {path}"))?
            .filled()
    };
    print_records(chunk.cells(), format)
}
