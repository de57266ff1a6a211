//! Chunks: fixed-length arrays of bar cells plus a header.
//!
//! A [`Chunk`] holds decimal ("long") cells and is what a pass accumulates
//! into. [`ShortChunk`] is its 16-bit quantized form. Cells are 1-based; the
//! header sits at logical position `size + 1` in both binary encodings.

use odfce_codec::{Cipher, Codec, Value, layout};
use odfce_types::{Decimal, OdfceError, Record, Result};
use rust_decimal::prelude::ToPrimitive;
use tracing::warn;

use crate::ChunkId;

const SHORT_MAX: u64 = u16::MAX as u64;

/// Quantizes `value` to a whole number of `unit`s, rounding down.
///
/// Non-positive values and units quantize to 0. The result satisfies
/// `|dequantize(quantize(v, d), d) - v| <= d` for `v >= 0`.
#[must_use]
pub fn quantize(value: Decimal, unit: Decimal) -> u64 {
    if unit <= Decimal::ZERO || value <= Decimal::ZERO {
        return 0;
    }
    (value / unit).floor().to_u64().unwrap_or(u64::MAX)
}

/// Inverse of [`quantize`].
#[must_use]
pub fn dequantize(quantized: u64, unit: Decimal) -> Decimal {
    Decimal::from(quantized) * unit
}

/// Header of a long chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkHeader {
    /// Lowest populated LOW, unscaled.
    pub lowest_low: Decimal,
    /// Volume units per quantized volume step.
    pub volume_tick: u64,
    /// Lowest ODF recno written into the chunk.
    pub open_recno: u32,
    /// Highest ODF recno written into the chunk.
    pub close_recno: u32,
}

/// Which price fields one record writes into its cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellUpdate {
    /// Write OPEN.
    pub write_open: bool,
    /// Write CLOSE.
    pub write_close: bool,
}

/// A chunk of decimal cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    id: ChunkId,
    cells: Vec<Record>,
    header: ChunkHeader,
}

fn is_empty_cell(cell: &Record) -> bool {
    cell.open.is_zero() && cell.high.is_zero() && cell.low.is_zero() && cell.close.is_zero()
}

fn check_len(schema: &'static str, expected: usize, actual: usize) -> Result<()> {
    if actual < expected {
        return Err(OdfceError::ShortRead {
            schema,
            expected,
            actual,
        });
    }
    if actual > expected {
        return Err(OdfceError::SizeMismatch {
            schema,
            declared: expected,
            computed: actual,
        });
    }
    Ok(())
}

fn int_at(values: &[Value], idx: usize) -> u64 {
    values.get(idx).and_then(Value::as_int).unwrap_or(0)
}

fn decimal_at(values: &[Value], idx: usize) -> Decimal {
    values.get(idx).map(Value::to_decimal).unwrap_or_default()
}

/// `max(1, ceil(highest_volume / 65535))`.
fn volume_tick_for(highest_volume: Decimal) -> u64 {
    (highest_volume / Decimal::from(SHORT_MAX))
        .ceil()
        .to_u64()
        .unwrap_or(u64::MAX)
        .max(1)
}

fn clamp_u16(value: u64, saturated: &mut usize) -> u16 {
    u16::try_from(value).unwrap_or_else(|_| {
        *saturated += 1;
        u16::MAX
    })
}

impl Chunk {
    /// Creates a zeroed chunk of `size` cells.
    #[must_use]
    pub fn new(id: ChunkId, size: u32) -> Self {
        Self {
            id,
            cells: (1..=size).map(Record::zero).collect(),
            header: ChunkHeader::default(),
        }
    }

    /// Chunk identity.
    #[must_use]
    pub const fn id(&self) -> ChunkId {
        self.id
    }

    /// Number of cells.
    #[must_use]
    pub fn size(&self) -> u32 {
        u32::try_from(self.cells.len()).unwrap_or(u32::MAX)
    }

    /// Cells in order; each cell's recno is its 1-based position.
    #[must_use]
    pub fn cells(&self) -> &[Record] {
        &self.cells
    }

    /// Returns the cell at 1-based position `chunk_recno`.
    #[must_use]
    pub fn cell(&self, chunk_recno: u32) -> Option<&Record> {
        let idx = usize::try_from(chunk_recno.checked_sub(1)?).ok()?;
        self.cells.get(idx)
    }

    /// Chunk header.
    #[must_use]
    pub const fn header(&self) -> &ChunkHeader {
        &self.header
    }

    /// Folds one ODF record into cell `chunk_recno`.
    ///
    /// HIGH and LOW are running extremes that ignore empty values, VOLUME is
    /// a running sum and the header tracks the lowest and highest recno.
    ///
    /// # Errors
    ///
    /// Returns [`OdfceError::ValueOutOfRange`] if `chunk_recno` is not a cell.
    pub fn apply(
        &mut self,
        chunk_recno: u32,
        recno: u32,
        record: &Record,
        update: CellUpdate,
    ) -> Result<()> {
        let size = self.cells.len();
        let cell = chunk_recno
            .checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| self.cells.get_mut(i))
            .ok_or_else(|| OdfceError::ValueOutOfRange {
                field: "CHUNK_RECNO",
                value: format!("{chunk_recno} (chunk size {size})"),
            })?;

        if update.write_open {
            cell.open = record.open;
        }
        if update.write_close {
            cell.close = record.close;
        }
        if record.high > cell.high {
            cell.high = record.high;
        }
        if !record.low.is_zero() && (cell.low.is_zero() || record.low < cell.low) {
            cell.low = record.low;
        }
        cell.volume += record.volume;

        if self.header.open_recno == 0 || recno < self.header.open_recno {
            self.header.open_recno = recno;
        }
        self.header.close_recno = self.header.close_recno.max(recno);
        Ok(())
    }

    /// Highest VOLUME among populated cells (LOW > 0).
    #[must_use]
    pub fn highest_volume(&self) -> Decimal {
        self.cells
            .iter()
            .filter(|c| c.low > Decimal::ZERO)
            .map(|c| c.volume)
            .max()
            .unwrap_or_default()
    }

    /// Lowest LOW among populated cells (LOW > 0).
    #[must_use]
    pub fn lowest_low(&self) -> Decimal {
        self.cells
            .iter()
            .filter(|c| c.low > Decimal::ZERO)
            .map(|c| c.low)
            .min()
            .unwrap_or_default()
    }

    /// Fills the leading and trailing empty cells.
    ///
    /// Cells before the first OPEN are back-filled with that OPEN; empty
    /// cells after the last CLOSE are forward-filled with it. Empty cells
    /// between populated ones stay zero, as does an entirely empty chunk.
    /// Returns the number of cells filled.
    pub fn fill_empty_cells(&mut self) -> usize {
        let mut filled = 0;

        if let Some(first) = self.cells.iter().position(|c| c.open > Decimal::ZERO) {
            let open = self.cells[first].open;
            for cell in self.cells[..first].iter_mut().filter(|c| is_empty_cell(c)) {
                *cell = Record::flat(cell.recno, open, cell.volume);
                filled += 1;
            }
        }

        if let Some(last) = self.cells.iter().rposition(|c| c.close > Decimal::ZERO) {
            let close = self.cells[last].close;
            for cell in self.cells[last + 1..].iter_mut().filter(|c| is_empty_cell(c)) {
                *cell = Record::flat(cell.recno, close, cell.volume);
                filled += 1;
            }
        }
        filled
    }

    /// Returns a gap-filled copy.
    #[must_use]
    pub fn filled(&self) -> Self {
        let mut copy = self.clone();
        copy.fill_empty_cells();
        copy
    }

    /// Quantizes into a [`ShortChunk`].
    ///
    /// A price becomes one plus its whole ticks above LOWEST_LOW, both scaled
    /// by `divider`, so that 0 is left for an empty price; volumes become
    /// whole VOLUME_TICKs with
    /// `VOLUME_TICK = max(1, ceil(highest_volume / 65535))`. Values that do
    /// not fit 16 bits saturate and are reported once per chunk.
    #[must_use]
    pub fn quantize_to_short(&self, tick: u32, divider: u32) -> ShortChunk {
        let scale = Decimal::from(divider.max(1));
        let tick_unit = Decimal::from(tick.max(1));
        let lowest = (self.lowest_low() * scale).floor();
        let volume_tick = volume_tick_for(self.highest_volume());
        let volume_unit = Decimal::from(volume_tick);

        let mut saturated = 0;
        let price = |value: Decimal, saturated: &mut usize| {
            if value.is_zero() {
                return 0;
            }
            let ticks = quantize(value * scale - lowest, tick_unit);
            clamp_u16(ticks.saturating_add(1), saturated)
        };
        let cells = self
            .cells
            .iter()
            .map(|c| ShortCell {
                open: price(c.open, &mut saturated),
                high: price(c.high, &mut saturated),
                low: price(c.low, &mut saturated),
                close: price(c.close, &mut saturated),
                volume: clamp_u16(quantize(c.volume, volume_unit), &mut saturated),
            })
            .collect();

        let header = ShortHeader {
            lowest_low: lowest.to_u32().unwrap_or_else(|| {
                saturated += 1;
                u32::MAX
            }),
            volume_tick: clamp_u16(volume_tick, &mut saturated),
            open_recno: clamp_u16(u64::from(self.header.open_recno), &mut saturated),
            close_recno: clamp_u16(u64::from(self.header.close_recno), &mut saturated),
        };
        if saturated > 0 {
            warn!(chunk = %self.id, saturated, tick, divider, "values saturated while quantizing");
        }

        ShortChunk {
            id: self.id,
            cells,
            header,
        }
    }

    /// Encodes the long binary form.
    ///
    /// # Errors
    ///
    /// Returns a codec error if a header value does not fit its field.
    pub fn encode_long(&self) -> Result<Vec<u8>> {
        let cell = Codec::new(layout::CHUNK_LONG_CELL)?;
        let header = Codec::new(layout::CHUNK_LONG_HEADER)?;
        let mut out = Vec::with_capacity(cell.size() * (self.cells.len() + 1));
        for c in &self.cells {
            out.extend(cell.encode(&[
                Value::from_decimal(c.open),
                Value::from_decimal(c.high),
                Value::from_decimal(c.low),
                Value::from_decimal(c.close),
                Value::from_decimal(c.volume),
            ])?);
        }
        out.extend(header.encode(&[
            Value::from_decimal(self.header.lowest_low),
            Value::Int(self.header.volume_tick),
            Value::Int(u64::from(self.header.open_recno)),
            Value::Int(u64::from(self.header.close_recno)),
        ])?);
        Ok(out)
    }

    /// Decodes the long binary form of a chunk with `size` cells.
    ///
    /// # Errors
    ///
    /// Returns [`OdfceError::ShortRead`] or [`OdfceError::SizeMismatch`] if
    /// the buffer is not exactly `size + 1` frames.
    pub fn decode_long(id: ChunkId, size: u32, bytes: &[u8]) -> Result<Self> {
        let cell = Codec::new(layout::CHUNK_LONG_CELL)?;
        let header = Codec::new(layout::CHUNK_LONG_HEADER)?;
        let frame = cell.size();
        check_len("CHUNK_LONG", frame * (size as usize + 1), bytes.len())?;

        let mut frames = bytes.chunks_exact(frame);
        let mut cells = Vec::with_capacity(size as usize);
        for (recno, raw) in (1..=size).zip(frames.by_ref()) {
            let v = cell.decode(raw)?;
            cells.push(Record::new(
                recno,
                decimal_at(&v, 0),
                decimal_at(&v, 1),
                decimal_at(&v, 2),
                decimal_at(&v, 3),
                decimal_at(&v, 4),
            ));
        }
        let raw = frames.next().ok_or(OdfceError::ShortRead {
            schema: "CHUNK_LONG",
            expected: frame,
            actual: 0,
        })?;
        let v = header.decode(raw)?;
        Ok(Self {
            id,
            cells,
            header: ChunkHeader {
                lowest_low: decimal_at(&v, 0),
                volume_tick: int_at(&v, 1),
                open_recno: u32::try_from(int_at(&v, 2)).unwrap_or(u32::MAX),
                close_recno: u32::try_from(int_at(&v, 3)).unwrap_or(u32::MAX),
            },
        })
    }

    /// Sets the header's LOWEST_LOW and VOLUME_TICK from the cells.
    pub fn refresh_header(&mut self) {
        self.header.lowest_low = self.lowest_low();
        self.header.volume_tick = volume_tick_for(self.highest_volume());
    }
}

/// One quantized cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShortCell {
    /// OPEN as 1 + ticks above LOWEST_LOW; 0 if empty.
    pub open: u16,
    /// HIGH as 1 + ticks above LOWEST_LOW; 0 if empty.
    pub high: u16,
    /// LOW as 1 + ticks above LOWEST_LOW; 0 if empty.
    pub low: u16,
    /// CLOSE as 1 + ticks above LOWEST_LOW; 0 if empty.
    pub close: u16,
    /// VOLUME in VOLUME_TICKs.
    pub volume: u16,
}

/// Header of a quantized chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShortHeader {
    /// LOWEST_LOW scaled by the divider.
    pub lowest_low: u32,
    /// Volume units per quantized step.
    pub volume_tick: u16,
    /// Lowest ODF recno written into the chunk.
    pub open_recno: u16,
    /// Highest ODF recno written into the chunk.
    pub close_recno: u16,
}

/// A quantized chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortChunk {
    id: ChunkId,
    cells: Vec<ShortCell>,
    header: ShortHeader,
}

impl ShortChunk {
    /// Chunk identity.
    #[must_use]
    pub const fn id(&self) -> ChunkId {
        self.id
    }

    /// Quantized cells.
    #[must_use]
    pub fn cells(&self) -> &[ShortCell] {
        &self.cells
    }

    /// Quantized header.
    #[must_use]
    pub const fn header(&self) -> &ShortHeader {
        &self.header
    }

    /// Restores decimal cells. Empty prices stay zero; every other price is
    /// off by less than one tick and each volume by less than one
    /// VOLUME_TICK.
    #[must_use]
    pub fn dequantize_to_long(&self, tick: u32, divider: u32) -> Chunk {
        let scale = Decimal::from(divider.max(1));
        let tick_unit = Decimal::from(tick.max(1));
        let lowest = Decimal::from(self.header.lowest_low);
        let volume_unit = Decimal::from(self.header.volume_tick.max(1));
        let price = |q: u16| match q {
            0 => Decimal::ZERO,
            q => (dequantize(u64::from(q - 1), tick_unit) + lowest) / scale,
        };

        let cells = (1..)
            .zip(&self.cells)
            .map(|(recno, c)| {
                Record::new(
                    recno,
                    price(c.open),
                    price(c.high),
                    price(c.low),
                    price(c.close),
                    dequantize(u64::from(c.volume), volume_unit),
                )
            })
            .collect();

        Chunk {
            id: self.id,
            cells,
            header: ChunkHeader {
                lowest_low: lowest / scale,
                volume_tick: u64::from(self.header.volume_tick),
                open_recno: u32::from(self.header.open_recno),
                close_recno: u32::from(self.header.close_recno),
            },
        }
    }

    /// Encodes the short binary form, optionally encrypted.
    ///
    /// # Errors
    ///
    /// Returns a codec error; every value fits by construction.
    pub fn encode(&self, cipher: Option<&Cipher>) -> Result<Vec<u8>> {
        let cell = Codec::new(layout::CHUNK_SHORT_CELL)?;
        let header = Codec::new(layout::CHUNK_SHORT_HEADER)?;
        let mut out = Vec::with_capacity(cell.size() * (self.cells.len() + 1));
        for c in &self.cells {
            out.extend(cell.encode(&[
                Value::Int(u64::from(c.open)),
                Value::Int(u64::from(c.high)),
                Value::Int(u64::from(c.low)),
                Value::Int(u64::from(c.close)),
                Value::Int(u64::from(c.volume)),
            ])?);
        }
        out.extend(header.encode(&[
            Value::Int(u64::from(self.header.lowest_low)),
            Value::Int(u64::from(self.header.volume_tick)),
            Value::Int(u64::from(self.header.open_recno)),
            Value::Int(u64::from(self.header.close_recno)),
        ])?);
        if let Some(cipher) = cipher {
            cipher.apply(&mut out);
        }
        Ok(out)
    }

    /// Decodes the short binary form of a chunk with `size` cells.
    ///
    /// # Errors
    ///
    /// Returns [`OdfceError::ShortRead`] or [`OdfceError::SizeMismatch`] if
    /// the buffer is not exactly `size + 1` frames.
    pub fn decode(id: ChunkId, size: u32, bytes: &[u8], cipher: Option<&Cipher>) -> Result<Self> {
        let cell = Codec::new(layout::CHUNK_SHORT_CELL)?;
        let header = Codec::new(layout::CHUNK_SHORT_HEADER)?;
        let frame = cell.size();
        check_len("CHUNK_SHORT", frame * (size as usize + 1), bytes.len())?;

        let mut buf = bytes.to_vec();
        if let Some(cipher) = cipher {
            cipher.apply(&mut buf);
        }
        let narrow = |v: &[Value], idx: usize| u16::try_from(int_at(v, idx)).unwrap_or(u16::MAX);

        let mut frames = buf.chunks_exact(frame);
        let mut cells = Vec::with_capacity(size as usize);
        for raw in frames.by_ref().take(size as usize) {
            let v = cell.decode(raw)?;
            cells.push(ShortCell {
                open: narrow(&v, 0),
                high: narrow(&v, 1),
                low: narrow(&v, 2),
                close: narrow(&v, 3),
                volume: narrow(&v, 4),
            });
        }
        let raw = frames.next().ok_or(OdfceError::ShortRead {
            schema: "CHUNK_SHORT",
            expected: frame,
            actual: 0,
        })?;
        let v = header.decode(raw)?;
        Ok(Self {
            id,
            cells,
            header: ShortHeader {
                lowest_low: u32::try_from(int_at(&v, 0)).unwrap_or(u32::MAX),
                volume_tick: narrow(&v, 1),
                open_recno: narrow(&v, 2),
                close_recno: narrow(&v, 3),
            },
        })
    }
}
