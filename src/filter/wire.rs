//! Wire format: filter id (handled by the transport layer, not here),
//! kind tag (u8), column-type tag (u8), flags (u16), then a kind-specific
//! payload. Manual length-prefixed binary encoding, not a generic
//! serializer, because the layout below is exact and must round-trip
//! across versions that may not share a Rust type.

use crate::filter::error::{FilterError, FilterResult};
use crate::filter::types::{ColumnType, ColumnValue};
use crate::filter::value::{
    BitmapPayload, BloomPayload, FilterValue, InOrBloomPayload, InSetPayload, MinMaxPayload,
    Polarity,
};

// Flags are a plain u16 (four bits defined below) rather than an
// external bitflags dependency, since the layout needs exactly four.
pub const FLAG_IGNORED: u16 = 1 << 0;
pub const FLAG_ALWAYS_TRUE: u16 = 1 << 1;
pub const FLAG_POLARITY_NOT_IN: u16 = 1 << 2;
pub const FLAG_NULL_CONTAINED: u16 = 1 << 3;

const KIND_IN_SET: u8 = 0;
const KIND_MIN_MAX: u8 = 1;
const KIND_BLOOM: u8 = 2;
const KIND_IN_OR_BLOOM: u8 = 3;
const KIND_BITMAP: u8 = 4;

fn column_type_tag(ct: ColumnType) -> u8 {
    use ColumnType::*;
    match ct {
        Bool => 0,
        Int8 => 1,
        Int16 => 2,
        Int32 => 3,
        Int64 => 4,
        Int128 => 5,
        Float => 6,
        Double => 7,
        Decimal32 => 8,
        Decimal64 => 9,
        Decimal128 => 10,
        DecimalLegacy => 11,
        Date => 12,
        DateTime => 13,
        DateV2 => 14,
        DateTimeV2 => 15,
        Char => 16,
        VarChar => 17,
        String => 18,
        Hll => 19,
        Time => 20,
    }
}

fn column_type_from_tag(tag: u8) -> FilterResult<ColumnType> {
    use ColumnType::*;
    Ok(match tag {
        0 => Bool,
        1 => Int8,
        2 => Int16,
        3 => Int32,
        4 => Int64,
        5 => Int128,
        6 => Float,
        7 => Double,
        8 => Decimal32,
        9 => Decimal64,
        10 => Decimal128,
        11 => DecimalLegacy,
        12 => Date,
        13 => DateTime,
        14 => DateV2,
        15 => DateTimeV2,
        16 => Char,
        17 => VarChar,
        18 => String,
        19 => Hll,
        20 => Time,
        other => {
            return Err(FilterError::SerializationError(format!(
                "unknown column type tag {other}"
            )))
        }
    })
}

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i128(&mut self, v: i128) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn bytes_field(&mut self, b: &[u8]) {
        self.u32(b.len() as u32);
        self.buf.extend_from_slice(b);
    }

    fn opt_value(&mut self, v: Option<&ColumnValue>) {
        match v {
            None => self.u8(0),
            Some(val) => {
                self.u8(1);
                self.value(val);
            }
        }
    }

    fn value(&mut self, v: &ColumnValue) {
        match v {
            ColumnValue::Null => self.u8(0),
            ColumnValue::Bool(b) => {
                self.u8(1);
                self.u8(*b as u8);
            }
            ColumnValue::Int8(x) => {
                self.u8(2);
                self.u8(*x as u8);
            }
            ColumnValue::Int16(x) => {
                self.u8(3);
                self.buf.extend_from_slice(&x.to_le_bytes());
            }
            ColumnValue::Int32(x) => {
                self.u8(4);
                self.buf.extend_from_slice(&x.to_le_bytes());
            }
            ColumnValue::Int64(x) => {
                self.u8(5);
                self.i64(*x);
            }
            ColumnValue::Int128(x) => {
                self.u8(6);
                self.i128(*x);
            }
            ColumnValue::Float(x) => {
                self.u8(7);
                self.buf.extend_from_slice(&x.to_le_bytes());
            }
            ColumnValue::Double(x) => {
                self.u8(8);
                self.buf.extend_from_slice(&x.to_le_bytes());
            }
            ColumnValue::Decimal {
                unscaled,
                precision,
                scale,
            } => {
                self.u8(9);
                self.i128(*unscaled);
                self.u8(*precision);
                self.u8(*scale);
            }
            ColumnValue::Date(x) => {
                self.u8(10);
                self.buf.extend_from_slice(&x.to_le_bytes());
            }
            ColumnValue::DateTime(x) => {
                self.u8(11);
                self.i64(*x);
            }
            ColumnValue::Bytes(b) => {
                self.u8(12);
                self.bytes_field(b);
            }
            ColumnValue::Hll(b) => {
                self.u8(13);
                self.bytes_field(b);
            }
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn need(&self, n: usize) -> FilterResult<()> {
        if self.pos + n > self.buf.len() {
            Err(FilterError::SerializationError(
                "unexpected end of filter payload".into(),
            ))
        } else {
            Ok(())
        }
    }

    fn u8(&mut self) -> FilterResult<u8> {
        self.need(1)?;
        let v = self.buf[self.pos];
        self.pos += 1;
        Ok(v)
    }

    fn u16(&mut self) -> FilterResult<u16> {
        self.need(2)?;
        let v = u16::from_le_bytes(self.buf[self.pos..self.pos + 2].try_into().unwrap());
        self.pos += 2;
        Ok(v)
    }

    fn u32(&mut self) -> FilterResult<u32> {
        self.need(4)?;
        let v = u32::from_le_bytes(self.buf[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }

    fn i16(&mut self) -> FilterResult<i16> {
        self.need(2)?;
        let v = i16::from_le_bytes(self.buf[self.pos..self.pos + 2].try_into().unwrap());
        self.pos += 2;
        Ok(v)
    }

    fn i32(&mut self) -> FilterResult<i32> {
        self.need(4)?;
        let v = i32::from_le_bytes(self.buf[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }

    fn i64(&mut self) -> FilterResult<i64> {
        self.need(8)?;
        let v = i64::from_le_bytes(self.buf[self.pos..self.pos + 8].try_into().unwrap());
        self.pos += 8;
        Ok(v)
    }

    fn i128(&mut self) -> FilterResult<i128> {
        self.need(16)?;
        let v = i128::from_le_bytes(self.buf[self.pos..self.pos + 16].try_into().unwrap());
        self.pos += 16;
        Ok(v)
    }

    fn f32(&mut self) -> FilterResult<f32> {
        self.need(4)?;
        let v = f32::from_le_bytes(self.buf[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }

    fn f64(&mut self) -> FilterResult<f64> {
        self.need(8)?;
        let v = f64::from_le_bytes(self.buf[self.pos..self.pos + 8].try_into().unwrap());
        self.pos += 8;
        Ok(v)
    }

    fn bytes_field(&mut self) -> FilterResult<Vec<u8>> {
        let len = self.u32()? as usize;
        self.need(len)?;
        let v = self.buf[self.pos..self.pos + len].to_vec();
        self.pos += len;
        Ok(v)
    }

    fn opt_value(&mut self) -> FilterResult<Option<ColumnValue>> {
        match self.u8()? {
            0 => Ok(None),
            1 => self.value().map(Some),
            other => Err(FilterError::SerializationError(format!(
                "invalid optional-value tag {other}"
            ))),
        }
    }

    fn value(&mut self) -> FilterResult<ColumnValue> {
        let tag = self.u8()?;
        Ok(match tag {
            0 => ColumnValue::Null,
            1 => ColumnValue::Bool(self.u8()? != 0),
            2 => ColumnValue::Int8(self.u8()? as i8),
            3 => ColumnValue::Int16(self.i16()?),
            4 => ColumnValue::Int32(self.i32()?),
            5 => ColumnValue::Int64(self.i64()?),
            6 => ColumnValue::Int128(self.i128()?),
            7 => ColumnValue::Float(self.f32()?),
            8 => ColumnValue::Double(self.f64()?),
            9 => {
                let unscaled = self.i128()?;
                let precision = self.u8()?;
                let scale = self.u8()?;
                ColumnValue::Decimal {
                    unscaled,
                    precision,
                    scale,
                }
            }
            10 => ColumnValue::Date(self.i32()?),
            11 => ColumnValue::DateTime(self.i64()?),
            12 => ColumnValue::Bytes(self.bytes_field()?),
            13 => ColumnValue::Hll(self.bytes_field()?),
            other => {
                return Err(FilterError::SerializationError(format!(
                    "invalid value tag {other}"
                )))
            }
        })
    }
}

/// Wrapper-level flags carried alongside a filter's payload: whether the
/// filter is ignored or always-true. Kind-specific flags (polarity) are
/// folded in automatically by `encode`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Envelope {
    pub ignored: bool,
    pub always_true: bool,
}

/// Encode one filter's contents (kind tag, column-type tag, flags, kind
/// payload). The filter id is carried by the transport, not embedded
/// here, since it is a routing key rather than filter content.
pub fn encode(value: &FilterValue, column_type: ColumnType) -> FilterResult<Vec<u8>> {
    encode_with_envelope(value, column_type, Envelope::default())
}

pub fn encode_with_envelope(
    value: &FilterValue,
    column_type: ColumnType,
    envelope: Envelope,
) -> FilterResult<Vec<u8>> {
    let mut w = Writer::new();
    let (kind, mut flags) = kind_and_flags(value);
    if envelope.ignored {
        flags |= FLAG_IGNORED;
    }
    if envelope.always_true {
        flags |= FLAG_ALWAYS_TRUE;
    }
    w.u8(kind);
    w.u8(column_type_tag(column_type));
    w.u16(flags);
    encode_payload(&mut w, value);
    Ok(w.buf)
}

fn kind_and_flags(value: &FilterValue) -> (u8, u16) {
    match value {
        FilterValue::InSet(_) => (KIND_IN_SET, 0),
        FilterValue::MinMax(_) => (KIND_MIN_MAX, 0),
        FilterValue::Bloom(_) => (KIND_BLOOM, 0),
        // the set-vs-bloom discriminator lives in the payload itself
        FilterValue::InOrBloom(_) => (KIND_IN_OR_BLOOM, 0),
        FilterValue::Bitmap(bm) => (
            KIND_BITMAP,
            if bm.polarity() == Polarity::NotIn {
                FLAG_POLARITY_NOT_IN
            } else {
                0
            },
        ),
    }
}

fn encode_payload(w: &mut Writer, value: &FilterValue) {
    match value {
        FilterValue::InSet(set) => {
            w.u8(if set.contains_null() { 1 } else { 0 });
            w.u32(set.len() as u32);
            for v in set.values() {
                w.value(v);
            }
        }
        FilterValue::MinMax(mm) => {
            w.opt_value(mm.min());
            w.opt_value(mm.max());
        }
        FilterValue::Bloom(bloom) => encode_bloom(w, bloom),
        FilterValue::InOrBloom(v) => match v {
            InOrBloomPayload::Set(set) => {
                w.u8(0);
                w.u8(if set.contains_null() { 1 } else { 0 });
                w.u32(set.len() as u32);
                for v in set.values() {
                    w.value(v);
                }
            }
            InOrBloomPayload::Bloom(bloom) => {
                w.u8(1);
                encode_bloom(w, bloom);
            }
        },
        FilterValue::Bitmap(bm) => {
            let runs = bm.runs();
            w.u32(runs.len() as u32);
            for (start, len) in runs {
                w.i64(start);
                w.u64(len);
            }
        }
    }
}

fn encode_bloom(w: &mut Writer, bloom: &BloomPayload) {
    w.u32(bloom.num_bits());
    w.u8(bloom.num_hashes());
    w.u8(if bloom.contains_null() { 1 } else { 0 });
    for word in bloom.bits() {
        w.buf.extend_from_slice(&word.to_le_bytes());
    }
}

fn decode_bloom(r: &mut Reader) -> FilterResult<BloomPayload> {
    let num_bits = r.u32()?;
    let num_hashes = r.u8()?;
    let contains_null = r.u8()? != 0;
    let words = (num_bits as usize).div_ceil(64);
    let mut raw = Vec::with_capacity(words);
    for _ in 0..words {
        r.need(8)?;
        let word = u64::from_le_bytes(r.buf[r.pos..r.pos + 8].try_into().unwrap());
        r.pos += 8;
        raw.push(word);
    }
    let mut bloom = BloomPayload::from_raw_bits(num_bits, num_hashes, raw)?;
    bloom.set_contains_null(contains_null);
    Ok(bloom)
}

/// Decode a filter's wire bytes, returning the column type embedded in
/// the payload alongside the reconstructed value so the caller can
/// cross-check it against the consumer's own binding.
pub fn decode(bytes: &[u8], expected_column_type: ColumnType) -> FilterResult<FilterValue> {
    decode_with_envelope(bytes, expected_column_type).map(|(v, _)| v)
}

pub fn decode_with_envelope(
    bytes: &[u8],
    expected_column_type: ColumnType,
) -> FilterResult<(FilterValue, Envelope)> {
    let mut r = Reader::new(bytes);
    let kind = r.u8()?;
    let column_type = column_type_from_tag(r.u8()?)?;
    if column_type != expected_column_type {
        return Err(FilterError::SerializationError(format!(
            "column type mismatch: expected {expected_column_type:?}, got {column_type:?}"
        )));
    }
    let flags = r.u16()?;
    let envelope = Envelope {
        ignored: flags & FLAG_IGNORED != 0,
        always_true: flags & FLAG_ALWAYS_TRUE != 0,
    };
    let value: FilterResult<FilterValue> = match kind {
        KIND_IN_SET => {
            let contains_null = r.u8()? != 0;
            let count = r.u32()?;
            let mut set = InSetPayload::new(count.max(1) as usize);
            for _ in 0..count {
                let v = r.value()?;
                let _ = set.insert(&v);
            }
            if contains_null {
                let _ = set.insert(&ColumnValue::Null);
            }
            Ok(FilterValue::InSet(set))
        }
        KIND_MIN_MAX => {
            let min = r.opt_value()?;
            let max = r.opt_value()?;
            let mut mm = MinMaxPayload::new();
            if let Some(v) = min {
                mm.insert(&v);
            }
            if let Some(v) = max {
                mm.insert(&v);
            }
            Ok(FilterValue::MinMax(mm))
        }
        KIND_BLOOM => Ok(FilterValue::Bloom(decode_bloom(&mut r)?)),
        KIND_IN_OR_BLOOM => {
            let discriminator = r.u8()?;
            if discriminator == 0 {
                let contains_null = r.u8()? != 0;
                let count = r.u32()?;
                let mut set = InSetPayload::new(count.max(1) as usize);
                for _ in 0..count {
                    let v = r.value()?;
                    let _ = set.insert(&v);
                }
                if contains_null {
                    let _ = set.insert(&ColumnValue::Null);
                }
                Ok(FilterValue::InOrBloom(InOrBloomPayload::Set(set)))
            } else {
                Ok(FilterValue::InOrBloom(InOrBloomPayload::Bloom(decode_bloom(
                    &mut r,
                )?)))
            }
        }
        KIND_BITMAP => {
            let polarity = if flags & FLAG_POLARITY_NOT_IN != 0 {
                Polarity::NotIn
            } else {
                Polarity::In
            };
            let num_runs = r.u32()?;
            let mut runs = Vec::with_capacity(num_runs as usize);
            for _ in 0..num_runs {
                let start = r.i64()?;
                let len = {
                    r.need(8)?;
                    let v = u64::from_le_bytes(r.buf[r.pos..r.pos + 8].try_into().unwrap());
                    r.pos += 8;
                    v
                };
                runs.push((start, len));
            }
            Ok(FilterValue::Bitmap(BitmapPayload::from_runs(&runs, polarity)))
        }
        other => Err(FilterError::SerializationError(format!(
            "unknown filter kind tag {other}"
        ))),
    };
    value.map(|v| (v, envelope))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_max_round_trip() {
        let mut mm = MinMaxPayload::new();
        mm.insert(&ColumnValue::Int32(1));
        mm.insert(&ColumnValue::Int32(99));
        let value = FilterValue::MinMax(mm);
        let bytes = encode(&value, ColumnType::Int32).unwrap();
        let decoded = decode(&bytes, ColumnType::Int32).unwrap();
        match decoded {
            FilterValue::MinMax(mm) => {
                assert_eq!(mm.min(), Some(&ColumnValue::Int32(1)));
                assert_eq!(mm.max(), Some(&ColumnValue::Int32(99)));
            }
            _ => panic!("wrong kind decoded"),
        }
    }

    #[test]
    fn in_set_round_trip_preserves_order() {
        let mut set = InSetPayload::new(8);
        for v in [3, 1, 2] {
            set.insert(&ColumnValue::Int32(v)).unwrap();
        }
        let value = FilterValue::InSet(set);
        let bytes = encode(&value, ColumnType::Int32).unwrap();
        let decoded = decode(&bytes, ColumnType::Int32).unwrap();
        match decoded {
            FilterValue::InSet(set) => assert_eq!(
                set.values(),
                &[
                    ColumnValue::Int32(3),
                    ColumnValue::Int32(1),
                    ColumnValue::Int32(2)
                ]
            ),
            _ => panic!("wrong kind decoded"),
        }
    }

    #[test]
    fn bloom_round_trip() {
        let mut bloom = BloomPayload::new(1024, 3).unwrap();
        bloom.insert(&ColumnValue::Int32(42));
        let value = FilterValue::Bloom(bloom);
        let bytes = encode(&value, ColumnType::Int32).unwrap();
        let decoded = decode(&bytes, ColumnType::Int32).unwrap();
        match decoded {
            FilterValue::Bloom(b) => assert!(b.probe(&ColumnValue::Int32(42))),
            _ => panic!("wrong kind decoded"),
        }
    }

    #[test]
    fn bitmap_round_trip_preserves_polarity() {
        let mut bm = BitmapPayload::new(Polarity::NotIn);
        bm.insert(&ColumnValue::Int32(5));
        let value = FilterValue::Bitmap(bm);
        let bytes = encode(&value, ColumnType::Int32).unwrap();
        let decoded = decode(&bytes, ColumnType::Int32).unwrap();
        match decoded {
            FilterValue::Bitmap(bm) => {
                assert_eq!(bm.polarity(), Polarity::NotIn);
                assert!(!bm.probe(&ColumnValue::Int32(5)));
            }
            _ => panic!("wrong kind decoded"),
        }
    }

    #[test]
    fn column_type_mismatch_rejected() {
        let mm = MinMaxPayload::new();
        let value = FilterValue::MinMax(mm);
        let bytes = encode(&value, ColumnType::Int32).unwrap();
        assert!(decode(&bytes, ColumnType::Int64).is_err());
    }
}
