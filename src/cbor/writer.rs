use crate::buffer::Buffer;
use crate::error::{Result, TxForgeError};

use super::{
    MAJOR_ARRAY, MAJOR_BYTES, MAJOR_MAP, MAJOR_NINT, MAJOR_SIMPLE, MAJOR_TAG, MAJOR_TEXT,
    MAJOR_UINT,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Array,
    Map,
}

#[derive(Debug, Clone)]
struct Frame {
    kind: FrameKind,
    /// `None` means indefinite. For maps this is pairs * 2, matching the
    /// reader's accounting.
    declared: Option<u64>,
    written: u64,
}

/// Streaming encoder to an internal buffer. Enforces canonical
/// (shortest-width) integer and definite-length-where-known encoding by
/// default; `write_encoded` is the escape hatch that splats raw bytes
/// verbatim, used to preserve a cached sub-tree's exact original encoding.
#[derive(Debug, Clone, Default)]
pub struct CborWriter {
    buf: Vec<u8>,
    frames: Vec<Frame>,
}

impl CborWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_buffer(self) -> Buffer {
        Buffer::from_vec(self.buf)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    fn write_head(&mut self, major: u8, arg: u64) {
        let top = major << 5;
        match arg {
            0..=23 => self.buf.push(top | arg as u8),
            24..=0xFF => {
                self.buf.push(top | 24);
                self.buf.push(arg as u8);
            }
            0x100..=0xFFFF => {
                self.buf.push(top | 25);
                self.buf.extend_from_slice(&(arg as u16).to_be_bytes());
            }
            0x1_0000..=0xFFFF_FFFF => {
                self.buf.push(top | 26);
                self.buf.extend_from_slice(&(arg as u32).to_be_bytes());
            }
            _ => {
                self.buf.push(top | 27);
                self.buf.extend_from_slice(&arg.to_be_bytes());
            }
        }
    }

    fn write_indefinite_head(&mut self, major: u8) {
        self.buf.push((major << 5) | 31);
    }

    fn note_item_written(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.written += 1;
        }
    }

    pub fn write_uint(&mut self, value: u64) {
        self.write_head(MAJOR_UINT, value);
        self.note_item_written();
    }

    /// Writes a signed integer using major type 0 (non-negative) or major
    /// type 1 (negative, encoded as `-1 - n`).
    pub fn write_signed_int(&mut self, value: i64) {
        if value >= 0 {
            self.write_head(MAJOR_UINT, value as u64);
        } else {
            let n = (-1 - value) as u64;
            self.write_head(MAJOR_NINT, n);
        }
        self.note_item_written();
    }

    pub fn write_bytestring(&mut self, bytes: &[u8]) {
        self.write_head(MAJOR_BYTES, bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
        self.note_item_written();
    }

    pub fn write_textstring(&mut self, s: &str) {
        self.write_head(MAJOR_TEXT, s.len() as u64);
        self.buf.extend_from_slice(s.as_bytes());
        self.note_item_written();
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push((MAJOR_SIMPLE << 5) | if value { 21 } else { 20 });
        self.note_item_written();
    }

    pub fn write_null(&mut self) {
        self.buf.push((MAJOR_SIMPLE << 5) | 22);
        self.note_item_written();
    }

    /// Writes a tag head only. A tag and the item it prefixes form a
    /// single CBOR data item, so the item-count bump happens on whichever
    /// write call follows this one (a scalar write or a container start),
    /// not here — otherwise a tagged value nested in a definite-length
    /// array or map would be counted twice against its enclosing frame.
    pub fn write_tag(&mut self, tag: u64) {
        self.write_head(MAJOR_TAG, tag);
    }

    /// `len == -1` opens an indefinite-length array.
    pub fn write_start_array(&mut self, len: i64) -> Result<()> {
        if len < -1 {
            return Err(TxForgeError::Encoding(format!(
                "negative array length {len}"
            )));
        }
        self.note_item_written();
        if len == -1 {
            self.write_indefinite_head(MAJOR_ARRAY);
            self.frames.push(Frame {
                kind: FrameKind::Array,
                declared: None,
                written: 0,
            });
        } else {
            self.write_head(MAJOR_ARRAY, len as u64);
            self.frames.push(Frame {
                kind: FrameKind::Array,
                declared: Some(len as u64),
                written: 0,
            });
        }
        Ok(())
    }

    pub fn write_end_array(&mut self) -> Result<()> {
        let frame = match self.frames.pop() {
            Some(f) if f.kind == FrameKind::Array => f,
            Some(f) => {
                self.frames.push(f);
                return Err(TxForgeError::IllegalState(
                    "write_end_array called while top frame is a map".into(),
                ));
            }
            None => return Err(TxForgeError::IllegalState("no open array".into())),
        };
        match frame.declared {
            Some(declared) if declared != frame.written => {
                return Err(TxForgeError::Encoding(format!(
                    "array declared {declared} items, wrote {}",
                    frame.written
                )))
            }
            Some(_) => {}
            None => self.buf.push(0xFF),
        }
        Ok(())
    }

    /// `len == -1` opens an indefinite-length map; `len` otherwise counts
    /// key-value pairs (not individual items).
    pub fn write_start_map(&mut self, len: i64) -> Result<()> {
        if len < -1 {
            return Err(TxForgeError::Encoding(format!("negative map length {len}")));
        }
        self.note_item_written();
        if len == -1 {
            self.write_indefinite_head(MAJOR_MAP);
            self.frames.push(Frame {
                kind: FrameKind::Map,
                declared: None,
                written: 0,
            });
        } else {
            self.write_head(MAJOR_MAP, len as u64);
            self.frames.push(Frame {
                kind: FrameKind::Map,
                declared: Some(len as u64 * 2),
                written: 0,
            });
        }
        Ok(())
    }

    pub fn write_end_map(&mut self) -> Result<()> {
        let frame = match self.frames.pop() {
            Some(f) if f.kind == FrameKind::Map => f,
            Some(f) => {
                self.frames.push(f);
                return Err(TxForgeError::IllegalState(
                    "write_end_map called while top frame is an array".into(),
                ));
            }
            None => return Err(TxForgeError::IllegalState("no open map".into())),
        };
        match frame.declared {
            Some(declared) if declared != frame.written => {
                return Err(TxForgeError::Encoding(format!(
                    "map declared {} pairs, wrote {}",
                    declared / 2,
                    frame.written / 2
                )))
            }
            Some(_) => {}
            None => self.buf.push(0xFF),
        }
        Ok(())
    }

    /// Writes `bytes` verbatim, counting as a single item for the
    /// enclosing container's accounting. Used to splat a cached raw CBOR
    /// sub-tree (or a tagged bignum written by `write_bigint`) exactly as
    /// received, preserving producer-specific non-canonical choices.
    pub fn write_encoded(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        self.note_item_written();
    }

    /// Writes a big integer: the major-0/1 direct form when it fits in
    /// 64 bits, otherwise a tag-2/tag-3 wrapped byte string, chunked per
    /// the Plutus 64-byte rule when the magnitude exceeds 64 bytes.
    pub fn write_bigint(&mut self, value: &num_bigint::BigInt) {
        use num_bigint::Sign;
        if let Ok(v) = i64::try_from(value.clone()) {
            self.write_signed_int(v);
            return;
        }
        let (sign, magnitude) = value.to_bytes_be();
        let tag = match sign {
            Sign::Minus => super::TAG_BIGNUM_NEG,
            _ => super::TAG_BIGNUM_POS,
        };
        // Tag 3's payload is the magnitude of `-1 - value`, i.e. `|value| - 1`.
        let payload = if sign == Sign::Minus {
            let m = num_bigint::BigUint::from_bytes_be(&magnitude) - 1u8;
            m.to_bytes_be()
        } else {
            magnitude
        };
        self.write_tag(tag);
        self.write_chunked_bytes(&payload);
    }

    /// Writes a byte string using the Plutus 64-byte chunking rule: a
    /// definite-length bytestring when `bytes.len() <= 64`, otherwise an
    /// indefinite-length bytestring made of exactly-64-byte chunks plus a
    /// shorter tail, terminated by break.
    pub fn write_chunked_bytes(&mut self, bytes: &[u8]) {
        if bytes.len() <= super::PLUTUS_CHUNK_SIZE {
            self.write_bytestring(bytes);
            return;
        }
        self.write_indefinite_head(MAJOR_BYTES);
        for chunk in bytes.chunks(super::PLUTUS_CHUNK_SIZE) {
            self.write_head(MAJOR_BYTES, chunk.len() as u64);
            self.buf.extend_from_slice(chunk);
        }
        self.buf.push(0xFF);
        self.note_item_written();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cbor::CborReader;

    #[test]
    fn uint_boundary_round_trip() {
        let mut w = CborWriter::new();
        w.write_uint(23);
        assert_eq!(w.as_slice(), &[0x17]);

        let mut w = CborWriter::new();
        w.write_uint(24);
        assert_eq!(w.as_slice(), &[0x18, 0x18]);

        let mut w = CborWriter::new();
        w.write_uint((1u64 << 63) - 1);
        assert_eq!(
            w.as_slice(),
            &[0x1b, 0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn chunked_bytes_match_s2() {
        let bytes: Vec<u8> = (0..100u8).collect();
        let mut w = CborWriter::new();
        w.write_chunked_bytes(&bytes);
        let out = w.as_slice();
        assert_eq!(out[0], 0x5f);
        assert_eq!(&out[1..3], &[0x58, 0x40]);
        assert_eq!(&out[3..67], &bytes[0..64]);
        assert_eq!(&out[67..69], &[0x58, 0x24]);
        assert_eq!(&out[69..105], &bytes[64..100]);
        assert_eq!(out[105], 0xff);
    }

    #[test]
    fn definite_array_wrong_count_fails() {
        let mut w = CborWriter::new();
        w.write_start_array(3).unwrap();
        w.write_uint(1);
        w.write_uint(2);
        assert!(w.write_end_array().is_err());
    }

    #[test]
    fn array_writer_reader_round_trip() {
        let mut w = CborWriter::new();
        w.write_start_array(-1).unwrap();
        w.write_uint(1);
        w.write_uint(2);
        w.write_end_array().unwrap();
        let buf = w.into_buffer();

        let mut r = CborReader::new(buf.as_slice());
        assert_eq!(r.read_start_array().unwrap(), -1);
        assert_eq!(r.read_uint().unwrap(), 1);
        assert_eq!(r.read_uint().unwrap(), 2);
        r.read_end_array().unwrap();
    }

    #[test]
    fn bigint_round_trips_through_reader() {
        let big = num_bigint::BigInt::parse_bytes(b"123456789012345678901234567890", 10).unwrap();
        let mut w = CborWriter::new();
        w.write_bigint(&big);
        let buf = w.into_buffer();
        let mut r = CborReader::new(buf.as_slice());
        assert_eq!(r.read_bigint().unwrap(), big);

        let neg = -big;
        let mut w = CborWriter::new();
        w.write_bigint(&neg);
        let buf = w.into_buffer();
        let mut r = CborReader::new(buf.as_slice());
        assert_eq!(r.read_bigint().unwrap(), neg);
    }

    #[test]
    fn tagged_value_counts_once_in_definite_array() {
        // A tag and the item it wraps must count as a single element
        // against the enclosing definite-length array, not two.
        let mut w = CborWriter::new();
        w.write_start_array(2).unwrap();
        w.write_uint(1);
        w.write_tag(24);
        w.write_bytestring(&[0xde, 0xad]);
        w.write_end_array().unwrap();
        let buf = w.into_buffer();

        let mut r = CborReader::new(buf.as_slice());
        assert_eq!(r.read_start_array().unwrap(), 2);
        assert_eq!(r.read_uint().unwrap(), 1);
        assert_eq!(r.read_tag().unwrap(), 24);
        assert_eq!(r.read_bytestring().unwrap().as_slice(), &[0xde, 0xad]);
        r.read_end_array().unwrap();
    }
}
