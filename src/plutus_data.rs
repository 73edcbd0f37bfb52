//! Recursive Plutus data sum type with byte-cache preservation (spec §3,
//! §4.G).
//!
//! Grounded on `pallas_primitives::plutus_data::PlutusData`'s manual
//! `minicbor` `Decode`/`Encode` impls (the tag-range dispatch for
//! constructors, the tag-2/3 dispatch for big integers, the 64-byte
//! chunking for byte strings) and on `pallas_codec::utils::KeepRaw`'s
//! position-tracked decode for the cached-raw-bytes mechanism: decode
//! records the reader's position before and after parsing a node, then
//! slices the original input to capture exactly what was received.

use std::rc::Rc;

use num_bigint::BigInt;

use crate::buffer::Buffer;
use crate::cbor::{CborReader, CborState, CborWriter};
use crate::error::{Result, TxForgeError};

/// A decoded node's exact source bytes, shared (not deep-copied) with any
/// clone of the node — the one place this crate uses `Rc` for true
/// sharing, per spec §9.
type CachedBytes = Rc<[u8]>;

#[derive(Debug, Clone)]
enum PlutusDataKind {
    Constr { tag: u64, fields: Vec<PlutusData> },
    Map(Vec<(PlutusData, PlutusData)>),
    List(Vec<PlutusData>),
    Integer(BigInt),
    Bytes(Buffer),
}

/// `Constr | Map | List | Integer | Bytes`, each optionally carrying the
/// exact byte range it was decoded from.
#[derive(Debug, Clone)]
pub struct PlutusData {
    kind: PlutusDataKind,
    cache: Option<CachedBytes>,
}

impl PartialEq for PlutusData {
    fn eq(&self, other: &Self) -> bool {
        use PlutusDataKind::*;
        match (&self.kind, &other.kind) {
            (Constr { tag: t1, fields: f1 }, Constr { tag: t2, fields: f2 }) => {
                t1 == t2 && f1 == f2
            }
            (Map(a), Map(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for PlutusData {}

impl PlutusData {
    pub fn constr(tag: u64, fields: Vec<PlutusData>) -> Self {
        Self {
            kind: PlutusDataKind::Constr { tag, fields },
            cache: None,
        }
    }

    pub fn map(entries: Vec<(PlutusData, PlutusData)>) -> Self {
        Self {
            kind: PlutusDataKind::Map(entries),
            cache: None,
        }
    }

    pub fn list(items: Vec<PlutusData>) -> Self {
        Self {
            kind: PlutusDataKind::List(items),
            cache: None,
        }
    }

    pub fn integer(value: impl Into<BigInt>) -> Self {
        Self {
            kind: PlutusDataKind::Integer(value.into()),
            cache: None,
        }
    }

    pub fn bytes(value: impl Into<Buffer>) -> Self {
        Self {
            kind: PlutusDataKind::Bytes(value.into()),
            cache: None,
        }
    }

    /// Whether this node carries a cached raw-CBOR slice. Re-encoding a
    /// cached node reproduces those bytes verbatim regardless of any
    /// canonicalization rule.
    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    /// Drops this node's cache and every descendant's, so subsequent
    /// encodes fall through to canonical re-encoding.
    pub fn clear_cbor_cache(&mut self) {
        self.cache = None;
        match &mut self.kind {
            PlutusDataKind::Constr { fields, .. } => {
                for f in fields {
                    f.clear_cbor_cache();
                }
            }
            PlutusDataKind::Map(entries) => {
                for (k, v) in entries {
                    k.clear_cbor_cache();
                    v.clear_cbor_cache();
                }
            }
            PlutusDataKind::List(items) => {
                for i in items {
                    i.clear_cbor_cache();
                }
            }
            PlutusDataKind::Integer(_) | PlutusDataKind::Bytes(_) => {}
        }
    }

    pub fn decode(reader: &mut CborReader) -> Result<PlutusData> {
        let start = reader.position();
        let kind = Self::decode_kind(reader)?;
        let end = reader.position();
        let raw: CachedBytes = Rc::from(&reader.full_data()[start..end]);
        Ok(PlutusData {
            kind,
            cache: Some(raw),
        })
    }

    fn decode_kind(reader: &mut CborReader) -> Result<PlutusDataKind> {
        match reader.peek_state()? {
            CborState::UnsignedInt | CborState::NegativeInt => {
                Ok(PlutusDataKind::Integer(reader.read_bigint()?))
            }
            CborState::Tag => {
                let tag = reader.peek_tag()?;
                match tag {
                    2 | 3 => Ok(PlutusDataKind::Integer(reader.read_bigint()?)),
                    121..=127 => {
                        reader.read_tag()?;
                        let fields = Self::decode_list(reader)?;
                        Ok(PlutusDataKind::Constr {
                            tag: tag - 121,
                            fields,
                        })
                    }
                    1280..=1400 => {
                        reader.read_tag()?;
                        let fields = Self::decode_list(reader)?;
                        Ok(PlutusDataKind::Constr {
                            tag: tag - 1280 + 7,
                            fields,
                        })
                    }
                    102 => {
                        reader.read_tag()?;
                        let len = reader.read_start_array()?;
                        if len != 2 {
                            return Err(TxForgeError::InvalidCborArraySize {
                                expected: 2,
                                found: len,
                            });
                        }
                        let constructor = reader.read_uint()?;
                        let fields = Self::decode_list(reader)?;
                        reader.read_end_array()?;
                        Ok(PlutusDataKind::Constr {
                            tag: constructor,
                            fields,
                        })
                    }
                    other => Err(TxForgeError::InvalidCborValue(format!(
                        "unsupported plutus data tag {other}"
                    ))),
                }
            }
            CborState::ByteString | CborState::StartIndefByteString => {
                Ok(PlutusDataKind::Bytes(reader.read_bytestring()?))
            }
            CborState::StartArray => Ok(PlutusDataKind::List(Self::decode_list(reader)?)),
            CborState::StartMap => Ok(PlutusDataKind::Map(Self::decode_map(reader)?)),
            other => Err(TxForgeError::Decoding(format!(
                "unexpected plutus data state {other:?}"
            ))),
        }
    }

    fn decode_list(reader: &mut CborReader) -> Result<Vec<PlutusData>> {
        let len = reader.read_start_array()?;
        let mut out = Vec::new();
        if len >= 0 {
            for _ in 0..len {
                out.push(PlutusData::decode(reader)?);
            }
        } else {
            while reader.peek_state()? != CborState::EndArray {
                out.push(PlutusData::decode(reader)?);
            }
        }
        reader.read_end_array()?;
        Ok(out)
    }

    fn decode_map(reader: &mut CborReader) -> Result<Vec<(PlutusData, PlutusData)>> {
        let pairs = reader.read_start_map()?;
        let mut out = Vec::new();
        if pairs >= 0 {
            for _ in 0..pairs {
                let k = PlutusData::decode(reader)?;
                let v = PlutusData::decode(reader)?;
                out.push((k, v));
            }
        } else {
            while reader.peek_state()? != CborState::EndMap {
                let k = PlutusData::decode(reader)?;
                let v = PlutusData::decode(reader)?;
                out.push((k, v));
            }
        }
        reader.read_end_map()?;
        Ok(out)
    }

    /// Prefers the cache: if present, emits it verbatim (preserving the
    /// producer's original choice of definite/indefinite form and integer
    /// width). Otherwise encodes canonically per the rules below.
    pub fn encode(&self, writer: &mut CborWriter) {
        if let Some(cache) = &self.cache {
            writer.write_encoded(cache);
            return;
        }
        match &self.kind {
            PlutusDataKind::Integer(v) => writer.write_bigint(v),
            PlutusDataKind::Bytes(b) => writer.write_chunked_bytes(b.as_slice()),
            PlutusDataKind::List(items) => encode_list(writer, items),
            PlutusDataKind::Map(entries) => encode_map(writer, entries),
            PlutusDataKind::Constr { tag, fields } => match constr_tag(*tag) {
                Some(cbor_tag) => {
                    writer.write_tag(cbor_tag);
                    encode_list(writer, fields);
                }
                None => {
                    writer.write_tag(102);
                    writer.write_start_array(2).expect("fixed-size array");
                    writer.write_uint(*tag);
                    encode_list(writer, fields);
                    writer.write_end_array().expect("fixed-size array");
                }
            },
        }
    }

    pub fn to_cbor(&self) -> Buffer {
        let mut w = CborWriter::new();
        self.encode(&mut w);
        w.into_buffer()
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<PlutusData> {
        let mut r = CborReader::new(bytes);
        PlutusData::decode(&mut r)
    }

    pub fn as_constr(&self) -> Option<(u64, &[PlutusData])> {
        match &self.kind {
            PlutusDataKind::Constr { tag, fields } => Some((*tag, fields)),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Buffer> {
        match &self.kind {
            PlutusDataKind::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<&BigInt> {
        match &self.kind {
            PlutusDataKind::Integer(i) => Some(i),
            _ => None,
        }
    }
}

/// Maps constructor index 0..=6 to tag 121..=127 and 7..=127 to tag
/// 1280..=1400; constructors >= 128 have no compact tag and use the
/// generic `[tag, fields]` form (tag 102) instead.
fn constr_tag(index: u64) -> Option<u64> {
    match index {
        0..=6 => Some(121 + index),
        7..=127 => Some(1280 + (index - 7)),
        _ => None,
    }
}

/// A non-empty list is written indefinite-length; an empty one definite
/// with length 0 — the asymmetry this crate's open-question resolution
/// carries forward from the original's metadatum-list encoding, applied
/// uniformly to every Plutus-data list and map.
fn encode_list(writer: &mut CborWriter, items: &[PlutusData]) {
    if items.is_empty() {
        writer.write_start_array(0).expect("fixed-size array");
        writer.write_end_array().expect("fixed-size array");
    } else {
        writer.write_start_array(-1).expect("indefinite array");
        for item in items {
            item.encode(writer);
        }
        writer.write_end_array().expect("indefinite array");
    }
}

fn encode_map(writer: &mut CborWriter, entries: &[(PlutusData, PlutusData)]) {
    if entries.is_empty() {
        writer.write_start_map(0).expect("fixed-size map");
        writer.write_end_map().expect("fixed-size map");
    } else {
        writer.write_start_map(-1).expect("indefinite map");
        for (k, v) in entries {
            k.encode(writer);
            v.encode(writer);
        }
        writer.write_end_map().expect("indefinite map");
    }
}
