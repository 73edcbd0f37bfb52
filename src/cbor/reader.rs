use num_bigint::{BigInt, Sign};

use crate::buffer::Buffer;
use crate::error::{Result, TxForgeError};

use super::{
    MAJOR_ARRAY, MAJOR_BYTES, MAJOR_MAP, MAJOR_NINT, MAJOR_SIMPLE, MAJOR_TAG, MAJOR_TEXT,
    MAJOR_UINT, MAX_CONTAINER_DEPTH, TAG_BIGNUM_NEG, TAG_BIGNUM_POS,
};

/// The observable state the reader is parked in before the next `read_*`
/// call consumes it. Mirrors the item the next byte(s) would decode to,
/// without committing the read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CborState {
    UnsignedInt,
    NegativeInt,
    ByteString,
    StartIndefByteString,
    TextString,
    StartArray,
    EndArray,
    StartMap,
    EndMap,
    Tag,
    Bool,
    Null,
    HalfFloat,
    Float,
    Double,
    Break,
    EndOfStream,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Array,
    Map,
}

#[derive(Debug, Clone)]
struct Frame {
    kind: FrameKind,
    /// Declared item count. For maps this is pairs * 2. `None` = indefinite.
    declared: Option<u64>,
    consumed: u64,
}

#[derive(Debug, Clone, Copy)]
struct Head {
    major: u8,
    info: u8,
    arg: u64,
    indefinite: bool,
}

/// Streaming decode state machine over a borrowed byte span.
///
/// Never panics on malformed input: every operation returns a precise
/// [`TxForgeError`] variant. Once an operation fails the reader is still
/// inspectable (position and frame stack are left as they were before the
/// failing read), but no further item can be read until the caller backs
/// off to a known-good position via `clone`.
#[derive(Debug, Clone)]
pub struct CborReader<'b> {
    data: &'b [u8],
    pos: usize,
    frames: Vec<Frame>,
    poisoned: bool,
}

impl<'b> CborReader<'b> {
    pub fn new(data: &'b [u8]) -> Self {
        Self {
            data,
            pos: 0,
            frames: Vec::new(),
            poisoned: false,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> &'b [u8] {
        &self.data[self.pos..]
    }

    /// The full source byte span this reader was constructed over,
    /// independent of current position. Used to slice out the exact raw
    /// bytes a sub-tree decoded from, for cache preservation (spec §4.G).
    pub fn full_data(&self) -> &'b [u8] {
        self.data
    }

    fn fail<T>(&mut self, err: TxForgeError) -> Result<T> {
        self.poisoned = true;
        Err(err)
    }

    fn ensure_not_poisoned(&self) -> Result<()> {
        if self.poisoned {
            return Err(TxForgeError::IllegalState(
                "reader is poisoned by a previous error".into(),
            ));
        }
        Ok(())
    }

    fn byte_at(&self, offset: usize) -> Result<u8> {
        self.data
            .get(offset)
            .copied()
            .ok_or(TxForgeError::EndOfStream)
    }

    /// Reads the head at `pos` without mutating state. Returns the parsed
    /// head plus the number of bytes it occupies.
    fn peek_head_at(&self, pos: usize) -> Result<(Head, usize)> {
        let b0 = self.byte_at(pos)?;
        let major = b0 >> 5;
        let info = b0 & 0x1f;

        match info {
            0..=23 => Ok((
                Head {
                    major,
                    info,
                    arg: info as u64,
                    indefinite: false,
                },
                1,
            )),
            24 => {
                let b1 = self.byte_at(pos + 1)?;
                Ok((
                    Head {
                        major,
                        info,
                        arg: b1 as u64,
                        indefinite: false,
                    },
                    2,
                ))
            }
            25 => {
                let mut arg = [0u8; 2];
                for (i, a) in arg.iter_mut().enumerate() {
                    *a = self.byte_at(pos + 1 + i)?;
                }
                Ok((
                    Head {
                        major,
                        info,
                        arg: u16::from_be_bytes(arg) as u64,
                        indefinite: false,
                    },
                    3,
                ))
            }
            26 => {
                let mut arg = [0u8; 4];
                for (i, a) in arg.iter_mut().enumerate() {
                    *a = self.byte_at(pos + 1 + i)?;
                }
                Ok((
                    Head {
                        major,
                        info,
                        arg: u32::from_be_bytes(arg) as u64,
                        indefinite: false,
                    },
                    5,
                ))
            }
            27 => {
                let mut arg = [0u8; 8];
                for (i, a) in arg.iter_mut().enumerate() {
                    *a = self.byte_at(pos + 1 + i)?;
                }
                Ok((
                    Head {
                        major,
                        info,
                        arg: u64::from_be_bytes(arg),
                        indefinite: false,
                    },
                    1 + 8,
                ))
            }
            28..=30 => Err(TxForgeError::InvalidCborValue(format!(
                "reserved additional info {info} at offset {pos}"
            ))),
            31 => Ok((
                Head {
                    major,
                    info,
                    arg: 0,
                    indefinite: true,
                },
                1,
            )),
            _ => unreachable!(),
        }
    }

    fn peek_head(&self) -> Result<(Head, usize)> {
        self.peek_head_at(self.pos)
    }

    fn note_item_consumed(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.consumed += 1;
        }
    }

    /// Checks whether the current top frame demands an `EndArray`/`EndMap`
    /// before any other item can be read.
    fn frame_at_end(&self) -> Result<Option<CborState>> {
        let Some(frame) = self.frames.last() else {
            return Ok(None);
        };
        let end_state = match frame.kind {
            FrameKind::Array => CborState::EndArray,
            FrameKind::Map => CborState::EndMap,
        };
        match frame.declared {
            Some(declared) => {
                if frame.consumed >= declared {
                    Ok(Some(end_state))
                } else {
                    Ok(None)
                }
            }
            None => {
                if self.pos < self.data.len() && self.data[self.pos] == 0xFF {
                    Ok(Some(end_state))
                } else {
                    Ok(None)
                }
            }
        }
    }

    pub fn peek_state(&self) -> Result<CborState> {
        if let Some(end) = self.frame_at_end()? {
            return Ok(end);
        }
        if self.pos >= self.data.len() {
            return Ok(CborState::EndOfStream);
        }
        let (head, _) = self.peek_head()?;
        Ok(match head.major {
            MAJOR_UINT => CborState::UnsignedInt,
            MAJOR_NINT => CborState::NegativeInt,
            MAJOR_BYTES => {
                if head.indefinite {
                    CborState::StartIndefByteString
                } else {
                    CborState::ByteString
                }
            }
            MAJOR_TEXT => CborState::TextString,
            MAJOR_ARRAY => CborState::StartArray,
            MAJOR_MAP => CborState::StartMap,
            MAJOR_TAG => CborState::Tag,
            MAJOR_SIMPLE => match head.info {
                20 | 21 => CborState::Bool,
                22 => CborState::Null,
                23 => CborState::Undefined,
                25 => CborState::HalfFloat,
                26 => CborState::Float,
                27 => CborState::Double,
                31 => CborState::Break,
                other => {
                    return Err(TxForgeError::UnexpectedCborType {
                        expected: "bool/null/float/break",
                        found: format!("simple({other})"),
                    })
                }
            },
            other => {
                return Err(TxForgeError::UnexpectedCborType {
                    expected: "known major type",
                    found: format!("major({other})"),
                })
            }
        })
    }

    pub fn peek_tag(&self) -> Result<u64> {
        let (head, _) = self.peek_head()?;
        if head.major != MAJOR_TAG {
            return Err(TxForgeError::UnexpectedCborType {
                expected: "tag",
                found: format!("major({})", head.major),
            });
        }
        Ok(head.arg)
    }

    pub fn read_tag(&mut self) -> Result<u64> {
        self.ensure_not_poisoned()?;
        let (head, len) = match self.peek_head() {
            Ok(v) => v,
            Err(e) => return self.fail(e),
        };
        if head.major != MAJOR_TAG {
            return self.fail(TxForgeError::UnexpectedCborType {
                expected: "tag",
                found: format!("major({})", head.major),
            });
        }
        self.pos += len;
        // A tag and the item it prefixes are a single CBOR data item; the
        // read that follows accounts for it against the enclosing frame,
        // not this call (see the symmetric note on `CborWriter::write_tag`).
        Ok(head.arg)
    }

    pub fn read_uint(&mut self) -> Result<u64> {
        self.ensure_not_poisoned()?;
        let (head, len) = match self.peek_head() {
            Ok(v) => v,
            Err(e) => return self.fail(e),
        };
        if head.major != MAJOR_UINT {
            return self.fail(TxForgeError::UnexpectedCborType {
                expected: "unsigned int",
                found: format!("major({})", head.major),
            });
        }
        self.pos += len;
        self.note_item_consumed();
        Ok(head.arg)
    }

    /// Reads a signed integer of either major type 0 or 1, fitting in i64.
    pub fn read_int(&mut self) -> Result<i64> {
        self.ensure_not_poisoned()?;
        let (head, len) = match self.peek_head() {
            Ok(v) => v,
            Err(e) => return self.fail(e),
        };
        let value = match head.major {
            MAJOR_UINT => i64::try_from(head.arg).map_err(|_| TxForgeError::IntegerOverflow),
            MAJOR_NINT => {
                let v: i128 = -1 - head.arg as i128;
                i64::try_from(v).map_err(|_| TxForgeError::IntegerOverflow)
            }
            other => Err(TxForgeError::UnexpectedCborType {
                expected: "integer",
                found: format!("major({other})"),
            }),
        };
        match value {
            Ok(v) => {
                self.pos += len;
                self.note_item_consumed();
                Ok(v)
            }
            Err(e) => self.fail(e),
        }
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        self.ensure_not_poisoned()?;
        let (head, len) = match self.peek_head() {
            Ok(v) => v,
            Err(e) => return self.fail(e),
        };
        if head.major != MAJOR_SIMPLE || (head.info != 20 && head.info != 21) {
            return self.fail(TxForgeError::UnexpectedCborType {
                expected: "bool",
                found: format!("major({}) info({})", head.major, head.info),
            });
        }
        self.pos += len;
        self.note_item_consumed();
        Ok(head.info == 21)
    }

    pub fn read_null(&mut self) -> Result<()> {
        self.ensure_not_poisoned()?;
        let (head, len) = match self.peek_head() {
            Ok(v) => v,
            Err(e) => return self.fail(e),
        };
        if head.major != MAJOR_SIMPLE || head.info != 22 {
            return self.fail(TxForgeError::UnexpectedCborType {
                expected: "null",
                found: format!("major({}) info({})", head.major, head.info),
            });
        }
        self.pos += len;
        self.note_item_consumed();
        Ok(())
    }

    /// Reads a single (definite) byte-string chunk's bytes, or, if the
    /// string is indefinite, reads and concatenates every chunk up to the
    /// terminating break.
    pub fn read_bytestring(&mut self) -> Result<Buffer> {
        self.ensure_not_poisoned()?;
        match self.read_bytestring_raw() {
            Ok(buf) => {
                self.note_item_consumed();
                Ok(buf)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Core byte-string read, without poison-checking or per-item frame
    /// accounting — used both by `read_bytestring` and by `read_bigint`'s
    /// tag-2/tag-3 path, which must count the tag+bytes pair as one item.
    fn read_bytestring_raw(&mut self) -> Result<Buffer> {
        let (head, len) = self.peek_head()?;
        if head.major != MAJOR_BYTES {
            return Err(TxForgeError::UnexpectedCborType {
                expected: "byte string",
                found: format!("major({})", head.major),
            });
        }
        self.pos += len;
        if !head.indefinite {
            let n = head.arg as usize;
            if self.pos + n > self.data.len() {
                return Err(TxForgeError::EndOfStream);
            }
            let out = self.data[self.pos..self.pos + n].to_vec();
            self.pos += n;
            return Ok(Buffer::from_vec(out));
        }
        // Indefinite: a sequence of definite chunks terminated by 0xFF.
        let mut out = Vec::new();
        loop {
            if self.pos >= self.data.len() {
                return Err(TxForgeError::EndOfStream);
            }
            if self.data[self.pos] == 0xFF {
                self.pos += 1;
                break;
            }
            let (chead, clen) = self.peek_head()?;
            if chead.major != MAJOR_BYTES || chead.indefinite {
                return Err(TxForgeError::InvalidCborValue(
                    "non-bytestring chunk inside indefinite byte string".into(),
                ));
            }
            self.pos += clen;
            let n = chead.arg as usize;
            if self.pos + n > self.data.len() {
                return Err(TxForgeError::EndOfStream);
            }
            out.extend_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
        }
        Ok(Buffer::from_vec(out))
    }

    pub fn read_textstring(&mut self) -> Result<String> {
        self.ensure_not_poisoned()?;
        let (head, len) = match self.peek_head() {
            Ok(v) => v,
            Err(e) => return self.fail(e),
        };
        if head.major != MAJOR_TEXT {
            return self.fail(TxForgeError::UnexpectedCborType {
                expected: "text string",
                found: format!("major({})", head.major),
            });
        }
        self.pos += len;
        if head.indefinite {
            return self.fail(TxForgeError::InvalidCborValue(
                "indefinite text strings are not supported".into(),
            ));
        }
        let n = head.arg as usize;
        if self.pos + n > self.data.len() {
            return self.fail(TxForgeError::EndOfStream);
        }
        let bytes = &self.data[self.pos..self.pos + n];
        let s = match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => return self.fail(TxForgeError::Decoding("invalid utf-8".into())),
        };
        self.pos += n;
        self.note_item_consumed();
        Ok(s)
    }

    fn push_frame(&mut self, kind: FrameKind, declared: Option<u64>) -> Result<()> {
        if self.frames.len() >= MAX_CONTAINER_DEPTH {
            return Err(TxForgeError::IllegalState(format!(
                "container nesting exceeds max depth {MAX_CONTAINER_DEPTH}"
            )));
        }
        self.frames.push(Frame { kind, declared, consumed: 0 });
        Ok(())
    }

    /// Returns the declared length, or `-1` for an indefinite-length array.
    pub fn read_start_array(&mut self) -> Result<i64> {
        self.ensure_not_poisoned()?;
        let (head, len) = match self.peek_head() {
            Ok(v) => v,
            Err(e) => return self.fail(e),
        };
        if head.major != MAJOR_ARRAY {
            return self.fail(TxForgeError::UnexpectedCborType {
                expected: "array",
                found: format!("major({})", head.major),
            });
        }
        self.pos += len;
        self.note_item_consumed();
        if head.indefinite {
            self.push_frame(FrameKind::Array, None)?;
            Ok(-1)
        } else {
            self.push_frame(FrameKind::Array, Some(head.arg))?;
            i64::try_from(head.arg).map_err(|_| TxForgeError::IntegerOverflow)
        }
    }

    pub fn read_end_array(&mut self) -> Result<()> {
        self.ensure_not_poisoned()?;
        let frame = match self.frames.pop() {
            Some(f) if f.kind == FrameKind::Array => f,
            Some(f) => {
                self.frames.push(f);
                return self.fail(TxForgeError::IllegalState(
                    "read_end_array called while top frame is a map".into(),
                ));
            }
            None => return self.fail(TxForgeError::IllegalState("no open array".into())),
        };
        match frame.declared {
            Some(declared) => {
                if frame.consumed != declared {
                    return self.fail(TxForgeError::InvalidCborArraySize {
                        expected: declared as i64,
                        found: frame.consumed as i64,
                    });
                }
            }
            None => {
                if self.pos >= self.data.len() || self.data[self.pos] != 0xFF {
                    return self.fail(TxForgeError::InvalidCborValue(
                        "expected break byte to close indefinite array".into(),
                    ));
                }
                self.pos += 1;
            }
        }
        self.note_item_consumed();
        Ok(())
    }

    /// Returns the declared pair count, or `-1` for an indefinite-length map.
    pub fn read_start_map(&mut self) -> Result<i64> {
        self.ensure_not_poisoned()?;
        let (head, len) = match self.peek_head() {
            Ok(v) => v,
            Err(e) => return self.fail(e),
        };
        if head.major != MAJOR_MAP {
            return self.fail(TxForgeError::UnexpectedCborType {
                expected: "map",
                found: format!("major({})", head.major),
            });
        }
        self.pos += len;
        self.note_item_consumed();
        if head.indefinite {
            self.push_frame(FrameKind::Map, None)?;
            Ok(-1)
        } else {
            let pairs = head.arg;
            let declared_items = pairs
                .checked_mul(2)
                .ok_or(TxForgeError::IntegerOverflow)?;
            self.push_frame(FrameKind::Map, Some(declared_items))?;
            i64::try_from(pairs).map_err(|_| TxForgeError::IntegerOverflow)
        }
    }

    pub fn read_end_map(&mut self) -> Result<()> {
        self.ensure_not_poisoned()?;
        let frame = match self.frames.pop() {
            Some(f) if f.kind == FrameKind::Map => f,
            Some(f) => {
                self.frames.push(f);
                return self.fail(TxForgeError::IllegalState(
                    "read_end_map called while top frame is an array".into(),
                ));
            }
            None => return self.fail(TxForgeError::IllegalState("no open map".into())),
        };
        match frame.declared {
            Some(declared) => {
                if frame.consumed != declared {
                    return self.fail(TxForgeError::InvalidCborMapSize {
                        expected: (declared / 2) as i64,
                        found: (frame.consumed / 2) as i64,
                    });
                }
            }
            None => {
                if self.pos >= self.data.len() || self.data[self.pos] != 0xFF {
                    return self.fail(TxForgeError::InvalidCborValue(
                        "expected break byte to close indefinite map".into(),
                    ));
                }
                self.pos += 1;
            }
        }
        self.note_item_consumed();
        Ok(())
    }

    /// Accepts a direct major-0/1 integer, or a tag-2/tag-3 wrapped
    /// (possibly chunked) byte string, per spec §4.B.
    pub fn read_bigint(&mut self) -> Result<BigInt> {
        self.ensure_not_poisoned()?;
        let (head, _) = match self.peek_head() {
            Ok(v) => v,
            Err(e) => return self.fail(e),
        };
        match head.major {
            MAJOR_UINT => {
                let v = self.read_uint()?;
                Ok(BigInt::from(v))
            }
            MAJOR_NINT => {
                let v = self.read_int()?;
                Ok(BigInt::from(v))
            }
            MAJOR_TAG => {
                // The tag and the bytestring it wraps are a single bigint
                // item from the caller's point of view; consume both
                // without the public helpers' own per-item accounting,
                // then note exactly one item here.
                let (tag_head, tag_len) = self.peek_head()?;
                self.pos += tag_len;
                let sign = match tag_head.arg {
                    TAG_BIGNUM_POS => Sign::Plus,
                    TAG_BIGNUM_NEG => Sign::Minus,
                    other => {
                        return self.fail(TxForgeError::InvalidCborValue(format!(
                            "unsupported bignum tag {other}"
                        )))
                    }
                };
                let bytes = match self.read_bytestring_raw() {
                    Ok(b) => b,
                    Err(e) => return self.fail(e),
                };
                let magnitude = num_bigint::BigUint::from_bytes_be(bytes.as_slice());
                self.note_item_consumed();
                if sign == Sign::Minus {
                    // Tag 3 encodes -1 - n, where n is the unsigned value of the bytes.
                    Ok(-BigInt::from(1u8) - BigInt::from(magnitude))
                } else {
                    Ok(BigInt::from(magnitude))
                }
            }
            other => self.fail(TxForgeError::UnexpectedCborType {
                expected: "bigint",
                found: format!("major({other})"),
            }),
        }
    }

    /// Copies the exact byte range of the next complete item (recursively,
    /// tags included) without interpreting it semantically. Used to cache
    /// a producer's exact encoding of a sub-tree.
    pub fn read_encoded_value(&mut self) -> Result<Buffer> {
        self.ensure_not_poisoned()?;
        let start = self.pos;
        match self.skip_one_value() {
            Ok(()) => {
                let end = self.pos;
                self.note_item_consumed();
                Ok(Buffer::from_vec(self.data[start..end].to_vec()))
            }
            Err(e) => self.fail(e),
        }
    }

    /// Advances `self.pos` past one complete CBOR item, without touching
    /// the frame stack (this is a raw byte-skip, not a semantic read).
    fn skip_one_value(&mut self) -> Result<()> {
        let (head, len) = self.peek_head()?;
        self.pos += len;
        match head.major {
            MAJOR_UINT | MAJOR_NINT => Ok(()),
            MAJOR_BYTES | MAJOR_TEXT => {
                if head.indefinite {
                    loop {
                        if self.pos >= self.data.len() {
                            return Err(TxForgeError::EndOfStream);
                        }
                        if self.data[self.pos] == 0xFF {
                            self.pos += 1;
                            return Ok(());
                        }
                        let (chead, clen) = self.peek_head()?;
                        if chead.major != head.major || chead.indefinite {
                            return Err(TxForgeError::InvalidCborValue(
                                "malformed chunk in indefinite string".into(),
                            ));
                        }
                        self.pos += clen;
                        let n = chead.arg as usize;
                        if self.pos + n > self.data.len() {
                            return Err(TxForgeError::EndOfStream);
                        }
                        self.pos += n;
                    }
                } else {
                    let n = head.arg as usize;
                    if self.pos + n > self.data.len() {
                        return Err(TxForgeError::EndOfStream);
                    }
                    self.pos += n;
                    Ok(())
                }
            }
            MAJOR_ARRAY => {
                if head.indefinite {
                    loop {
                        if self.pos >= self.data.len() {
                            return Err(TxForgeError::EndOfStream);
                        }
                        if self.data[self.pos] == 0xFF {
                            self.pos += 1;
                            return Ok(());
                        }
                        self.skip_one_value()?;
                    }
                } else {
                    for _ in 0..head.arg {
                        self.skip_one_value()?;
                    }
                    Ok(())
                }
            }
            MAJOR_MAP => {
                if head.indefinite {
                    loop {
                        if self.pos >= self.data.len() {
                            return Err(TxForgeError::EndOfStream);
                        }
                        if self.data[self.pos] == 0xFF {
                            self.pos += 1;
                            return Ok(());
                        }
                        self.skip_one_value()?;
                        self.skip_one_value()?;
                    }
                } else {
                    for _ in 0..(head.arg * 2) {
                        self.skip_one_value()?;
                    }
                    Ok(())
                }
            }
            MAJOR_TAG => self.skip_one_value(),
            MAJOR_SIMPLE => Ok(()),
            other => Err(TxForgeError::UnexpectedCborType {
                expected: "known major type",
                found: format!("major({other})"),
            }),
        }
    }
}
