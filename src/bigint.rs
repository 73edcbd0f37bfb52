//! Signed arbitrary-precision integers, for Plutus `Integer` values that
//! exceed 64 bits.
//!
//! Rather than hand-roll sign-magnitude arithmetic, this wraps
//! `num_bigint::BigInt` (the same crate `pallas-validate` and the optional
//! big-integer support in `pallas-codec` use) and adds the CBOR encode/
//! decode rules this crate's wire format requires: the major-0/1 direct
//! form when a value fits in 64 bits, tag 2/3 wrapped bytestrings
//! otherwise.

pub use num_bigint::{BigInt, Sign};

use crate::buffer::Buffer;
use crate::cbor::{CborReader, CborWriter};
use crate::error::Result;

/// Decodes a big integer per spec §4.B: major-0/1 direct, or tag-2/tag-3
/// wrapping a (possibly chunked) byte string.
pub fn decode(reader: &mut CborReader) -> Result<BigInt> {
    reader.read_bigint()
}

/// Encodes a big integer, using the shortest form that round-trips.
pub fn encode(writer: &mut CborWriter, value: &BigInt) {
    writer.write_bigint(value);
}

pub fn to_cbor(value: &BigInt) -> Buffer {
    let mut w = CborWriter::new();
    encode(&mut w, value);
    w.into_buffer()
}

pub fn from_cbor(bytes: &[u8]) -> Result<BigInt> {
    let mut r = CborReader::new(bytes);
    decode(&mut r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_values_use_direct_form() {
        let buf = to_cbor(&BigInt::from(42));
        assert_eq!(buf.as_slice(), &[0x18, 0x2a]);
    }

    #[test]
    fn round_trip_large_magnitude() {
        let v = BigInt::parse_bytes(b"-99999999999999999999999999999999", 10).unwrap();
        let buf = to_cbor(&v);
        assert_eq!(from_cbor(buf.as_slice()).unwrap(), v);
    }
}
