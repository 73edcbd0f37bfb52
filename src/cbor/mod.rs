//! Streaming CBOR codec foundation (RFC 8949).
//!
//! This is hand-rolled rather than built on a derive-oriented CBOR crate:
//! the byte-cache preservation invariant the rest of this crate depends on
//! (re-encoding a [`crate::plutus_data::PlutusData`] node must reproduce the
//! exact bytes it was decoded from, not merely an equivalent canonical
//! encoding) needs direct control over the reader/writer state machine.

mod reader;
mod validate;
mod writer;

pub use reader::{CborReader, CborState};
pub use validate::{
    validate_array_of_n_elements, validate_end_array, validate_end_map, validate_enum_value,
    validate_uint_in_range,
};
pub use writer::CborWriter;

/// Hard cap on nested container depth, guarding against pathological or
/// adversarial input. Not a tunable resource budget: a fixed constant.
pub const MAX_CONTAINER_DEPTH: usize = 64;

/// Plutus-data byte strings longer than this are chunked into
/// indefinite-length segments of exactly this many bytes, per the Plutus
/// 64-byte rule (spec §4.G, §6).
pub const PLUTUS_CHUNK_SIZE: usize = 64;

pub(crate) const MAJOR_UINT: u8 = 0;
pub(crate) const MAJOR_NINT: u8 = 1;
pub(crate) const MAJOR_BYTES: u8 = 2;
pub(crate) const MAJOR_TEXT: u8 = 3;
pub(crate) const MAJOR_ARRAY: u8 = 4;
pub(crate) const MAJOR_MAP: u8 = 5;
pub(crate) const MAJOR_TAG: u8 = 6;
pub(crate) const MAJOR_SIMPLE: u8 = 7;

pub(crate) const TAG_BIGNUM_POS: u64 = 2;
pub(crate) const TAG_BIGNUM_NEG: u64 = 3;
