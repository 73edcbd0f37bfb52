//! Fixed-size hash digests and the BLAKE2b hasher that produces them.
//!
//! Grounded directly on `pallas-crypto`'s `Hash<const BYTES: usize>` /
//! `Hasher<const BITS: usize>` pair: a const-generic newtype around a byte
//! array, and a hasher built on `cryptoxide::blake2b::Blake2b` with a
//! `hash_tagged` convenience that matches this crate's script-hash formula
//! (a single prefix byte, then the body).

use std::fmt;
use std::str::FromStr;

use cryptoxide::blake2b::Blake2b;

use crate::error::{Result, TxForgeError};

/// A fixed-size hash digest, e.g. `Hash<28>` for a policy id or script
/// hash, `Hash<32>` for a transaction id or datum hash.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash<const BYTES: usize>([u8; BYTES]);

impl<const BYTES: usize> Hash<BYTES> {
    pub fn new(bytes: [u8; BYTES]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != BYTES {
            return Err(TxForgeError::InvalidBlake2bHashSize {
                expected: BYTES,
                found: bytes.len(),
            });
        }
        let mut out = [0u8; BYTES];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }
}

impl<const BYTES: usize> AsRef<[u8]> for Hash<BYTES> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<const BYTES: usize> std::ops::Deref for Hash<BYTES> {
    type Target = [u8; BYTES];
    fn deref(&self) -> &[u8; BYTES] {
        &self.0
    }
}

impl<const BYTES: usize> From<[u8; BYTES]> for Hash<BYTES> {
    fn from(bytes: [u8; BYTES]) -> Self {
        Self(bytes)
    }
}

impl<const BYTES: usize> fmt::Debug for Hash<BYTES> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash<{BYTES}>({})", hex::encode(self.0))
    }
}

impl<const BYTES: usize> fmt::Display for Hash<BYTES> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl<const BYTES: usize> FromStr for Hash<BYTES> {
    type Err = TxForgeError;
    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

/// A hasher parameterized by output size in bits (160, 224, or 256 — the
/// three digest sizes this crate needs).
pub struct Hasher<const BITS: usize>(Blake2b);

macro_rules! common_hasher {
    ($bits:literal) => {
        impl Hasher<$bits> {
            pub fn new() -> Self {
                Self(Blake2b::new($bits / 8))
            }

            pub fn input(&mut self, bytes: &[u8]) {
                self.0.input(bytes);
            }

            pub fn finalize(self) -> Hash<{ $bits / 8 }> {
                let mut out = [0u8; $bits / 8];
                let mut hasher = self.0;
                hasher.result(&mut out);
                Hash(out)
            }

            pub fn hash(bytes: &[u8]) -> Hash<{ $bits / 8 }> {
                let mut h = Self::new();
                h.input(bytes);
                h.finalize()
            }

            /// Hashes `tag` concatenated with `bytes` — the script-hash
            /// formula of spec §3/§6: `BLAKE2b-224(tag ‖ body)`.
            pub fn hash_tagged(tag: u8, bytes: &[u8]) -> Hash<{ $bits / 8 }> {
                let mut h = Self::new();
                h.input(&[tag]);
                h.input(bytes);
                h.finalize()
            }
        }

        impl Default for Hasher<$bits> {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

common_hasher!(160);
common_hasher!(224);
common_hasher!(256);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_tagged_matches_manual_concat() {
        let tag = 1u8;
        let body = b"compiled plutus code";
        let tagged = Hasher::<224>::hash_tagged(tag, body);

        let mut manual = Vec::new();
        manual.push(tag);
        manual.extend_from_slice(body);
        let expected = Hasher::<224>::hash(&manual);

        assert_eq!(tagged, expected);
    }

    #[test]
    fn hash_display_round_trips_through_from_str() {
        let h = Hash::<28>::new([0xAB; 28]);
        let s = h.to_string();
        let parsed: Hash<28> = s.parse().unwrap();
        assert_eq!(h, parsed);
    }
}
