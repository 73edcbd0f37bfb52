//! Owned growable byte sequence with hex import/export.

use std::fmt;

use crate::error::{Result, TxForgeError};

/// A contiguous, owned byte sequence.
///
/// Thin wrapper over `Vec<u8>`; exists as its own type so call sites read
/// as "buffer of bytes" rather than a bare `Vec<u8>`, matching the rest of
/// this crate's newtypes over raw collections (`Value`, `MultiAsset`, ...).
#[derive(Clone, PartialEq, Eq, Default, Hash)]
pub struct Buffer(Vec<u8>);

impl Buffer {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self(Vec::with_capacity(cap))
    }

    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.0.extend_from_slice(bytes);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a copy of `self.0[start..start+len]`, failing if out of range.
    pub fn slice(&self, start: usize, len: usize) -> Result<Buffer> {
        let end = start
            .checked_add(len)
            .ok_or(TxForgeError::IntegerOverflow)?;
        if end > self.0.len() {
            return Err(TxForgeError::OutOfBoundsMemoryRead {
                offset: start,
                len: self.0.len(),
            });
        }
        if self.0.is_empty() {
            return Err(TxForgeError::InsufficientBufferSize { needed: len, had: 0 });
        }
        Ok(Buffer(self.0[start..end].to_vec()))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn from_hex(s: &str) -> Result<Buffer> {
        let bytes = hex::decode(s)?;
        Ok(Buffer(bytes))
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Buffer({})", self.to_hex())
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(v: Vec<u8>) -> Self {
        Buffer(v)
    }
}

impl From<&[u8]> for Buffer {
    fn from(v: &[u8]) -> Self {
        Buffer(v.to_vec())
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::ops::Deref for Buffer {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.0
    }
}
