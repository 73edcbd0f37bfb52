//! Script model: the `Native | PlutusV1 | PlutusV2 | PlutusV3` tagged union
//! and its hash (spec §3, §4.H, §6).
//!
//! Grounded on `pallas-crypto::hash::Hasher::hash_tagged` for the hash
//! formula itself, and on `StagingTransaction::script`'s tag assignment
//! (native = 0, V1 = 1, V2 = 2) in `pallas-txbuilder`, extended here with
//! V3 = 3 per this crate's closed `Script` union.

use crate::buffer::Buffer;
use crate::cbor::{CborReader, CborState, CborWriter};
use crate::error::{Result, TxForgeError};
use crate::hash::{Hash, Hasher};

pub type ScriptHash = Hash<28>;
pub type KeyHash = Hash<28>;

/// Recursive native-script sum type (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeScript {
    Sig(KeyHash),
    All(Vec<NativeScript>),
    Any(Vec<NativeScript>),
    NOfK(u32, Vec<NativeScript>),
    InvalidBefore(u64),
    InvalidHereafter(u64),
}

impl NativeScript {
    pub fn encode(&self, writer: &mut CborWriter) {
        match self {
            NativeScript::Sig(key_hash) => {
                writer.write_start_array(2).expect("fixed array");
                writer.write_uint(0);
                writer.write_bytestring(key_hash.as_ref());
                writer.write_end_array().expect("fixed array");
            }
            NativeScript::All(scripts) => {
                writer.write_start_array(2).expect("fixed array");
                writer.write_uint(1);
                encode_script_list(writer, scripts);
                writer.write_end_array().expect("fixed array");
            }
            NativeScript::Any(scripts) => {
                writer.write_start_array(2).expect("fixed array");
                writer.write_uint(2);
                encode_script_list(writer, scripts);
                writer.write_end_array().expect("fixed array");
            }
            NativeScript::NOfK(n, scripts) => {
                writer.write_start_array(3).expect("fixed array");
                writer.write_uint(3);
                writer.write_uint(*n as u64);
                encode_script_list(writer, scripts);
                writer.write_end_array().expect("fixed array");
            }
            NativeScript::InvalidBefore(slot) => {
                writer.write_start_array(2).expect("fixed array");
                writer.write_uint(4);
                writer.write_uint(*slot);
                writer.write_end_array().expect("fixed array");
            }
            NativeScript::InvalidHereafter(slot) => {
                writer.write_start_array(2).expect("fixed array");
                writer.write_uint(5);
                writer.write_uint(*slot);
                writer.write_end_array().expect("fixed array");
            }
        }
    }

    pub fn decode(reader: &mut CborReader) -> Result<NativeScript> {
        reader.read_start_array()?;
        let kind = reader.read_uint()?;
        let script = match kind {
            0 => {
                let bytes = reader.read_bytestring()?;
                NativeScript::Sig(KeyHash::from_slice(bytes.as_slice())?)
            }
            1 => NativeScript::All(decode_script_list(reader)?),
            2 => NativeScript::Any(decode_script_list(reader)?),
            3 => {
                let n = reader.read_uint()?;
                NativeScript::NOfK(
                    u32::try_from(n).map_err(|_| TxForgeError::IntegerOverflow)?,
                    decode_script_list(reader)?,
                )
            }
            4 => NativeScript::InvalidBefore(reader.read_uint()?),
            5 => NativeScript::InvalidHereafter(reader.read_uint()?),
            other => return Err(TxForgeError::InvalidNativeScriptType(other)),
        };
        reader.read_end_array()?;
        Ok(script)
    }

    pub fn to_cbor(&self) -> Buffer {
        let mut w = CborWriter::new();
        self.encode(&mut w);
        w.into_buffer()
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<NativeScript> {
        let mut r = CborReader::new(bytes);
        NativeScript::decode(&mut r)
    }
}

fn encode_script_list(writer: &mut CborWriter, scripts: &[NativeScript]) {
    writer.write_start_array(scripts.len() as i64).expect("definite array");
    for s in scripts {
        s.encode(writer);
    }
    writer.write_end_array().expect("definite array");
}

fn decode_script_list(reader: &mut CborReader) -> Result<Vec<NativeScript>> {
    let len = reader.read_start_array()?;
    let mut out = Vec::new();
    if len >= 0 {
        for _ in 0..len {
            out.push(NativeScript::decode(reader)?);
        }
    } else {
        while reader.peek_state()? != CborState::EndArray {
            out.push(NativeScript::decode(reader)?);
        }
    }
    reader.read_end_array()?;
    Ok(out)
}

/// Tagged union of script languages. Hash = BLAKE2b-224 over the
/// single-byte language tag (0 native, 1 v1, 2 v2, 3 v3) concatenated with
/// the compiled-code bytes (Plutus) or the CBOR of the native script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    Native(NativeScript),
    PlutusV1(Buffer),
    PlutusV2(Buffer),
    PlutusV3(Buffer),
}

impl Script {
    pub fn language_tag(&self) -> u8 {
        match self {
            Script::Native(_) => 0,
            Script::PlutusV1(_) => 1,
            Script::PlutusV2(_) => 2,
            Script::PlutusV3(_) => 3,
        }
    }

    pub fn hash(&self) -> ScriptHash {
        let body = match self {
            Script::Native(ns) => ns.to_cbor().into_vec(),
            Script::PlutusV1(b) | Script::PlutusV2(b) | Script::PlutusV3(b) => b.to_vec(),
        };
        Hasher::<224>::hash_tagged(self.language_tag(), &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plutus_script_hash_matches_formula() {
        let code = Buffer::from(vec![0xde, 0xad, 0xbe, 0xef].as_slice());
        let script = Script::PlutusV2(code.clone());

        let mut expected_body = vec![2u8];
        expected_body.extend_from_slice(code.as_slice());
        let expected = Hasher::<224>::hash(&expected_body);

        assert_eq!(script.hash(), expected);
    }

    #[test]
    fn native_script_round_trips() {
        let script = NativeScript::All(vec![
            NativeScript::Sig(KeyHash::new([7u8; 28])),
            NativeScript::InvalidBefore(100),
        ]);
        let cbor = script.to_cbor();
        let decoded = NativeScript::from_cbor(cbor.as_slice()).unwrap();
        assert_eq!(script, decoded);
    }

    #[test]
    fn native_script_hash_uses_its_own_cbor() {
        let script = NativeScript::Sig(KeyHash::new([1u8; 28]));
        let wrapped = Script::Native(script.clone());
        let mut expected_body = vec![0u8];
        expected_body.extend_from_slice(script.to_cbor().as_slice());
        let expected = Hasher::<224>::hash(&expected_body);
        assert_eq!(wrapped.hash(), expected);
    }
}
