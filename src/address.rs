//! Thin address model: Bech32 payment/reward address parsing and
//! rendering (spec §3 "Address (ambient)", §6).
//!
//! Modeled as a tagged sum over concrete variants rather than via the
//! "first field is the base object" struct-casting the original source
//! used (spec §9) — each variant carries exactly the fields it has, and a
//! `network_id`/`credential` accessor pattern-matches across variants
//! instead of reading a shared leading header. Uses `bech32` directly, the
//! same crate `pallas-addresses`, `pallas-wallet`, and `pallas-bech32` all
//! depend on for this.

use bech32::{FromBase32, ToBase32, Variant};

use crate::error::{Result, TxForgeError};
use crate::hash::Hash;

pub type Network = u8;
pub const NETWORK_TESTNET: Network = 0;
pub const NETWORK_MAINNET: Network = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Credential {
    Key(Hash<28>),
    Script(Hash<28>),
}

impl Credential {
    fn hash_bytes(&self) -> &[u8; 28] {
        match self {
            Credential::Key(h) | Credential::Script(h) => h,
        }
    }

    fn is_script(&self) -> bool {
        matches!(self, Credential::Script(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    Base {
        network: Network,
        payment: Credential,
        stake: Credential,
    },
    Enterprise {
        network: Network,
        payment: Credential,
    },
    Pointer {
        network: Network,
        payment: Credential,
        slot: u64,
        tx_index: u64,
        cert_index: u64,
    },
    Reward {
        network: Network,
        credential: Credential,
    },
    Byron(Vec<u8>),
}

impl Address {
    pub fn network(&self) -> Option<Network> {
        match self {
            Address::Base { network, .. }
            | Address::Enterprise { network, .. }
            | Address::Pointer { network, .. }
            | Address::Reward { network, .. } => Some(*network),
            Address::Byron(_) => None,
        }
    }

    pub fn payment_credential(&self) -> Option<&Credential> {
        match self {
            Address::Base { payment, .. } | Address::Enterprise { payment, .. } | Address::Pointer { payment, .. } => {
                Some(payment)
            }
            Address::Reward { .. } | Address::Byron(_) => None,
        }
    }

    fn header_byte(&self) -> Option<u8> {
        let network = self.network()?;
        let byte = match self {
            Address::Base { payment, stake, .. } => {
                let kind = match (payment.is_script(), stake.is_script()) {
                    (false, false) => 0b0000,
                    (true, false) => 0b0001,
                    (false, true) => 0b0010,
                    (true, true) => 0b0011,
                };
                (kind << 4) | network
            }
            Address::Pointer { payment, .. } => {
                let kind = if payment.is_script() { 0b0101 } else { 0b0100 };
                (kind << 4) | network
            }
            Address::Enterprise { payment, .. } => {
                let kind = if payment.is_script() { 0b0111 } else { 0b0110 };
                (kind << 4) | network
            }
            Address::Reward { credential, .. } => {
                let kind = if credential.is_script() { 0b1111 } else { 0b1110 };
                (kind << 4) | network
            }
            Address::Byron(_) => return None,
        };
        Some(byte)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if let Address::Byron(bytes) = self {
            return Ok(bytes.clone());
        }
        let header = self
            .header_byte()
            .ok_or_else(|| TxForgeError::InvalidAddressFormat("byron has no header".into()))?;
        let mut out = vec![header];
        match self {
            Address::Base { payment, stake, .. } => {
                out.extend_from_slice(payment.hash_bytes());
                out.extend_from_slice(stake.hash_bytes());
            }
            Address::Enterprise { payment, .. } => {
                out.extend_from_slice(payment.hash_bytes());
            }
            Address::Pointer {
                payment,
                slot,
                tx_index,
                cert_index,
                ..
            } => {
                out.extend_from_slice(payment.hash_bytes());
                out.extend(encode_varint(*slot));
                out.extend(encode_varint(*tx_index));
                out.extend(encode_varint(*cert_index));
            }
            Address::Reward { credential, .. } => {
                out.extend_from_slice(credential.hash_bytes());
            }
            Address::Byron(_) => unreachable!(),
        }
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Address> {
        let header = *bytes
            .first()
            .ok_or_else(|| TxForgeError::InvalidAddressFormat("empty address".into()))?;
        let kind = header >> 4;
        let network = header & 0x0f;

        if kind == 0b1000 {
            return Ok(Address::Byron(bytes.to_vec()));
        }

        let body = &bytes[1..];
        let read_hash = |slice: &[u8]| -> Result<Hash<28>> { Hash::from_slice(slice) };

        match kind {
            0b0000..=0b0011 => {
                if body.len() < 56 {
                    return Err(TxForgeError::InvalidAddressFormat(
                        "base address too short".into(),
                    ));
                }
                let payment_is_script = kind & 0b01 != 0;
                let stake_is_script = kind & 0b10 != 0;
                let payment_hash = read_hash(&body[0..28])?;
                let stake_hash = read_hash(&body[28..56])?;
                let payment = if payment_is_script {
                    Credential::Script(payment_hash)
                } else {
                    Credential::Key(payment_hash)
                };
                let stake = if stake_is_script {
                    Credential::Script(stake_hash)
                } else {
                    Credential::Key(stake_hash)
                };
                Ok(Address::Base {
                    network,
                    payment,
                    stake,
                })
            }
            0b0100 | 0b0101 => {
                if body.len() < 28 {
                    return Err(TxForgeError::InvalidAddressFormat(
                        "pointer address too short".into(),
                    ));
                }
                let payment_hash = read_hash(&body[0..28])?;
                let payment = if kind == 0b0101 {
                    Credential::Script(payment_hash)
                } else {
                    Credential::Key(payment_hash)
                };
                let (slot, rest) = decode_varint(&body[28..])?;
                let (tx_index, rest) = decode_varint(rest)?;
                let (cert_index, _rest) = decode_varint(rest)?;
                Ok(Address::Pointer {
                    network,
                    payment,
                    slot,
                    tx_index,
                    cert_index,
                })
            }
            0b0110 | 0b0111 => {
                if body.len() < 28 {
                    return Err(TxForgeError::InvalidAddressFormat(
                        "enterprise address too short".into(),
                    ));
                }
                let payment_hash = read_hash(&body[0..28])?;
                let payment = if kind == 0b0111 {
                    Credential::Script(payment_hash)
                } else {
                    Credential::Key(payment_hash)
                };
                Ok(Address::Enterprise { network, payment })
            }
            0b1110 | 0b1111 => {
                if body.len() < 28 {
                    return Err(TxForgeError::InvalidAddressFormat(
                        "reward address too short".into(),
                    ));
                }
                let hash = read_hash(&body[0..28])?;
                let credential = if kind == 0b1111 {
                    Credential::Script(hash)
                } else {
                    Credential::Key(hash)
                };
                Ok(Address::Reward { network, credential })
            }
            other => Err(TxForgeError::InvalidAddressFormat(format!(
                "unknown address header kind {other:#06b}"
            ))),
        }
    }

    /// Bech32 human-readable part per spec §6: `addr`/`addr_test` for
    /// payment-capable addresses, `stake`/`stake_test` for reward
    /// addresses.
    fn hrp(&self) -> Result<&'static str> {
        let mainnet = self.network() == Some(NETWORK_MAINNET);
        Ok(match self {
            Address::Reward { .. } => {
                if mainnet {
                    "stake"
                } else {
                    "stake_test"
                }
            }
            Address::Byron(_) => {
                return Err(TxForgeError::NotImplemented(
                    "byron addresses use Base58, not Bech32",
                ))
            }
            _ => {
                if mainnet {
                    "addr"
                } else {
                    "addr_test"
                }
            }
        })
    }

    pub fn to_bech32(&self) -> Result<String> {
        let hrp = self.hrp()?;
        let bytes = self.to_bytes()?;
        bech32::encode(hrp, bytes.to_base32(), Variant::Bech32)
            .map_err(|e| TxForgeError::InvalidAddressFormat(e.to_string()))
    }

    pub fn from_bech32(s: &str) -> Result<Address> {
        let (hrp, data, _variant) =
            bech32::decode(s).map_err(|e| TxForgeError::InvalidAddressFormat(e.to_string()))?;
        if !matches!(
            hrp.as_str(),
            "addr" | "addr_test" | "stake" | "stake_test"
        ) {
            return Err(TxForgeError::InvalidAddressFormat(format!(
                "unrecognized bech32 prefix `{hrp}`"
            )));
        }
        let bytes = Vec::<u8>::from_base32(&data)
            .map_err(|e| TxForgeError::InvalidAddressFormat(e.to_string()))?;
        Address::from_bytes(&bytes)
    }
}

fn encode_varint(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
    out
}

fn decode_varint(bytes: &[u8]) -> Result<(u64, &[u8])> {
    let mut value: u64 = 0;
    for (i, &b) in bytes.iter().enumerate() {
        value = (value << 7) | (b & 0x7f) as u64;
        if b & 0x80 == 0 {
            return Ok((value, &bytes[i + 1..]));
        }
    }
    Err(TxForgeError::Decoding(
        "truncated varint in pointer address".into(),
    ))
}
