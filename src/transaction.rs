//! Transaction body/witness-set model and protocol parameters (spec §3,
//! §4.N "Transaction model (ambient)").
//!
//! Grounded on `pallas-txbuilder`'s `transaction::Transaction` /
//! `transaction::model` shapes (body + witness_set + is_valid + optional
//! auxiliary data, a consuming-builder surface mirroring
//! `TransactionBuilder`/`StagingTransaction`) but generalized to the
//! non-era-specific field set the balancer needs rather than pinned to one
//! Cardano era's ledger types. CBOR map keys follow the Conway-era
//! conventional numbering so a produced transaction is wire-shaped like a
//! real one, even though certificate/governance bodies themselves remain
//! schema work outside this crate's scope (spec §1).

use indexmap::IndexMap;

use crate::address::Address;
use crate::buffer::Buffer;
use crate::cbor::{CborReader, CborState, CborWriter};
use crate::error::{Result, TxForgeError};
use crate::hash::Hash;
use crate::plutus_data::PlutusData;
use crate::script::{NativeScript, Script};
use crate::value::{PolicyId, Value};

pub type TxHash = Hash<32>;
pub type DatumHash = Hash<32>;
pub type KeyHash = Hash<28>;

/// `(tx_id, index)` — identifies a single transaction output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionInput {
    pub transaction_id: TxHash,
    pub index: u64,
}

impl TransactionInput {
    pub fn new(transaction_id: TxHash, index: u64) -> Self {
        Self { transaction_id, index }
    }

    pub fn encode(&self, writer: &mut CborWriter) {
        writer.write_start_array(2).expect("fixed array");
        writer.write_bytestring(self.transaction_id.as_ref());
        writer.write_uint(self.index);
        writer.write_end_array().expect("fixed array");
    }

    pub fn decode(reader: &mut CborReader) -> Result<Self> {
        reader.read_start_array()?;
        let id = TxHash::from_slice(reader.read_bytestring()?.as_slice())?;
        let index = reader.read_uint()?;
        reader.read_end_array()?;
        Ok(Self::new(id, index))
    }
}

/// A spendable datum attached to an output: absent, referenced by hash, or
/// carried inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datum {
    Hash(DatumHash),
    Inline(PlutusData),
}

impl Datum {
    fn encode(&self, writer: &mut CborWriter) {
        writer.write_start_array(2).expect("fixed array");
        match self {
            Datum::Hash(h) => {
                writer.write_uint(0);
                writer.write_bytestring(h.as_ref());
            }
            Datum::Inline(data) => {
                writer.write_uint(1);
                // datum_option's inline form wraps the PlutusData CBOR bytes in tag 24.
                let inner = data.to_cbor();
                writer.write_tag(24);
                writer.write_bytestring(inner.as_slice());
            }
        }
        writer.write_end_array().expect("fixed array");
    }

    fn decode(reader: &mut CborReader) -> Result<Self> {
        reader.read_start_array()?;
        let kind = reader.read_uint()?;
        let datum = match kind {
            0 => Datum::Hash(DatumHash::from_slice(reader.read_bytestring()?.as_slice())?),
            1 => {
                let tag = reader.read_tag()?;
                if tag != 24 {
                    return Err(TxForgeError::InvalidDatumType);
                }
                let inner = reader.read_bytestring()?;
                Datum::Inline(PlutusData::from_cbor(inner.as_slice())?)
            }
            _ => return Err(TxForgeError::InvalidDatumType),
        };
        reader.read_end_array()?;
        Ok(datum)
    }
}

/// A transaction output: address, value, optional datum, optional script
/// reference (spec §3 UTxO).
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionOutput {
    pub address: Address,
    pub value: Value,
    pub datum: Option<Datum>,
    pub script_ref: Option<Script>,
}

impl TransactionOutput {
    pub fn new(address: Address, value: Value) -> Self {
        Self {
            address,
            value,
            datum: None,
            script_ref: None,
        }
    }

    pub fn with_datum(mut self, datum: Datum) -> Self {
        self.datum = Some(datum);
        self
    }

    pub fn with_script_ref(mut self, script: Script) -> Self {
        self.script_ref = Some(script);
        self
    }

    fn encode_value(writer: &mut CborWriter, value: &Value) {
        let policies = value.sorted_policies();
        if policies.is_empty() {
            writer.write_signed_int(value.coin());
            return;
        }
        writer.write_start_array(2).expect("fixed array");
        writer.write_signed_int(value.coin());
        writer.write_start_map(policies.len() as i64).expect("definite map");
        for (policy, names) in policies {
            writer.write_bytestring(policy.as_ref());
            writer.write_start_map(names.len() as i64).expect("definite map");
            for (name, qty) in names {
                writer.write_bytestring(name.as_slice());
                writer.write_signed_int(qty);
            }
            writer.write_end_map().expect("definite map");
        }
        writer.write_end_map().expect("definite map");
    }

    fn decode_value(reader: &mut CborReader) -> Result<Value> {
        match reader.peek_state()? {
            CborState::UnsignedInt | CborState::NegativeInt => {
                Ok(Value::from_coin(reader.read_int()?))
            }
            CborState::StartArray => {
                reader.read_start_array()?;
                let coin = reader.read_int()?;
                let mut value = decode_multiasset(reader)?;
                value.set_coin(coin);
                reader.read_end_array()?;
                Ok(value)
            }
            other => Err(TxForgeError::UnexpectedCborType {
                expected: "coin or [coin, multiasset]",
                found: format!("{other:?}"),
            }),
        }
    }

    pub fn encode(&self, writer: &mut CborWriter) {
        let mut n = 2;
        if self.datum.is_some() {
            n += 1;
        }
        if self.script_ref.is_some() {
            n += 1;
        }
        writer.write_start_map(n).expect("definite map");
        writer.write_uint(0);
        let addr_bytes = self
            .address
            .to_bytes()
            .expect("address round-trips to bytes for every non-Byron-decode variant");
        writer.write_bytestring(&addr_bytes);
        writer.write_uint(1);
        Self::encode_value(writer, &self.value);
        if let Some(datum) = &self.datum {
            writer.write_uint(2);
            datum.encode(writer);
        }
        if let Some(script) = &self.script_ref {
            writer.write_uint(3);
            let cbor = encode_script_ref(script);
            writer.write_tag(24);
            writer.write_bytestring(cbor.as_slice());
        }
        writer.write_end_map().expect("definite map");
    }

    pub fn decode(reader: &mut CborReader) -> Result<Self> {
        let pairs = reader.read_start_map()?;
        let mut address = None;
        let mut value = None;
        let mut datum = None;
        let mut script_ref = None;
        let count = if pairs >= 0 { pairs as u64 } else { u64::MAX };
        let mut i = 0;
        loop {
            if pairs >= 0 {
                if i >= count {
                    break;
                }
            } else if reader.peek_state()? == CborState::EndMap {
                break;
            }
            let key = reader.read_uint()?;
            match key {
                0 => address = Some(Address::from_bytes(reader.read_bytestring()?.as_slice())?),
                1 => value = Some(Self::decode_value(reader)?),
                2 => datum = Some(Datum::decode(reader)?),
                3 => {
                    let tag = reader.read_tag()?;
                    if tag != 24 {
                        return Err(TxForgeError::Decoding("expected tag 24 script_ref".into()));
                    }
                    let inner = reader.read_bytestring()?;
                    script_ref = Some(decode_script_ref(inner.as_slice())?);
                }
                _other => {
                    return Err(TxForgeError::InvalidCborMapKey {
                        context: "unknown transaction output map key",
                    })
                }
            }
            i += 1;
        }
        reader.read_end_map()?;
        Ok(TransactionOutput {
            address: address.ok_or(TxForgeError::IllegalState("output missing address".into()))?,
            value: value.ok_or(TxForgeError::IllegalState("output missing value".into()))?,
            datum,
            script_ref,
        })
    }

    pub fn to_cbor(&self) -> Buffer {
        let mut w = CborWriter::new();
        self.encode(&mut w);
        w.into_buffer()
    }
}

/// Reads a bare `{policy: {asset: quantity}}` map (no leading coin), the
/// shape `mint` uses — as opposed to `decode_value`'s `coin | [coin, map]`.
fn decode_multiasset(reader: &mut CborReader) -> Result<Value> {
    let mut value = Value::zero();
    let pairs = reader.read_start_map()?;
    let policy_count = if pairs >= 0 { pairs as u64 } else { u64::MAX };
    let mut i = 0;
    loop {
        if pairs >= 0 {
            if i >= policy_count {
                break;
            }
        } else if reader.peek_state()? == CborState::EndMap {
            break;
        }
        let policy = PolicyId::from_slice(reader.read_bytestring()?.as_slice())?;
        let asset_pairs = reader.read_start_map()?;
        let asset_count = if asset_pairs >= 0 { asset_pairs as u64 } else { u64::MAX };
        let mut j = 0;
        loop {
            if asset_pairs >= 0 {
                if j >= asset_count {
                    break;
                }
            } else if reader.peek_state()? == CborState::EndMap {
                break;
            }
            let name = reader.read_bytestring()?;
            let qty = reader.read_int()?;
            value.set_quantity(policy, name, qty);
            j += 1;
        }
        reader.read_end_map()?;
        i += 1;
    }
    reader.read_end_map()?;
    Ok(value)
}

/// Reads a definite or indefinite array of items via a per-item reader.
fn decode_array<T>(
    reader: &mut CborReader,
    mut read_item: impl FnMut(&mut CborReader) -> Result<T>,
) -> Result<Vec<T>> {
    let n = reader.read_start_array()?;
    let count = if n >= 0 { n as u64 } else { u64::MAX };
    let mut out = Vec::new();
    let mut i = 0;
    loop {
        if n >= 0 {
            if i >= count {
                break;
            }
        } else if reader.peek_state()? == CborState::EndArray {
            break;
        }
        out.push(read_item(reader)?);
        i += 1;
    }
    reader.read_end_array()?;
    Ok(out)
}

fn encode_script_ref(script: &Script) -> Buffer {
    let mut w = CborWriter::new();
    w.write_start_array(2).expect("fixed array");
    w.write_uint(script.language_tag() as u64);
    match script {
        Script::Native(ns) => {
            let cbor = ns.to_cbor();
            w.write_bytestring(cbor.as_slice());
        }
        Script::PlutusV1(b) | Script::PlutusV2(b) | Script::PlutusV3(b) => {
            w.write_bytestring(b.as_slice());
        }
    }
    w.write_end_array().expect("fixed array");
    w.into_buffer()
}

fn decode_script_ref(bytes: &[u8]) -> Result<Script> {
    let mut r = CborReader::new(bytes);
    r.read_start_array()?;
    let tag = r.read_uint()?;
    let body = r.read_bytestring()?;
    r.read_end_array()?;
    match tag {
        0 => Ok(Script::Native(NativeScript::from_cbor(body.as_slice())?)),
        1 => Ok(Script::PlutusV1(body)),
        2 => Ok(Script::PlutusV2(body)),
        3 => Ok(Script::PlutusV3(body)),
        other => Err(TxForgeError::InvalidScriptLanguage(other as u8)),
    }
}

/// Execution units consumed by a Plutus script run: memory + CPU steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct ExUnits {
    pub mem: u64,
    pub steps: u64,
}

/// Which part of the transaction a redeemer validates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeemerTag {
    Spend,
    Mint,
    Cert,
    Reward,
    Vote,
    Propose,
}

impl RedeemerTag {
    fn as_u64(self) -> u64 {
        match self {
            RedeemerTag::Spend => 0,
            RedeemerTag::Mint => 1,
            RedeemerTag::Cert => 2,
            RedeemerTag::Reward => 3,
            RedeemerTag::Vote => 4,
            RedeemerTag::Propose => 5,
        }
    }

    fn from_u64(v: u64) -> Result<Self> {
        Ok(match v {
            0 => RedeemerTag::Spend,
            1 => RedeemerTag::Mint,
            2 => RedeemerTag::Cert,
            3 => RedeemerTag::Reward,
            4 => RedeemerTag::Vote,
            5 => RedeemerTag::Propose,
            other => return Err(TxForgeError::InvalidProcedureProposalType(other)),
        })
    }
}

/// A script-input witness: purpose, index, datum, execution units.
#[derive(Debug, Clone, PartialEq)]
pub struct Redeemer {
    pub tag: RedeemerTag,
    pub index: u32,
    pub data: PlutusData,
    pub ex_units: ExUnits,
}

impl Redeemer {
    pub fn encode(&self, writer: &mut CborWriter) {
        writer.write_start_array(4).expect("fixed array");
        writer.write_uint(self.tag.as_u64());
        writer.write_uint(self.index as u64);
        self.data.encode(writer);
        writer.write_start_array(2).expect("fixed array");
        writer.write_uint(self.ex_units.mem);
        writer.write_uint(self.ex_units.steps);
        writer.write_end_array().expect("fixed array");
        writer.write_end_array().expect("fixed array");
    }

    pub fn decode(reader: &mut CborReader) -> Result<Self> {
        reader.read_start_array()?;
        let tag = RedeemerTag::from_u64(reader.read_uint()?)?;
        let index = u32::try_from(reader.read_uint()?).map_err(|_| TxForgeError::IntegerOverflow)?;
        let data = PlutusData::decode(reader)?;
        reader.read_start_array()?;
        let mem = reader.read_uint()?;
        let steps = reader.read_uint()?;
        reader.read_end_array()?;
        reader.read_end_array()?;
        Ok(Redeemer { tag, index, data, ex_units: ExUnits { mem, steps } })
    }
}

/// The subset of live protocol parameters the balancer, fee calculator, and
/// min-UTxO calculator read. Arrives from `Provider::get_parameters`;
/// `serde::Deserialize` so a caller can load it from a node's JSON response
/// or a test fixture.
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ProtocolParams {
    pub min_fee_a: u64,
    pub min_fee_b: u64,
    pub ada_per_utxo_byte: u64,
    pub collateral_percentage: u64,
    pub max_collateral_inputs: usize,
    pub max_tx_size: usize,
    pub mem_price_numerator: u64,
    pub mem_price_denominator: u64,
    pub step_price_numerator: u64,
    pub step_price_denominator: u64,
    pub max_tx_execution_mem: u64,
    pub max_tx_execution_steps: u64,
}

impl ProtocolParams {
    /// The min-UTxO overhead constant mandated by the protocol (spec
    /// §4.K/§9): not a literal in the calculator, sourced here as the
    /// compiled-in fallback for a "mainnet as of Babbage" parameter set.
    pub const MIN_UTXO_OVERHEAD_BYTES: u64 = 160;
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            min_fee_a: 44,
            min_fee_b: 155_381,
            ada_per_utxo_byte: 4_310,
            collateral_percentage: 150,
            max_collateral_inputs: 3,
            max_tx_size: 16_384,
            mem_price_numerator: 577,
            mem_price_denominator: 10_000,
            step_price_numerator: 721,
            step_price_denominator: 10_000_000,
            max_tx_execution_mem: 14_000_000,
            max_tx_execution_steps: 10_000_000_000,
        }
    }
}

/// The body fields the balancer reads and writes (spec §3 Transaction).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionBody {
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub fee: u64,
    pub ttl: Option<u64>,
    pub validity_start: Option<u64>,
    pub withdrawals: IndexMap<Address, i64>,
    pub mint: Value,
    pub collateral_inputs: Vec<TransactionInput>,
    pub collateral_return: Option<TransactionOutput>,
    pub total_collateral: Option<u64>,
    pub required_signers: Vec<KeyHash>,
    pub reference_inputs: Vec<TransactionInput>,
    pub script_data_hash: Option<Hash<32>>,
    /// Certificates are out-of-scope schema work (spec §1); carried as
    /// opaque already-encoded CBOR items so the balancer's size accounting
    /// stays correct without this crate needing to model every certificate
    /// variant.
    pub certificates: Vec<Buffer>,
}

impl TransactionBody {
    fn encode(&self, writer: &mut CborWriter) {
        let mut n = 2; // inputs, outputs
        n += 1; // fee
        if self.ttl.is_some() {
            n += 1;
        }
        if !self.certificates.is_empty() {
            n += 1;
        }
        if !self.withdrawals.is_empty() {
            n += 1;
        }
        if self.validity_start.is_some() {
            n += 1;
        }
        if !self.mint.is_zero() {
            n += 1;
        }
        if self.script_data_hash.is_some() {
            n += 1;
        }
        if !self.collateral_inputs.is_empty() {
            n += 1;
        }
        if !self.required_signers.is_empty() {
            n += 1;
        }
        if self.collateral_return.is_some() {
            n += 1;
        }
        if self.total_collateral.is_some() {
            n += 1;
        }
        if !self.reference_inputs.is_empty() {
            n += 1;
        }

        writer.write_start_map(n).expect("definite map");

        writer.write_uint(0);
        writer.write_start_array(self.inputs.len() as i64).expect("definite array");
        for i in &self.inputs {
            i.encode(writer);
        }
        writer.write_end_array().expect("definite array");

        writer.write_uint(1);
        writer.write_start_array(self.outputs.len() as i64).expect("definite array");
        for o in &self.outputs {
            o.encode(writer);
        }
        writer.write_end_array().expect("definite array");

        writer.write_uint(2);
        writer.write_uint(self.fee);

        if let Some(ttl) = self.ttl {
            writer.write_uint(3);
            writer.write_uint(ttl);
        }
        if !self.certificates.is_empty() {
            writer.write_uint(4);
            writer.write_start_array(self.certificates.len() as i64).expect("definite array");
            for c in &self.certificates {
                writer.write_encoded(c.as_slice());
            }
            writer.write_end_array().expect("definite array");
        }
        if !self.withdrawals.is_empty() {
            writer.write_uint(5);
            writer.write_start_map(self.withdrawals.len() as i64).expect("definite map");
            let mut entries: Vec<_> = self.withdrawals.iter().collect();
            entries.sort_by(|a, b| {
                a.0.to_bytes()
                    .expect("address is encodable")
                    .cmp(&b.0.to_bytes().expect("address is encodable"))
            });
            for (addr, amount) in entries {
                writer.write_bytestring(&addr.to_bytes().expect("address is encodable"));
                writer.write_signed_int(*amount);
            }
            writer.write_end_map().expect("definite map");
        }
        if let Some(start) = self.validity_start {
            writer.write_uint(8);
            writer.write_uint(start);
        }
        if !self.mint.is_zero() {
            writer.write_uint(9);
            let policies = self.mint.sorted_policies();
            writer.write_start_map(policies.len() as i64).expect("definite map");
            for (policy, names) in policies {
                writer.write_bytestring(policy.as_ref());
                writer.write_start_map(names.len() as i64).expect("definite map");
                for (name, qty) in names {
                    writer.write_bytestring(name.as_slice());
                    writer.write_signed_int(qty);
                }
                writer.write_end_map().expect("definite map");
            }
            writer.write_end_map().expect("definite map");
        }
        if let Some(hash) = &self.script_data_hash {
            writer.write_uint(11);
            writer.write_bytestring(hash.as_ref());
        }
        if !self.collateral_inputs.is_empty() {
            writer.write_uint(13);
            writer.write_start_array(self.collateral_inputs.len() as i64).expect("definite array");
            for i in &self.collateral_inputs {
                i.encode(writer);
            }
            writer.write_end_array().expect("definite array");
        }
        if !self.required_signers.is_empty() {
            writer.write_uint(14);
            writer.write_start_array(self.required_signers.len() as i64).expect("definite array");
            for s in &self.required_signers {
                writer.write_bytestring(s.as_ref());
            }
            writer.write_end_array().expect("definite array");
        }
        if let Some(ret) = &self.collateral_return {
            writer.write_uint(16);
            ret.encode(writer);
        }
        if let Some(total) = self.total_collateral {
            writer.write_uint(17);
            writer.write_uint(total);
        }
        if !self.reference_inputs.is_empty() {
            writer.write_uint(18);
            writer.write_start_array(self.reference_inputs.len() as i64).expect("definite array");
            for i in &self.reference_inputs {
                i.encode(writer);
            }
            writer.write_end_array().expect("definite array");
        }

        writer.write_end_map().expect("definite map");
    }

    pub fn decode(reader: &mut CborReader) -> Result<Self> {
        let pairs = reader.read_start_map()?;
        let mut body = TransactionBody {
            fee: 0,
            ..Default::default()
        };
        let mut fee_seen = false;
        let count = if pairs >= 0 { pairs as u64 } else { u64::MAX };
        let mut i = 0;
        loop {
            if pairs >= 0 {
                if i >= count {
                    break;
                }
            } else if reader.peek_state()? == CborState::EndMap {
                break;
            }
            let key = reader.read_uint()?;
            match key {
                0 => body.inputs = decode_array(reader, TransactionInput::decode)?,
                1 => body.outputs = decode_array(reader, TransactionOutput::decode)?,
                2 => {
                    body.fee = reader.read_uint()?;
                    fee_seen = true;
                }
                3 => body.ttl = Some(reader.read_uint()?),
                4 => body.certificates = decode_array(reader, |r| r.read_encoded_value())?,
                5 => {
                    let pairs = reader.read_start_map()?;
                    let n = if pairs >= 0 { pairs as u64 } else { u64::MAX };
                    let mut j = 0;
                    loop {
                        if pairs >= 0 {
                            if j >= n {
                                break;
                            }
                        } else if reader.peek_state()? == CborState::EndMap {
                            break;
                        }
                        let addr = Address::from_bytes(reader.read_bytestring()?.as_slice())?;
                        let amount = reader.read_int()?;
                        body.withdrawals.insert(addr, amount);
                        j += 1;
                    }
                    reader.read_end_map()?;
                }
                8 => body.validity_start = Some(reader.read_uint()?),
                9 => body.mint = decode_multiasset(reader)?,
                11 => body.script_data_hash = Some(Hash::from_slice(reader.read_bytestring()?.as_slice())?),
                13 => body.collateral_inputs = decode_array(reader, TransactionInput::decode)?,
                14 => {
                    body.required_signers =
                        decode_array(reader, |r| KeyHash::from_slice(r.read_bytestring()?.as_slice()))?
                }
                16 => body.collateral_return = Some(TransactionOutput::decode(reader)?),
                17 => body.total_collateral = Some(reader.read_uint()?),
                18 => body.reference_inputs = decode_array(reader, TransactionInput::decode)?,
                _other => {
                    return Err(TxForgeError::InvalidCborMapKey {
                        context: "unknown transaction body map key",
                    })
                }
            }
            i += 1;
        }
        reader.read_end_map()?;
        if !fee_seen {
            return Err(TxForgeError::IllegalState("transaction body missing fee".into()));
        }
        Ok(body)
    }

    pub fn to_cbor(&self) -> Buffer {
        let mut w = CborWriter::new();
        self.encode(&mut w);
        w.into_buffer()
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        let mut r = CborReader::new(bytes);
        Self::decode(&mut r)
    }

    /// Sum of every existing input's resolved value. The body alone
    /// doesn't carry resolved UTxOs; callers pass the resolution in.
    pub fn required_output_value(&self) -> Value {
        let mut required = Value::zero();
        for output in &self.outputs {
            required = Value::add(&required, &output.value);
        }
        // Burned (negative) mint quantities must be covered from inputs;
        // minted (positive) quantities contribute supply, not demand.
        for (policy, names) in self.mint.sorted_policies() {
            for (name, qty) in names {
                if qty < 0 {
                    let current = required.quantity_of(policy, name);
                    required.set_quantity(*policy, name.clone(), current - qty);
                }
            }
        }
        required
    }
}

/// Everything needed to witness a transaction: scripts, datums, redeemers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WitnessSet {
    pub native_scripts: Vec<NativeScript>,
    pub plutus_v1_scripts: Vec<Buffer>,
    pub plutus_v2_scripts: Vec<Buffer>,
    pub plutus_v3_scripts: Vec<Buffer>,
    pub plutus_data: Vec<PlutusData>,
    pub redeemers: Vec<Redeemer>,
    /// Already-serialized vkey witnesses, signed after balancing; out of
    /// this crate's scope to construct (Ed25519 signing lives with the
    /// caller), but carried through so size accounting over a witnessed
    /// transaction is accurate.
    pub vkey_witnesses: Vec<Buffer>,
}

impl WitnessSet {
    fn encode(&self, writer: &mut CborWriter) {
        let mut n = 0;
        if !self.vkey_witnesses.is_empty() {
            n += 1;
        }
        if !self.native_scripts.is_empty() {
            n += 1;
        }
        if !self.plutus_v1_scripts.is_empty() {
            n += 1;
        }
        if !self.plutus_data.is_empty() {
            n += 1;
        }
        if !self.redeemers.is_empty() {
            n += 1;
        }
        if !self.plutus_v2_scripts.is_empty() {
            n += 1;
        }
        if !self.plutus_v3_scripts.is_empty() {
            n += 1;
        }

        writer.write_start_map(n).expect("definite map");
        if !self.vkey_witnesses.is_empty() {
            writer.write_uint(0);
            writer.write_start_array(self.vkey_witnesses.len() as i64).expect("definite array");
            for w in &self.vkey_witnesses {
                writer.write_encoded(w.as_slice());
            }
            writer.write_end_array().expect("definite array");
        }
        if !self.native_scripts.is_empty() {
            writer.write_uint(1);
            writer.write_start_array(self.native_scripts.len() as i64).expect("definite array");
            for s in &self.native_scripts {
                s.encode(writer);
            }
            writer.write_end_array().expect("definite array");
        }
        if !self.plutus_v1_scripts.is_empty() {
            writer.write_uint(3);
            writer.write_start_array(self.plutus_v1_scripts.len() as i64).expect("definite array");
            for s in &self.plutus_v1_scripts {
                writer.write_bytestring(s.as_slice());
            }
            writer.write_end_array().expect("definite array");
        }
        if !self.plutus_data.is_empty() {
            writer.write_uint(4);
            writer.write_start_array(-1).expect("indefinite array");
            for d in &self.plutus_data {
                d.encode(writer);
            }
            writer.write_end_array().expect("indefinite array");
        }
        if !self.redeemers.is_empty() {
            writer.write_uint(5);
            writer.write_start_array(self.redeemers.len() as i64).expect("definite array");
            for r in &self.redeemers {
                r.encode(writer);
            }
            writer.write_end_array().expect("definite array");
        }
        if !self.plutus_v2_scripts.is_empty() {
            writer.write_uint(6);
            writer.write_start_array(self.plutus_v2_scripts.len() as i64).expect("definite array");
            for s in &self.plutus_v2_scripts {
                writer.write_bytestring(s.as_slice());
            }
            writer.write_end_array().expect("definite array");
        }
        if !self.plutus_v3_scripts.is_empty() {
            writer.write_uint(7);
            writer.write_start_array(self.plutus_v3_scripts.len() as i64).expect("definite array");
            for s in &self.plutus_v3_scripts {
                writer.write_bytestring(s.as_slice());
            }
            writer.write_end_array().expect("definite array");
        }
        writer.write_end_map().expect("definite map");
    }

    pub fn decode(reader: &mut CborReader) -> Result<Self> {
        let pairs = reader.read_start_map()?;
        let mut set = WitnessSet::default();
        let count = if pairs >= 0 { pairs as u64 } else { u64::MAX };
        let mut i = 0;
        loop {
            if pairs >= 0 {
                if i >= count {
                    break;
                }
            } else if reader.peek_state()? == CborState::EndMap {
                break;
            }
            let key = reader.read_uint()?;
            match key {
                0 => set.vkey_witnesses = decode_array(reader, |r| r.read_encoded_value())?,
                1 => set.native_scripts = decode_array(reader, NativeScript::decode)?,
                3 => set.plutus_v1_scripts = decode_array(reader, |r| r.read_bytestring())?,
                4 => {
                    set.plutus_data = decode_array(reader, PlutusData::decode)?;
                }
                5 => set.redeemers = decode_array(reader, Redeemer::decode)?,
                6 => set.plutus_v2_scripts = decode_array(reader, |r| r.read_bytestring())?,
                7 => set.plutus_v3_scripts = decode_array(reader, |r| r.read_bytestring())?,
                _other => {
                    return Err(TxForgeError::InvalidCborMapKey {
                        context: "unknown witness set map key",
                    })
                }
            }
            i += 1;
        }
        reader.read_end_map()?;
        Ok(set)
    }

    pub fn to_cbor(&self) -> Buffer {
        let mut w = CborWriter::new();
        self.encode(&mut w);
        w.into_buffer()
    }

    pub fn has_scripts(&self) -> bool {
        !self.native_scripts.is_empty()
            || !self.plutus_v1_scripts.is_empty()
            || !self.plutus_v2_scripts.is_empty()
            || !self.plutus_v3_scripts.is_empty()
    }
}

/// Auxiliary transaction metadata (spec §6): tag 259 map keyed
/// `0=metadata, 1=native scripts, 2=PlutusV1, 3=V2, 4=V3`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuxiliaryData {
    /// Already-encoded transaction-metadatum-label map; metadatum schemas
    /// are out of this crate's scope (spec §1).
    pub metadata: Option<Buffer>,
    pub native_scripts: Vec<NativeScript>,
    pub plutus_v1_scripts: Vec<Buffer>,
    pub plutus_v2_scripts: Vec<Buffer>,
    pub plutus_v3_scripts: Vec<Buffer>,
}

impl AuxiliaryData {
    fn is_empty(&self) -> bool {
        self.metadata.is_none()
            && self.native_scripts.is_empty()
            && self.plutus_v1_scripts.is_empty()
            && self.plutus_v2_scripts.is_empty()
            && self.plutus_v3_scripts.is_empty()
    }

    fn encode(&self, writer: &mut CborWriter) {
        writer.write_tag(259);
        let mut n = 0;
        if self.metadata.is_some() {
            n += 1;
        }
        if !self.native_scripts.is_empty() {
            n += 1;
        }
        if !self.plutus_v1_scripts.is_empty() {
            n += 1;
        }
        if !self.plutus_v2_scripts.is_empty() {
            n += 1;
        }
        if !self.plutus_v3_scripts.is_empty() {
            n += 1;
        }
        writer.write_start_map(n).expect("definite map");
        if let Some(meta) = &self.metadata {
            writer.write_uint(0);
            writer.write_encoded(meta.as_slice());
        }
        if !self.native_scripts.is_empty() {
            writer.write_uint(1);
            writer.write_start_array(self.native_scripts.len() as i64).expect("definite array");
            for s in &self.native_scripts {
                s.encode(writer);
            }
            writer.write_end_array().expect("definite array");
        }
        for (key, scripts) in [
            (2u64, &self.plutus_v1_scripts),
            (3, &self.plutus_v2_scripts),
            (4, &self.plutus_v3_scripts),
        ] {
            if !scripts.is_empty() {
                writer.write_uint(key);
                writer.write_start_array(scripts.len() as i64).expect("definite array");
                for s in scripts {
                    writer.write_bytestring(s.as_slice());
                }
                writer.write_end_array().expect("definite array");
            }
        }
        writer.write_end_map().expect("definite map");
    }

    fn decode(reader: &mut CborReader) -> Result<Self> {
        let tag = reader.read_tag()?;
        if tag != 259 {
            return Err(TxForgeError::Decoding("expected tag 259 auxiliary data".into()));
        }
        let pairs = reader.read_start_map()?;
        let mut data = AuxiliaryData::default();
        let count = if pairs >= 0 { pairs as u64 } else { u64::MAX };
        let mut i = 0;
        loop {
            if pairs >= 0 {
                if i >= count {
                    break;
                }
            } else if reader.peek_state()? == CborState::EndMap {
                break;
            }
            let key = reader.read_uint()?;
            match key {
                0 => data.metadata = Some(reader.read_encoded_value()?),
                1 => data.native_scripts = decode_array(reader, NativeScript::decode)?,
                2 => data.plutus_v1_scripts = decode_array(reader, |r| r.read_bytestring())?,
                3 => data.plutus_v2_scripts = decode_array(reader, |r| r.read_bytestring())?,
                4 => data.plutus_v3_scripts = decode_array(reader, |r| r.read_bytestring())?,
                _other => {
                    return Err(TxForgeError::InvalidCborMapKey {
                        context: "unknown auxiliary data map key",
                    })
                }
            }
            i += 1;
        }
        reader.read_end_map()?;
        Ok(data)
    }
}

/// A full transaction: body, witness set, validity flag, optional
/// auxiliary data (spec §3).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    pub body: TransactionBody,
    pub witness_set: WitnessSet,
    pub is_valid: bool,
    pub auxiliary_data: Option<AuxiliaryData>,
}

impl Transaction {
    pub fn new(body: TransactionBody) -> Self {
        Self {
            body,
            witness_set: WitnessSet::default(),
            is_valid: true,
            auxiliary_data: None,
        }
    }

    pub fn encode(&self, writer: &mut CborWriter) {
        writer.write_start_array(4).expect("fixed array");
        self.body.encode(writer);
        self.witness_set.encode(writer);
        writer.write_bool(self.is_valid);
        match &self.auxiliary_data {
            Some(aux) if !aux.is_empty() => aux.encode(writer),
            _ => writer.write_null(),
        }
        writer.write_end_array().expect("fixed array");
    }

    pub fn decode(reader: &mut CborReader) -> Result<Self> {
        reader.read_start_array()?;
        let body = TransactionBody::decode(reader)?;
        let witness_set = WitnessSet::decode(reader)?;
        let is_valid = reader.read_bool()?;
        let auxiliary_data = match reader.peek_state()? {
            CborState::Null => {
                reader.read_null()?;
                None
            }
            _ => Some(AuxiliaryData::decode(reader)?),
        };
        reader.read_end_array()?;
        Ok(Transaction {
            body,
            witness_set,
            is_valid,
            auxiliary_data,
        })
    }

    pub fn to_cbor(&self) -> Buffer {
        let mut w = CborWriter::new();
        self.encode(&mut w);
        w.into_buffer()
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        let mut r = CborReader::new(bytes);
        Self::decode(&mut r)
    }

    /// Byte length of the canonical re-encoding — used by the fee
    /// calculator (spec §4.K); recomputed fresh each call since the
    /// balancer mutates the body between iterations.
    pub fn serialized_size(&self) -> usize {
        self.to_cbor().len()
    }

    pub fn has_scripts(&self) -> bool {
        self.witness_set.has_scripts()
    }
}

/// An unspent transaction output: the input pointer plus its resolved
/// output (spec §3, GLOSSARY).
#[derive(Debug, Clone, PartialEq)]
pub struct Utxo {
    pub input: TransactionInput,
    pub output: TransactionOutput,
}

impl Utxo {
    pub fn new(input: TransactionInput, output: TransactionOutput) -> Self {
        Self { input, output }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Credential, NETWORK_MAINNET};

    fn addr() -> Address {
        Address::Enterprise {
            network: NETWORK_MAINNET,
            payment: Credential::Key(Hash::new([9u8; 28])),
        }
    }

    #[test]
    fn transaction_input_round_trips() {
        let input = TransactionInput::new(TxHash::new([1u8; 32]), 3);
        let mut w = CborWriter::new();
        input.encode(&mut w);
        let buf = w.into_buffer();
        let mut r = CborReader::new(buf.as_slice());
        let decoded = TransactionInput::decode(&mut r).unwrap();
        assert_eq!(input, decoded);
    }

    #[test]
    fn output_with_coin_only_round_trips() {
        let output = TransactionOutput::new(addr(), Value::from_coin(5_000_000));
        let cbor = output.to_cbor();
        let mut r = CborReader::new(cbor.as_slice());
        let decoded = TransactionOutput::decode(&mut r).unwrap();
        assert_eq!(output, decoded);
    }

    #[test]
    fn output_with_multiasset_round_trips() {
        let mut value = Value::from_coin(2_000_000);
        value.set_quantity(PolicyId::new([5u8; 28]), Buffer::from(b"TOKEN".as_slice()), 10);
        let output = TransactionOutput::new(addr(), value);
        let cbor = output.to_cbor();
        let mut r = CborReader::new(cbor.as_slice());
        let decoded = TransactionOutput::decode(&mut r).unwrap();
        assert_eq!(output, decoded);
    }

    #[test]
    fn output_with_inline_datum_round_trips() {
        let output = TransactionOutput::new(addr(), Value::from_coin(2_000_000))
            .with_datum(Datum::Inline(PlutusData::integer(42)));
        let cbor = output.to_cbor();
        let mut r = CborReader::new(cbor.as_slice());
        let decoded = TransactionOutput::decode(&mut r).unwrap();
        assert_eq!(output, decoded);
    }

    #[test]
    fn transaction_size_grows_with_outputs() {
        let mut body = TransactionBody {
            inputs: vec![TransactionInput::new(TxHash::new([2u8; 32]), 0)],
            ..Default::default()
        };
        body.outputs.push(TransactionOutput::new(addr(), Value::from_coin(1_000_000)));
        let small = Transaction::new(body.clone()).serialized_size();
        body.outputs.push(TransactionOutput::new(addr(), Value::from_coin(2_000_000)));
        let large = Transaction::new(body).serialized_size();
        assert!(large > small);
    }

    #[test]
    fn transaction_round_trips_through_cbor() {
        let mut body = TransactionBody {
            inputs: vec![TransactionInput::new(TxHash::new([3u8; 32]), 0)],
            outputs: vec![TransactionOutput::new(addr(), Value::from_coin(4_000_000))],
            fee: 180_000,
            ttl: Some(1_000_000),
            ..Default::default()
        };
        body.required_signers.push(KeyHash::new([5u8; 28]));
        body.mint.set_quantity(PolicyId::new([6u8; 28]), Buffer::from(b"COIN".as_slice()), 3);

        let mut tx = Transaction::new(body);
        tx.witness_set
            .native_scripts
            .push(NativeScript::Sig(Hash::new([7u8; 28])));
        tx.witness_set.redeemers.push(Redeemer {
            tag: RedeemerTag::Spend,
            index: 0,
            data: PlutusData::integer(1),
            ex_units: ExUnits { mem: 1_000, steps: 2_000 },
        });

        let cbor = tx.to_cbor();
        let decoded = Transaction::from_cbor(cbor.as_slice()).unwrap();
        assert_eq!(tx, decoded);
    }

    #[test]
    fn required_output_value_covers_burned_mint() {
        let mut body = TransactionBody::default();
        body.outputs.push(TransactionOutput::new(addr(), Value::from_coin(1_000_000)));
        body.mint.set_quantity(PolicyId::new([1u8; 28]), Buffer::from(b"X".as_slice()), -5);
        let required = body.required_output_value();
        assert_eq!(required.quantity_of(&PolicyId::new([1u8; 28]), &Buffer::from(b"X".as_slice())), 5);
    }
}
