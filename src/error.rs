//! Closed error taxonomy for the whole crate.
//!
//! Every public operation returns `Result<T, TxForgeError>`. There is no
//! per-object "last error" slot anywhere in this crate: a failure carries
//! whatever contextual message it needs directly on the variant.

use thiserror::Error;

/// The closed set of failure kinds this crate can produce.
#[derive(Error, Debug)]
pub enum TxForgeError {
    // --- Input ---
    #[error("argument was null: {0}")]
    PointerIsNull(&'static str),
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("out of bounds memory read at offset {offset} (len {len})")]
    OutOfBoundsMemoryRead { offset: usize, len: usize },
    #[error("out of bounds memory write at offset {offset} (len {len})")]
    OutOfBoundsMemoryWrite { offset: usize, len: usize },

    // --- Resource ---
    #[error("memory allocation failed")]
    MemoryAllocationFailed,
    #[error("insufficient buffer size: needed {needed}, had {had}")]
    InsufficientBufferSize { needed: usize, had: usize },

    // --- Codec ---
    #[error("encoding error: {0}")]
    Encoding(String),
    #[error("decoding error: {0}")]
    Decoding(String),
    #[error("invalid json: {0}")]
    InvalidJson(String),
    #[error("unexpected cbor type: expected {expected}, found {found}")]
    UnexpectedCborType { expected: &'static str, found: String },
    #[error("invalid cbor value: {0}")]
    InvalidCborValue(String),
    #[error("invalid cbor array size: expected {expected}, found {found}")]
    InvalidCborArraySize { expected: i64, found: i64 },
    #[error("invalid cbor map size: expected {expected}, found {found}")]
    InvalidCborMapSize { expected: i64, found: i64 },
    #[error("duplicated cbor map key in `{context}`")]
    DuplicatedCborMapKey { context: &'static str },
    #[error("invalid cbor map key in `{context}`")]
    InvalidCborMapKey { context: &'static str },
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("invalid magic bytes")]
    InvalidMagic,
    #[error("invalid checksum")]
    InvalidChecksum,

    // --- Numeric ---
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("integer underflow")]
    IntegerUnderflow,
    #[error("conversion failed: {0}")]
    ConversionFailed(String),
    #[error("loss of precision converting {0}")]
    LossOfPrecision(String),

    // --- Domain ---
    #[error("invalid address type/format: {0}")]
    InvalidAddressFormat(String),
    #[error("invalid credential type")]
    InvalidCredentialType,
    #[error("invalid script language: {0}")]
    InvalidScriptLanguage(u8),
    #[error("invalid native script type: {0}")]
    InvalidNativeScriptType(u64),
    #[error("invalid plutus data conversion: {0}")]
    InvalidPlutusDataConversion(String),
    #[error("invalid datum type")]
    InvalidDatumType,
    #[error("invalid certificate type: {0}")]
    InvalidCertificateType(u64),
    #[error("invalid plutus cost model: {0}")]
    InvalidPlutusCostModel(String),
    #[error("invalid procedure/proposal type: {0}")]
    InvalidProcedureProposalType(u64),
    #[error("invalid metadatum conversion: {0}")]
    InvalidMetadatumConversion(String),
    #[error("metadatum text string too long: {len} bytes (max 64)")]
    InvalidMetadatumTextStringSize { len: usize },
    #[error("metadatum bounded bytes too long: {len} bytes (max 64)")]
    InvalidMetadatumBoundedBytesSize { len: usize },

    // --- Hash/key sizes ---
    #[error("invalid blake2b hash size: expected {expected}, found {found}")]
    InvalidBlake2bHashSize { expected: usize, found: usize },
    #[error("invalid ed25519 signature size: expected {expected}, found {found}")]
    InvalidEd25519SignatureSize { expected: usize, found: usize },
    #[error("invalid ed25519 public key size: expected {expected}, found {found}")]
    InvalidEd25519PublicKeySize { expected: usize, found: usize },
    #[error("invalid ed25519 private key size: expected {expected}, found {found}")]
    InvalidEd25519PrivateKeySize { expected: usize, found: usize },
    #[error("invalid bip32 public key size: expected {expected}, found {found}")]
    InvalidBip32PublicKeySize { expected: usize, found: usize },
    #[error("invalid bip32 private key size: expected {expected}, found {found}")]
    InvalidBip32PrivateKeySize { expected: usize, found: usize },
    #[error("invalid bip32 derivation index: {0}")]
    InvalidBip32DerivationIndex(u32),

    // --- Balancer ---
    #[error("balance insufficient: missing {shortfall} of asset {asset}")]
    BalanceInsufficient { asset: String, shortfall: i128 },
    #[error("utxo set not fragmented enough to cover asset {0}")]
    UtxoNotFragmentedEnough(String),
    #[error("utxo set fully depleted while selecting for asset {0}")]
    UtxoFullyDepleted(String),
    #[error("maximum input count exceeded: {max}")]
    MaximumInputCountExceeded { max: usize },
    #[error("script evaluation failure: {0}")]
    ScriptEvaluationFailure(String),

    // --- Control ---
    #[error("element not found: {0}")]
    ElementNotFound(String),
    #[error("duplicated key: {0}")]
    DuplicatedKey(String),
    #[error("illegal state: {0}")]
    IllegalState(String),
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("{0}")]
    Generic(String),

    #[error(transparent)]
    TryFromInt(#[from] std::num::TryFromIntError),
    #[error(transparent)]
    FromHex(#[from] hex::FromHexError),
}

pub type Result<T> = std::result::Result<T, TxForgeError>;
