//! `txforge`: build, serialize, and balance Cardano transactions.
//!
//! The transaction model (`transaction`) and codec (`cbor`) are
//! era-generic rather than pinned to a single Cardano hard fork; the
//! balancer (`balancer`) and coin selector (`coin_select`) work against
//! that model and a caller-supplied [`provider::Provider`] rather than any
//! particular node RPC.

pub mod address;
pub mod balancer;
pub mod bigint;
pub mod buffer;
pub mod cbor;
pub mod coin_select;
pub mod error;
pub mod fee;
pub mod hash;
pub mod plutus_data;
pub mod provider;
pub mod script;
pub mod transaction;
pub mod value;

pub use address::Address;
pub use balancer::{add_collateral, balance_transaction};
pub use coin_select::select_largest_first;
pub use error::{Result, TxForgeError};
pub use fee::{calculate_fee, min_utxo_value};
pub use provider::Provider;
pub use transaction::{
    ProtocolParams, Transaction, TransactionBody, TransactionInput, TransactionOutput, Utxo,
};
pub use value::Value;
