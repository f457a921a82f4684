//! Bedrock Consensus
//!
//! Bitcoin consensus-core primitives: the Script interpreter, the
//! CompactInt varint codec, the Block/BlockHeader model (Merkle and
//! witness-Merkle computation, compact-bits target decoding), and the
//! peer `NodeStatus` handshake/violation state machine.
//!
//! This crate implements consensus rules only — it does not persist a
//! chain, manage a wallet, search for proof-of-work, run a mempool, or
//! talk DNS. Those are external collaborators; see each module's doc
//! comment for the exact boundary.
//!
//! No elliptic-curve or hash primitive is implemented in-crate. They're
//! consumed through `secp256k1`, `sha2`, `ripemd`, `sha1`, and
//! `bitcoin_hashes`, pinned to exact versions in `Cargo.toml` because a
//! consensus-critical crate cannot tolerate a silent behavior change in
//! a transitive dependency.

pub mod block;
pub mod consensus_params;
pub mod constants;
pub mod error;
pub mod peer;
pub mod script;
pub mod serialization;
pub mod transaction;
pub mod transaction_hash;
pub mod types;

pub use error::{ConsensusError, Result};
pub use types::{
    Block, BlockHeader, ByteString, Hash, Integer, Natural, OutPoint, ScriptFlags, Transaction,
    TransactionInput, TransactionOutput, UtxoSet, ValidationResult, Witness, UTXO,
};
