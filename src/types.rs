//! Shared value types
//!
//! Plain data carried between modules: transactions, blocks, the UTXO
//! view used by transaction validation, and the script execution context
//! (`OpData`). Kept free of behavior beyond small constructors — the
//! Orange Paper math lives in `transaction.rs`, `block.rs`, and `script/`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Raw byte string: a stack item, a script, a serialized field.
pub type ByteString = Vec<u8>;

/// 32-byte double-SHA256 digest (block hash, txid, wtxid, merkle node).
pub type Hash = [u8; 32];

/// Unsigned height/count/amount-like quantity.
pub type Natural = u64;

/// Signed amount (satoshis), matches `TransactionOutput::value`.
pub type Integer = i64;

/// Outcome of a structural or consensus check that isn't itself an error
/// (the check ran fine; the *subject* may still be invalid).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationResult {
    Valid,
    Invalid(String),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }
}

/// Reference to a previous transaction output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct OutPoint {
    pub hash: Hash,
    pub index: u32,
}

impl OutPoint {
    /// The null outpoint used by coinbase inputs.
    pub const COINBASE: OutPoint = OutPoint { hash: [0u8; 32], index: 0xffff_ffff };
}

/// One spend of a previous output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct TransactionInput {
    pub prevout: OutPoint,
    pub script_sig: ByteString,
    pub sequence: u32,
}

/// One newly created output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct TransactionOutput {
    pub value: Integer,
    pub script_pubkey: ByteString,
}

/// Per-input witness stack (empty for a non-segwit input).
pub type Witness = Vec<ByteString>;

/// A Bitcoin transaction.
///
/// `witnesses`, when present, has exactly one entry per input (an empty
/// `Vec<ByteString>` for inputs that carry no witness data) and is only
/// serialized when the marker/flag (`0x00 0x01`) is emitted — see
/// `serialization::transaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub lock_time: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witnesses: Option<Vec<Witness>>,
}

impl Transaction {
    /// Whether this transaction carries segwit witness data.
    pub fn has_witness(&self) -> bool {
        self.witnesses.as_ref().is_some_and(|w| w.iter().any(|wit| !wit.is_empty()))
    }

    /// Witness stack for a given input, if any.
    pub fn witness_for(&self, input_index: usize) -> Option<&Witness> {
        self.witnesses.as_ref().and_then(|w| w.get(input_index))
    }
}

/// A confirmed, spendable transaction output as tracked by the UTXO set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct UTXO {
    pub value: Integer,
    pub script_pubkey: ByteString,
    pub height: Natural,
}

/// In-memory UTXO view consulted by `check_tx_inputs`.
///
/// A thin `HashMap` wrapper rather than a bare type alias so call sites
/// read as domain vocabulary (`UtxoSet::new()`, `.insert(outpoint, utxo)`)
/// the way the teacher's transaction tests already call it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct UtxoSet(HashMap<OutPoint, UTXO>);

impl UtxoSet {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&UTXO> {
        self.0.get(outpoint)
    }

    pub fn insert(&mut self, outpoint: OutPoint, utxo: UTXO) -> Option<UTXO> {
        self.0.insert(outpoint, utxo)
    }

    pub fn remove(&mut self, outpoint: &OutPoint) -> Option<UTXO> {
        self.0.remove(outpoint)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// 80-byte fixed block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block_hash: Hash,
    pub merkle_root: Hash,
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
}

/// A full block: header plus its transaction list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

/// Script evaluation flags (spec §3 OpData invariants: "applicable
/// flags"). Each BIP gate is independent so callers can derive the
/// correct set for a given height from `consensus_params`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScriptFlags {
    /// BIP16: P2SH redemption.
    pub p2sh: bool,
    /// BIP66: strict DER signature encoding.
    pub strict_der: bool,
    /// BIP65: OP_CHECKLOCKTIMEVERIFY.
    pub checklocktimeverify: bool,
    /// BIP112: OP_CHECKSEQUENCEVERIFY.
    pub checksequenceverify: bool,
    /// BIP141: segwit.
    pub segwit: bool,
    /// BIP143: segwit signature hashing.
    pub bip143: bool,
    /// BIP341/342: Taproot.
    pub taproot: bool,
    /// Require minimal (shortest) push encodings and minimal ScriptNums.
    pub minimal_data: bool,
    /// Require the final stack to contain exactly one item (P2SH/segwit).
    pub clean_stack: bool,
    /// Treat NOP1/NOP4..NOP10 as a script failure (discouraged upgradable
    /// NOPs not yet assigned meaning).
    pub discourage_upgradable_nops: bool,
}

impl ScriptFlags {
    /// All gates off: legacy pre-BIP16 behavior.
    pub fn none() -> Self {
        Self::default()
    }

    /// Every gate on — used by tests that want the strictest ruleset.
    pub fn all() -> Self {
        Self {
            p2sh: true,
            strict_der: true,
            checklocktimeverify: true,
            checksequenceverify: true,
            segwit: true,
            bip143: true,
            taproot: true,
            minimal_data: true,
            clean_stack: true,
            discourage_upgradable_nops: true,
        }
    }
}
