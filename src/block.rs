//! Block-level consensus operations (C6/C7)
//!
//! `types::Block`/`types::BlockHeader` are plain data; this module adds
//! the consensus arithmetic over them: compact-bits target decoding,
//! the double-SHA256 block hash, and the transaction/witness Merkle
//! roots a header commits to.

use crate::serialization::block::serialize_block_header;
use crate::types::{Block, BlockHeader, Hash};
use sha2::{Digest, Sha256};

impl BlockHeader {
    /// Decode `bits` (compact representation, "nBits") into a 256-bit
    /// target per Orange Paper §4.5: the top byte is an exponent, the
    /// low 23 bits are a mantissa, and bit 0x00800000 is a sign bit that
    /// consensus treats as an automatic zero target (never satisfiable).
    pub fn target(&self) -> [u8; 32] {
        let exponent = self.bits >> 24;
        let mut mantissa = self.bits & 0x007f_ffff;
        if self.bits & 0x0080_0000 != 0 {
            // Negative target per the sign bit: consensus treats this as zero.
            mantissa = 0;
        }
        let mut target = [0u8; 32];
        if mantissa == 0 {
            return target;
        }
        if exponent <= 3 {
            // Mantissa shifted right by the byte count it's missing; the
            // result is a small integer living in the last 4 bytes.
            let value = mantissa >> (8 * (3 - exponent));
            target[28..32].copy_from_slice(&value.to_be_bytes());
        } else {
            // Mantissa shifted left: its 3 significant bytes land `shift`
            // bytes in from the right-hand edge of the 256-bit target.
            let shift = (exponent - 3) as usize;
            if shift < 30 {
                let mantissa_bytes = mantissa.to_be_bytes();
                let mantissa_bytes = &mantissa_bytes[1..]; // low 3 bytes
                let start = 32 - 3 - shift;
                target[start..start + 3].copy_from_slice(mantissa_bytes);
            }
            // shift >= 30 would need more than 32 bytes to hold the value;
            // consensus treats this as an unsatisfiable (saturated-zero) target.
        }
        target
    }

    /// Double-SHA256 of the 80-byte serialized header, byte-reversed per
    /// Bitcoin's little-endian display convention is NOT applied here —
    /// this returns the raw internal digest (`serialize_block_header`'s
    /// hash), matching how `prev_block_hash`/`merkle_root` are already
    /// stored in `types::BlockHeader`.
    pub fn block_hash(&self) -> Hash {
        double_sha256(&serialize_block_header(self))
    }
}

impl Block {
    /// Transaction Merkle root over `txid()` of each transaction.
    ///
    /// Preserves the historical duplicate-last-node-on-odd-width
    /// behavior (CVE-2012-2459): Bitcoin Core's original algorithm
    /// duplicates the final hash at each level with an odd count rather
    /// than dropping it, which made certain crafted blocks hash
    /// identically with and without a duplicated transaction. Consensus
    /// depends on this exact (not "fixed") behavior.
    pub fn merkle_root(&self) -> Hash {
        let leaves: Vec<Hash> = self.transactions.iter().map(|tx| tx.txid()).collect();
        merkle_root_of(leaves)
    }

    /// Witness Merkle root (BIP141). Identical algorithm to `merkle_root`
    /// except the coinbase's leaf is fixed to 32 zero bytes (a coinbase
    /// has no meaningful wtxid) and every other leaf is the transaction's
    /// real `wtxid()`.
    pub fn witness_merkle_root(&self) -> Hash {
        let leaves: Vec<Hash> = self
            .transactions
            .iter()
            .enumerate()
            .map(|(i, tx)| if i == 0 { [0u8; 32] } else { tx.wtxid() })
            .collect();
        merkle_root_of(leaves)
    }

    /// The witness commitment a segwit block's coinbase must carry:
    /// `dSHA256(witness_merkle_root || witness_reserved_value)`, where
    /// the reserved value is the single witness item of the coinbase
    /// input (all-zero if the coinbase carries none, per BIP141).
    pub fn witness_commitment(&self) -> Hash {
        let reserved = self
            .transactions
            .first()
            .and_then(|coinbase| coinbase.witness_for(0))
            .and_then(|w| w.first())
            .cloned()
            .unwrap_or_else(|| vec![0u8; 32]);
        let root = self.witness_merkle_root();
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&root);
        buf.extend_from_slice(&reserved);
        double_sha256(&buf)
    }
}

/// Bitcoin's Merkle tree: pairwise dSHA256, duplicating the last node at
/// any level with an odd number of nodes, until one hash remains.
/// A single-element list's root is just that one hash (no combination
/// step runs) and an empty list's root is all-zero.
fn merkle_root_of(mut level: Vec<Hash>) -> Hash {
    if level.is_empty() {
        return [0u8; 32];
    }
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            let last = *level.last().unwrap();
            level.push(last);
        }
        level = level
            .chunks_exact(2)
            .map(|pair| {
                let mut buf = Vec::with_capacity(64);
                buf.extend_from_slice(&pair[0]);
                buf.extend_from_slice(&pair[1]);
                double_sha256(&buf)
            })
            .collect();
    }
    level[0]
}

fn double_sha256(bytes: &[u8]) -> Hash {
    let first = Sha256::digest(bytes);
    let second = Sha256::digest(first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    out
}
