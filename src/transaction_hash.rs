//! Transaction hash calculation for signature verification
//!
//! Implements Bitcoin's transaction sighash algorithm for ECDSA signature
//! verification: the legacy (pre-segwit) preimage here, and the BIP143
//! witness-aware preimage in `calculate_transaction_sighash_v1`.

use crate::error::Result;
use crate::serialization::varint::encode_varint;
use crate::types::*;
use sha2::{Digest, Sha256};

/// Base SIGHASH component, independent of the ANYONECANPAY bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SighashBase {
    All,
    None,
    Single,
}

/// SIGHASH type for transaction signature verification: a base mode plus
/// the independent ANYONECANPAY bit, matching the on-wire byte's actual
/// structure (bit 0x80 combines with any of the three base values).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SighashType {
    pub base: SighashBase,
    pub anyone_can_pay: bool,
}

impl SighashType {
    pub const ALL: SighashType = SighashType { base: SighashBase::All, anyone_can_pay: false };
    pub const NONE: SighashType = SighashType { base: SighashBase::None, anyone_can_pay: false };
    pub const SINGLE: SighashType = SighashType { base: SighashBase::Single, anyone_can_pay: false };

    /// Parse sighash type from its on-wire byte (the last byte of a
    /// DER-encoded script signature).
    pub fn from_byte(byte: u8) -> Result<Self> {
        let anyone_can_pay = byte & 0x80 != 0;
        let base = match byte & 0x1f {
            0x01 => SighashBase::All,
            0x02 => SighashBase::None,
            0x03 => SighashBase::Single,
            _ => return Err(crate::error::ConsensusError::InvalidSighashType(byte)),
        };
        Ok(SighashType { base, anyone_can_pay })
    }

    pub fn to_byte(self) -> u8 {
        let base = match self.base {
            SighashBase::All => 0x01,
            SighashBase::None => 0x02,
            SighashBase::Single => 0x03,
        };
        if self.anyone_can_pay {
            base | 0x80
        } else {
            base
        }
    }
}

/// Calculate the legacy (pre-BIP143) transaction sighash for signature
/// verification.
///
/// # Arguments
/// * `tx` - The transaction being signed
/// * `input_index` - Index of the input being signed
/// * `prevouts` - Previous transaction outputs (for input validation)
/// * `sighash_type` - Type of sighash to calculate
///
/// # Returns
/// 32-byte hash to be signed with ECDSA
pub fn calculate_transaction_sighash(
    tx: &Transaction,
    input_index: usize,
    prevouts: &[TransactionOutput],
    sighash_type: SighashType,
) -> Result<Hash> {
    if input_index >= tx.inputs.len() {
        return Err(crate::error::ConsensusError::InvalidInputIndex(input_index));
    }

    if prevouts.len() != tx.inputs.len() {
        return Err(crate::error::ConsensusError::InvalidPrevoutsCount(prevouts.len(), tx.inputs.len()));
    }

    let mut preimage = Vec::new();

    // 1. Transaction version (4 bytes, little endian)
    preimage.extend_from_slice(&tx.version.to_le_bytes());

    // 2. Inputs: ANYONECANPAY signs only this input, otherwise all of them
    //    (with non-signed inputs' scriptSig blanked and sequence zeroed
    //    for anything but SIGHASH_ALL).
    if sighash_type.anyone_can_pay {
        preimage.extend_from_slice(&encode_varint(1));
        let input = &tx.inputs[input_index];
        preimage.extend_from_slice(&input.prevout.hash);
        preimage.extend_from_slice(&input.prevout.index.to_le_bytes());
        preimage.extend_from_slice(&encode_varint(input.script_sig.len() as u64));
        preimage.extend_from_slice(&input.script_sig);
        preimage.extend_from_slice(&input.sequence.to_le_bytes());
    } else {
        preimage.extend_from_slice(&encode_varint(tx.inputs.len() as u64));
        for (i, input) in tx.inputs.iter().enumerate() {
            preimage.extend_from_slice(&input.prevout.hash);
            preimage.extend_from_slice(&input.prevout.index.to_le_bytes());
            if i == input_index {
                preimage.extend_from_slice(&encode_varint(input.script_sig.len() as u64));
                preimage.extend_from_slice(&input.script_sig);
            } else {
                preimage.extend_from_slice(&encode_varint(0));
            }
            let sequence = if i != input_index && !matches!(sighash_type.base, SighashBase::All) { 0 } else { input.sequence };
            preimage.extend_from_slice(&sequence.to_le_bytes());
        }
    }

    // 3. Outputs
    match sighash_type.base {
        SighashBase::All => {
            preimage.extend_from_slice(&encode_varint(tx.outputs.len() as u64));
            for output in &tx.outputs {
                preimage.extend_from_slice(&output.value.to_le_bytes());
                preimage.extend_from_slice(&encode_varint(output.script_pubkey.len() as u64));
                preimage.extend_from_slice(&output.script_pubkey);
            }
        }
        SighashBase::None => {
            preimage.extend_from_slice(&encode_varint(0));
        }
        SighashBase::Single => {
            if input_index >= tx.outputs.len() {
                // BIP: signing SIGHASH_SINGLE with no matching output is
                // the well-known "return all-one-hash" degenerate case.
                return Ok([
                    1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
                ]);
            }
            preimage.extend_from_slice(&encode_varint(input_index as u64 + 1));
            for output in &tx.outputs[..=input_index] {
                preimage.extend_from_slice(&output.value.to_le_bytes());
                preimage.extend_from_slice(&encode_varint(output.script_pubkey.len() as u64));
                preimage.extend_from_slice(&output.script_pubkey);
            }
        }
    }

    preimage.extend_from_slice(&tx.lock_time.to_le_bytes());
    preimage.extend_from_slice(&(sighash_type.to_byte() as u32).to_le_bytes());

    Ok(double_sha256(&preimage))
}

/// BIP143 (segwit v0) sighash: commits to the prevout value and script
/// being spent, and hashes the full prevout/sequence/output sets once via
/// `hash_prevouts`/`hash_sequence`/`hash_outputs` rather than per input.
///
/// `script_code` is the script actually executed (the redeem script for
/// P2WSH, or `OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG` for
/// P2WPKH) — callers construct it, this function only consumes it.
pub fn calculate_transaction_sighash_v1(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    prevout_value: i64,
    sighash_type: SighashType,
) -> Result<Hash> {
    if input_index >= tx.inputs.len() {
        return Err(crate::error::ConsensusError::InvalidInputIndex(input_index));
    }

    let mut preimage = Vec::new();
    preimage.extend_from_slice(&tx.version.to_le_bytes());

    preimage.extend_from_slice(&hash_prevouts(tx, sighash_type));
    preimage.extend_from_slice(&hash_sequence(tx, sighash_type));

    let input = &tx.inputs[input_index];
    preimage.extend_from_slice(&input.prevout.hash);
    preimage.extend_from_slice(&input.prevout.index.to_le_bytes());
    preimage.extend_from_slice(&encode_varint(script_code.len() as u64));
    preimage.extend_from_slice(script_code);
    preimage.extend_from_slice(&prevout_value.to_le_bytes());
    preimage.extend_from_slice(&input.sequence.to_le_bytes());

    preimage.extend_from_slice(&hash_outputs(tx, input_index, sighash_type));

    preimage.extend_from_slice(&tx.lock_time.to_le_bytes());
    preimage.extend_from_slice(&(sighash_type.to_byte() as u32).to_le_bytes());

    Ok(double_sha256(&preimage))
}

fn hash_prevouts(tx: &Transaction, sighash_type: SighashType) -> Hash {
    if sighash_type.anyone_can_pay {
        return [0u8; 32];
    }
    let mut buf = Vec::new();
    for input in &tx.inputs {
        buf.extend_from_slice(&input.prevout.hash);
        buf.extend_from_slice(&input.prevout.index.to_le_bytes());
    }
    double_sha256(&buf)
}

fn hash_sequence(tx: &Transaction, sighash_type: SighashType) -> Hash {
    if sighash_type.anyone_can_pay || !matches!(sighash_type.base, SighashBase::All) {
        return [0u8; 32];
    }
    let mut buf = Vec::new();
    for input in &tx.inputs {
        buf.extend_from_slice(&input.sequence.to_le_bytes());
    }
    double_sha256(&buf)
}

fn hash_outputs(tx: &Transaction, input_index: usize, sighash_type: SighashType) -> Hash {
    match sighash_type.base {
        SighashBase::All => {
            let mut buf = Vec::new();
            for output in &tx.outputs {
                buf.extend_from_slice(&output.value.to_le_bytes());
                buf.extend_from_slice(&encode_varint(output.script_pubkey.len() as u64));
                buf.extend_from_slice(&output.script_pubkey);
            }
            double_sha256(&buf)
        }
        SighashBase::Single if input_index < tx.outputs.len() => {
            let output = &tx.outputs[input_index];
            let mut buf = Vec::new();
            buf.extend_from_slice(&output.value.to_le_bytes());
            buf.extend_from_slice(&encode_varint(output.script_pubkey.len() as u64));
            buf.extend_from_slice(&output.script_pubkey);
            double_sha256(&buf)
        }
        _ => [0u8; 32],
    }
}

fn double_sha256(bytes: &[u8]) -> Hash {
    let first = Sha256::digest(bytes);
    let second = Sha256::digest(first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sighash_type_parsing() {
        assert_eq!(SighashType::from_byte(0x01).unwrap(), SighashType::ALL);
        assert_eq!(SighashType::from_byte(0x02).unwrap(), SighashType::NONE);
        assert_eq!(SighashType::from_byte(0x03).unwrap(), SighashType::SINGLE);
        assert!(SighashType::from_byte(0x00).is_err());
    }

    #[test]
    fn anyone_can_pay_bit_round_trips_with_each_base() {
        for (byte, base) in [(0x81, SighashBase::All), (0x82, SighashBase::None), (0x83, SighashBase::Single)] {
            let parsed = SighashType::from_byte(byte).unwrap();
            assert_eq!(parsed.base, base);
            assert!(parsed.anyone_can_pay);
            assert_eq!(parsed.to_byte(), byte);
        }
    }

    fn sample_tx() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TransactionInput {
                prevout: OutPoint { hash: [1u8; 32], index: 0 },
                script_sig: vec![0x51],
                sequence: 0xffffffff,
            }],
            outputs: vec![TransactionOutput {
                value: 5000000000,
                script_pubkey: vec![
                    0x76, 0xa9, 0x14, 0x89, 0xab, 0xcd, 0xef, 0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0, 0x12, 0x34, 0x56, 0x78, 0x9a, 0x88, 0xac,
                ],
            }],
            lock_time: 0,
            witnesses: None,
        }
    }

    #[test]
    fn test_sighash_calculation() {
        let tx = sample_tx();
        let prevouts = vec![TransactionOutput {
            value: 10000000000,
            script_pubkey: vec![
                0x76, 0xa9, 0x14, 0x89, 0xab, 0xcd, 0xef, 0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0, 0x12, 0x34, 0x56, 0x78, 0x9a, 0x88, 0xac,
            ],
        }];

        let sighash = calculate_transaction_sighash(&tx, 0, &prevouts, SighashType::ALL).unwrap();
        assert_eq!(sighash.len(), 32);

        let sighash_none = calculate_transaction_sighash(&tx, 0, &prevouts, SighashType::NONE).unwrap();
        assert_ne!(sighash, sighash_none);

        let sighash_single = calculate_transaction_sighash(&tx, 0, &prevouts, SighashType::SINGLE).unwrap();
        assert_ne!(sighash, sighash_single);
    }

    #[test]
    fn test_sighash_invalid_input_index() {
        let tx = Transaction { version: 1, inputs: vec![], outputs: vec![], lock_time: 0, witnesses: None };

        let result = calculate_transaction_sighash(&tx, 0, &[], SighashType::ALL);
        assert!(result.is_err());
    }

    #[test]
    fn anyone_can_pay_changes_the_hash() {
        let tx = sample_tx();
        let prevouts = vec![TransactionOutput { value: 10000000000, script_pubkey: vec![] }];

        let all = calculate_transaction_sighash(&tx, 0, &prevouts, SighashType::ALL).unwrap();
        let all_acp = calculate_transaction_sighash(&tx, 0, &prevouts, SighashType { base: SighashBase::All, anyone_can_pay: true }).unwrap();
        assert_ne!(all, all_acp);
    }

    #[test]
    fn bip143_sighash_is_deterministic_and_differs_from_legacy() {
        let tx = sample_tx();
        let script_code = vec![0x76, 0xa9, 0x14, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x88, 0xac];

        let v1 = calculate_transaction_sighash_v1(&tx, 0, &script_code, 10000000000, SighashType::ALL).unwrap();
        let v1_again = calculate_transaction_sighash_v1(&tx, 0, &script_code, 10000000000, SighashType::ALL).unwrap();
        assert_eq!(v1, v1_again);

        let legacy = calculate_transaction_sighash(&tx, 0, &[TransactionOutput { value: 10000000000, script_pubkey: script_code.clone() }], SighashType::ALL).unwrap();
        assert_ne!(v1, legacy);
    }

    #[test]
    fn bip143_single_with_no_matching_output_zeroes_hash_outputs() {
        let mut tx = sample_tx();
        tx.outputs.clear();
        let script_code = vec![0x51];
        let result = calculate_transaction_sighash_v1(&tx, 0, &script_code, 1000, SighashType::SINGLE).unwrap();
        assert_eq!(result.len(), 32);
    }
}
