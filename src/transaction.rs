//! Transaction validation functions from Orange Paper Section 5.1

use crate::constants::*;
use crate::error::Result;
use crate::serialization::transaction::serialize_transaction;
use crate::types::*;
use sha2::{Digest, Sha256};

/// CheckTransaction: 𝒯𝒳 → {valid, invalid}
///
/// A transaction tx = (v, ins, outs, lt) is valid if and only if:
/// 1. |ins| > 0 ∧ |outs| > 0
/// 2. ∀o ∈ outs: 0 ≤ o.value ≤ M_max
/// 3. |ins| ≤ M_max_inputs
/// 4. |outs| ≤ M_max_outputs
/// 5. |tx| ≤ M_max_tx_size
pub fn check_transaction(tx: &Transaction) -> Result<ValidationResult> {
    // 1. Check inputs and outputs are not empty
    if tx.inputs.is_empty() || tx.outputs.is_empty() {
        return Ok(ValidationResult::Invalid("Empty inputs or outputs".to_string()));
    }

    // 2. Check output values are valid
    for (i, output) in tx.outputs.iter().enumerate() {
        if output.value < 0 || output.value > MAX_MONEY {
            return Ok(ValidationResult::Invalid(format!("Invalid output value {} at index {}", output.value, i)));
        }
    }

    // 3. Check input count limit
    if tx.inputs.len() > MAX_INPUTS {
        return Ok(ValidationResult::Invalid(format!("Too many inputs: {}", tx.inputs.len())));
    }

    // 4. Check output count limit
    if tx.outputs.len() > MAX_OUTPUTS {
        return Ok(ValidationResult::Invalid(format!("Too many outputs: {}", tx.outputs.len())));
    }

    // 5. Check transaction size limit
    let tx_size = calculate_transaction_size(tx);
    if tx_size > MAX_TX_SIZE {
        return Ok(ValidationResult::Invalid(format!("Transaction too large: {} bytes", tx_size)));
    }

    Ok(ValidationResult::Valid)
}

/// CheckTxInputs: 𝒯𝒳 × 𝒰𝒮 × ℕ → {valid, invalid} × ℤ
///
/// For transaction tx with UTXO set us at height h:
/// 1. If tx is coinbase: return (valid, 0)
/// 2. Let total_in = Σᵢ us(i.prevout).value
/// 3. Let total_out = Σₒ o.value
/// 4. If total_in < total_out: return (invalid, 0)
/// 5. Return (valid, total_in - total_out)
pub fn check_tx_inputs(tx: &Transaction, utxo_set: &UtxoSet, _height: Natural) -> Result<(ValidationResult, Integer)> {
    // Check if this is a coinbase transaction
    if is_coinbase(tx) {
        return Ok((ValidationResult::Valid, 0));
    }

    let mut total_input_value = 0i64;

    for (i, input) in tx.inputs.iter().enumerate() {
        // Check if input exists in UTXO set
        if let Some(utxo) = utxo_set.get(&input.prevout) {
            total_input_value += utxo.value;
        } else {
            return Ok((ValidationResult::Invalid(format!("Input {} not found in UTXO set", i)), 0));
        }
    }

    let total_output_value: i64 = tx.outputs.iter().map(|o| o.value).sum();

    if total_input_value < total_output_value {
        return Ok((ValidationResult::Invalid("Insufficient input value".to_string()), 0));
    }

    let fee = total_input_value - total_output_value;
    Ok((ValidationResult::Valid, fee))
}

/// Check if transaction is coinbase
pub fn is_coinbase(tx: &Transaction) -> bool {
    tx.inputs.len() == 1 && tx.inputs[0].prevout.hash == [0u8; 32] && tx.inputs[0].prevout.index == 0xffffffff
}

/// Wire-accurate transaction size: the no-witness serialized length, the
/// same form `MAX_TX_SIZE` limits against.
pub fn calculate_transaction_size(tx: &Transaction) -> usize {
    serialize_transaction(tx, false).len()
}

impl Transaction {
    /// txid: double-SHA256 of the no-witness serialization. Identical
    /// for a segwit and legacy rendition of the same transaction.
    pub fn txid(&self) -> Hash {
        double_sha256(&serialize_transaction(self, false))
    }

    /// wtxid: double-SHA256 of the witness-inclusive serialization.
    /// Equal to `txid()` for a transaction with no witness data.
    pub fn wtxid(&self) -> Hash {
        double_sha256(&serialize_transaction(self, true))
    }
}

fn double_sha256(bytes: &[u8]) -> Hash {
    let first = Sha256::digest(bytes);
    let second = Sha256::digest(first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    out
}

// ============================================================================
// FORMAL VERIFICATION
// ============================================================================

/// Mathematical Specification for Transaction Validation:
/// ∀ tx ∈ 𝒯𝒳: CheckTransaction(tx) = valid ⟺
///   (|tx.inputs| > 0 ∧ |tx.outputs| > 0 ∧
///    ∀o ∈ tx.outputs: 0 ≤ o.value ≤ M_max ∧
///    |tx.inputs| ≤ M_max_inputs ∧ |tx.outputs| ≤ M_max_outputs ∧
///    |tx| ≤ M_max_tx_size)
///
/// Invariants:
/// - Valid transactions have non-empty inputs and outputs
/// - Output values are bounded [0, MAX_MONEY]
/// - Input/output counts respect limits
/// - Transaction size respects limits
/// - Coinbase transactions have special validation rules

#[cfg(kani)]
mod kani_proofs {
    use super::*;
    use kani::*;

    /// Kani proof: check_transaction validates structure correctly
    #[kani::proof]
    #[kani::unwind(10)]
    fn kani_check_transaction_structure() {
        let tx: Transaction = kani::any();

        // Bound for tractability
        kani::assume(tx.inputs.len() <= 10);
        kani::assume(tx.outputs.len() <= 10);

        let result = check_transaction(&tx).unwrap_or(ValidationResult::Invalid("Error".to_string()));

        // Structure invariants
        match result {
            ValidationResult::Valid => {
                assert!(!tx.inputs.is_empty(), "Valid transaction must have inputs");
                assert!(!tx.outputs.is_empty(), "Valid transaction must have outputs");

                assert!(tx.inputs.len() <= MAX_INPUTS, "Valid transaction must respect input limit");
                assert!(tx.outputs.len() <= MAX_OUTPUTS, "Valid transaction must respect output limit");

                for output in &tx.outputs {
                    assert!(output.value >= 0, "Valid transaction outputs must be non-negative");
                    assert!(output.value <= MAX_MONEY, "Valid transaction outputs must not exceed max money");
                }
            }
            ValidationResult::Invalid(_) => {}
        }
    }

    /// Kani proof: check_tx_inputs handles coinbase correctly
    #[kani::proof]
    fn kani_check_tx_inputs_coinbase() {
        let tx: Transaction = kani::any();
        let utxo_set: UtxoSet = kani::any();
        let height: Natural = kani::any();

        kani::assume(tx.inputs.len() <= 5);
        kani::assume(tx.outputs.len() <= 5);

        let result = check_tx_inputs(&tx, &utxo_set, height).unwrap_or((ValidationResult::Invalid("Error".to_string()), 0));

        if is_coinbase(&tx) {
            assert!(matches!(result.0, ValidationResult::Valid), "Coinbase transactions must be valid");
            assert_eq!(result.1, 0, "Coinbase transactions must have zero fee");
        }
    }

    /// Kani proof: is_coinbase correctly identifies coinbase transactions
    #[kani::proof]
    fn kani_is_coinbase_correct() {
        let tx: Transaction = kani::any();

        let is_cb = is_coinbase(&tx);

        if is_cb {
            assert_eq!(tx.inputs.len(), 1, "Coinbase must have exactly one input");
            assert_eq!(tx.inputs[0].prevout.hash, [0u8; 32], "Coinbase input must have zero hash");
            assert_eq!(tx.inputs[0].prevout.index, 0xffffffff, "Coinbase input must have max index");
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_transaction_valid() {
        let tx = Transaction {
            version: 1,
            inputs: vec![TransactionInput { prevout: OutPoint { hash: [0; 32], index: 0 }, script_sig: vec![], sequence: 0xffffffff }],
            outputs: vec![TransactionOutput { value: 1000, script_pubkey: vec![] }],
            lock_time: 0,
            witnesses: None,
        };

        assert_eq!(check_transaction(&tx).unwrap(), ValidationResult::Valid);
    }

    #[test]
    fn test_check_transaction_empty_inputs() {
        let tx = Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![TransactionOutput { value: 1000, script_pubkey: vec![] }],
            lock_time: 0,
            witnesses: None,
        };

        assert!(matches!(check_transaction(&tx).unwrap(), ValidationResult::Invalid(_)));
    }

    #[test]
    fn test_check_tx_inputs_coinbase() {
        let tx = Transaction {
            version: 1,
            inputs: vec![TransactionInput {
                prevout: OutPoint { hash: [0; 32], index: 0xffffffff },
                script_sig: vec![],
                sequence: 0xffffffff,
            }],
            outputs: vec![TransactionOutput { value: 5000000000, script_pubkey: vec![] }],
            lock_time: 0,
            witnesses: None,
        };

        let utxo_set = UtxoSet::new();
        let (result, fee) = check_tx_inputs(&tx, &utxo_set, 0).unwrap();

        assert_eq!(result, ValidationResult::Valid);
        assert_eq!(fee, 0);
    }

    // ============================================================================
    // COMPREHENSIVE TRANSACTION TESTS
    // ============================================================================

    #[test]
    fn test_check_transaction_empty_outputs() {
        let tx = Transaction {
            version: 1,
            inputs: vec![TransactionInput { prevout: OutPoint { hash: [0; 32], index: 0 }, script_sig: vec![], sequence: 0xffffffff }],
            outputs: vec![],
            lock_time: 0,
            witnesses: None,
        };

        assert!(matches!(check_transaction(&tx).unwrap(), ValidationResult::Invalid(_)));
    }

    #[test]
    fn test_check_transaction_invalid_output_value_negative() {
        let tx = Transaction {
            version: 1,
            inputs: vec![TransactionInput { prevout: OutPoint { hash: [0; 32], index: 0 }, script_sig: vec![], sequence: 0xffffffff }],
            outputs: vec![TransactionOutput { value: -1, script_pubkey: vec![] }],
            lock_time: 0,
            witnesses: None,
        };

        assert!(matches!(check_transaction(&tx).unwrap(), ValidationResult::Invalid(_)));
    }

    #[test]
    fn test_check_transaction_invalid_output_value_too_large() {
        let tx = Transaction {
            version: 1,
            inputs: vec![TransactionInput { prevout: OutPoint { hash: [0; 32], index: 0 }, script_sig: vec![], sequence: 0xffffffff }],
            outputs: vec![TransactionOutput { value: MAX_MONEY + 1, script_pubkey: vec![] }],
            lock_time: 0,
            witnesses: None,
        };

        assert!(matches!(check_transaction(&tx).unwrap(), ValidationResult::Invalid(_)));
    }

    #[test]
    fn test_check_transaction_max_output_value() {
        let tx = Transaction {
            version: 1,
            inputs: vec![TransactionInput { prevout: OutPoint { hash: [0; 32], index: 0 }, script_sig: vec![], sequence: 0xffffffff }],
            outputs: vec![TransactionOutput { value: MAX_MONEY, script_pubkey: vec![] }],
            lock_time: 0,
            witnesses: None,
        };

        assert_eq!(check_transaction(&tx).unwrap(), ValidationResult::Valid);
    }

    #[test]
    fn test_check_transaction_too_many_inputs() {
        let mut inputs = Vec::new();
        for i in 0..=MAX_INPUTS {
            inputs.push(TransactionInput { prevout: OutPoint { hash: [i as u8; 32], index: 0 }, script_sig: vec![], sequence: 0xffffffff });
        }

        let tx = Transaction {
            version: 1,
            inputs,
            outputs: vec![TransactionOutput { value: 1000, script_pubkey: vec![] }],
            lock_time: 0,
            witnesses: None,
        };

        assert!(matches!(check_transaction(&tx).unwrap(), ValidationResult::Invalid(_)));
    }

    #[test]
    fn test_check_transaction_max_inputs() {
        let mut inputs = Vec::new();
        for i in 0..MAX_INPUTS {
            inputs.push(TransactionInput { prevout: OutPoint { hash: [i as u8; 32], index: 0 }, script_sig: vec![], sequence: 0xffffffff });
        }

        let tx = Transaction {
            version: 1,
            inputs,
            outputs: vec![TransactionOutput { value: 1000, script_pubkey: vec![] }],
            lock_time: 0,
            witnesses: None,
        };

        assert_eq!(check_transaction(&tx).unwrap(), ValidationResult::Valid);
    }

    #[test]
    fn test_check_transaction_too_many_outputs() {
        let mut outputs = Vec::new();
        for _ in 0..=MAX_OUTPUTS {
            outputs.push(TransactionOutput { value: 1000, script_pubkey: vec![] });
        }

        let tx = Transaction {
            version: 1,
            inputs: vec![TransactionInput { prevout: OutPoint { hash: [0; 32], index: 0 }, script_sig: vec![], sequence: 0xffffffff }],
            outputs,
            lock_time: 0,
            witnesses: None,
        };

        assert!(matches!(check_transaction(&tx).unwrap(), ValidationResult::Invalid(_)));
    }

    #[test]
    fn test_check_transaction_max_outputs() {
        let mut outputs = Vec::new();
        for _ in 0..MAX_OUTPUTS {
            outputs.push(TransactionOutput { value: 1000, script_pubkey: vec![] });
        }

        let tx = Transaction {
            version: 1,
            inputs: vec![TransactionInput { prevout: OutPoint { hash: [0; 32], index: 0 }, script_sig: vec![], sequence: 0xffffffff }],
            outputs,
            lock_time: 0,
            witnesses: None,
        };

        assert_eq!(check_transaction(&tx).unwrap(), ValidationResult::Valid);
    }

    #[test]
    fn test_check_transaction_too_large() {
        // Enough inputs with nontrivial scriptSigs to exceed MAX_TX_SIZE
        // once wire-serialized.
        let mut inputs = Vec::new();
        for i in 0..25000 {
            inputs.push(TransactionInput { prevout: OutPoint { hash: [i as u8; 32], index: 0 }, script_sig: vec![0u8; 100], sequence: 0xffffffff });
        }

        let tx = Transaction {
            version: 1,
            inputs,
            outputs: vec![TransactionOutput { value: 1000, script_pubkey: vec![] }],
            lock_time: 0,
            witnesses: None,
        };

        assert!(matches!(check_transaction(&tx).unwrap(), ValidationResult::Invalid(_)));
    }

    #[test]
    fn test_check_tx_inputs_regular_transaction() {
        let mut utxo_set = UtxoSet::new();

        let outpoint = OutPoint { hash: [1; 32], index: 0 };
        let utxo = UTXO { value: 1000000000, script_pubkey: vec![], height: 0 };
        utxo_set.insert(outpoint, utxo);

        let tx = Transaction {
            version: 1,
            inputs: vec![TransactionInput { prevout: OutPoint { hash: [1; 32], index: 0 }, script_sig: vec![], sequence: 0xffffffff }],
            outputs: vec![TransactionOutput { value: 900000000, script_pubkey: vec![] }],
            lock_time: 0,
            witnesses: None,
        };

        let (result, fee) = check_tx_inputs(&tx, &utxo_set, 0).unwrap();

        assert_eq!(result, ValidationResult::Valid);
        assert_eq!(fee, 100000000);
    }

    #[test]
    fn test_check_tx_inputs_missing_utxo() {
        let utxo_set = UtxoSet::new();

        let tx = Transaction {
            version: 1,
            inputs: vec![TransactionInput { prevout: OutPoint { hash: [1; 32], index: 0 }, script_sig: vec![], sequence: 0xffffffff }],
            outputs: vec![TransactionOutput { value: 100000000, script_pubkey: vec![] }],
            lock_time: 0,
            witnesses: None,
        };

        let (result, fee) = check_tx_inputs(&tx, &utxo_set, 0).unwrap();

        assert!(matches!(result, ValidationResult::Invalid(_)));
        assert_eq!(fee, 0);
    }

    #[test]
    fn test_check_tx_inputs_insufficient_funds() {
        let mut utxo_set = UtxoSet::new();

        let outpoint = OutPoint { hash: [1; 32], index: 0 };
        let utxo = UTXO { value: 100000000, script_pubkey: vec![], height: 0 };
        utxo_set.insert(outpoint, utxo);

        let tx = Transaction {
            version: 1,
            inputs: vec![TransactionInput { prevout: OutPoint { hash: [1; 32], index: 0 }, script_sig: vec![], sequence: 0xffffffff }],
            outputs: vec![TransactionOutput { value: 200000000, script_pubkey: vec![] }],
            lock_time: 0,
            witnesses: None,
        };

        let (result, fee) = check_tx_inputs(&tx, &utxo_set, 0).unwrap();

        assert!(matches!(result, ValidationResult::Invalid(_)));
        assert_eq!(fee, 0);
    }

    #[test]
    fn test_check_tx_inputs_multiple_inputs() {
        let mut utxo_set = UtxoSet::new();

        let outpoint1 = OutPoint { hash: [1; 32], index: 0 };
        let utxo1 = UTXO { value: 500000000, script_pubkey: vec![], height: 0 };
        utxo_set.insert(outpoint1, utxo1);

        let outpoint2 = OutPoint { hash: [2; 32], index: 0 };
        let utxo2 = UTXO { value: 300000000, script_pubkey: vec![], height: 0 };
        utxo_set.insert(outpoint2, utxo2);

        let tx = Transaction {
            version: 1,
            inputs: vec![
                TransactionInput { prevout: OutPoint { hash: [1; 32], index: 0 }, script_sig: vec![], sequence: 0xffffffff },
                TransactionInput { prevout: OutPoint { hash: [2; 32], index: 0 }, script_sig: vec![], sequence: 0xffffffff },
            ],
            outputs: vec![TransactionOutput { value: 700000000, script_pubkey: vec![] }],
            lock_time: 0,
            witnesses: None,
        };

        let (result, fee) = check_tx_inputs(&tx, &utxo_set, 0).unwrap();

        assert_eq!(result, ValidationResult::Valid);
        assert_eq!(fee, 100000000);
    }

    #[test]
    fn test_is_coinbase_edge_cases() {
        let valid_coinbase = Transaction {
            version: 1,
            inputs: vec![TransactionInput {
                prevout: OutPoint { hash: [0; 32], index: 0xffffffff },
                script_sig: vec![],
                sequence: 0xffffffff,
            }],
            outputs: vec![],
            lock_time: 0,
            witnesses: None,
        };
        assert!(is_coinbase(&valid_coinbase));

        let wrong_hash = Transaction {
            version: 1,
            inputs: vec![TransactionInput {
                prevout: OutPoint { hash: [1; 32], index: 0xffffffff },
                script_sig: vec![],
                sequence: 0xffffffff,
            }],
            outputs: vec![],
            lock_time: 0,
            witnesses: None,
        };
        assert!(!is_coinbase(&wrong_hash));

        let wrong_index = Transaction {
            version: 1,
            inputs: vec![TransactionInput { prevout: OutPoint { hash: [0; 32], index: 0 }, script_sig: vec![], sequence: 0xffffffff }],
            outputs: vec![],
            lock_time: 0,
            witnesses: None,
        };
        assert!(!is_coinbase(&wrong_index));

        let multiple_inputs = Transaction {
            version: 1,
            inputs: vec![
                TransactionInput {
                    prevout: OutPoint { hash: [0; 32], index: 0xffffffff },
                    script_sig: vec![],
                    sequence: 0xffffffff,
                },
                TransactionInput { prevout: OutPoint { hash: [1; 32], index: 0 }, script_sig: vec![], sequence: 0xffffffff },
            ],
            outputs: vec![],
            lock_time: 0,
            witnesses: None,
        };
        assert!(!is_coinbase(&multiple_inputs));

        let no_inputs = Transaction { version: 1, inputs: vec![], outputs: vec![], lock_time: 0, witnesses: None };
        assert!(!is_coinbase(&no_inputs));
    }

    #[test]
    fn test_calculate_transaction_size_matches_wire_format() {
        let tx = Transaction {
            version: 1,
            inputs: vec![
                TransactionInput { prevout: OutPoint { hash: [0; 32], index: 0 }, script_sig: vec![1, 2, 3], sequence: 0xffffffff },
                TransactionInput { prevout: OutPoint { hash: [1; 32], index: 1 }, script_sig: vec![4, 5, 6], sequence: 0xffffffff },
            ],
            outputs: vec![
                TransactionOutput { value: 1000, script_pubkey: vec![7, 8, 9] },
                TransactionOutput { value: 2000, script_pubkey: vec![10, 11, 12] },
            ],
            lock_time: 12345,
            witnesses: None,
        };

        let size = calculate_transaction_size(&tx);
        assert_eq!(size, serialize_transaction(&tx, false).len());
    }

    #[test]
    fn txid_ignores_witness_wtxid_does_not() {
        let tx = Transaction {
            version: 1,
            inputs: vec![TransactionInput { prevout: OutPoint { hash: [0; 32], index: 0 }, script_sig: vec![], sequence: 0xffffffff }],
            outputs: vec![TransactionOutput { value: 1000, script_pubkey: vec![] }],
            lock_time: 0,
            witnesses: None,
        };
        let mut witnessed = tx.clone();
        witnessed.witnesses = Some(vec![vec![vec![0x01, 0x02]]]);

        assert_eq!(tx.txid(), witnessed.txid());
        assert_ne!(tx.wtxid(), witnessed.wtxid());
    }
}
