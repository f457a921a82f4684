//! Transaction structural validation and id computation.

use bedrock_consensus::transaction::{check_transaction, check_tx_inputs, is_coinbase};
use bedrock_consensus::types::{OutPoint, Transaction, TransactionInput, TransactionOutput, UtxoSet, UTXO};

fn coinbase_tx() -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TransactionInput { prevout: OutPoint::COINBASE, script_sig: vec![0x51], sequence: 0xffff_ffff }],
        outputs: vec![TransactionOutput { value: 5_000_000_000, script_pubkey: vec![] }],
        lock_time: 0,
        witnesses: None,
    }
}

fn spend_tx(prevout: OutPoint, value: i64) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TransactionInput { prevout, script_sig: vec![], sequence: 0xffff_ffff }],
        outputs: vec![TransactionOutput { value, script_pubkey: vec![] }],
        lock_time: 0,
        witnesses: None,
    }
}

#[test]
fn coinbase_is_recognized() {
    assert!(is_coinbase(&coinbase_tx()));
    let non_coinbase = spend_tx(OutPoint { hash: [7u8; 32], index: 0 }, 100);
    assert!(!is_coinbase(&non_coinbase));
}

#[test]
fn well_formed_transaction_passes_structural_checks() {
    assert!(check_transaction(&coinbase_tx()).unwrap().is_valid());
}

#[test]
fn empty_inputs_is_rejected() {
    let tx = Transaction {
        version: 1,
        inputs: vec![],
        outputs: vec![TransactionOutput { value: 1, script_pubkey: vec![] }],
        lock_time: 0,
        witnesses: None,
    };
    assert!(!check_transaction(&tx).unwrap().is_valid());
}

#[test]
fn negative_output_value_is_rejected() {
    let tx = Transaction {
        version: 1,
        inputs: vec![TransactionInput { prevout: OutPoint { hash: [1u8; 32], index: 0 }, script_sig: vec![], sequence: 0xffff_ffff }],
        outputs: vec![TransactionOutput { value: -1, script_pubkey: vec![] }],
        lock_time: 0,
        witnesses: None,
    };
    assert!(!check_transaction(&tx).unwrap().is_valid());
}

#[test]
fn spend_of_known_utxo_succeeds_and_computes_fee() {
    let outpoint = OutPoint { hash: [9u8; 32], index: 0 };
    let mut utxos = UtxoSet::new();
    utxos.insert(outpoint, UTXO { value: 10_000, script_pubkey: vec![], height: 100 });
    let tx = spend_tx(outpoint, 9_000);
    let (result, fee) = check_tx_inputs(&tx, &utxos, 200).unwrap();
    assert!(result.is_valid());
    assert_eq!(fee, 1_000);
}

#[test]
fn spend_of_unknown_utxo_is_invalid() {
    let utxos = UtxoSet::new();
    let tx = spend_tx(OutPoint { hash: [9u8; 32], index: 0 }, 9_000);
    let (result, _fee) = check_tx_inputs(&tx, &utxos, 200).unwrap();
    assert!(!result.is_valid());
}

#[test]
fn spend_exceeding_input_value_is_invalid() {
    let outpoint = OutPoint { hash: [3u8; 32], index: 0 };
    let mut utxos = UtxoSet::new();
    utxos.insert(outpoint, UTXO { value: 500, script_pubkey: vec![], height: 100 });
    let tx = spend_tx(outpoint, 9_000);
    let (result, _fee) = check_tx_inputs(&tx, &utxos, 200).unwrap();
    assert!(!result.is_valid());
}

#[test]
fn coinbase_spend_check_is_always_valid_with_zero_fee() {
    let utxos = UtxoSet::new();
    let (result, fee) = check_tx_inputs(&coinbase_tx(), &utxos, 200).unwrap();
    assert!(result.is_valid());
    assert_eq!(fee, 0);
}

#[test]
fn txid_and_wtxid_differ_only_when_witness_present() {
    let tx = coinbase_tx();
    assert_eq!(tx.txid(), tx.wtxid());

    let with_witness = Transaction { witnesses: Some(vec![vec![vec![0x01, 0x02]]]), ..coinbase_tx() };
    assert_ne!(with_witness.txid(), with_witness.wtxid());
}
