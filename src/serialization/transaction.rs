//! Transaction wire serialization (C6)
//!
//! Two forms exist: "no-witness" (`version || txins || txouts || locktime`)
//! and "witness" (`version || 0x00 || 0x01 || txins || txouts ||
//! witnesses || locktime`). The txid is always the double-SHA256 of the
//! no-witness form; `serialize_transaction(tx, true)` is what `wtxid`
//! hashes instead.

use crate::error::{ConsensusError, Result};
use crate::serialization::byte_stream::{ByteReader, ByteWriter};
use crate::serialization::varint::{read_varint, write_varint};
use crate::types::{OutPoint, Transaction, TransactionInput, TransactionOutput, Witness};

fn write_script(w: &mut ByteWriter, script: &[u8]) {
    write_varint(w, script.len() as u64);
    w.write_bytes(script);
}

fn read_script(r: &mut ByteReader) -> Result<Vec<u8>> {
    let len = read_varint(r).map_err(ConsensusError::from)?;
    Ok(r.read_bytes(len as usize)?.to_vec())
}

/// Serialize `tx`. When `include_witness` is true and the transaction
/// carries witness data, the segwit marker/flag and per-input witness
/// stacks are emitted; otherwise the no-witness (legacy) form is used.
pub fn serialize_transaction(tx: &Transaction, include_witness: bool) -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(256);
    let with_witness = include_witness && tx.has_witness();

    w.write_i32_le(tx.version);
    if with_witness {
        w.write_u8(0x00); // marker
        w.write_u8(0x01); // flag
    }

    write_varint(&mut w, tx.inputs.len() as u64);
    for input in &tx.inputs {
        w.write_bytes(&input.prevout.hash);
        w.write_u32_le(input.prevout.index);
        write_script(&mut w, &input.script_sig);
        w.write_u32_le(input.sequence);
    }

    write_varint(&mut w, tx.outputs.len() as u64);
    for output in &tx.outputs {
        w.write_i64_le(output.value);
        write_script(&mut w, &output.script_pubkey);
    }

    if with_witness {
        let witnesses = tx.witnesses.as_ref().expect("has_witness implies Some");
        for witness in witnesses {
            write_varint(&mut w, witness.len() as u64);
            for item in witness {
                write_script(&mut w, item);
            }
        }
    }

    w.write_u32_le(tx.lock_time);
    w.into_vec()
}

/// Parse a transaction, auto-detecting the segwit marker/flag.
pub fn deserialize_transaction(bytes: &[u8]) -> Result<Transaction> {
    let mut r = ByteReader::new(bytes);
    let version = r.read_i32_le()?;

    let mut has_witness = false;
    let marker_pos = r.position();
    if r.remaining() >= 2 {
        let marker = r.read_u8()?;
        let flag = r.read_u8()?;
        if marker == 0x00 && flag == 0x01 {
            has_witness = true;
        } else {
            // Not a segwit marker; rewind by re-reading from marker_pos.
            r = ByteReader::new(bytes);
            r.read_i32_le()?;
            let _ = marker_pos;
        }
    }

    let n_inputs = read_varint(&mut r).map_err(ConsensusError::from)?;
    let mut inputs = Vec::with_capacity(n_inputs as usize);
    for _ in 0..n_inputs {
        let hash = r.read_array::<32>()?;
        let index = r.read_u32_le()?;
        let script_sig = read_script(&mut r)?;
        let sequence = r.read_u32_le()?;
        inputs.push(TransactionInput { prevout: OutPoint { hash, index }, script_sig, sequence });
    }

    let n_outputs = read_varint(&mut r).map_err(ConsensusError::from)?;
    let mut outputs = Vec::with_capacity(n_outputs as usize);
    for _ in 0..n_outputs {
        let value = r.read_i64_le()?;
        let script_pubkey = read_script(&mut r)?;
        outputs.push(TransactionOutput { value, script_pubkey });
    }

    let witnesses = if has_witness {
        let mut all = Vec::with_capacity(inputs.len());
        for _ in 0..inputs.len() {
            let n_items = read_varint(&mut r).map_err(ConsensusError::from)?;
            let mut witness: Witness = Vec::with_capacity(n_items as usize);
            for _ in 0..n_items {
                witness.push(read_script(&mut r)?);
            }
            all.push(witness);
        }
        Some(all)
    } else {
        None
    };

    let lock_time = r.read_u32_le()?;

    Ok(Transaction { version, inputs, outputs, lock_time, witnesses })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_legacy() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TransactionInput {
                prevout: OutPoint { hash: [7u8; 32], index: 0 },
                script_sig: vec![0x51],
                sequence: 0xffff_ffff,
            }],
            outputs: vec![TransactionOutput { value: 5_000_000_000, script_pubkey: vec![0x76, 0xa9] }],
            lock_time: 0,
            witnesses: None,
        }
    }

    #[test]
    fn legacy_round_trips() {
        let tx = sample_legacy();
        let bytes = serialize_transaction(&tx, true);
        let decoded = deserialize_transaction(&bytes).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(bytes[4], 0x01); // input count varint, no marker emitted
    }

    #[test]
    fn witness_round_trips() {
        let mut tx = sample_legacy();
        tx.witnesses = Some(vec![vec![vec![0xde, 0xad], vec![0xbe, 0xef]]]);
        let bytes = serialize_transaction(&tx, true);
        assert_eq!(&bytes[4..6], &[0x00, 0x01]);
        let decoded = deserialize_transaction(&bytes).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn no_witness_serialization_ignores_witness_data() {
        let mut tx = sample_legacy();
        tx.witnesses = Some(vec![vec![vec![0xde, 0xad]]]);
        let with_witness = serialize_transaction(&tx, true);
        let without_witness = serialize_transaction(&tx, false);
        assert_ne!(with_witness, without_witness);
        assert_eq!(without_witness, serialize_transaction(&sample_legacy(), true));
    }

    #[test]
    fn truncated_input_fails() {
        let tx = sample_legacy();
        let mut bytes = serialize_transaction(&tx, true);
        bytes.truncate(bytes.len() - 1);
        assert!(deserialize_transaction(&bytes).is_err());
    }
}
