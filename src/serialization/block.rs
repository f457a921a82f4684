//! Block / BlockHeader wire serialization (C7)
//!
//! `BlockHeader` is always exactly 80 bytes:
//! `version(4) || prev_hash(32) || merkle_root(32) || time(4) || bits(4) || nonce(4)`.
//! A `Block` is that header followed by a CompactInt-prefixed transaction
//! list, each transaction in its own legacy-or-witness form.

use crate::error::{ConsensusError, Result};
use crate::serialization::byte_stream::{ByteReader, ByteWriter};
use crate::serialization::transaction::{deserialize_transaction, serialize_transaction};
use crate::serialization::varint::{read_varint, write_varint};
use crate::types::{Block, BlockHeader};

/// Fixed on-wire size of a block header.
pub const BLOCK_HEADER_SIZE: usize = 80;

/// Serialize a header to its canonical 80 bytes.
pub fn serialize_block_header(header: &BlockHeader) -> [u8; BLOCK_HEADER_SIZE] {
    let mut w = ByteWriter::with_capacity(BLOCK_HEADER_SIZE);
    w.write_i32_le(header.version);
    w.write_bytes(&header.prev_block_hash);
    w.write_bytes(&header.merkle_root);
    w.write_u32_le(header.time);
    w.write_u32_le(header.bits);
    w.write_u32_le(header.nonce);
    let bytes = w.into_vec();
    let mut out = [0u8; BLOCK_HEADER_SIZE];
    out.copy_from_slice(&bytes);
    out
}

/// Parse an 80-byte header.
pub fn deserialize_block_header(bytes: &[u8]) -> Result<BlockHeader> {
    if bytes.len() < BLOCK_HEADER_SIZE {
        return Err(ConsensusError::EndOfStream { needed: BLOCK_HEADER_SIZE - bytes.len() });
    }
    let mut r = ByteReader::new(&bytes[..BLOCK_HEADER_SIZE]);
    let version = r.read_i32_le()?;
    let prev_block_hash = r.read_array::<32>()?;
    let merkle_root = r.read_array::<32>()?;
    let time = r.read_u32_le()?;
    let bits = r.read_u32_le()?;
    let nonce = r.read_u32_le()?;
    Ok(BlockHeader { version, prev_block_hash, merkle_root, time, bits, nonce })
}

/// Serialize a full block: header, then CompactInt(n), then n transactions
/// (witness form, so a segwit block's wire bytes are complete).
pub fn serialize_block(block: &Block) -> Vec<u8> {
    let mut out = serialize_block_header(&block.header).to_vec();
    let mut w = ByteWriter::new();
    write_varint(&mut w, block.transactions.len() as u64);
    out.extend_from_slice(&w.into_vec());
    for tx in &block.transactions {
        out.extend_from_slice(&serialize_transaction(tx, true));
    }
    out
}

/// Parse a full block, honoring per-transaction segwit marker/flag.
pub fn deserialize_block_with_witnesses(bytes: &[u8]) -> Result<Block> {
    let header = deserialize_block_header(bytes)?;
    let mut r = ByteReader::new(&bytes[BLOCK_HEADER_SIZE..]);
    let n_tx = read_varint(&mut r).map_err(ConsensusError::from)?;

    // Transactions don't carry a fixed length prefix of their own, so we
    // re-parse sequentially from the remaining bytes, tracking how much
    // deserialize_transaction consumed indirectly via re-serialization.
    let mut transactions = Vec::with_capacity(n_tx as usize);
    let mut offset = BLOCK_HEADER_SIZE + r.position();
    for _ in 0..n_tx {
        let tx = deserialize_transaction(&bytes[offset..])?;
        offset += serialize_transaction(&tx, true).len();
        transactions.push(tx);
    }

    Ok(Block { header, transactions })
}
