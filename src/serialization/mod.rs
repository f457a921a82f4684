//! Bitcoin wire format serialization/deserialization
//!
//! This module provides consensus-critical serialization functions that must match
//! Bitcoin Core's wire format exactly to ensure consensus compatibility.
//!
//! All serialization uses little-endian byte order (Bitcoin standard).

pub mod byte_stream;
pub mod varint;
pub mod transaction;
pub mod block;

pub use byte_stream::{ByteReader, ByteWriter};
pub use varint::{decode_varint, encode_varint, read_varint, write_varint, CompactInt, VarIntError};
pub use transaction::{deserialize_transaction, serialize_transaction};
pub use block::{
    deserialize_block_header, deserialize_block_with_witnesses, serialize_block, serialize_block_header,
};
