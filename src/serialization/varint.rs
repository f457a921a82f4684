//! CompactInt codec (C2)
//!
//! Bitcoin's canonical variable-length unsigned integer prefix. Every
//! length-prefixed wire structure in this crate — scripts, input/output
//! vectors, witness stacks — uses this exact 1/3/5/9-byte scheme.
//! Canonicality is a consensus rule, not a style choice: a value encoded
//! with more bytes than necessary must fail to decode.

use crate::serialization::byte_stream::{ByteReader, ByteWriter};
use std::ops::Deref;
use thiserror::Error;

/// Errors local to the CompactInt codec, before being folded into
/// [`crate::error::ConsensusError::Malformed`] at the call boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VarIntError {
    #[error("unexpected end of stream reading CompactInt")]
    EndOfStream,
    #[error("non-canonical CompactInt encoding: value {value} encoded with marker 0x{marker:02x}")]
    NonCanonical { marker: u8, value: u64 },
}

impl From<VarIntError> for crate::error::ConsensusError {
    fn from(e: VarIntError) -> Self {
        crate::error::ConsensusError::Malformed(e.to_string())
    }
}

/// A CompactInt-encoded unsigned 64-bit value.
///
/// A thin wrapper over `u64` for call-site clarity (spec §9: "does not
/// need a dedicated wrapper type except for API clarity"). Derefs to the
/// underlying value so arithmetic and comparisons work without unwrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompactInt(pub u64);

impl Deref for CompactInt {
    type Target = u64;
    fn deref(&self) -> &u64 {
        &self.0
    }
}

impl From<u64> for CompactInt {
    fn from(v: u64) -> Self {
        CompactInt(v)
    }
}

impl TryFrom<usize> for CompactInt {
    type Error = std::num::TryFromIntError;
    fn try_from(v: usize) -> std::result::Result<Self, Self::Error> {
        Ok(CompactInt(u64::try_from(v)?))
    }
}

/// Encode `value` as a CompactInt, appending to `out`.
pub fn write_varint(out: &mut ByteWriter, value: u64) {
    if value <= 252 {
        out.write_u8(value as u8);
    } else if value <= 0xFFFF {
        out.write_u8(0xFD);
        out.write_u16_le(value as u16);
    } else if value <= 0xFFFF_FFFF {
        out.write_u8(0xFE);
        out.write_u32_le(value as u32);
    } else {
        out.write_u8(0xFF);
        out.write_u64_le(value);
    }
}

/// Encode `value` as a standalone CompactInt byte sequence.
pub fn encode_varint(value: u64) -> Vec<u8> {
    let mut w = ByteWriter::new();
    write_varint(&mut w, value);
    w.into_vec()
}

/// Decode a CompactInt from `reader`, enforcing minimal encoding.
pub fn read_varint(reader: &mut ByteReader) -> std::result::Result<u64, VarIntError> {
    let marker = reader.read_u8().map_err(|_| VarIntError::EndOfStream)?;
    match marker {
        0..=252 => Ok(marker as u64),
        0xFD => {
            let v = reader.read_u16_le().map_err(|_| VarIntError::EndOfStream)? as u64;
            if v <= 252 {
                Err(VarIntError::NonCanonical { marker, value: v })
            } else {
                Ok(v)
            }
        }
        0xFE => {
            let v = reader.read_u32_le().map_err(|_| VarIntError::EndOfStream)? as u64;
            if v <= 0xFFFF {
                Err(VarIntError::NonCanonical { marker, value: v })
            } else {
                Ok(v)
            }
        }
        0xFF => {
            let v = reader.read_u64_le().map_err(|_| VarIntError::EndOfStream)?;
            if v <= 0xFFFF_FFFF {
                Err(VarIntError::NonCanonical { marker, value: v })
            } else {
                Ok(v)
            }
        }
    }
}

/// Decode a CompactInt from a standalone byte slice, returning the value
/// and the number of bytes consumed.
pub fn decode_varint(bytes: &[u8]) -> std::result::Result<(u64, usize), VarIntError> {
    let mut reader = ByteReader::new(bytes);
    let value = read_varint(&mut reader)?;
    Ok((value, reader.position()))
}
