//! ScriptNum: the little-endian signed-magnitude integer view of a stack item
//!
//! Per spec §3: sign bit lives in the high bit of the top byte; the
//! *numeric* view of a stack item is only valid when consumed as ≤ 4
//! bytes (the 32-bit arithmetic family). Encoding a number always
//! produces the shortest possible representation — an empty array for
//! zero, and 0x80 (negative zero) is never naturally produced.

use crate::error::{ConsensusError, Result};

/// Decode a stack item as a ScriptNum.
///
/// `max_len` bounds how many bytes may be consumed (4 for ordinary
/// arithmetic opcodes; callers enforcing BIP65/BIP112 locktime checks pass
/// a wider bound since those opcodes accept up to 5 bytes).
///
/// When `minimal` is set, the encoding must already be the shortest one
/// for its value (no superfluous leading zero byte, and the case where
/// the top byte is 0x00/0x80 with nothing beneath it to justify the extra
/// byte is rejected) — this is the "minimal data" push/number rule used
/// once `ScriptFlags::minimal_data` is active.
pub fn decode_script_num(bytes: &[u8], max_len: usize, minimal: bool) -> Result<i64> {
    if bytes.is_empty() {
        return Ok(0);
    }
    if bytes.len() > max_len {
        return Err(ConsensusError::ScriptExecution(format!(
            "script number too long: {} bytes (max {})",
            bytes.len(),
            max_len
        )));
    }
    if minimal {
        let last = *bytes.last().unwrap();
        if last & 0x7f == 0 {
            // The most significant byte is 0x00 or 0x80; that's only
            // legitimate if the next byte down has its own sign bit set
            // (otherwise this extra byte could have been dropped).
            if bytes.len() <= 1 || bytes[bytes.len() - 2] & 0x80 == 0 {
                return Err(ConsensusError::ScriptExecution(
                    "non-minimally encoded script number".to_string(),
                ));
            }
        }
    }

    let mut result: i64 = 0;
    for (i, &b) in bytes.iter().enumerate() {
        result |= (b as i64) << (8 * i);
    }

    let top = bytes[bytes.len() - 1];
    if top & 0x80 != 0 {
        // Sign bit set: clear it from the magnitude and negate.
        result &= !(0x80i64 << (8 * (bytes.len() - 1)));
        result = -result;
    }
    Ok(result)
}

/// Encode `value` as the shortest little-endian signed-magnitude byte
/// string (empty for zero).
pub fn encode_script_num(value: i64) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }

    let negative = value < 0;
    let mut absvalue: u64 = value.unsigned_abs();
    let mut bytes = Vec::new();
    while absvalue != 0 {
        bytes.push((absvalue & 0xff) as u8);
        absvalue >>= 8;
    }

    if bytes.last().unwrap() & 0x80 != 0 {
        bytes.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        *bytes.last_mut().unwrap() |= 0x80;
    }
    bytes
}

/// Boolean coercion of a stack item (spec §3): true iff any byte is
/// non-zero, except a lone trailing 0x80 with every other byte zero,
/// which is the "negative zero" representation and counts as false.
pub fn cast_to_bool(bytes: &[u8]) -> bool {
    for (i, &b) in bytes.iter().enumerate() {
        if b != 0 {
            if i == bytes.len() - 1 && b == 0x80 {
                return false;
            }
            return true;
        }
    }
    false
}
