//! Single-pass script parser
//!
//! Turns a raw script byte string into a `Vec<Operation>`, resolving
//! push-data length prefixes and nesting `IF`/`NOTIF`/`ELSE`/`ENDIF` into
//! `Operation::Conditional` nodes. This is new relative to the teacher's
//! `script.rs`, which has no notion of push-data length or flow control
//! at all and simply matches single opcode bytes.

use crate::error::{ConsensusError, Result};
use crate::script::opcodes::*;
use crate::script::operation::{Operation, PushBytes};

struct ConditionalFrame {
    not: bool,
    main: Vec<Operation>,
    else_branch: Option<Vec<Operation>>,
    in_else: bool,
}

/// Parse `bytes` into a flat-but-nested instruction tree. Fails on
/// truncated push-data and on any IF/ELSE/ENDIF imbalance.
pub fn parse_script(bytes: &[u8]) -> Result<Vec<Operation>> {
    let mut cursor = 0usize;
    let mut frames: Vec<ConditionalFrame> = Vec::new();
    let mut root: Vec<Operation> = Vec::new();

    while cursor < bytes.len() {
        let op = bytes[cursor];
        cursor += 1;

        let instruction = match op {
            OP_0 => Some(Operation::Push(PushBytes { bytes: Vec::new(), opcode: op })),
            0x01..=0x4b => {
                let len = op as usize;
                let data = read_slice(bytes, &mut cursor, len)?;
                Some(Operation::Push(PushBytes { bytes: data, opcode: op }))
            }
            OP_PUSHDATA1 => {
                let len = read_slice(bytes, &mut cursor, 1)?[0] as usize;
                let data = read_slice(bytes, &mut cursor, len)?;
                Some(Operation::Push(PushBytes { bytes: data, opcode: op }))
            }
            OP_PUSHDATA2 => {
                let len_bytes = read_slice(bytes, &mut cursor, 2)?;
                let len = u16::from_le_bytes([len_bytes[0], len_bytes[1]]) as usize;
                let data = read_slice(bytes, &mut cursor, len)?;
                Some(Operation::Push(PushBytes { bytes: data, opcode: op }))
            }
            OP_PUSHDATA4 => {
                let len_bytes = read_slice(bytes, &mut cursor, 4)?;
                let len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
                let data = read_slice(bytes, &mut cursor, len)?;
                Some(Operation::Push(PushBytes { bytes: data, opcode: op }))
            }
            OP_1NEGATE => Some(Operation::Push(PushBytes { bytes: vec![0x81], opcode: op })),
            _ if is_small_int_push(op) => {
                Some(Operation::Push(PushBytes { bytes: vec![small_int_value(op)], opcode: op }))
            }
            OP_IF | OP_NOTIF => {
                frames.push(ConditionalFrame { not: op == OP_NOTIF, main: Vec::new(), else_branch: None, in_else: false });
                None
            }
            OP_ELSE => {
                let frame = frames.last_mut().ok_or_else(|| {
                    ConsensusError::ScriptExecution("OP_ELSE without matching OP_IF".to_string())
                })?;
                if frame.in_else {
                    return Err(ConsensusError::ScriptExecution("duplicate OP_ELSE".to_string()));
                }
                frame.in_else = true;
                frame.else_branch = Some(Vec::new());
                None
            }
            OP_ENDIF => {
                let frame = frames.pop().ok_or_else(|| {
                    ConsensusError::ScriptExecution("OP_ENDIF without matching OP_IF".to_string())
                })?;
                Some(Operation::Conditional { not: frame.not, main: frame.main, else_branch: frame.else_branch })
            }
            _ if is_disabled(op) => Some(Operation::Disabled(op)),
            _ if is_non_runnable(op) => Some(Operation::NonRunnable(op)),
            _ => Some(Operation::Simple(op)),
        };

        if let Some(instruction) = instruction {
            let target: &mut Vec<Operation> = match frames.last_mut() {
                Some(frame) if frame.in_else => frame.else_branch.as_mut().unwrap(),
                Some(frame) => &mut frame.main,
                None => &mut root,
            };
            target.push(instruction);
        }
    }

    if !frames.is_empty() {
        return Err(ConsensusError::ScriptExecution("dangling OP_IF with no matching OP_ENDIF".to_string()));
    }

    Ok(root)
}

fn read_slice(bytes: &[u8], cursor: &mut usize, len: usize) -> Result<Vec<u8>> {
    if *cursor + len > bytes.len() {
        return Err(ConsensusError::EndOfStream { needed: *cursor + len - bytes.len() });
    }
    let slice = bytes[*cursor..*cursor + len].to_vec();
    *cursor += len;
    Ok(slice)
}
