//! Parsed script instructions
//!
//! The teacher's `script.rs` dispatches on raw `u8` opcodes in a flat
//! loop with no notion of push-data length or nested conditionals. This
//! tagged `Operation` enum is the parse tree that replaces it: a script
//! is parsed once into a `Vec<Operation>`, and `OP_IF`/`OP_NOTIF`/`OP_ELSE`/
//! `OP_ENDIF` become a single `Conditional` node holding both branches
//! instead of being dispatched opcode-by-opcode at execution time.

use crate::types::ByteString;

/// A push-data instruction: how many bytes were pushed and via which
/// opcode family (direct length byte, `OP_PUSHDATA1/2/4`, `OP_0`, or
/// `OP_1NEGATE`/`OP_1..OP_16`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushBytes {
    pub bytes: ByteString,
    /// The opcode that produced this push, kept for minimal-push checks.
    pub opcode: u8,
}

/// One parsed script instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Any push-data opcode: direct push, `OP_PUSHDATA1/2/4`, `OP_0`,
    /// `OP_1NEGATE`, or `OP_1..OP_16`.
    Push(PushBytes),
    /// An ordinary non-push, non-flow-control opcode.
    Simple(u8),
    /// An opcode that is disabled under every consensus rule set.
    Disabled(u8),
    /// An opcode that must never be executed, even in a skipped branch.
    NonRunnable(u8),
    /// A parsed `IF`/`NOTIF` ... `ELSE` ... `ENDIF` block.
    Conditional { not: bool, main: Vec<Operation>, else_branch: Option<Vec<Operation>> },
}

impl Operation {
    /// Walk this operation (and, for conditionals, both branches) looking
    /// for a disabled opcode. Per spec, disabled opcodes fail script
    /// execution even when nested inside a branch that will never run.
    pub fn contains_disabled(&self) -> bool {
        match self {
            Operation::Disabled(_) => true,
            Operation::Conditional { main, else_branch, .. } => {
                main.iter().any(Operation::contains_disabled)
                    || else_branch.as_ref().is_some_and(|b| b.iter().any(Operation::contains_disabled))
            }
            _ => false,
        }
    }
}
