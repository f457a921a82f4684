//! Consensus error taxonomy
//!
//! Every fallible operation in this crate returns [`Result`] instead of
//! panicking. Parsing and script execution never throw: callers get a
//! typed reason back, grouped into the kinds from the Orange Paper error
//! taxonomy so peer-layer code can decide how to react (ignore, penalize,
//! disconnect) without string-matching messages.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ConsensusError>;

/// Consensus-critical error taxonomy.
///
/// Variants map to the kinds in the Orange Paper error design: a reader
/// ran out of bytes (`EndOfStream`), a length prefix or structure was
/// invalid (`Malformed`), a rule that is part of chain consensus was
/// violated (`Consensus`), a rule that is merely relay policy was violated
/// (`Policy`), or the peer layer hit a protocol/timeout/cancellation
/// condition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("unexpected end of stream: needed {needed} more byte(s)")]
    EndOfStream { needed: usize },

    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("consensus rule violated: {0}")]
    ConsensusRuleViolation(String),

    #[error("script execution failed: {0}")]
    ScriptExecution(String),

    #[error("disabled opcode encountered: 0x{0:02x}")]
    DisabledOpcode(u8),

    #[error("non-standard but consensus-valid (policy): {0}")]
    Policy(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("operation timed out")]
    Timeout,

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid sighash type byte: 0x{0:02x}")]
    InvalidSighashType(u8),

    #[error("invalid input index {0} for transaction")]
    InvalidInputIndex(usize),

    #[error("prevouts count {0} does not match input count {1}")]
    InvalidPrevoutsCount(usize, usize),

    #[error("invalid proof of work: {0}")]
    InvalidProofOfWork(String),
}

impl ConsensusError {
    /// True for the one kind that a cancellation-requesting caller should
    /// never treat as an error condition (spec: "Cancelled is never an
    /// error for the caller that requested cancellation").
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ConsensusError::Cancelled)
    }
}
