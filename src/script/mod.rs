//! Bitcoin Script: parser, stack machine, and interpreter
//!
//! Replaces the teacher's flat `script.rs` (single-opcode dispatch, no
//! conditionals, no push-data length handling) with a real parse tree
//! (`operation.rs`, `parser.rs`) walked by `interpreter.rs`. `opdata.rs`
//! and `num.rs` hold the stack-machine state and ScriptNum codec that
//! both the parser's minimal-push checks and the interpreter's
//! arithmetic opcodes depend on.

pub mod interpreter;
pub mod num;
pub mod opcodes;
pub mod opdata;
pub mod operation;
pub mod parser;

pub use interpreter::{eval_script, verify_script, verify_script_with_context};
pub use num::{cast_to_bool, decode_script_num, encode_script_num};
pub use opdata::OpData;
pub use operation::{Operation, PushBytes};
pub use parser::parse_script;
