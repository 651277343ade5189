//! Instruction model library for the looping execution core
//!
//! Provides the instruction data model (lending and router instructions),
//! the self-describing binary codec, and the conditional trigger parameters
//! that gate limit-order instantiation.

pub mod codec;
pub mod instruction;
pub mod trigger;

// Re-export public types for convenience
pub use codec::CodecError;
pub use instruction::{
    Instruction, InputRef, LendingOp, ProtocolId, ProtocolInstruction, RouterInstruction, RouterOp,
};
pub use trigger::{normalized_price, ConditionalTrigger, TriggerCodecError, PRICE_SCALE};
