//! Binary Instruction Codec
//!
//! Self-describing, lossless wire layout for instructions. Fixed-width
//! fields are big-endian; the variable-length adapter context is
//! length-prefixed. Both instruction kinds round-trip exactly, including a
//! zero-length context.
//!
//! Layout:
//!
//! ```text
//! protocol instruction: 0x01 | protocol u8 | op u8 | token 20B | user 20B
//!                       | amount 32B | input u16 | context_len u32 | context
//! router instruction:   0x02 | op u8 | token 20B | user 20B
//!                       | amount 32B | input u16 | second_input u16
//! ```

use ethereum_types::{Address, U256};
use thiserror::Error;

use crate::instruction::{
    InputRef, Instruction, LendingOp, ProtocolId, ProtocolInstruction, RouterInstruction, RouterOp,
};

/// Wire tag for a protocol (lending) instruction.
pub const TAG_PROTOCOL: u8 = 0x01;
/// Wire tag for a router instruction.
pub const TAG_ROUTER: u8 = 0x02;

/// Contexts above this length are rejected at encode and decode time.
pub const MAX_CONTEXT_LEN: usize = 64 * 1024;

/// Structured codec failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("truncated input: needed {needed} more bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("unknown instruction tag 0x{0:02x}")]
    UnknownTag(u8),

    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),

    #[error("unknown protocol code {0}")]
    UnknownProtocol(u8),

    #[error("unknown protocol name '{0}'")]
    UnknownProtocolName(String),

    #[error("context length {0} exceeds maximum {MAX_CONTEXT_LEN}")]
    ContextTooLong(usize),

    #[error("{0} trailing bytes after instruction")]
    TrailingBytes(usize),

    #[error("instruction user {found:?} does not match expected owner {expected:?}")]
    OwnerMismatch { expected: Address, found: Address },
}

// ============================================================================
// ENCODING
// ============================================================================

/// Encode an instruction to its wire layout.
///
/// Fails on a context above [`MAX_CONTEXT_LEN`], so everything that
/// encodes is guaranteed to decode back.
pub fn encode(instruction: &Instruction) -> Result<Vec<u8>, CodecError> {
    match instruction {
        Instruction::Protocol(instr) => encode_protocol(instr),
        Instruction::Router(instr) => Ok(encode_router(instr)),
    }
}

fn encode_protocol(instr: &ProtocolInstruction) -> Result<Vec<u8>, CodecError> {
    if instr.context.len() > MAX_CONTEXT_LEN {
        return Err(CodecError::ContextTooLong(instr.context.len()));
    }
    let mut out = Vec::with_capacity(1 + 1 + 1 + 20 + 20 + 32 + 2 + 4 + instr.context.len());
    out.push(TAG_PROTOCOL);
    out.push(instr.protocol.code());
    out.push(instr.op.code());
    out.extend_from_slice(instr.token.as_bytes());
    out.extend_from_slice(instr.user.as_bytes());
    out.extend_from_slice(&u256_be(instr.amount));
    out.extend_from_slice(&instr.input.raw().to_be_bytes());
    out.extend_from_slice(&(instr.context.len() as u32).to_be_bytes());
    out.extend_from_slice(&instr.context);
    Ok(out)
}

fn encode_router(instr: &RouterInstruction) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + 1 + 20 + 20 + 32 + 2 + 2);
    out.push(TAG_ROUTER);
    out.push(instr.op.code());
    out.extend_from_slice(instr.token.as_bytes());
    out.extend_from_slice(instr.user.as_bytes());
    out.extend_from_slice(&u256_be(instr.amount));
    out.extend_from_slice(&instr.input.raw().to_be_bytes());
    out.extend_from_slice(&instr.second_input.raw().to_be_bytes());
    out
}

fn u256_be(value: U256) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    bytes
}

// ============================================================================
// DECODING
// ============================================================================

/// Decode an instruction from its wire layout.
///
/// The full input must be consumed; trailing bytes are an error so that a
/// corrupted or concatenated buffer is never silently accepted.
pub fn decode(bytes: &[u8]) -> Result<Instruction, CodecError> {
    let mut cursor = Cursor::new(bytes);
    let instruction = decode_from(&mut cursor)?;
    if cursor.remaining() != 0 {
        return Err(CodecError::TrailingBytes(cursor.remaining()));
    }
    Ok(instruction)
}

/// Decode one instruction from the cursor, leaving any following bytes in
/// place.
fn decode_from(cursor: &mut Cursor<'_>) -> Result<Instruction, CodecError> {
    let tag = cursor.take_u8()?;
    match tag {
        TAG_PROTOCOL => {
            let protocol = ProtocolId::from_code(cursor.take_u8()?)?;
            let op = LendingOp::from_code(cursor.take_u8()?)?;
            let token = cursor.take_address()?;
            let user = cursor.take_address()?;
            let amount = cursor.take_u256()?;
            let input = InputRef::from_raw(cursor.take_u16()?);
            let context_len = cursor.take_u32()? as usize;
            if context_len > MAX_CONTEXT_LEN {
                return Err(CodecError::ContextTooLong(context_len));
            }
            let context = cursor.take(context_len)?.to_vec();
            Ok(Instruction::Protocol(ProtocolInstruction {
                protocol,
                op,
                token,
                user,
                amount,
                context,
                input,
            }))
        }
        TAG_ROUTER => {
            let op = RouterOp::from_code(cursor.take_u8()?)?;
            let token = cursor.take_address()?;
            let user = cursor.take_address()?;
            let amount = cursor.take_u256()?;
            let input = InputRef::from_raw(cursor.take_u16()?);
            let second_input = InputRef::from_raw(cursor.take_u16()?);
            Ok(Instruction::Router(RouterInstruction {
                op,
                token,
                user,
                amount,
                input,
                second_input,
            }))
        }
        other => Err(CodecError::UnknownTag(other)),
    }
}

/// Checked forward-only reader over a byte slice. Fails closed on any read
/// past the end instead of panicking.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Cursor { bytes, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn take_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn take_u16(&mut self) -> Result<u16, CodecError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn take_u32(&mut self) -> Result<u32, CodecError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn take_address(&mut self) -> Result<Address, CodecError> {
        Ok(Address::from_slice(self.take(20)?))
    }

    pub fn take_u256(&mut self) -> Result<U256, CodecError> {
        Ok(U256::from_big_endian(self.take(32)?))
    }
}
