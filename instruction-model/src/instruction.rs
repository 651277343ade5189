//! Instruction Data Model
//!
//! This module defines the instruction records that the execution engine
//! runs: lending instructions dispatched to money-market protocol adapters,
//! and router instructions that move value in and out of the per-chunk
//! UTXO table. Instructions are pure data; execution semantics live in the
//! execution engine.

use ethereum_types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::codec::{self, CodecError};

// ============================================================================
// OPCODES
// ============================================================================

/// Closed set of lending operations understood by protocol adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LendingOp {
    Deposit,
    DepositCollateral,
    Withdraw,
    WithdrawCollateral,
    Borrow,
    Repay,
}

impl LendingOp {
    /// Wire code used by the binary codec.
    pub fn code(self) -> u8 {
        match self {
            LendingOp::Deposit => 0,
            LendingOp::DepositCollateral => 1,
            LendingOp::Withdraw => 2,
            LendingOp::WithdrawCollateral => 3,
            LendingOp::Borrow => 4,
            LendingOp::Repay => 5,
        }
    }

    /// Decode a wire code back into an opcode.
    pub fn from_code(code: u8) -> Result<Self, CodecError> {
        match code {
            0 => Ok(LendingOp::Deposit),
            1 => Ok(LendingOp::DepositCollateral),
            2 => Ok(LendingOp::Withdraw),
            3 => Ok(LendingOp::WithdrawCollateral),
            4 => Ok(LendingOp::Borrow),
            5 => Ok(LendingOp::Repay),
            other => Err(CodecError::UnknownOpcode(other)),
        }
    }

    /// Whether the operation hands value back to the caller and therefore
    /// produces a new UTXO when executed (Withdraw/Borrow family).
    pub fn produces_output(self) -> bool {
        matches!(
            self,
            LendingOp::Withdraw | LendingOp::WithdrawCollateral | LendingOp::Borrow
        )
    }
}

/// Closed set of router primitives operating on the UTXO table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouterOp {
    /// Pull tokens from a named owner into the table as a new UTXO.
    PullToken,
    /// Send a UTXO's value to a named recipient, consuming it.
    PushToken,
    /// Authorize a downstream protocol to spend a UTXO's value.
    Approve,
    /// Merge two UTXOs of the same token into one, consuming both.
    Add,
}

impl RouterOp {
    pub fn code(self) -> u8 {
        match self {
            RouterOp::PullToken => 0,
            RouterOp::PushToken => 1,
            RouterOp::Approve => 2,
            RouterOp::Add => 3,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, CodecError> {
        match code {
            0 => Ok(RouterOp::PullToken),
            1 => Ok(RouterOp::PushToken),
            2 => Ok(RouterOp::Approve),
            3 => Ok(RouterOp::Add),
            other => Err(CodecError::UnknownOpcode(other)),
        }
    }
}

// ============================================================================
// PROTOCOL IDENTIFIERS
// ============================================================================

/// Closed set of supported money-market protocols.
///
/// The source of truth for adapter dispatch. Unknown protocol names are
/// rejected here, at parse time, rather than at execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolId {
    AaveV3,
    MorphoBlue,
    CompoundV3,
    Euler,
    Spark,
    Fluid,
}

impl ProtocolId {
    pub fn code(self) -> u8 {
        match self {
            ProtocolId::AaveV3 => 0,
            ProtocolId::MorphoBlue => 1,
            ProtocolId::CompoundV3 => 2,
            ProtocolId::Euler => 3,
            ProtocolId::Spark => 4,
            ProtocolId::Fluid => 5,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, CodecError> {
        match code {
            0 => Ok(ProtocolId::AaveV3),
            1 => Ok(ProtocolId::MorphoBlue),
            2 => Ok(ProtocolId::CompoundV3),
            3 => Ok(ProtocolId::Euler),
            4 => Ok(ProtocolId::Spark),
            5 => Ok(ProtocolId::Fluid),
            other => Err(CodecError::UnknownProtocol(other)),
        }
    }

    /// Canonical protocol name as used in client-facing order definitions.
    pub fn name(self) -> &'static str {
        match self {
            ProtocolId::AaveV3 => "aave-v3",
            ProtocolId::MorphoBlue => "morpho-blue",
            ProtocolId::CompoundV3 => "compound-v3",
            ProtocolId::Euler => "euler",
            ProtocolId::Spark => "spark",
            ProtocolId::Fluid => "fluid",
        }
    }

    /// Resolve a protocol name, rejecting anything outside the closed set.
    ///
    /// # Arguments
    ///
    /// * `name` - Canonical protocol name (e.g. "aave-v3")
    ///
    /// # Returns
    ///
    /// * `Ok(ProtocolId)` - The protocol identifier
    /// * `Err(CodecError::UnknownProtocolName)` - Name is not supported
    pub fn from_name(name: &str) -> Result<Self, CodecError> {
        match name {
            "aave-v3" => Ok(ProtocolId::AaveV3),
            "morpho-blue" => Ok(ProtocolId::MorphoBlue),
            "compound-v3" => Ok(ProtocolId::CompoundV3),
            "euler" => Ok(ProtocolId::Euler),
            "spark" => Ok(ProtocolId::Spark),
            "fluid" => Ok(ProtocolId::Fluid),
            other => Err(CodecError::UnknownProtocolName(other.to_string())),
        }
    }
}

// ============================================================================
// UTXO INPUT REFERENCE
// ============================================================================

/// Reference to an entry of the per-chunk UTXO table.
///
/// `0xFFFF` is the sentinel for "no input"; every other value is an index
/// into the table that must already exist when the instruction runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRef(u16);

impl InputRef {
    /// Sentinel wire value meaning "no input UTXO".
    pub const NONE_SENTINEL: u16 = u16::MAX;

    /// The "no input" reference.
    pub const NONE: InputRef = InputRef(Self::NONE_SENTINEL);

    /// Reference to table entry `index`. The table can never grow to the
    /// sentinel value, so all indices below it are representable.
    pub fn index(index: u16) -> Self {
        InputRef(index)
    }

    /// The referenced index, or `None` for the sentinel.
    pub fn as_index(self) -> Option<u16> {
        if self.0 == Self::NONE_SENTINEL {
            None
        } else {
            Some(self.0)
        }
    }

    /// Raw wire value (index or sentinel).
    pub fn raw(self) -> u16 {
        self.0
    }

    pub fn from_raw(raw: u16) -> Self {
        InputRef(raw)
    }
}

// ============================================================================
// INSTRUCTION RECORDS
// ============================================================================

/// A lending operation dispatched to a protocol adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolInstruction {
    /// Target protocol, resolved through the adapter registry.
    pub protocol: ProtocolId,
    pub op: LendingOp,
    pub token: Address,
    /// Position owner on the target protocol. Must equal the order owner.
    pub user: Address,
    /// Literal amount, used when `input` is `InputRef::NONE`.
    pub amount: U256,
    /// Opaque adapter context (market id, referral code, or a nested
    /// encoded instruction for composite adapters).
    #[serde(with = "hex_bytes")]
    pub context: Vec<u8>,
    pub input: InputRef,
}

/// A router primitive operating on the UTXO table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterInstruction {
    pub op: RouterOp,
    pub token: Address,
    /// Owner for PullToken, recipient for PushToken, spender for Approve.
    /// Unused by Add.
    pub user: Address,
    /// Literal amount, used when `input` is `InputRef::NONE`.
    pub amount: U256,
    pub input: InputRef,
    /// Second consumed entry, used only by `Add`.
    pub second_input: InputRef,
}

/// Tagged union over the two instruction kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    Protocol(ProtocolInstruction),
    Router(RouterInstruction),
}

impl Instruction {
    /// The embedded user subject to the order user-binding rule.
    ///
    /// Lending instructions always bind their `user`. Router PullToken and
    /// PushToken bind the owner/recipient. Approve names an external
    /// spender and Add names nobody, so neither carries a binding.
    pub fn owner(&self) -> Option<Address> {
        match self {
            Instruction::Protocol(instr) => Some(instr.user),
            Instruction::Router(instr) => match instr.op {
                RouterOp::PullToken | RouterOp::PushToken => Some(instr.user),
                RouterOp::Approve | RouterOp::Add => None,
            },
        }
    }

    /// Encode to the self-describing binary layout.
    ///
    /// Fails on a context above the codec's length cap; anything that
    /// encodes successfully decodes back losslessly.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        codec::encode(self)
    }

    /// Decode from the self-describing binary layout.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        codec::decode(bytes)
    }

    /// Encode, refusing instructions whose embedded user differs from
    /// `expected_owner`.
    ///
    /// Defense in depth: the authoritative check is still performed by the
    /// order manager at creation time.
    pub fn encode_checked(&self, expected_owner: Address) -> Result<Vec<u8>, CodecError> {
        if let Some(owner) = self.owner() {
            if owner != expected_owner {
                return Err(CodecError::OwnerMismatch {
                    expected: expected_owner,
                    found: owner,
                });
            }
        }
        self.encode()
    }
}

/// Hex (de)serialization for opaque byte fields in JSON order definitions.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
