//! Order Data Structures
//!
//! The order definition submitted by a user, and the deterministic hash
//! that keys the order registry. An order is never mutated after creation;
//! the only later binding is the funding step in the hook security gate.

use ethereum_types::{Address, H256, U256};
use instruction_model::{CodecError, Instruction};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// One iteration's ordered instruction sequence.
pub type InstructionSet = Vec<Instruction>;

/// When an order counts as complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Completion {
    /// Complete after a fixed number of chunk iterations.
    Iterations(u32),
}

/// Full order parameter set as submitted to `create_order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderParams {
    /// Authenticated order owner. Every embedded instruction must bind to
    /// this address.
    pub user: Address,
    /// Instruction sets run before the swap/settlement, one per iteration.
    pub pre_instructions: Vec<InstructionSet>,
    /// Instruction sets run after the swap/settlement, one per iteration.
    pub post_instructions: Vec<InstructionSet>,
    pub total_amount: U256,
    pub chunk_size: U256,
    pub min_buy_per_chunk: U256,
    pub completion: Completion,
    pub target_value: U256,
    pub min_health_factor: U256,
    pub app_data_hash: H256,
    /// Flash-loan funded orders require the funding binding at hook time.
    pub is_flash_loan_order: bool,
    pub is_kind_buy: bool,
}

/// A stored order, keyed by its hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub hash: H256,
    pub params: OrderParams,
    pub salt: H256,
    pub seed_amount: U256,
}

/// Deterministic order hash: Keccak256 over the full encoded parameter set
/// plus the salt.
///
/// Identical parameters with a different salt hash to an independent
/// order; any parameter change, however deep in a nested instruction,
/// changes the hash. Fails when an embedded instruction cannot be
/// encoded (oversized context).
pub fn order_hash(params: &OrderParams, salt: H256) -> Result<H256, CodecError> {
    let mut hasher = Keccak256::new();
    hasher.update(params.user.as_bytes());
    hash_instruction_sets(&mut hasher, &params.pre_instructions)?;
    hash_instruction_sets(&mut hasher, &params.post_instructions)?;
    hasher.update(u256_be(params.total_amount));
    hasher.update(u256_be(params.chunk_size));
    hasher.update(u256_be(params.min_buy_per_chunk));
    match params.completion {
        Completion::Iterations(n) => {
            hasher.update([0u8]);
            hasher.update(n.to_be_bytes());
        }
    }
    hasher.update(u256_be(params.target_value));
    hasher.update(u256_be(params.min_health_factor));
    hasher.update(params.app_data_hash.as_bytes());
    hasher.update([params.is_flash_loan_order as u8, params.is_kind_buy as u8]);
    hasher.update(salt.as_bytes());
    Ok(H256::from_slice(&hasher.finalize()))
}

fn hash_instruction_sets(
    hasher: &mut Keccak256,
    sets: &[InstructionSet],
) -> Result<(), CodecError> {
    hasher.update((sets.len() as u32).to_be_bytes());
    for set in sets {
        hasher.update((set.len() as u32).to_be_bytes());
        for instruction in set {
            let encoded = instruction.encode()?;
            // Length prefix keeps set boundaries unambiguous in the
            // hashed stream.
            hasher.update((encoded.len() as u32).to_be_bytes());
            hasher.update(&encoded);
        }
    }
    Ok(())
}

fn u256_be(value: U256) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    bytes
}
