//! Shared fixtures for order manager tests
//!
//! Order parameter builders and a no-op token port. The well-known
//! addresses mirror the creator/foreign-user scenarios the validation
//! rules are specified against.

use ethereum_types::{Address, H256, U256};

use execution_engine::{AdapterError, TokenPort};
use instruction_model::{
    InputRef, Instruction, LendingOp, ProtocolId, ProtocolInstruction, RouterInstruction, RouterOp,
};
use order_manager::{Completion, OrderManager, OrderParams};

/// Order creator in most scenarios.
pub const CREATOR: u8 = 0xAA;
/// A foreign user that must never pass validation inside CREATOR's order.
pub const FOREIGN: u8 = 0xBB;
/// The order manager's own address.
pub const MANAGER_ADDR: u8 = 0x50;

pub fn addr(byte: u8) -> Address {
    Address::from([byte; 20])
}

pub fn salt(n: u64) -> H256 {
    H256::from_low_u64_be(n)
}

/// Borrow instruction for `user`, USDC-like token, amount in base units.
pub fn borrow_for(user: u8, amount: u64) -> Instruction {
    Instruction::Protocol(ProtocolInstruction {
        protocol: ProtocolId::AaveV3,
        op: LendingOp::Borrow,
        token: addr(0x11),
        user: addr(user),
        amount: U256::from(amount),
        context: Vec::new(),
        input: InputRef::NONE,
    })
}

pub fn pull_for(user: u8, amount: u64) -> Instruction {
    Instruction::Router(RouterInstruction {
        op: RouterOp::PullToken,
        token: addr(0x11),
        user: addr(user),
        amount: U256::from(amount),
        input: InputRef::NONE,
        second_input: InputRef::NONE,
    })
}

/// Deposit whose context nests another encoded instruction.
pub fn deposit_with_nested(user: u8, nested: &Instruction) -> Instruction {
    Instruction::Protocol(ProtocolInstruction {
        protocol: ProtocolId::MorphoBlue,
        op: LendingOp::Deposit,
        token: addr(0x11),
        user: addr(user),
        amount: U256::from(1u64),
        context: nested.encode().unwrap(),
        input: InputRef::NONE,
    })
}

/// Minimal valid params for `creator` with the given instruction sets.
pub fn params_with(
    creator: u8,
    pre: Vec<Vec<Instruction>>,
    post: Vec<Vec<Instruction>>,
) -> OrderParams {
    OrderParams {
        user: addr(creator),
        pre_instructions: pre,
        post_instructions: post,
        total_amount: U256::from(1_000u64),
        chunk_size: U256::from(250u64),
        min_buy_per_chunk: U256::from(1u64),
        completion: Completion::Iterations(4),
        target_value: U256::zero(),
        min_health_factor: U256::zero(),
        app_data_hash: H256::zero(),
        is_flash_loan_order: false,
        is_kind_buy: false,
    }
}

/// Flash-loan flagged variant of [`params_with`].
pub fn flash_params_with(
    creator: u8,
    pre: Vec<Vec<Instruction>>,
    post: Vec<Vec<Instruction>>,
) -> OrderParams {
    OrderParams {
        is_flash_loan_order: true,
        ..params_with(creator, pre, post)
    }
}

pub fn test_manager() -> OrderManager {
    OrderManager::new(addr(MANAGER_ADDR), addr(CREATOR))
}

/// Executor wired with an echo adapter and the accept-all port, for
/// settlement flow tests.
pub fn test_executor() -> execution_engine::Executor {
    use std::sync::Arc;

    let mut registry = execution_engine::AdapterRegistry::new();
    registry.register(ProtocolId::AaveV3, Arc::new(EchoAdapter));
    registry.register(ProtocolId::MorphoBlue, Arc::new(EchoAdapter));
    execution_engine::Executor::new(
        registry,
        Arc::new(AcceptAllPort),
        execution_engine::EngineConfig::default(),
    )
}

/// Adapter that supports every op and echoes the amount back for
/// producing ops.
pub struct EchoAdapter;

impl execution_engine::ProtocolAdapter for EchoAdapter {
    fn execute(
        &self,
        op: LendingOp,
        _token: Address,
        _user: Address,
        amount: U256,
        _context: &[u8],
    ) -> Result<U256, AdapterError> {
        Ok(if op.produces_output() { amount } else { U256::zero() })
    }

    fn supports(&self, _op: LendingOp) -> bool {
        true
    }
}

/// Token port that accepts every movement without recording.
pub struct AcceptAllPort;

impl TokenPort for AcceptAllPort {
    fn pull(&self, _token: Address, _owner: Address, amount: U256) -> Result<U256, AdapterError> {
        Ok(amount)
    }

    fn push(&self, _token: Address, _recipient: Address, _amount: U256) -> Result<(), AdapterError> {
        Ok(())
    }

    fn approve(
        &self,
        _token: Address,
        _spender: Address,
        _amount: U256,
    ) -> Result<(), AdapterError> {
        Ok(())
    }
}
