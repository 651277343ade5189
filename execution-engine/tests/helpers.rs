//! Shared test doubles for execution engine tests
//!
//! Provides an in-memory token port that records every movement, and a
//! scriptable protocol adapter. No external protocol is touched.

use std::sync::{Arc, Mutex};

use ethereum_types::{Address, U256};
use instruction_model::{LendingOp, ProtocolId};

use execution_engine::{
    AdapterError, AdapterRegistry, EngineConfig, Executor, ProtocolAdapter, TokenPort,
};

pub fn addr(byte: u8) -> Address {
    Address::from([byte; 20])
}

// ============================================================================
// TOKEN PORT DOUBLE
// ============================================================================

/// One recorded token movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortCall {
    Pull {
        token: Address,
        owner: Address,
        amount: U256,
    },
    Push {
        token: Address,
        recipient: Address,
        amount: U256,
    },
    Approve {
        token: Address,
        spender: Address,
        amount: U256,
    },
}

/// Token port that records calls and succeeds unless told otherwise.
#[derive(Default)]
pub struct RecordingPort {
    pub calls: Mutex<Vec<PortCall>>,
    pub fail_push: bool,
}

impl RecordingPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_push() -> Self {
        RecordingPort {
            calls: Mutex::new(Vec::new()),
            fail_push: true,
        }
    }

    pub fn recorded(&self) -> Vec<PortCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl TokenPort for RecordingPort {
    fn pull(&self, token: Address, owner: Address, amount: U256) -> Result<U256, AdapterError> {
        self.calls.lock().unwrap().push(PortCall::Pull {
            token,
            owner,
            amount,
        });
        Ok(amount)
    }

    fn push(&self, token: Address, recipient: Address, amount: U256) -> Result<(), AdapterError> {
        if self.fail_push {
            return Err(AdapterError::Transfer("push disabled in test".to_string()));
        }
        self.calls.lock().unwrap().push(PortCall::Push {
            token,
            recipient,
            amount,
        });
        Ok(())
    }

    fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<(), AdapterError> {
        self.calls.lock().unwrap().push(PortCall::Approve {
            token,
            spender,
            amount,
        });
        Ok(())
    }
}

// ============================================================================
// PROTOCOL ADAPTER DOUBLE
// ============================================================================

/// One recorded adapter invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterCall {
    pub op: LendingOp,
    pub token: Address,
    pub user: Address,
    pub amount: U256,
}

/// Adapter that echoes the operation amount back for producing ops and
/// records every call. Can be restricted to a support set or made to fail.
pub struct ScriptedAdapter {
    pub calls: Mutex<Vec<AdapterCall>>,
    pub supported: Vec<LendingOp>,
    pub fail_with: Option<String>,
}

impl ScriptedAdapter {
    pub fn supporting_all() -> Self {
        ScriptedAdapter {
            calls: Mutex::new(Vec::new()),
            supported: vec![
                LendingOp::Deposit,
                LendingOp::DepositCollateral,
                LendingOp::Withdraw,
                LendingOp::WithdrawCollateral,
                LendingOp::Borrow,
                LendingOp::Repay,
            ],
            fail_with: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        ScriptedAdapter {
            fail_with: Some(message.to_string()),
            ..Self::supporting_all()
        }
    }

    pub fn recorded(&self) -> Vec<AdapterCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl ProtocolAdapter for ScriptedAdapter {
    fn execute(
        &self,
        op: LendingOp,
        token: Address,
        user: Address,
        amount: U256,
        _context: &[u8],
    ) -> Result<U256, AdapterError> {
        if let Some(message) = &self.fail_with {
            return Err(AdapterError::Protocol(message.clone()));
        }
        self.calls.lock().unwrap().push(AdapterCall {
            op,
            token,
            user,
            amount,
        });
        // Producing ops hand the full amount back; the executor decides
        // whether that becomes a UTXO.
        Ok(if op.produces_output() { amount } else { U256::zero() })
    }

    fn supports(&self, op: LendingOp) -> bool {
        self.supported.contains(&op)
    }
}

// ============================================================================
// EXECUTOR WIRING
// ============================================================================

/// Executor over a fresh recording port and a scripted Aave adapter.
pub fn test_executor() -> (Executor, Arc<RecordingPort>, Arc<ScriptedAdapter>) {
    executor_with(ScriptedAdapter::supporting_all(), RecordingPort::new())
}

pub fn executor_with(
    adapter: ScriptedAdapter,
    port: RecordingPort,
) -> (Executor, Arc<RecordingPort>, Arc<ScriptedAdapter>) {
    let adapter = Arc::new(adapter);
    let port = Arc::new(port);
    let mut registry = AdapterRegistry::new();
    registry.register(ProtocolId::AaveV3, adapter.clone());
    let executor = Executor::new(registry, port.clone(), EngineConfig::default());
    (executor, port, adapter)
}
