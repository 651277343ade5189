//! Protocol Adapter Registry
//!
//! Maps the closed protocol identifier set to capability-typed adapters.
//! Adapters are external collaborators: the engine never inspects their
//! internals, only the declared opcode support set and the produced amount
//! they report back.

use std::collections::HashMap;
use std::sync::Arc;

use ethereum_types::{Address, U256};
use instruction_model::{LendingOp, ProtocolId};
use thiserror::Error;
use tracing::warn;

/// Failures reported by a protocol adapter or the registry.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("no adapter registered for protocol {0:?}")]
    UnknownProtocol(ProtocolId),

    #[error("adapter for {protocol:?} does not support {op:?}")]
    UnsupportedOp { protocol: ProtocolId, op: LendingOp },

    /// Failure inside the external protocol (market paused, insufficient
    /// collateral, health factor violation, ...). Opaque to the engine.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("token transfer failed: {0}")]
    Transfer(String),
}

/// Capability interface of one money-market protocol integration.
///
/// Implementations live outside the core; the executor only relies on the
/// declared support set and the produced amount.
pub trait ProtocolAdapter: Send + Sync {
    /// Execute a lending operation.
    ///
    /// # Arguments
    ///
    /// * `op` - Lending operation to perform
    /// * `token` - Asset the operation is denominated in
    /// * `user` - Position owner on the protocol
    /// * `amount` - Operation amount in token base units
    /// * `context` - Opaque adapter context from the instruction
    ///
    /// # Returns
    ///
    /// * `Ok(U256)` - Amount handed back to the execution context (zero for
    ///   operations that produce nothing)
    /// * `Err(AdapterError)` - Operation failed; the whole chunk reverts
    fn execute(
        &self,
        op: LendingOp,
        token: Address,
        user: Address,
        amount: U256,
        context: &[u8],
    ) -> Result<U256, AdapterError>;

    /// Whether the adapter supports the given operation.
    fn supports(&self, op: LendingOp) -> bool;
}

/// Token movement port used by router primitives.
///
/// Abstracts the custody layer: pulling capital in, pushing value out, and
/// approving downstream protocols to spend.
pub trait TokenPort: Send + Sync {
    /// Move `amount` of `token` from `owner` into the execution context.
    fn pull(&self, token: Address, owner: Address, amount: U256) -> Result<U256, AdapterError>;

    /// Send `amount` of `token` from the execution context to `recipient`.
    fn push(&self, token: Address, recipient: Address, amount: U256) -> Result<(), AdapterError>;

    /// Authorize `spender` to take `amount` of `token` from the execution
    /// context.
    fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<(), AdapterError>;
}

/// Registry of protocol adapters keyed by the closed identifier set.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<ProtocolId, Arc<dyn ProtocolAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        AdapterRegistry {
            adapters: HashMap::new(),
        }
    }

    /// Register an adapter, replacing any previous one for the protocol.
    pub fn register(&mut self, protocol: ProtocolId, adapter: Arc<dyn ProtocolAdapter>) {
        if self.adapters.insert(protocol, adapter).is_some() {
            warn!("replacing registered adapter for {:?}", protocol);
        }
    }

    /// Look up the adapter for a protocol.
    pub fn get(&self, protocol: ProtocolId) -> Result<&Arc<dyn ProtocolAdapter>, AdapterError> {
        self.adapters
            .get(&protocol)
            .ok_or(AdapterError::UnknownProtocol(protocol))
    }

    pub fn is_registered(&self, protocol: ProtocolId) -> bool {
        self.adapters.contains_key(&protocol)
    }
}
