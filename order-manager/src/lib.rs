//! Order management library for the looping core
//!
//! Accepts order definitions, validates every embedded instruction's
//! user-binding, stores orders by deterministic hash, and guards the
//! settlement-network hook path with the funding-bound security gate.

pub mod hooks;
pub mod manager;
pub mod order;
pub mod settlement;

// Re-export public types for convenience
pub use hooks::{GatePhase, HookError, HookGate};
pub use manager::{OrderError, OrderManager};
pub use order::{order_hash, Completion, InstructionSet, Order, OrderParams};
pub use settlement::{execute_iteration, SettlementError};
