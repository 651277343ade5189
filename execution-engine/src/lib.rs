//! Execution engine for the looping core
//!
//! Runs ordered instruction lists against a per-chunk UTXO table and a
//! protocol adapter registry, and plans flash-loan funded chunks with
//! deterministic fee and repayment accounting.

pub mod config;
pub mod executor;
pub mod flashloan;
pub mod registry;
pub mod utxo;

// Re-export public types for convenience
pub use config::EngineConfig;
pub use executor::{ChunkOutcome, ExecutionError, ExecutionStatus, Executor, StepError};
pub use flashloan::{
    FlashLoanError, FlashLoanInfo, FlashLoanOrchestrator, FlashLoanPlan, FlashLoanProvider,
    LenderQuote,
};
pub use registry::{AdapterError, AdapterRegistry, ProtocolAdapter, TokenPort};
pub use utxo::{Utxo, UtxoError, UtxoTable};
