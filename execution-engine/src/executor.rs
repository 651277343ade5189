//! Instruction Executor
//!
//! Runs an ordered instruction list against a fresh per-chunk UTXO table
//! and the protocol adapter registry. Execution is strictly in list order,
//! all-or-nothing: the first failing instruction aborts the chunk and no
//! partial outcome is returned. The ledger environment this engine targets
//! guarantees that external effects of an aborted chunk are rolled back
//! with it.

use std::sync::Arc;

use ethereum_types::{Address, U256};
use instruction_model::{Instruction, ProtocolInstruction, RouterInstruction, RouterOp};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::registry::{AdapterError, AdapterRegistry, TokenPort};
use crate::utxo::{Utxo, UtxoError, UtxoTable};

// ============================================================================
// STATUS AND OUTCOME
// ============================================================================

/// Chunk execution state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Idle,
    Running,
    Success,
    Reverted,
}

/// Result of a successfully executed chunk.
#[derive(Debug, Clone)]
pub struct ChunkOutcome {
    pub status: ExecutionStatus,
    /// Number of UTXOs produced over the chunk.
    pub produced: usize,
    /// Entries left unconsumed at chunk end, with their indices. A clean
    /// chunk consumes everything it produces.
    pub leftovers: Vec<(u16, Utxo)>,
}

// ============================================================================
// ERRORS
// ============================================================================

/// Failure of a single instruction.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Utxo(#[from] UtxoError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("{op} requires an input UTXO")]
    MissingInput { op: &'static str },

    #[error("PullToken defines a fresh amount and must not reference an input UTXO")]
    UnexpectedInput,

    #[error("cannot merge UTXOs of different tokens ({first:?} vs {second:?})")]
    MergeTokenMismatch { first: Address, second: Address },

    #[error("input UTXO token {found:?} does not match instruction token {expected:?}")]
    InputTokenMismatch { expected: Address, found: Address },

    #[error("input UTXO carries {found}, below the required push amount {required}")]
    InsufficientInputAmount { required: U256, found: U256 },

    #[error("UTXO amount overflow while merging")]
    AmountOverflow,
}

/// Chunk-level failure. Any step error reverts the whole chunk.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("chunk has {count} instructions, configured limit is {limit}")]
    TooManyInstructions { count: usize, limit: usize },

    #[error("chunk reverted at instruction {index}: {source}")]
    Step {
        index: usize,
        #[source]
        source: StepError,
    },
}

// ============================================================================
// EXECUTOR
// ============================================================================

/// Executes instruction chunks against the adapter registry and token port.
pub struct Executor {
    registry: AdapterRegistry,
    port: Arc<dyn TokenPort>,
    config: EngineConfig,
}

impl Executor {
    pub fn new(registry: AdapterRegistry, port: Arc<dyn TokenPort>, config: EngineConfig) -> Self {
        Executor {
            registry,
            port,
            config,
        }
    }

    /// Execute one chunk: a fresh UTXO table, strict list order, no partial
    /// application.
    ///
    /// # Returns
    ///
    /// * `Ok(ChunkOutcome)` - Every instruction applied; status is `Success`
    /// * `Err(ExecutionError)` - The chunk reverted; nothing is applied
    pub fn run_chunk(&self, instructions: &[Instruction]) -> Result<ChunkOutcome, ExecutionError> {
        if instructions.len() > self.config.max_instructions_per_chunk {
            return Err(ExecutionError::TooManyInstructions {
                count: instructions.len(),
                limit: self.config.max_instructions_per_chunk,
            });
        }

        info!(instructions = instructions.len(), "executing chunk");
        let mut table = UtxoTable::new();

        for (index, instruction) in instructions.iter().enumerate() {
            let result = match instruction {
                Instruction::Protocol(instr) => self.run_protocol(instr, &mut table),
                Instruction::Router(instr) => self.run_router(instr, &mut table),
            };
            if let Err(source) = result {
                warn!(index, status = ?ExecutionStatus::Reverted, error = %source, "chunk reverted");
                return Err(ExecutionError::Step { index, source });
            }
        }

        let leftovers = table.live_entries();
        if !leftovers.is_empty() {
            debug!(leftovers = leftovers.len(), "chunk left unconsumed UTXOs");
        }
        info!(produced = table.len(), "chunk complete");

        Ok(ChunkOutcome {
            status: ExecutionStatus::Success,
            produced: table.len(),
            leftovers,
        })
    }

    /// Dispatch a lending instruction to its protocol adapter.
    ///
    /// The operation amount comes from the input UTXO when one is
    /// referenced, else from the instruction's literal amount. Operations
    /// that hand value back (Withdraw/Borrow family) append a new UTXO.
    fn run_protocol(
        &self,
        instr: &ProtocolInstruction,
        table: &mut UtxoTable,
    ) -> Result<(), StepError> {
        let adapter = self.registry.get(instr.protocol)?;
        if !adapter.supports(instr.op) {
            return Err(AdapterError::UnsupportedOp {
                protocol: instr.protocol,
                op: instr.op,
            }
            .into());
        }

        let amount = match instr.input.as_index() {
            Some(index) => {
                let utxo = table.consume(index)?;
                if utxo.token != instr.token {
                    return Err(StepError::InputTokenMismatch {
                        expected: instr.token,
                        found: utxo.token,
                    });
                }
                utxo.amount
            }
            None => instr.amount,
        };

        debug!(protocol = ?instr.protocol, op = ?instr.op, %amount, "lending op");
        let produced = adapter.execute(instr.op, instr.token, instr.user, amount, &instr.context)?;

        if instr.op.produces_output() && !produced.is_zero() {
            table.produce(instr.token, produced)?;
        }
        Ok(())
    }

    /// Apply a router primitive to the UTXO table.
    fn run_router(
        &self,
        instr: &RouterInstruction,
        table: &mut UtxoTable,
    ) -> Result<(), StepError> {
        debug!(op = ?instr.op, "router op");
        match instr.op {
            RouterOp::PullToken => {
                // Fresh amount by definition: an input reference here is a
                // malformed instruction, not a no-op.
                if instr.input.as_index().is_some() {
                    return Err(StepError::UnexpectedInput);
                }
                let pulled = self.port.pull(instr.token, instr.user, instr.amount)?;
                table.produce(instr.token, pulled)?;
            }
            RouterOp::PushToken => {
                let index = instr
                    .input
                    .as_index()
                    .ok_or(StepError::MissingInput { op: "PushToken" })?;
                let utxo = table.consume(index)?;
                if utxo.token != instr.token {
                    return Err(StepError::InputTokenMismatch {
                        expected: instr.token,
                        found: utxo.token,
                    });
                }
                // A nonzero instruction amount is a floor (a flash loan
                // repayment names principal + fee here); pushing less
                // would short the recipient.
                if !instr.amount.is_zero() && utxo.amount < instr.amount {
                    return Err(StepError::InsufficientInputAmount {
                        required: instr.amount,
                        found: utxo.amount,
                    });
                }
                self.port.push(utxo.token, instr.user, utxo.amount)?;
            }
            RouterOp::Approve => {
                // Reads the entry without consuming it: the downstream
                // protocol pull is what consumes the value.
                let index = instr
                    .input
                    .as_index()
                    .ok_or(StepError::MissingInput { op: "Approve" })?;
                let utxo = table.peek(index)?;
                self.port.approve(utxo.token, instr.user, utxo.amount)?;
            }
            RouterOp::Add => {
                let first_index = instr
                    .input
                    .as_index()
                    .ok_or(StepError::MissingInput { op: "Add" })?;
                let second_index = instr
                    .second_input
                    .as_index()
                    .ok_or(StepError::MissingInput { op: "Add" })?;
                let first = table.consume(first_index)?;
                let second = table.consume(second_index)?;
                if first.token != second.token {
                    return Err(StepError::MergeTokenMismatch {
                        first: first.token,
                        second: second.token,
                    });
                }
                let sum = first
                    .amount
                    .checked_add(second.amount)
                    .ok_or(StepError::AmountOverflow)?;
                table.produce(first.token, sum)?;
            }
        }
        Ok(())
    }
}
