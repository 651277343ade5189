//! Settlement Flow
//!
//! Runs one chunk iteration of an order end to end: pre-hook, the
//! iteration's pre-instruction chunk, the iteration's post-instruction
//! chunk, post-hook. The swap between the two chunks belongs to the
//! external settlement network and is not modeled here.
//!
//! Iterations are logically independent and may settle in any wall-clock
//! order; instructions within one chunk are strictly ordered by the
//! executor.

use ethereum_types::H256;
use thiserror::Error;
use tracing::info;

use execution_engine::{ExecutionError, Executor};

use crate::hooks::{HookError, HookGate};
use crate::manager::{OrderError, OrderManager};

/// Failures settling one iteration. Hook and execution errors propagate
/// verbatim; nothing is retried or substituted here.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("order {order:?} has no iteration {iteration}")]
    MissingIteration { order: H256, iteration: usize },
}

/// Execute one iteration of a stored order.
///
/// The pre-hook and post-hook are invoked with the manager's own address:
/// the settlement network reaches this path only through the manager's
/// trampoline, never by calling the gate directly.
///
/// # Arguments
///
/// * `manager` - Order registry; also the only authorized hook caller
/// * `gate` - Hook security gate holding the funding binding
/// * `executor` - Chunk executor
/// * `order_hash` - Order to settle
/// * `iteration` - Zero-based iteration index
pub fn execute_iteration(
    manager: &OrderManager,
    gate: &mut HookGate,
    executor: &Executor,
    order_hash: H256,
    iteration: usize,
) -> Result<(), SettlementError> {
    let order = manager
        .get_order(order_hash)
        .ok_or(OrderError::UnknownOrder(order_hash))?;

    let pre_chunk = order.params.pre_instructions.get(iteration);
    let post_chunk = order.params.post_instructions.get(iteration);
    if pre_chunk.is_none() && post_chunk.is_none() {
        return Err(SettlementError::MissingIteration {
            order: order_hash,
            iteration,
        });
    }

    info!(order = ?order_hash, iteration, "settling iteration");
    gate.on_pre_hook(manager.address(), order)?;

    if let Some(chunk) = pre_chunk {
        executor.run_chunk(chunk)?;
    }
    // External swap/settlement happens between the chunks.
    if let Some(chunk) = post_chunk {
        executor.run_chunk(chunk)?;
    }

    gate.on_post_hook(manager.address(), order)?;
    info!(order = ?order_hash, iteration, "iteration settled");
    Ok(())
}
