//! Hook Security Gate
//!
//! Binds an expected order hash at funding time and enforces it at
//! pre/post hook time. The gate is the only trusted signal of "we are
//! inside the expected settlement window": protocol calls may re-enter,
//! so call-stack position is never trusted. This is what prevents a
//! hostile settlement actor from executing, funding, or hooking one
//! user's order with another user's capital or context.

use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use execution_engine::{AdapterError, TokenPort};

use crate::order::Order;

/// Gate lifecycle: funding opens a settlement window for exactly one
/// order hash; post-hook completion closes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatePhase {
    Unfunded,
    Funded,
    PreHookRun,
    PostHookRun,
}

/// Authorization failures at hook time.
///
/// These are security signals: they surface verbatim to the settlement
/// network and are never silently swallowed. Recovery is re-funding
/// correctly before retrying.
#[derive(Debug, Error)]
pub enum HookError {
    /// Hooks are callable only by the order manager, never directly by
    /// the settlement network or any other actor.
    #[error("hooks are callable only by the order manager")]
    OnlyOrderManager,

    /// The funded hash does not cover this order (or nothing is funded).
    #[error("order {got:?} does not match the funded order {expected:?}")]
    OrderMismatch { expected: Option<H256>, got: H256 },

    /// Post-hook invoked without its pre-hook in the current window.
    #[error("post-hook called before pre-hook for order {0:?}")]
    HookOutOfOrder(H256),

    /// Pulling the funding capital failed.
    #[error("funding transfer failed: {0}")]
    Funding(#[from] AdapterError),
}

/// Capital pulled in for one settlement attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Funding {
    pub token: Address,
    pub from: Address,
    pub amount: U256,
}

/// Per-execution gate state. Single-writer: only the order manager's
/// settlement path drives it.
pub struct HookGate {
    /// The only address allowed to invoke the hooks.
    order_manager: Address,
    expected_order_hash: Option<H256>,
    funding: Option<Funding>,
    phase: GatePhase,
}

impl HookGate {
    pub fn new(order_manager: Address) -> Self {
        HookGate {
            order_manager,
            expected_order_hash: None,
            funding: None,
            phase: GatePhase::Unfunded,
        }
    }

    pub fn phase(&self) -> GatePhase {
        self.phase
    }

    /// The hash funded for the current settlement window, if any.
    pub fn expected_order_hash(&self) -> Option<H256> {
        self.expected_order_hash
    }

    pub fn funding(&self) -> Option<&Funding> {
        self.funding.as_ref()
    }

    /// Fund a settlement attempt: pull `amount` of `token` from `from`
    /// and bind the expected order hash.
    ///
    /// Callable whenever capital is available; refunding rebinds the
    /// window to the new hash (a funding is scoped to a single attempt
    /// and is not reusable across orders).
    pub fn fund_order(
        &mut self,
        order_hash: H256,
        token: Address,
        from: Address,
        amount: U256,
        port: &dyn TokenPort,
    ) -> Result<(), HookError> {
        port.pull(token, from, amount)?;
        info!(order = ?order_hash, %amount, "order funded");
        self.expected_order_hash = Some(order_hash);
        self.funding = Some(Funding {
            token,
            from,
            amount,
        });
        self.phase = GatePhase::Funded;
        Ok(())
    }

    /// Pre-execution hook for one chunk of `order`.
    ///
    /// # Arguments
    ///
    /// * `caller` - Must be the order manager
    /// * `order` - The order being settled
    ///
    /// # Returns
    ///
    /// * `Err(HookError::OnlyOrderManager)` - Foreign caller, regardless
    ///   of order state
    /// * `Err(HookError::OrderMismatch)` - Flash-loan order whose hash is
    ///   not the funded one (or nothing funded)
    pub fn on_pre_hook(&mut self, caller: Address, order: &Order) -> Result<(), HookError> {
        self.only_order_manager(caller)?;
        self.require_funded_for(order)?;
        if order.params.is_flash_loan_order {
            self.phase = GatePhase::PreHookRun;
        }
        info!(order = ?order.hash, "pre-hook accepted");
        Ok(())
    }

    /// Post-execution hook for one chunk of `order`. Completing it closes
    /// the settlement window and resets the gate to `Unfunded`.
    pub fn on_post_hook(&mut self, caller: Address, order: &Order) -> Result<(), HookError> {
        self.only_order_manager(caller)?;
        self.require_funded_for(order)?;
        if order.params.is_flash_loan_order {
            if self.phase != GatePhase::PreHookRun {
                return Err(HookError::HookOutOfOrder(order.hash));
            }
            // The funded capital is consumed with this chunk; close the
            // window so the funding cannot be replayed for another attempt.
            self.reset();
        }
        info!(order = ?order.hash, "post-hook accepted");
        Ok(())
    }

    fn only_order_manager(&self, caller: Address) -> Result<(), HookError> {
        if caller != self.order_manager {
            warn!(?caller, "hook call from foreign address refused");
            return Err(HookError::OnlyOrderManager);
        }
        Ok(())
    }

    /// Flash-loan orders must be the funded order, exactly. Non-flash
    /// orders have no funding step, so there is nothing to compare
    /// against (legacy path).
    fn require_funded_for(&self, order: &Order) -> Result<(), HookError> {
        if !order.params.is_flash_loan_order {
            return Ok(());
        }
        if self.expected_order_hash != Some(order.hash) {
            warn!(
                expected = ?self.expected_order_hash,
                got = ?order.hash,
                "hook refused: order hash not funded"
            );
            return Err(HookError::OrderMismatch {
                expected: self.expected_order_hash,
                got: order.hash,
            });
        }
        Ok(())
    }

    /// Close the settlement window once the funded capital is consumed.
    fn reset(&mut self) {
        self.expected_order_hash = None;
        self.funding = None;
        self.phase = GatePhase::Unfunded;
    }
}
