//! Flash Loan Orchestration
//!
//! Selects a lender from ranked liquidity quotes, computes the provider fee
//! deterministically (integer division rounded up, so the repay amount is
//! never short), and fixes the repayment UTXO index before the chunk is
//! built. The planner wraps a chunk body with the loan arrival and the
//! final repayment push.

use ethereum_types::{Address, U256};
use instruction_model::{InputRef, Instruction, RouterInstruction, RouterOp};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::EngineConfig;

/// Basis-point denominator shared by fee and buffer math.
pub const BPS_DENOMINATOR: u64 = 10_000;

// ============================================================================
// PROVIDERS AND QUOTES
// ============================================================================

/// Supported flash loan capital sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlashLoanProvider {
    BalancerV2,
    BalancerV3,
    AaveV3,
    MorphoBlue,
}

impl FlashLoanProvider {
    /// Default fee in basis points, matching each capital source's fee
    /// model. Balancer V3 governance can turn a fee on, which is why the
    /// engine config carries per-provider overrides.
    pub fn default_fee_bps(self) -> u32 {
        match self {
            FlashLoanProvider::BalancerV2 => 0,
            FlashLoanProvider::BalancerV3 => 0,
            FlashLoanProvider::AaveV3 => 9,
            FlashLoanProvider::MorphoBlue => 0,
        }
    }
}

/// One lender's available depth for a token, as reported by the liquidity
/// source ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LenderQuote {
    pub lender: Address,
    pub provider: FlashLoanProvider,
    pub available: U256,
}

/// A selected flash loan: lender, provider, principal, and the exact fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashLoanInfo {
    pub lender: Address,
    pub provider: FlashLoanProvider,
    pub token: Address,
    pub amount: U256,
    pub fee: U256,
}

impl FlashLoanInfo {
    /// Principal plus fee: the amount the repayment UTXO must carry.
    pub fn repay_amount(&self) -> U256 {
        self.amount + self.fee
    }
}

/// A flash-loan funded chunk with its repayment index fixed up front.
///
/// The loan arrival is UTXO 0; the chunk body is written against that. The
/// repayment index names the body UTXO pushed back to the lender as the
/// final instruction and is never recomputed mid-run.
#[derive(Debug, Clone)]
pub struct FlashLoanPlan {
    pub info: FlashLoanInfo,
    pub repayment_utxo_index: u16,
    pub instructions: Vec<Instruction>,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlashLoanError {
    /// No provider has sufficient depth. The orchestrator never silently
    /// picks an insufficient lender.
    #[error("no flash loan liquidity for {amount} of token {token:?}")]
    NoLiquidity { token: Address, amount: U256 },

    #[error("repayment index must be a concrete UTXO index")]
    InvalidRepaymentIndex,

    #[error("fee computation overflowed")]
    AmountOverflow,
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// Lender selection, fee accounting, and chunk planning.
pub struct FlashLoanOrchestrator {
    config: EngineConfig,
}

impl FlashLoanOrchestrator {
    pub fn new(config: EngineConfig) -> Self {
        FlashLoanOrchestrator { config }
    }

    /// Effective fee rate for a provider, config override first.
    pub fn fee_bps(&self, provider: FlashLoanProvider) -> u32 {
        self.config
            .provider_fee_override(provider)
            .unwrap_or_else(|| provider.default_fee_bps())
    }

    /// Deterministic fee: `ceil(amount * bps / 10_000)`.
    ///
    /// Rounding up matches the capital sources' own accounting, so the
    /// repay amount is never short by a rounding step.
    pub fn compute_fee(
        &self,
        provider: FlashLoanProvider,
        amount: U256,
    ) -> Result<U256, FlashLoanError> {
        ceil_bps_product(amount, self.fee_bps(provider))
    }

    /// Select a lender for `amount` of `token` from ranked quotes.
    ///
    /// Zero-fee providers with sufficient depth win; otherwise the first
    /// quote with sufficient depth is taken in ranking order.
    ///
    /// # Returns
    ///
    /// * `Ok(FlashLoanInfo)` - Selected lender with the fee precomputed
    /// * `Err(FlashLoanError::NoLiquidity)` - No quote covers the amount
    pub fn select_lender(
        &self,
        token: Address,
        amount: U256,
        quotes: &[LenderQuote],
    ) -> Result<FlashLoanInfo, FlashLoanError> {
        let sufficient = |quote: &&LenderQuote| quote.available >= amount;

        let chosen = quotes
            .iter()
            .filter(sufficient)
            .find(|quote| self.fee_bps(quote.provider) == 0)
            .or_else(|| quotes.iter().find(sufficient))
            .ok_or(FlashLoanError::NoLiquidity { token, amount })?;

        let fee = self.compute_fee(chosen.provider, amount)?;
        info!(
            provider = ?chosen.provider,
            lender = ?chosen.lender,
            %amount,
            %fee,
            "selected flash loan lender"
        );
        Ok(FlashLoanInfo {
            lender: chosen.lender,
            provider: chosen.provider,
            token,
            amount,
            fee,
        })
    }

    /// Max-repayment amount inflated by the configured dust buffer, to
    /// absorb interest accrual between quote and execution. The excess is
    /// refunded by a trailing push in the chunk body.
    pub fn buffered_amount(&self, amount: U256) -> Result<U256, FlashLoanError> {
        ceil_bps_product(amount, BPS_DENOMINATOR as u32 + self.config.dust_buffer_bps)
    }

    /// Wrap a chunk body with the loan arrival and repayment.
    ///
    /// Prepends the pull that lands the loan as UTXO 0 and appends the
    /// repayment push consuming `repayment_utxo_index`. The body is
    /// written against the loan being UTXO 0, so body indices need no
    /// shifting here.
    ///
    /// # Arguments
    ///
    /// * `info` - The selected loan
    /// * `body` - Chunk body instructions
    /// * `repayment_utxo_index` - Body UTXO that carries principal + fee;
    ///   fixed here, before execution starts
    pub fn plan_chunk(
        &self,
        info: FlashLoanInfo,
        body: Vec<Instruction>,
        repayment_utxo_index: InputRef,
    ) -> Result<FlashLoanPlan, FlashLoanError> {
        let repayment_index = repayment_utxo_index
            .as_index()
            .ok_or(FlashLoanError::InvalidRepaymentIndex)?;

        let mut instructions = Vec::with_capacity(body.len() + 2);
        instructions.push(Instruction::Router(RouterInstruction {
            op: RouterOp::PullToken,
            token: info.token,
            user: info.lender,
            amount: info.amount,
            input: InputRef::NONE,
            second_input: InputRef::NONE,
        }));
        instructions.extend(body);
        instructions.push(Instruction::Router(RouterInstruction {
            op: RouterOp::PushToken,
            token: info.token,
            user: info.lender,
            amount: info.repay_amount(),
            input: InputRef::index(repayment_index),
            second_input: InputRef::NONE,
        }));

        debug!(
            repayment_index,
            instructions = instructions.len(),
            "planned flash loan chunk"
        );
        Ok(FlashLoanPlan {
            info,
            repayment_utxo_index: repayment_index,
            instructions,
        })
    }
}

/// `ceil(amount * bps / 10_000)` with overflow reported, not panicked.
fn ceil_bps_product(amount: U256, bps: u32) -> Result<U256, FlashLoanError> {
    let product = amount
        .checked_mul(U256::from(bps))
        .ok_or(FlashLoanError::AmountOverflow)?;
    let denominator = U256::from(BPS_DENOMINATOR);
    let rounded = product
        .checked_add(denominator - U256::one())
        .ok_or(FlashLoanError::AmountOverflow)?;
    Ok(rounded / denominator)
}
