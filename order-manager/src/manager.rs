//! Order Manager
//!
//! Accepts order definitions from users, validates every embedded
//! instruction's user-binding (transitively through nested encodings),
//! and stores orders keyed by their deterministic hash. Also carries the
//! owner-restricted wiring of the external settlement collaborators.

use std::collections::HashMap;

use ethereum_types::{Address, H256, U256};
use instruction_model::{CodecError, Instruction};
use thiserror::Error;
use tracing::{debug, info};

use crate::hooks::HookGate;
use crate::order::{order_hash, Order, OrderParams};

/// Order creation and registry failures.
///
/// Validation errors are raised at creation time only and commit no
/// partial state; the client recovers by re-submitting corrected
/// instructions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("instruction user {found:?} does not match order creator {expected:?}")]
    InstructionUserMismatch { expected: Address, found: Address },

    #[error("order {0:?} already exists")]
    DuplicateOrder(H256),

    #[error("order {0:?} not found")]
    UnknownOrder(H256),

    #[error("caller is not the owner")]
    OnlyOwner,

    #[error("caller is not the order creator")]
    OnlyCreator,

    #[error("order {0:?} is funded for settlement and cannot be cancelled")]
    OrderFunded(H256),

    /// An embedded instruction cannot be encoded (oversized context).
    #[error("order contains an unencodable instruction: {0}")]
    Encoding(#[from] CodecError),
}

/// Registry and validation authority for orders.
pub struct OrderManager {
    /// The manager's own address: the only caller the hook gate accepts.
    address: Address,
    /// Configuration owner for settlement-collaborator wiring.
    owner: Address,
    orders: HashMap<H256, Order>,
    order_handler: Option<Address>,
    cow_adapter: Option<Address>,
}

impl OrderManager {
    pub fn new(address: Address, owner: Address) -> Self {
        OrderManager {
            address,
            owner,
            orders: HashMap::new(),
            order_handler: None,
            cow_adapter: None,
        }
    }

    /// The manager's address, used by the hook gate caller check.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Validate, hash, and store an order.
    ///
    /// Iterates pre-instruction sets then post-instruction sets,
    /// iteration-by-iteration, instruction-by-instruction, in encounter
    /// order; the first instruction whose embedded user differs from
    /// `params.user` aborts the whole creation and nothing is stored.
    ///
    /// # Arguments
    ///
    /// * `params` - Full order parameter set; `params.user` is the
    ///   authenticated creator
    /// * `salt` - Caller-chosen salt; same params with a new salt yield an
    ///   independent order
    /// * `seed_amount` - Initial capital attributed to the order
    ///
    /// # Returns
    ///
    /// * `Ok(H256)` - The stored order's hash
    /// * `Err(OrderError::InstructionUserMismatch)` - A foreign user is
    ///   embedded somewhere in the instruction sets
    /// * `Err(OrderError::DuplicateOrder)` - Same params and salt already
    ///   stored
    pub fn create_order(
        &mut self,
        params: OrderParams,
        salt: H256,
        seed_amount: U256,
    ) -> Result<H256, OrderError> {
        self.validate_instruction_users(&params)?;

        let hash = order_hash(&params, salt)?;
        if self.orders.contains_key(&hash) {
            return Err(OrderError::DuplicateOrder(hash));
        }

        info!(order = ?hash, user = ?params.user, "order created");
        self.orders.insert(
            hash,
            Order {
                hash,
                params,
                salt,
                seed_amount,
            },
        );
        Ok(hash)
    }

    /// Check every embedded user against the creator, in encounter order.
    fn validate_instruction_users(&self, params: &OrderParams) -> Result<(), OrderError> {
        for set in params.pre_instructions.iter().chain(&params.post_instructions) {
            for instruction in set {
                check_instruction_user(instruction, params.user)?;
            }
        }
        Ok(())
    }

    pub fn get_order(&self, hash: H256) -> Option<&Order> {
        self.orders.get(&hash)
    }

    pub fn contains(&self, hash: H256) -> bool {
        self.orders.contains_key(&hash)
    }

    /// Remove an unfunded order. Creator-only.
    ///
    /// A funded order is scoped to an in-flight settlement attempt and
    /// must not disappear under it.
    pub fn cancel_order(
        &mut self,
        caller: Address,
        hash: H256,
        gate: &HookGate,
    ) -> Result<(), OrderError> {
        let order = self.orders.get(&hash).ok_or(OrderError::UnknownOrder(hash))?;
        if caller != order.params.user {
            return Err(OrderError::OnlyCreator);
        }
        if gate.expected_order_hash() == Some(hash) {
            return Err(OrderError::OrderFunded(hash));
        }
        self.orders.remove(&hash);
        info!(order = ?hash, "order cancelled");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Owner-restricted settlement wiring (not on the hot path)
    // ------------------------------------------------------------------

    pub fn set_order_handler(&mut self, caller: Address, handler: Address) -> Result<(), OrderError> {
        self.only_owner(caller)?;
        debug!(?handler, "order handler configured");
        self.order_handler = Some(handler);
        Ok(())
    }

    pub fn set_cow_adapter(&mut self, caller: Address, adapter: Address) -> Result<(), OrderError> {
        self.only_owner(caller)?;
        debug!(?adapter, "cow adapter configured");
        self.cow_adapter = Some(adapter);
        Ok(())
    }

    pub fn order_handler(&self) -> Option<Address> {
        self.order_handler
    }

    pub fn cow_adapter(&self) -> Option<Address> {
        self.cow_adapter
    }

    fn only_owner(&self, caller: Address) -> Result<(), OrderError> {
        if caller != self.owner {
            return Err(OrderError::OnlyOwner);
        }
        Ok(())
    }
}

/// Validate one instruction's embedded user, recursing into a nested
/// encoded instruction when the context decodes as one.
///
/// Lending instructions bind `user`; router PullToken/PushToken bind the
/// owner/recipient; Approve and Add carry no binding. A protocol
/// instruction's context may itself encode an instruction for composite
/// adapters, and a foreign user must not hide there either.
fn check_instruction_user(instruction: &Instruction, expected: Address) -> Result<(), OrderError> {
    if let Some(found) = instruction.owner() {
        if found != expected {
            return Err(OrderError::InstructionUserMismatch { expected, found });
        }
    }
    if let Instruction::Protocol(protocol_instruction) = instruction {
        if let Ok(nested) = Instruction::decode(&protocol_instruction.context) {
            check_instruction_user(&nested, expected)?;
        }
    }
    Ok(())
}
