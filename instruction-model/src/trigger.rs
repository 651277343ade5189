//! Conditional Trigger Parameters
//!
//! Encode/decode for the price-trigger tuple that gates conditional order
//! instantiation, plus the comparison predicate. The trigger itself is
//! evaluated externally against an oracle price; this module only defines
//! the immutable parameter encoding and the normalized comparison.

use ethereum_types::{Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::instruction::ProtocolId;

/// Prices are compared at a fixed 1e18 scale, independent of token decimals.
pub const PRICE_SCALE: u32 = 18;

/// Wire tag for an encoded trigger tuple.
pub const TAG_TRIGGER: u8 = 0x03;

/// Failures decoding or constructing a trigger tuple.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TriggerCodecError {
    #[error("truncated trigger encoding: needed {needed} more bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("unknown trigger tag 0x{0:02x}")]
    UnknownTag(u8),

    #[error("unknown protocol code {0}")]
    UnknownProtocol(u8),

    #[error("invalid boolean byte 0x{0:02x}")]
    InvalidBool(u8),

    #[error("trigger must split into at least one chunk")]
    ZeroChunks,

    #[error("{0} trailing bytes after trigger")]
    TrailingBytes(usize),
}

/// Immutable price-trigger parameters for a conditional order.
///
/// `limit_price` is a 1e18-scaled buy-per-sell price; see
/// [`normalized_price`] for how observed prices are brought to the same
/// scale before comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalTrigger {
    pub protocol: ProtocolId,
    /// Opaque protocol context forwarded to the instantiated order.
    #[serde(with = "hex_vec")]
    pub protocol_context: Vec<u8>,
    pub sell_token: Address,
    pub buy_token: Address,
    pub sell_decimals: u8,
    pub buy_decimals: u8,
    /// 1e18-scaled limit price (buy units per sell unit).
    pub limit_price: U256,
    /// Fire when the observed price is above the limit; below otherwise.
    pub trigger_above_price: bool,
    pub total_sell_amount: U256,
    pub total_buy_amount: U256,
    pub num_chunks: u32,
    pub max_slippage_bps: u16,
    /// Buy-kind orders treat `total_buy_amount` as authoritative (exact
    /// receive); sell-kind orders treat `total_sell_amount` (max spend).
    pub is_kind_buy: bool,
}

impl ConditionalTrigger {
    /// Whether the trigger fires at the given 1e18-scaled observed price.
    pub fn fires(&self, observed_price: U256) -> bool {
        if self.trigger_above_price {
            observed_price > self.limit_price
        } else {
            observed_price < self.limit_price
        }
    }

    /// The quantity that slippage checks are anchored to.
    pub fn authoritative_amount(&self) -> U256 {
        if self.is_kind_buy {
            self.total_buy_amount
        } else {
            self.total_sell_amount
        }
    }

    /// Per-chunk sell amount (floor; the final chunk also settles the
    /// division remainder).
    pub fn chunk_sell_amount(&self) -> U256 {
        self.total_sell_amount / U256::from(self.num_chunks)
    }

    /// Per-chunk buy amount (floor; the final chunk also settles the
    /// division remainder).
    pub fn chunk_buy_amount(&self) -> U256 {
        self.total_buy_amount / U256::from(self.num_chunks)
    }

    /// Encode to the self-describing binary layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 1 + 4 + self.protocol_context.len() + 20 + 20 + 2 + 32 + 1 + 32 + 32 + 4 + 2 + 1);
        out.push(TAG_TRIGGER);
        out.push(self.protocol.code());
        out.extend_from_slice(&(self.protocol_context.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.protocol_context);
        out.extend_from_slice(self.sell_token.as_bytes());
        out.extend_from_slice(self.buy_token.as_bytes());
        out.push(self.sell_decimals);
        out.push(self.buy_decimals);
        out.extend_from_slice(&u256_be(self.limit_price));
        out.push(self.trigger_above_price as u8);
        out.extend_from_slice(&u256_be(self.total_sell_amount));
        out.extend_from_slice(&u256_be(self.total_buy_amount));
        out.extend_from_slice(&self.num_chunks.to_be_bytes());
        out.extend_from_slice(&self.max_slippage_bps.to_be_bytes());
        out.push(self.is_kind_buy as u8);
        out
    }

    /// Decode from the binary layout produced by [`encode`](Self::encode).
    ///
    /// Rejects trailing bytes, non-canonical booleans, and a zero chunk
    /// count (a trigger that can never settle).
    pub fn decode(bytes: &[u8]) -> Result<Self, TriggerCodecError> {
        let mut r = Reader { bytes, pos: 0 };
        let tag = r.take_u8()?;
        if tag != TAG_TRIGGER {
            return Err(TriggerCodecError::UnknownTag(tag));
        }
        let protocol = ProtocolId::from_code(r.take_u8()?)
            .map_err(|_| TriggerCodecError::UnknownProtocol(bytes[1]))?;
        let context_len = r.take_u32()? as usize;
        let protocol_context = r.take(context_len)?.to_vec();
        let sell_token = Address::from_slice(r.take(20)?);
        let buy_token = Address::from_slice(r.take(20)?);
        let sell_decimals = r.take_u8()?;
        let buy_decimals = r.take_u8()?;
        let limit_price = U256::from_big_endian(r.take(32)?);
        let trigger_above_price = r.take_bool()?;
        let total_sell_amount = U256::from_big_endian(r.take(32)?);
        let total_buy_amount = U256::from_big_endian(r.take(32)?);
        let num_chunks = r.take_u32()?;
        let max_slippage_bps = r.take_u16()?;
        let is_kind_buy = r.take_bool()?;

        if r.remaining() != 0 {
            return Err(TriggerCodecError::TrailingBytes(r.remaining()));
        }
        if num_chunks == 0 {
            return Err(TriggerCodecError::ZeroChunks);
        }

        Ok(ConditionalTrigger {
            protocol,
            protocol_context,
            sell_token,
            buy_token,
            sell_decimals,
            buy_decimals,
            limit_price,
            trigger_above_price,
            total_sell_amount,
            total_buy_amount,
            num_chunks,
            max_slippage_bps,
            is_kind_buy,
        })
    }
}

/// Normalize an observed fill (buy amount received per sell amount spent)
/// to the common 1e18 price scale, so prices compare regardless of token
/// decimal scale.
///
/// # Arguments
///
/// * `buy_amount` - Buy-token base units received
/// * `sell_amount` - Sell-token base units spent
/// * `sell_decimals` / `buy_decimals` - Token decimal scales
///
/// # Returns
///
/// `buy_amount * 10^(18 + sell_decimals - buy_decimals) / sell_amount`,
/// computed without intermediate truncation. `None` for an empty fill
/// (zero `sell_amount`) or when the scaled numerator overflows; an
/// unpriceable fill never matches a trigger.
pub fn normalized_price(
    buy_amount: U256,
    sell_amount: U256,
    sell_decimals: u8,
    buy_decimals: u8,
) -> Option<U256> {
    let scale = U256::from(10u64).checked_pow(U256::from(PRICE_SCALE + sell_decimals as u32))?;
    let denom_scale = U256::from(10u64).checked_pow(U256::from(buy_decimals as u32))?;
    let numerator = buy_amount.checked_mul(scale)?;
    let denominator = sell_amount.checked_mul(denom_scale)?;
    numerator.checked_div(denominator)
}

fn u256_be(value: U256) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    bytes
}

/// Minimal checked reader, local to the trigger layout.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], TriggerCodecError> {
        if self.remaining() < n {
            return Err(TriggerCodecError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_u8(&mut self) -> Result<u8, TriggerCodecError> {
        Ok(self.take(1)?[0])
    }

    fn take_u16(&mut self) -> Result<u16, TriggerCodecError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn take_u32(&mut self) -> Result<u32, TriggerCodecError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn take_bool(&mut self) -> Result<bool, TriggerCodecError> {
        match self.take_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(TriggerCodecError::InvalidBool(other)),
        }
    }
}

/// Hex (de)serialization for the opaque context field.
mod hex_vec {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
