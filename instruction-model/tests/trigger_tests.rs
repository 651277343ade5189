//! Tests for conditional trigger encoding and the price predicate
//!
//! Covers lossless round-trips, decimal normalization, trigger direction,
//! and the buy/sell authoritative-amount selection.

use ethereum_types::{Address, U256};

use instruction_model::{normalized_price, ConditionalTrigger, ProtocolId, TriggerCodecError};

fn addr(byte: u8) -> Address {
    Address::from([byte; 20])
}

fn wad(units: u64) -> U256 {
    U256::from(units) * U256::from(10u64).pow(U256::from(18u32))
}

fn sample_trigger() -> ConditionalTrigger {
    ConditionalTrigger {
        protocol: ProtocolId::AaveV3,
        protocol_context: vec![0x01, 0x02],
        sell_token: addr(0x11), // 18-decimals token
        buy_token: addr(0x22),  // 6-decimals token
        sell_decimals: 18,
        buy_decimals: 6,
        limit_price: wad(2_000), // 2000 buy per sell
        trigger_above_price: true,
        total_sell_amount: wad(10),
        total_buy_amount: U256::from(20_000_000_000u64), // 20_000 at 6 decimals
        num_chunks: 4,
        max_slippage_bps: 50,
        is_kind_buy: false,
    }
}

// ============================================================================
// CODEC
// ============================================================================

#[test]
fn trigger_round_trips() {
    let original = sample_trigger();
    let decoded = ConditionalTrigger::decode(&original.encode()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn trigger_round_trips_with_empty_context() {
    let mut original = sample_trigger();
    original.protocol_context = Vec::new();
    let decoded = ConditionalTrigger::decode(&original.encode()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn truncated_trigger_is_rejected() {
    let encoded = sample_trigger().encode();
    let err = ConditionalTrigger::decode(&encoded[..encoded.len() - 1]).unwrap_err();
    assert!(matches!(err, TriggerCodecError::Truncated { .. }));
}

#[test]
fn non_canonical_bool_is_rejected() {
    let mut encoded = sample_trigger().encode();
    let last = encoded.len() - 1; // is_kind_buy byte
    encoded[last] = 2;
    assert_eq!(
        ConditionalTrigger::decode(&encoded),
        Err(TriggerCodecError::InvalidBool(2))
    );
}

#[test]
fn zero_chunk_trigger_is_rejected() {
    let mut trigger = sample_trigger();
    trigger.num_chunks = 0;
    assert_eq!(
        ConditionalTrigger::decode(&trigger.encode()),
        Err(TriggerCodecError::ZeroChunks)
    );
}

// ============================================================================
// PRICE NORMALIZATION AND PREDICATE
// ============================================================================

#[test]
fn normalization_is_decimal_independent() {
    // Selling 1.0 of an 18-decimals token for 2500.0 of a 6-decimals token
    // is a price of 2500, same as the all-18-decimals equivalent.
    let mixed = normalized_price(
        U256::from(2_500_000_000u64), // 2500 at 6 decimals
        wad(1),
        18,
        6,
    )
    .unwrap();
    let uniform = normalized_price(wad(2_500), wad(1), 18, 18).unwrap();
    assert_eq!(mixed, uniform);
    assert_eq!(mixed, wad(2_500));
}

#[test]
fn empty_fill_has_no_price() {
    assert_eq!(normalized_price(wad(1), U256::zero(), 18, 18), None);
}

#[test]
fn overflowing_fill_has_no_price() {
    // The 1e36 numerator scaling cannot fit next to U256::MAX.
    assert_eq!(normalized_price(U256::MAX, wad(1), 18, 6), None);
}

#[test]
fn fires_above_limit_when_configured_above() {
    let trigger = sample_trigger();
    assert!(trigger.trigger_above_price);
    assert!(trigger.fires(wad(2_001)));
    assert!(!trigger.fires(wad(2_000))); // strict comparison at the limit
    assert!(!trigger.fires(wad(1_999)));
}

#[test]
fn fires_below_limit_when_configured_below() {
    let mut trigger = sample_trigger();
    trigger.trigger_above_price = false;
    assert!(trigger.fires(wad(1_999)));
    assert!(!trigger.fires(wad(2_000)));
    assert!(!trigger.fires(wad(2_001)));
}

#[test]
fn authoritative_amount_follows_order_kind() {
    let mut trigger = sample_trigger();
    assert_eq!(trigger.authoritative_amount(), trigger.total_sell_amount);
    trigger.is_kind_buy = true;
    assert_eq!(trigger.authoritative_amount(), trigger.total_buy_amount);
}

#[test]
fn chunk_amounts_divide_totals() {
    let trigger = sample_trigger();
    assert_eq!(trigger.chunk_sell_amount() * U256::from(4u32), wad(10) / 4 * 4);
    assert_eq!(
        trigger.chunk_buy_amount(),
        U256::from(5_000_000_000u64)
    );
}
