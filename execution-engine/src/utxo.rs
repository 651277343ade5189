//! Per-Chunk UTXO Table
//!
//! An append-only ordered table of `(token, amount)` values produced during
//! one chunk execution. Entries are consumed exactly once by index;
//! consuming an unknown, future, or already-spent index fails closed. The
//! table is created empty per chunk and dropped at chunk end — it is never
//! persisted across iterations or transactions.

use ethereum_types::{Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An intermediate value produced mid-execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub token: Address,
    pub amount: U256,
}

/// Failures resolving a UTXO index.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UtxoError {
    /// The index was never produced in this chunk (stale or forward
    /// reference).
    #[error("UTXO index {index} does not exist (table has {len} entries)")]
    UnknownIndex { index: u16, len: usize },

    /// The index was produced but already consumed by an earlier
    /// instruction.
    #[error("UTXO index {index} was already consumed")]
    AlreadyConsumed { index: u16 },

    /// The table reached the maximum addressable size.
    #[error("UTXO table is full")]
    TableFull,
}

#[derive(Debug, Clone)]
struct Slot {
    utxo: Utxo,
    consumed: bool,
}

/// Append-only table of produced values, consumed by index.
#[derive(Debug, Default)]
pub struct UtxoTable {
    slots: Vec<Slot>,
}

impl UtxoTable {
    /// Indices at and above the input-reference sentinel are not
    /// addressable, so the table caps just below it.
    pub const MAX_ENTRIES: usize = u16::MAX as usize;

    pub fn new() -> Self {
        UtxoTable { slots: Vec::new() }
    }

    /// Append a produced value and return its index.
    pub fn produce(&mut self, token: Address, amount: U256) -> Result<u16, UtxoError> {
        if self.slots.len() >= Self::MAX_ENTRIES {
            return Err(UtxoError::TableFull);
        }
        let index = self.slots.len() as u16;
        self.slots.push(Slot {
            utxo: Utxo { token, amount },
            consumed: false,
        });
        Ok(index)
    }

    /// Consume the entry at `index`, invalidating it for the rest of the
    /// chunk.
    ///
    /// # Returns
    ///
    /// * `Ok(Utxo)` - The consumed value
    /// * `Err(UtxoError)` - Unknown or already-consumed index
    pub fn consume(&mut self, index: u16) -> Result<Utxo, UtxoError> {
        let len = self.slots.len();
        let slot = self
            .slots
            .get_mut(index as usize)
            .ok_or(UtxoError::UnknownIndex { index, len })?;
        if slot.consumed {
            return Err(UtxoError::AlreadyConsumed { index });
        }
        slot.consumed = true;
        Ok(slot.utxo)
    }

    /// Read the entry at `index` without consuming it.
    pub fn peek(&self, index: u16) -> Result<Utxo, UtxoError> {
        let len = self.slots.len();
        let slot = self
            .slots
            .get(index as usize)
            .ok_or(UtxoError::UnknownIndex { index, len })?;
        if slot.consumed {
            return Err(UtxoError::AlreadyConsumed { index });
        }
        Ok(slot.utxo)
    }

    /// Total number of entries ever produced in this chunk.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Entries produced but not yet consumed, with their indices.
    pub fn live_entries(&self) -> Vec<(u16, Utxo)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.consumed)
            .map(|(i, slot)| (i as u16, slot.utxo))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::from([byte; 20])
    }

    #[test]
    fn produce_then_consume() {
        let mut table = UtxoTable::new();
        let index = table.produce(addr(1), U256::from(100u64)).unwrap();
        assert_eq!(index, 0);
        let utxo = table.consume(index).unwrap();
        assert_eq!(utxo.amount, U256::from(100u64));
        assert_eq!(utxo.token, addr(1));
    }

    #[test]
    fn double_consume_fails_closed() {
        let mut table = UtxoTable::new();
        let index = table.produce(addr(1), U256::from(100u64)).unwrap();
        table.consume(index).unwrap();
        assert_eq!(
            table.consume(index),
            Err(UtxoError::AlreadyConsumed { index })
        );
    }

    #[test]
    fn forward_reference_fails_closed() {
        let mut table = UtxoTable::new();
        assert_eq!(
            table.consume(0),
            Err(UtxoError::UnknownIndex { index: 0, len: 0 })
        );
    }

    #[test]
    fn live_entries_track_consumption() {
        let mut table = UtxoTable::new();
        table.produce(addr(1), U256::from(1u64)).unwrap();
        let second = table.produce(addr(2), U256::from(2u64)).unwrap();
        table.consume(second).unwrap();
        let live = table.live_entries();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].0, 0);
    }
}
