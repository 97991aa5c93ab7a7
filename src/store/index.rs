use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::models::{Address, Transaction};

/// Append-only per-address log of matched transactions
#[derive(Debug, Default)]
pub struct TransactionIndex {
    entries: RwLock<HashMap<Address, Vec<Transaction>>>,
}

impl TransactionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transaction to the address's history.
    ///
    /// Recording the same transaction twice yields two entries; the scanner
    /// calls this at most once per (address, transaction) and block.
    pub fn record(&self, address: &Address, transaction: Transaction) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.entry(address.clone()).or_default().push(transaction);
    }

    /// Copy of the address's history, oldest first
    pub fn get(&self, address: &Address) -> Vec<Transaction> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .cloned()
            .unwrap_or_default()
    }

    pub fn total_records(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }
}
