use serde::{Deserialize, Serialize};

use crate::error::ProcessingError;

/// A transaction as recorded in the index.
///
/// Fields are stored exactly as the node reported them; `value` is an opaque
/// quantity string and is never interpreted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value: String,
}

impl Transaction {
    pub fn new(hash: &str, from: &str, to: &str, value: &str) -> Self {
        Self {
            hash: hash.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            value: value.to_string(),
        }
    }
}

/// A transaction entry of a block body before validation.
///
/// Any field may be absent; contract creations, for instance, carry a null
/// `to`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RawTransaction {
    pub hash: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub value: Option<String>,
}

impl RawTransaction {
    /// Check that every field is present and build the indexed form.
    ///
    /// A contract creation carries a null `to` and is rejected like any other
    /// incomplete entry, so it is skipped rather than indexed under its sender.
    pub fn validate(&self, block_number: u64, index: usize) -> Result<Transaction, ProcessingError> {
        let missing: Vec<&str> = [
            ("hash", &self.hash),
            ("from", &self.from),
            ("to", &self.to),
            ("value", &self.value),
        ]
        .iter()
        .filter(|(_, field)| field.as_deref().map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| *name)
        .collect();

        if !missing.is_empty() {
            return Err(ProcessingError::MalformedTransaction {
                block_number,
                index,
                reason: format!("missing {}", missing.join(", ")),
            });
        }

        Ok(Transaction {
            hash: self.hash.clone().unwrap_or_default(),
            from: self.from.clone().unwrap_or_default(),
            to: self.to.clone().unwrap_or_default(),
            value: self.value.clone().unwrap_or_default(),
        })
    }
}

impl From<Transaction> for RawTransaction {
    fn from(tx: Transaction) -> Self {
        Self {
            hash: Some(tx.hash),
            from: Some(tx.from),
            to: Some(tx.to),
            value: Some(tx.value),
        }
    }
}

/// A block body: its height and transactions in block order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub number: u64,
    pub transactions: Vec<RawTransaction>,
}

impl Block {
    pub fn new(number: u64, transactions: Vec<RawTransaction>) -> Self {
        Self { number, transactions }
    }

    /// Build a block from already well-formed transactions
    pub fn from_transactions(number: u64, transactions: Vec<Transaction>) -> Self {
        Self {
            number,
            transactions: transactions.into_iter().map(RawTransaction::from).collect(),
        }
    }
}
