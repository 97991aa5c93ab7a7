use serde::{Deserialize, Serialize};

use crate::error::IndexerError;
use crate::logging::{ErrorLogger, LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::{Address, Block, Transaction};
use crate::store::{SubscriptionRegistry, TransactionIndex};

/// How a transfer from a subscribed address to itself is recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelfTransferPolicy {
    /// One entry under the address
    #[default]
    Deduplicate,
    /// One entry per matching role (sender and recipient), i.e. two entries
    RecordPerRole,
}

/// Which side of a transaction touches the subscription set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDirection {
    /// Only the sender is subscribed
    Outgoing,
    /// Only the recipient is subscribed
    Incoming,
    /// Sender and recipient are distinct subscribed addresses
    Both,
    /// Sender and recipient are the same subscribed address
    SelfTransfer,
    NotSubscribed,
}

/// Counters for one scanned block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub block_number: u64,
    /// Transactions in the block, malformed ones included
    pub transactions: usize,
    /// Transactions touching at least one subscribed address
    pub matched: usize,
    /// Index entries written
    pub recorded: usize,
    /// Transactions skipped because a field was missing
    pub malformed: usize,
}

/// Matches block transactions against the subscription set
#[derive(Debug, Clone, Default)]
pub struct BlockScanner {
    self_transfer_policy: SelfTransferPolicy,
}

impl BlockScanner {
    pub fn new(self_transfer_policy: SelfTransferPolicy) -> Self {
        Self { self_transfer_policy }
    }

    /// Record every transaction of `block` that touches a subscribed address.
    ///
    /// Transactions are visited in block order. A malformed transaction is
    /// logged and skipped; the rest of the block is still scanned.
    pub fn scan(
        &self,
        block: &Block,
        registry: &SubscriptionRegistry,
        index: &TransactionIndex,
    ) -> ScanSummary {
        let monitor = PerformanceMonitor::new("scan_block");
        let mut summary = ScanSummary {
            block_number: block.number,
            transactions: block.transactions.len(),
            ..ScanSummary::default()
        };

        for (position, raw) in block.transactions.iter().enumerate() {
            let transaction = match raw.validate(block.number, position) {
                Ok(transaction) => transaction,
                Err(e) => {
                    summary.malformed += 1;
                    let context = LogContext::new("block_scanner", "scan")
                        .with_block_number(block.number)
                        .with_metadata("position", serde_json::json!(position));
                    ErrorLogger::log_error(&IndexerError::Processing(e), Some(context));
                    continue;
                }
            };

            let recorded = self.record_matches(transaction, registry, index);
            if recorded > 0 {
                summary.matched += 1;
                summary.recorded += recorded;
            }
        }

        MetricsLogger::log_block_scanned(
            summary.block_number,
            summary.transactions,
            summary.recorded,
            summary.malformed,
            monitor.elapsed_ms(),
        );

        summary
    }

    /// Classify a transaction based on its sender and recipient
    pub fn classify(&self, from: &Address, to: &Address, registry: &SubscriptionRegistry) -> MatchDirection {
        let from_subscribed = registry.contains(from);
        let to_subscribed = registry.contains(to);

        match (from_subscribed, to_subscribed) {
            (true, true) if from == to => MatchDirection::SelfTransfer,
            (true, true) => MatchDirection::Both,
            (true, false) => MatchDirection::Outgoing,
            (false, true) => MatchDirection::Incoming,
            (false, false) => MatchDirection::NotSubscribed,
        }
    }

    fn record_matches(
        &self,
        transaction: Transaction,
        registry: &SubscriptionRegistry,
        index: &TransactionIndex,
    ) -> usize {
        let from = Address::new(&transaction.from);
        let to = Address::new(&transaction.to);

        let targets: Vec<&Address> = match self.classify(&from, &to, registry) {
            MatchDirection::Outgoing => vec![&from],
            MatchDirection::Incoming => vec![&to],
            MatchDirection::Both => vec![&from, &to],
            MatchDirection::SelfTransfer => match self.self_transfer_policy {
                SelfTransferPolicy::Deduplicate => vec![&from],
                SelfTransferPolicy::RecordPerRole => vec![&from, &to],
            },
            MatchDirection::NotSubscribed => return 0,
        };

        for address in &targets {
            LogContext::new("block_scanner", "record")
                .with_address(address.as_str())
                .with_transaction_hash(&transaction.hash)
                .debug("Recording transaction for subscribed address");
            index.record(address, transaction.clone());
        }

        targets.len()
    }
}
