use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::logging::LogContext;
use crate::models::{Address, Transaction};
use crate::store::{SubscriptionRegistry, TransactionIndex};

/// Query handle over a running parser.
///
/// Obtained from [`PollLoop::parser`](crate::blockchain::PollLoop::parser).
/// Clones share the same subscriptions, index and cursor.
#[derive(Debug, Clone)]
pub struct BlockParser {
    registry: Arc<SubscriptionRegistry>,
    index: Arc<TransactionIndex>,
    cursor: Arc<AtomicU64>,
}

impl BlockParser {
    pub(crate) fn new(
        registry: Arc<SubscriptionRegistry>,
        index: Arc<TransactionIndex>,
        cursor: Arc<AtomicU64>,
    ) -> Self {
        Self { registry, index, cursor }
    }

    /// Watch an address. Returns `false` if it was already watched.
    ///
    /// Only blocks scanned after this call are matched against the address.
    pub fn subscribe(&self, address: &str) -> bool {
        let added = self.registry.subscribe(address);

        let context = LogContext::new("parser", "subscribe").with_address(address);
        if added {
            context.info("Subscribed to address");
        } else {
            context.debug("Address already subscribed");
        }
        added
    }

    pub fn is_subscribed(&self, address: &str) -> bool {
        self.registry.is_subscribed(address)
    }

    /// Transactions recorded for `address`, oldest first
    pub fn get_transactions(&self, address: &str) -> Vec<Transaction> {
        self.index.get(&Address::new(address))
    }

    /// Highest block number fully scanned, `0` before the first block
    pub fn get_current_block(&self) -> u64 {
        self.cursor.load(Ordering::SeqCst)
    }

    pub fn subscriptions(&self) -> Vec<Address> {
        self.registry.addresses()
    }

    pub fn indexed_transactions(&self) -> usize {
        self.index.total_records()
    }
}
