use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use crate::models::Address;

/// Set of watched addresses.
///
/// Each operation takes the lock for its own duration only.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    addresses: RwLock<HashSet<Address>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an address. Returns `false` if it was already watched.
    pub fn subscribe(&self, address: &str) -> bool {
        let address = Address::new(address);
        let mut addresses = self.addresses.write().unwrap_or_else(PoisonError::into_inner);
        addresses.insert(address)
    }

    pub fn is_subscribed(&self, address: &str) -> bool {
        self.contains(&Address::new(address))
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.addresses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(address)
    }

    pub fn len(&self) -> usize {
        self.addresses.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted snapshot of the watched addresses
    pub fn addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self
            .addresses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        addresses.sort();
        addresses
    }
}
