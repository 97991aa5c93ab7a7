use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// Account identifier used as a registry and index key.
///
/// Addresses are normalized on construction (surrounding whitespace trimmed,
/// lower-cased) so `0xABC` and `0xabc` name the same account. The `0x` prefix
/// is kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn new(address: &str) -> Self {
        Self(normalize_address(address))
    }

    /// Build an address, rejecting identifiers that are empty after trimming
    pub fn parse(address: &str) -> Result<Self, ValidationError> {
        validate_address(address)?;
        Ok(Self::new(address))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Address {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

impl From<String> for Address {
    fn from(address: String) -> Self {
        Self::new(&address)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize an address for case-insensitive comparison
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Reject identifiers that cannot name an account.
///
/// The chain's address format is opaque here, so only emptiness and embedded
/// whitespace are checked.
pub fn validate_address(address: &str) -> Result<(), ValidationError> {
    let trimmed = address.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::InvalidAddress(
            "Address must not be empty".to_string(),
        ));
    }

    if trimmed.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidAddress(format!(
            "Address contains whitespace: {:?}",
            trimmed
        )));
    }

    Ok(())
}
