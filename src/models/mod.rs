pub mod address;
pub mod transaction;

pub use address::{normalize_address, validate_address, Address};
pub use transaction::{Block, RawTransaction, Transaction};
