pub mod index;
pub mod registry;

pub use index::TransactionIndex;
pub use registry::SubscriptionRegistry;
