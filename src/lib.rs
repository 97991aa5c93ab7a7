pub mod api;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod parser;
pub mod retry;
pub mod store;

pub use blockchain::{ChainClient, PollLoop, PollLoopConfig, PollOutcome, RpcClient, ShutdownHandle, StartPosition};
pub use config::{ApiConfig, AppConfig, LoggingConfig, ProcessingConfig, RpcConfig};
pub use error::{IndexerError, Result};
pub use logging::{ErrorLogger, LogContext, MetricsLogger, PerformanceMonitor};
pub use models::{Address, Block, Transaction};
pub use parser::BlockParser;
pub use retry::{Backoff, RetryConfig, RetryManager, RetryUtils};
