use thiserror::Error;

/// Main error type for the block parser
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Processing error: {0}")]
    Processing(#[from] ProcessingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Errors raised while talking to the chain node. All of them are transient
/// from the poll loop's point of view: the cycle is abandoned and retried
/// with the cursor left where it was.
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC method error: code={code}, message={message}")]
    Method { code: i32, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Rate limit exceeded, retry after {seconds} seconds")]
    RateLimit { seconds: u64 },

    #[error("Block not found: {block_number}")]
    BlockNotFound { block_number: u64 },

    #[error("Connection failed: {0}")]
    Connection(String),
}

/// Problems with individual block entries; never fatal to a scan
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Malformed transaction #{index} in block {block_number}: {reason}")]
    MalformedTransaction {
        block_number: u64,
        index: usize,
        reason: String,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parsing failed: {0}")]
    Parsing(String),

    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
}

/// Validation errors at the query surface
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

pub type Result<T> = std::result::Result<T, IndexerError>;

/// Log level bucket for an error; see [`ErrorLogger`](crate::logging::ErrorLogger)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// The process cannot start or continue
    Critical,
    /// The node is unreachable or rejects our calls
    High,
    /// A cycle was lost but the next one will likely succeed
    Medium,
    /// Expected noise: skipped entries, pending blocks, bad user input
    Low,
}

impl RpcError {
    /// Whether retrying the same call may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            RpcError::Timeout { .. } => true,
            RpcError::RateLimit { .. } => true,
            RpcError::Connection(_) => true,
            RpcError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            RpcError::BlockNotFound { .. } => true,

            RpcError::Json(_) => false,
            RpcError::Method { .. } => false,
            RpcError::InvalidResponse(_) => false,
        }
    }
}

impl IndexerError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            IndexerError::Config(_) => ErrorSeverity::Critical,

            IndexerError::Rpc(RpcError::Connection(_)) => ErrorSeverity::High,
            IndexerError::Rpc(RpcError::Method { .. }) => ErrorSeverity::High,

            IndexerError::Rpc(RpcError::Timeout { .. }) => ErrorSeverity::Medium,
            IndexerError::Rpc(RpcError::RateLimit { .. }) => ErrorSeverity::Medium,

            IndexerError::Processing(ProcessingError::MalformedTransaction { .. }) => ErrorSeverity::Low,
            IndexerError::Rpc(RpcError::BlockNotFound { .. }) => ErrorSeverity::Low,
            IndexerError::Validation(_) => ErrorSeverity::Low,
            _ => ErrorSeverity::Medium,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            IndexerError::Rpc(e) => e.is_recoverable(),
            IndexerError::Processing(_) => false,
            IndexerError::Config(_) => false,
            IndexerError::Validation(_) => false,
        }
    }

    /// Suggested wait in seconds before retrying, `None` if retrying is pointless
    pub fn retry_delay(&self) -> Option<u64> {
        if !self.is_recoverable() {
            return None;
        }

        match self {
            IndexerError::Rpc(RpcError::RateLimit { seconds }) => Some(*seconds),
            IndexerError::Rpc(RpcError::Timeout { .. }) => Some(5),
            IndexerError::Rpc(RpcError::Connection(_)) => Some(10),
            IndexerError::Rpc(RpcError::BlockNotFound { .. }) => Some(2),
            _ => Some(5),
        }
    }
}
