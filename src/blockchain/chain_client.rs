use async_trait::async_trait;
use std::sync::Arc;

use crate::error::RpcError;
use crate::models::Block;

/// Source of block heights and block bodies.
///
/// Implementations own wire encoding and per-call retries. Any error they
/// return is treated as transient by the poll loop.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Height of the most recent block known to the node
    async fn get_latest_height(&self) -> Result<u64, RpcError>;

    /// Full body of the block at `height`, transactions in block order
    async fn get_block(&self, height: u64) -> Result<Block, RpcError>;
}

#[async_trait]
impl<C> ChainClient for Arc<C>
where
    C: ChainClient + ?Sized,
{
    async fn get_latest_height(&self) -> Result<u64, RpcError> {
        (**self).get_latest_height().await
    }

    async fn get_block(&self, height: u64) -> Result<Block, RpcError> {
        (**self).get_block(height).await
    }
}
