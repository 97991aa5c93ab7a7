use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::blockchain::ChainClient;
use crate::config::RpcConfig;
use crate::error::RpcError;
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::{Block, RawTransaction};
use crate::retry::{RetryConfig, RetryUtils};

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: &'a [Value],
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: Option<String>,
    result: Option<Value>,
    error: Option<JsonRpcError>,
    #[allow(dead_code)]
    id: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

/// Block body as returned by `eth_getBlockByNumber` with full transactions.
///
/// Transactions stay untyped here so that one odd entry cannot fail the
/// whole block; each is decoded on its own in [`decode_block`].
#[derive(Debug, Deserialize)]
struct RpcBlock {
    number: Option<String>,
    hash: Option<String>,
    transactions: Vec<Value>,
}

/// JSON-RPC client for Ethereum-compatible nodes
#[derive(Clone)]
pub struct RpcClient {
    client: Client,
    endpoint: String,
    timeout_seconds: u64,
    retry_config: RetryConfig,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    pub fn new(endpoint: String) -> Result<Self, RpcError> {
        Self::new_with_config(endpoint, 30)
    }

    /// RPC client with a custom request timeout and connection pooling
    pub fn new_with_config(endpoint: String, timeout_seconds: u64) -> Result<Self, RpcError> {
        LogContext::new("rpc_client", "initialization")
            .with_metadata("endpoint", serde_json::json!(endpoint))
            .with_metadata("timeout_seconds", serde_json::json!(timeout_seconds))
            .info("Initializing RPC client");

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            timeout_seconds,
            retry_config: RetryConfig::for_rpc(),
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn from_config(config: &RpcConfig) -> Result<Self, RpcError> {
        Ok(Self::new_with_config(config.endpoint.clone(), config.timeout_seconds)?
            .with_retry_config(config.retry_config()))
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn make_request(&self, method: &str, params: &[Value]) -> Result<Value, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        LogContext::new("rpc_client", "make_request")
            .with_metadata("method", serde_json::json!(method))
            .with_metadata("id", serde_json::json!(request.id))
            .trace(&format!("Sending RPC request: {}", method));

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Timeout { seconds: self.timeout_seconds }
                } else if e.is_connect() {
                    RpcError::Connection(e.to_string())
                } else {
                    RpcError::Http(e)
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let seconds = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(60);
            return Err(RpcError::RateLimit { seconds });
        }
        if !status.is_success() {
            return Err(RpcError::Connection(format!(
                "HTTP error: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body = response.bytes().await?;
        let rpc_response: JsonRpcResponse = serde_json::from_slice(&body)?;

        if let Some(error) = rpc_response.error {
            return Err(RpcError::Method {
                code: error.code,
                message: error.message,
            });
        }

        rpc_response
            .result
            .ok_or_else(|| RpcError::InvalidResponse("No result in response".to_string()))
    }

    /// Issue a request with retries, timing and metrics
    async fn call(&self, method: &'static str, params: Vec<Value>) -> Result<Value, RpcError> {
        RetryUtils::retry_rpc(method, &self.retry_config, || async {
            let monitor = PerformanceMonitor::new(&format!("rpc_{}", method))
                .with_metadata("endpoint", serde_json::json!(self.endpoint));
            let result = self.make_request(method, &params).await;
            let duration = monitor.finish_with_result(&result);
            MetricsLogger::log_rpc_call(method, duration, result.is_ok());
            result
        })
        .await
    }

    pub async fn get_latest_block_number(&self) -> Result<u64, RpcError> {
        let value = self.call("eth_blockNumber", vec![]).await?;

        let hex_string = value
            .as_str()
            .ok_or_else(|| RpcError::InvalidResponse("Block number is not a string".to_string()))?;
        let block_number = parse_hex_quantity(hex_string)?;

        LogContext::new("rpc_client", "get_latest_block_number")
            .with_block_number(block_number)
            .debug(&format!("Retrieved latest block number: {}", block_number));

        Ok(block_number)
    }

    pub async fn get_block_by_number(&self, block_number: u64) -> Result<Block, RpcError> {
        let params = vec![
            Value::String(format!("0x{:x}", block_number)),
            Value::Bool(true), // full transaction objects
        ];

        let value = self.call("eth_getBlockByNumber", params).await?;
        let block = decode_block(value, block_number)?;

        LogContext::new("rpc_client", "get_block")
            .with_block_number(block_number)
            .with_metadata("transaction_count", serde_json::json!(block.transactions.len()))
            .debug(&format!(
                "Retrieved block {} with {} transactions",
                block_number,
                block.transactions.len()
            ));

        Ok(block)
    }
}

#[async_trait]
impl ChainClient for RpcClient {
    async fn get_latest_height(&self) -> Result<u64, RpcError> {
        self.get_latest_block_number().await
    }

    async fn get_block(&self, height: u64) -> Result<Block, RpcError> {
        self.get_block_by_number(height).await
    }
}

/// Parse a JSON-RPC hex quantity such as `0x4b7`
pub fn parse_hex_quantity(hex_str: &str) -> Result<u64, RpcError> {
    let hex_without_prefix = hex_str
        .strip_prefix("0x")
        .or_else(|| hex_str.strip_prefix("0X"))
        .unwrap_or(hex_str);
    u64::from_str_radix(hex_without_prefix, 16)
        .map_err(|e| RpcError::InvalidResponse(format!("Failed to parse hex quantity '{}': {}", hex_str, e)))
}

/// Decode an `eth_getBlockByNumber` result into a [`Block`].
///
/// A `null` result means the node does not have the block yet. Transaction
/// entries that are not objects of string fields decode to an empty
/// [`RawTransaction`], which the scanner reports as malformed.
fn decode_block(value: Value, requested: u64) -> Result<Block, RpcError> {
    if value.is_null() {
        return Err(RpcError::BlockNotFound { block_number: requested });
    }

    let rpc_block: RpcBlock = serde_json::from_value(value)?;

    if let Some(number) = rpc_block.number.as_deref() {
        let number = parse_hex_quantity(number)?;
        if number != requested {
            return Err(RpcError::InvalidResponse(format!(
                "Requested block {} but node returned block {}",
                requested, number
            )));
        }
    }

    let transactions = rpc_block
        .transactions
        .into_iter()
        .enumerate()
        .map(|(index, tx)| {
            serde_json::from_value::<RawTransaction>(tx).unwrap_or_else(|e| {
                LogContext::new("rpc_client", "decode_block")
                    .with_block_number(requested)
                    .with_metadata("index", serde_json::json!(index))
                    .with_metadata("block_hash", serde_json::json!(rpc_block.hash))
                    .debug(&format!("Undecodable transaction entry: {}", e));
                RawTransaction::default()
            })
        })
        .collect();

    Ok(Block::new(requested, transactions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rpc_client_creation() {
        let endpoint = "https://cloudflare-eth.com".to_string();
        let client = RpcClient::new(endpoint.clone()).unwrap();
        assert_eq!(client.endpoint(), endpoint);
    }

    #[test]
    fn test_json_rpc_request_serialization() {
        let params = vec![json!("0x4b7"), json!(true)];
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: "eth_getBlockByNumber",
            params: &params,
            id: 1,
        };

        let serialized = serde_json::to_string(&request).unwrap();
        let expected = r#"{"jsonrpc":"2.0","method":"eth_getBlockByNumber","params":["0x4b7",true],"id":1}"#;
        assert_eq!(serialized, expected);
    }

    #[test]
    fn test_json_rpc_response_deserialization_error() {
        let response_json = r#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"Method not found"},"id":1}"#;
        let response: JsonRpcResponse = serde_json::from_str(response_json).unwrap();

        assert!(response.result.is_none());
        let error = response.error.unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.message, "Method not found");
    }

    #[test]
    fn test_parse_hex_quantity() {
        assert_eq!(parse_hex_quantity("0x4b7").unwrap(), 1207);
        assert_eq!(parse_hex_quantity("4b7").unwrap(), 1207);
        assert_eq!(parse_hex_quantity("0X4B7").unwrap(), 1207);
        assert_eq!(parse_hex_quantity("0x0").unwrap(), 0);
        assert!(matches!(parse_hex_quantity("0x"), Err(RpcError::InvalidResponse(_))));
        assert!(parse_hex_quantity("invalid").is_err());
    }

    #[test]
    fn test_decode_block_with_full_transactions() {
        let value = json!({
            "number": "0x4b7",
            "hash": "0xblock",
            "transactions": [
                {"hash": "0x123", "from": "0xA", "to": "0xB", "value": "0x64", "gas": "0x5208"},
                {"hash": "0x456", "from": "0xC", "to": null, "value": "0x0"}
            ]
        });

        let block = decode_block(value, 1207).unwrap();
        assert_eq!(block.number, 1207);
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.transactions[0].value.as_deref(), Some("0x64"));
        assert_eq!(block.transactions[1].to, None);
    }

    #[test]
    fn test_decode_block_keeps_undecodable_entries_as_empty() {
        let value = json!({
            "number": "0x1",
            "transactions": ["0xjust-a-hash", {"hash": 5}]
        });

        let block = decode_block(value, 1).unwrap();
        assert_eq!(block.transactions, vec![RawTransaction::default(), RawTransaction::default()]);
    }

    #[test]
    fn test_decode_null_block() {
        assert!(matches!(
            decode_block(Value::Null, 99),
            Err(RpcError::BlockNotFound { block_number: 99 })
        ));
    }

    #[test]
    fn test_decode_block_number_mismatch() {
        let value = json!({"number": "0x2", "transactions": []});
        assert!(matches!(decode_block(value, 1), Err(RpcError::InvalidResponse(_))));
    }

    #[test]
    fn test_decode_block_without_transactions_field() {
        let value = json!({"number": "0x1"});
        assert!(matches!(decode_block(value, 1), Err(RpcError::Json(_))));
    }
}
