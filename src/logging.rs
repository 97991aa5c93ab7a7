use log::{debug, error, info, trace, warn};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::LoggingConfig;
use crate::error::{ErrorSeverity, IndexerError};

/// Structured log line builder: one JSON object per message
pub struct LogContext {
    pub component: String,
    pub operation: String,
    pub metadata: HashMap<String, Value>,
}

impl LogContext {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn with_block_number(self, block_number: u64) -> Self {
        self.with_metadata("block_number", json!(block_number))
    }

    pub fn with_transaction_hash(self, tx_hash: &str) -> Self {
        self.with_metadata("transaction_hash", json!(tx_hash))
    }

    pub fn with_address(self, address: &str) -> Self {
        self.with_metadata("address", json!(address))
    }

    pub fn with_duration_ms(self, duration_ms: u64) -> Self {
        self.with_metadata("duration_ms", json!(duration_ms))
    }

    pub fn with_retry_count(self, retry_count: u32) -> Self {
        self.with_metadata("retry_count", json!(retry_count))
    }

    fn format_message(&self, level: &str, message: &str) -> String {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let mut log_entry = json!({
            "timestamp": timestamp,
            "level": level,
            "component": self.component,
            "operation": self.operation,
            "message": message,
        });

        for (key, value) in &self.metadata {
            log_entry[key] = value.clone();
        }

        log_entry.to_string()
    }

    pub fn info(&self, message: &str) {
        info!("{}", self.format_message("INFO", message));
    }

    pub fn warn(&self, message: &str) {
        warn!("{}", self.format_message("WARN", message));
    }

    pub fn error(&self, message: &str) {
        error!("{}", self.format_message("ERROR", message));
    }

    pub fn debug(&self, message: &str) {
        debug!("{}", self.format_message("DEBUG", message));
    }

    pub fn trace(&self, message: &str) {
        trace!("{}", self.format_message("TRACE", message));
    }
}

/// Wall-clock timer that logs its result on completion
pub struct PerformanceMonitor {
    pub start_time: SystemTime,
    operation: String,
    metadata: HashMap<String, Value>,
}

impl PerformanceMonitor {
    pub fn new(operation: &str) -> Self {
        Self {
            start_time: SystemTime::now(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn elapsed_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.start_time)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn context(self, duration: u64) -> LogContext {
        let mut context = LogContext::new("performance", &self.operation).with_duration_ms(duration);
        for (key, value) in self.metadata {
            context = context.with_metadata(&key, value);
        }
        context
    }

    pub fn finish_with_result<T, E>(self, result: &Result<T, E>) -> u64
    where
        E: Display,
    {
        let duration = self.elapsed_ms();
        let context = self.context(duration);

        match result {
            Ok(_) => {
                context.trace(&format!("Operation completed successfully in {}ms", duration));
            }
            Err(e) => {
                context
                    .with_metadata("error", json!(e.to_string()))
                    .debug(&format!("Operation failed after {}ms: {}", duration, e));
            }
        }

        duration
    }
}

/// Severity-aware error reporting
pub struct ErrorLogger;

impl ErrorLogger {
    pub fn log_error(error: &IndexerError, context: Option<LogContext>) {
        let severity = error.severity();

        let mut log_context = context
            .unwrap_or_else(|| LogContext::new("error", "unknown"))
            .with_metadata("error_type", json!(format!("{:?}", error)))
            .with_metadata("severity", json!(format!("{:?}", severity)))
            .with_metadata("recoverable", json!(error.is_recoverable()));

        if let Some(delay) = error.retry_delay() {
            log_context = log_context.with_metadata("retry_delay_seconds", json!(delay));
        }

        let message = format!("Error occurred: {}", error);

        match severity {
            ErrorSeverity::Critical | ErrorSeverity::High => log_context.error(&message),
            ErrorSeverity::Medium => log_context.warn(&message),
            ErrorSeverity::Low => log_context.info(&message),
        }
    }

    pub fn log_recovery_attempt<E>(operation: &str, error: &E, attempt: u32, max_attempts: u32)
    where
        E: Display + Debug,
    {
        let context = LogContext::new("recovery", "retry_attempt")
            .with_metadata("operation", json!(operation))
            .with_retry_count(attempt)
            .with_metadata("max_attempts", json!(max_attempts))
            .with_metadata("error_type", json!(format!("{:?}", error)));

        if attempt >= max_attempts {
            context.error(&format!("Final retry attempt failed: {}", error));
        } else {
            context.warn(&format!("Retry attempt {} of {}: {}", attempt, max_attempts, error));
        }
    }

    pub fn log_recovery_success(operation: &str, attempts: u32, total_duration_ms: u64) {
        let context = LogContext::new("recovery", "success")
            .with_metadata("operation", json!(operation))
            .with_retry_count(attempts)
            .with_duration_ms(total_duration_ms);

        context.info(&format!(
            "Operation recovered after {} attempts in {}ms",
            attempts, total_duration_ms
        ));
    }
}

/// Counters and timings for the poll loop and RPC traffic
pub struct MetricsLogger;

impl MetricsLogger {
    pub fn log_block_scanned(
        block_number: u64,
        transaction_count: usize,
        recorded: usize,
        malformed: usize,
        processing_time_ms: u64,
    ) {
        let context = LogContext::new("metrics", "block_scanned")
            .with_block_number(block_number)
            .with_metadata("transaction_count", json!(transaction_count))
            .with_metadata("recorded", json!(recorded))
            .with_metadata("malformed", json!(malformed))
            .with_duration_ms(processing_time_ms);

        if recorded > 0 {
            context.info(&format!(
                "Block {} scanned, {} of {} transactions recorded",
                block_number, recorded, transaction_count
            ));
        } else {
            context.debug(&format!(
                "Block {} scanned, no subscribed activity in {} transactions",
                block_number, transaction_count
            ));
        }
    }

    pub fn log_rpc_call(method: &str, duration_ms: u64, success: bool) {
        let context = LogContext::new("metrics", "rpc_call")
            .with_metadata("method", json!(method))
            .with_duration_ms(duration_ms)
            .with_metadata("success", json!(success));

        if success {
            context.debug(&format!("RPC call {} completed in {}ms", method, duration_ms));
        } else {
            context.warn(&format!("RPC call {} failed after {}ms", method, duration_ms));
        }
    }

    pub fn log_poll_status(latest_block: u64, current_block: u64, subscriptions: usize, indexed: usize) {
        let blocks_behind = latest_block.saturating_sub(current_block);
        let context = LogContext::new("metrics", "poll_status")
            .with_metadata("latest_block", json!(latest_block))
            .with_metadata("current_block", json!(current_block))
            .with_metadata("blocks_behind", json!(blocks_behind))
            .with_metadata("subscriptions", json!(subscriptions))
            .with_metadata("indexed_transactions", json!(indexed));

        if blocks_behind > 10 {
            context.warn(&format!(
                "Parser is {} blocks behind (latest: {}, current: {})",
                blocks_behind, latest_block, current_block
            ));
        } else {
            context.debug(&format!(
                "Parser status: block {}, {} subscriptions, {} indexed transactions",
                current_block, subscriptions, indexed
            ));
        }
    }
}

/// Initialize logging from the `[logging]` configuration.
///
/// `RUST_LOG` still takes precedence over the configured level.
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let json_format = config.format == "json";

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.level.as_str()))
        .format(move |buf, record| {
            use std::io::Write;

            let message = record.args().to_string();
            let structured = serde_json::from_str::<Value>(&message).ok().filter(Value::is_object);

            match (json_format, structured) {
                (true, Some(value)) => writeln!(buf, "{}", value),
                (true, None) => writeln!(
                    buf,
                    "{}",
                    json!({
                        "timestamp": chrono::Utc::now().to_rfc3339(),
                        "level": record.level().to_string(),
                        "target": record.target(),
                        "message": message,
                    })
                ),
                (false, _) => writeln!(
                    buf,
                    "{} [{}] {}: {}",
                    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    record.level(),
                    record.target(),
                    message
                ),
            }
        })
        .try_init()?;

    info!("Logging initialized (level={}, format={})", config.level, config.format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProcessingError, RpcError};

    #[test]
    fn test_log_context_creation() {
        let context = LogContext::new("test_component", "test_operation");
        assert_eq!(context.component, "test_component");
        assert_eq!(context.operation, "test_operation");
        assert!(context.metadata.is_empty());
    }

    #[test]
    fn test_log_context_with_metadata() {
        let context = LogContext::new("test", "test")
            .with_block_number(12345)
            .with_transaction_hash("0xabc123")
            .with_address("0xdef");

        assert_eq!(context.metadata.get("block_number"), Some(&json!(12345)));
        assert_eq!(context.metadata.get("transaction_hash"), Some(&json!("0xabc123")));
        assert_eq!(context.metadata.get("address"), Some(&json!("0xdef")));
    }

    #[test]
    fn test_log_context_format_message() {
        let context = LogContext::new("scanner", "scan").with_metadata("key", json!("value"));

        let message = context.format_message("INFO", "test message");

        let parsed: Value = serde_json::from_str(&message).expect("Should be valid JSON");
        assert_eq!(parsed["level"], "INFO");
        assert_eq!(parsed["component"], "scanner");
        assert_eq!(parsed["operation"], "scan");
        assert_eq!(parsed["message"], "test message");
        assert_eq!(parsed["key"], "value");
    }

    #[test]
    fn test_performance_monitor_with_result() {
        let monitor = PerformanceMonitor::new("test_operation").with_metadata("k", json!(1));
        assert_eq!(monitor.operation, "test_operation");

        let result: Result<(), String> = Err("boom".to_string());
        let duration = monitor.finish_with_result(&result);
        assert!(duration < 60_000);
    }

    #[test]
    fn test_error_logging_does_not_panic() {
        ErrorLogger::log_error(
            &IndexerError::Rpc(RpcError::Timeout { seconds: 30 }),
            Some(LogContext::new("test", "error_test")),
        );
        ErrorLogger::log_error(
            &IndexerError::Processing(ProcessingError::MalformedTransaction {
                block_number: 1,
                index: 0,
                reason: "missing hash".to_string(),
            }),
            None,
        );
        ErrorLogger::log_recovery_attempt("op", &RpcError::Connection("refused".to_string()), 1, 3);
        ErrorLogger::log_recovery_success("op", 2, 15);
    }

    #[test]
    fn test_metrics_logging_does_not_panic() {
        MetricsLogger::log_block_scanned(12345, 150, 2, 1, 12);
        MetricsLogger::log_block_scanned(12346, 10, 0, 0, 3);
        MetricsLogger::log_rpc_call("eth_getBlockByNumber", 250, true);
        MetricsLogger::log_poll_status(12345, 12300, 3, 10);
    }
}
