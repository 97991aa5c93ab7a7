use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Notify;
use tokio::time::{sleep, timeout};
use log::{error, info};

use crate::blockchain::{BlockScanner, ChainClient, SelfTransferPolicy};
use crate::config::ProcessingConfig;
use crate::error::RpcError;
use crate::logging::{LogContext, MetricsLogger};
use crate::parser::BlockParser;
use crate::retry::Backoff;
use crate::store::{SubscriptionRegistry, TransactionIndex};

/// Where the cursor starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartPosition {
    /// Scan only the chain tip seen on the first successful poll
    #[default]
    Latest,
    /// Treat blocks up to and including this height as already scanned
    After(u64),
}

#[derive(Debug, Clone)]
pub struct PollLoopConfig {
    pub poll_interval: Duration,
    pub retry_delay: Duration,
    pub max_retry_delay: Duration,
    pub fetch_timeout: Duration,
    pub start: StartPosition,
    pub self_transfer_policy: SelfTransferPolicy,
}

impl Default for PollLoopConfig {
    fn default() -> Self {
        Self::from(&ProcessingConfig::default())
    }
}

impl From<&ProcessingConfig> for PollLoopConfig {
    fn from(config: &ProcessingConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            retry_delay: config.retry_delay(),
            max_retry_delay: config.max_retry_delay(),
            fetch_timeout: config.fetch_timeout(),
            start: config.start_block.map_or(StartPosition::Latest, StartPosition::After),
            self_transfer_policy: config.self_transfer_policy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Fetching,
    Scanning,
}

/// Result of a single poll cycle
#[derive(Debug)]
pub enum PollOutcome {
    /// The reported height did not pass the cursor
    Idle { latest: u64 },
    /// Blocks `from..=to` were scanned
    Scanned { from: u64, to: u64, recorded: usize },
    /// The height query failed; nothing was scanned
    HeightUnavailable(RpcError),
    /// Fetching block `failed_at` failed; blocks up to `scanned_to` are done
    Interrupted {
        scanned_to: u64,
        failed_at: u64,
        error: RpcError,
    },
    /// Shutdown was requested; blocks up to `scanned_to` are done
    Stopped { scanned_to: u64 },
}

impl PollOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, PollOutcome::HeightUnavailable(_) | PollOutcome::Interrupted { .. })
    }
}

/// Cloneable stop signal for a running [`PollLoop`]
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request graceful shutdown
    pub fn shutdown(&self) {
        info!("Requesting graceful shutdown");
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_shutdown(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown has been requested
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_shutdown() {
                return;
            }
            notified.await;
        }
    }

    /// Sleep for `duration` unless shutdown comes first. Returns `true` if
    /// shutdown was requested.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.wait() => true,
            _ = sleep(duration) => self.is_shutdown(),
        }
    }

    /// Trigger shutdown on Ctrl-C
    pub fn listen_for_ctrl_c(&self) {
        let handle = self.clone();
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received shutdown signal");
                    handle.shutdown();
                }
                Err(err) => {
                    error!("Unable to listen for shutdown signal: {}", err);
                }
            }
        });
    }
}

/// Drives the parser forward: polls the chain height and scans every new
/// block in ascending order, advancing the cursor after each one.
///
/// The loop is the only writer of the cursor. Readers go through the
/// [`BlockParser`] returned by [`PollLoop::parser`].
pub struct PollLoop<C> {
    client: C,
    scanner: BlockScanner,
    registry: Arc<SubscriptionRegistry>,
    index: Arc<TransactionIndex>,
    cursor: Arc<AtomicU64>,
    seeded: bool,
    state: PollState,
    backoff: Backoff,
    config: PollLoopConfig,
    shutdown: ShutdownHandle,
}

impl<C: ChainClient> PollLoop<C> {
    pub fn new(client: C, config: PollLoopConfig) -> Self {
        let (cursor, seeded) = match config.start {
            StartPosition::Latest => (0, false),
            StartPosition::After(height) => (height, true),
        };

        Self {
            client,
            scanner: BlockScanner::new(config.self_transfer_policy),
            registry: Arc::new(SubscriptionRegistry::new()),
            index: Arc::new(TransactionIndex::new()),
            cursor: Arc::new(AtomicU64::new(cursor)),
            seeded,
            state: PollState::Idle,
            backoff: Backoff::new(config.poll_interval, config.retry_delay, config.max_retry_delay),
            config,
            shutdown: ShutdownHandle::new(),
        }
    }

    /// Query handle sharing this loop's registry, index and cursor
    pub fn parser(&self) -> BlockParser {
        BlockParser::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.index),
            Arc::clone(&self.cursor),
        )
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Highest block number fully scanned, `0` if none
    pub fn cursor(&self) -> u64 {
        self.cursor.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn config(&self) -> &PollLoopConfig {
        &self.config
    }

    /// Run poll cycles until shutdown is requested. Returns the final cursor.
    pub async fn run(&mut self) -> u64 {
        info!(
            "Starting poll loop with {}ms polling interval from cursor {}",
            self.config.poll_interval.as_millis(),
            self.cursor()
        );

        while !self.shutdown.is_shutdown() {
            let before = self.cursor();
            let outcome = self.poll_once().await;
            let advanced = self.cursor() > before;

            // only cycles that scanned nothing escalate the backoff
            let delay = match &outcome {
                PollOutcome::Stopped { .. } => break,
                outcome if outcome.is_failure() && !advanced => self.backoff.on_failure(),
                _ => self.backoff.on_success(),
            };

            if self.backoff.consecutive_failures() > 0 {
                LogContext::new("poll_loop", "backoff")
                    .with_retry_count(self.backoff.consecutive_failures())
                    .with_metadata("delay_ms", serde_json::json!(delay.as_millis() as u64))
                    .info(&format!("Retrying in {}ms", delay.as_millis()));
            }

            if self.shutdown.sleep(delay).await {
                break;
            }
        }

        self.state = PollState::Idle;
        info!("Poll loop stopped at block {}", self.cursor());
        self.cursor()
    }

    /// Perform one Fetching (and, if the chain advanced, Scanning) cycle
    pub async fn poll_once(&mut self) -> PollOutcome {
        if self.shutdown.is_shutdown() {
            return PollOutcome::Stopped { scanned_to: self.cursor() };
        }

        self.state = PollState::Fetching;
        let latest = match self.fetch(self.client.get_latest_height()).await {
            None => return self.stop(),
            Some(Ok(height)) => height,
            Some(Err(e)) => {
                self.state = PollState::Idle;
                LogContext::new("poll_loop", "fetch_height")
                    .with_block_number(self.cursor())
                    .warn(&format!("Failed to fetch latest block height: {}", e));
                return PollOutcome::HeightUnavailable(e);
            }
        };

        self.seed_cursor(latest);

        let cursor = self.cursor();
        if latest <= cursor {
            self.state = PollState::Idle;
            self.log_status(latest);
            return PollOutcome::Idle { latest };
        }

        self.state = PollState::Scanning;
        let from = cursor + 1;
        let mut recorded = 0;

        for height in from..=latest {
            if self.shutdown.is_shutdown() {
                info!("Shutdown signal received during block processing");
                return self.stop();
            }

            let block = match self.fetch(self.client.get_block(height)).await {
                None => return self.stop(),
                Some(Ok(block)) if block.number != height => Err(RpcError::InvalidResponse(format!(
                    "Requested block {} but received block {}",
                    height, block.number
                ))),
                Some(result) => result,
            };

            let block = match block {
                Ok(block) => block,
                Err(e) => {
                    self.state = PollState::Idle;
                    LogContext::new("poll_loop", "fetch_block")
                        .with_block_number(height)
                        .error(&format!("Failed to fetch block {}, will retry next cycle: {}", height, e));
                    return PollOutcome::Interrupted {
                        scanned_to: height - 1,
                        failed_at: height,
                        error: e,
                    };
                }
            };

            let summary = self.scanner.scan(&block, &self.registry, &self.index);
            recorded += summary.recorded;
            self.cursor.store(height, Ordering::SeqCst);
        }

        self.state = PollState::Idle;
        self.log_status(latest);
        PollOutcome::Scanned { from, to: latest, recorded }
    }

    /// Bound a chain call by the fetch timeout and abandon it on shutdown.
    /// `None` means shutdown was requested.
    async fn fetch<T, F>(&self, operation: F) -> Option<Result<T, RpcError>>
    where
        F: Future<Output = Result<T, RpcError>>,
    {
        let limit = self.config.fetch_timeout;
        tokio::select! {
            _ = self.shutdown.wait() => None,
            result = timeout(limit, operation) => Some(
                result.unwrap_or_else(|_| Err(RpcError::Timeout { seconds: limit.as_secs() }))
            ),
        }
    }

    fn seed_cursor(&mut self, latest: u64) {
        if self.seeded {
            return;
        }
        self.seeded = true;

        let start = latest.saturating_sub(1);
        self.cursor.store(start, Ordering::SeqCst);
        info!("No start block configured, starting from current latest block {}", latest);
    }

    fn stop(&mut self) -> PollOutcome {
        self.state = PollState::Idle;
        PollOutcome::Stopped { scanned_to: self.cursor() }
    }

    fn log_status(&self, latest: u64) {
        MetricsLogger::log_poll_status(
            latest,
            self.cursor(),
            self.registry.len(),
            self.index.total_records(),
        );
    }
}
