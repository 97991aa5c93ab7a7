use clap::Parser;

use crate::config::AppConfig;
use crate::error::ConfigError;

/// Watch Ethereum addresses and index the transactions that touch them
#[derive(Debug, Parser)]
#[command(name = "eth-block-parser")]
#[command(version)]
pub struct Cli {
    /// Addresses to subscribe to on startup
    pub addresses: Vec<String>,

    /// JSON-RPC endpoint of the node
    #[arg(long)]
    pub rpc_url: Option<String>,

    /// Treat blocks up to this height as already scanned
    #[arg(long)]
    pub start_block: Option<u64>,

    /// Delay between poll cycles in milliseconds
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Do not start the HTTP API
    #[arg(long)]
    pub no_api: bool,

    /// HTTP API port
    #[arg(long)]
    pub port: Option<u16>,
}

impl Cli {
    /// File, then environment, then flags; validated once on the merged result
    pub fn load_config(&self) -> Result<AppConfig, ConfigError> {
        let mut config = AppConfig::load_from_file()?;
        config.apply_env_overrides()?;
        self.apply_to(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Layer command line flags over the loaded configuration
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(rpc_url) = &self.rpc_url {
            config.rpc.endpoint = rpc_url.clone();
        }
        if let Some(start_block) = self.start_block {
            config.processing.start_block = Some(start_block);
        }
        if let Some(poll_interval_ms) = self.poll_interval_ms {
            config.processing.poll_interval_ms = poll_interval_ms;
        }
        if self.no_api {
            config.api.enabled = false;
        }
        if let Some(port) = self.port {
            config.api.port = port;
        }
        config.processing.addresses.extend(self.addresses.iter().cloned());
    }
}
