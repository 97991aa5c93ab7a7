use clap::Parser;
use log::{error, info, warn};

use eth_block_parser::api::{ApiServer, Cli};
use eth_block_parser::blockchain::{PollLoop, PollLoopConfig, RpcClient};
use eth_block_parser::logging::init_logging;
use eth_block_parser::models::validate_address;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = cli.load_config()?;

    init_logging(&config.logging)?;

    if config.processing.addresses.is_empty() {
        error!("No address given; pass one or more addresses or set SUBSCRIBE_ADDRESSES");
        std::process::exit(2);
    }
    for address in &config.processing.addresses {
        validate_address(address)?;
    }

    info!("Starting Ethereum block parser against {}", config.rpc.endpoint);

    let client = RpcClient::from_config(&config.rpc)?;
    let mut poll_loop = PollLoop::new(client, PollLoopConfig::from(&config.processing));
    let parser = poll_loop.parser();

    for address in &config.processing.addresses {
        if !parser.subscribe(address) {
            warn!("Address listed more than once: {}", address);
        }
    }

    let shutdown = poll_loop.shutdown_handle();
    shutdown.listen_for_ctrl_c();

    let api_task = if config.api.enabled {
        let server = ApiServer::new(parser.clone(), &config.api.host, config.api.port);
        let api_shutdown = shutdown.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = server.start(api_shutdown).await {
                error!("HTTP API failed: {}", e);
            }
        }))
    } else {
        None
    };

    let final_block = poll_loop.run().await;

    if let Some(task) = api_task {
        if let Err(e) = task.await {
            error!("HTTP API task failed: {}", e);
        }
    }

    info!("Stopped after block {}", final_block);
    for address in parser.subscriptions() {
        info!(
            "{}: {} transactions recorded",
            address,
            parser.get_transactions(address.as_str()).len()
        );
    }

    Ok(())
}
