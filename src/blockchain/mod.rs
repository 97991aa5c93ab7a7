pub mod block_scanner;
pub mod chain_client;
pub mod poll_loop;
pub mod rpc_client;

pub use block_scanner::{BlockScanner, MatchDirection, ScanSummary, SelfTransferPolicy};
pub use chain_client::ChainClient;
pub use poll_loop::{PollLoop, PollLoopConfig, PollOutcome, PollState, ShutdownHandle, StartPosition};
pub use rpc_client::{parse_hex_quantity, RpcClient};
