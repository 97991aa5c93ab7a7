pub mod cli;
pub mod http;

pub use cli::Cli;
pub use http::{
    router, ApiError, ApiServer, AppState, ErrorResponse, StatusResponse, SubscribeRequest,
    SubscriptionResponse, SubscriptionsResponse, TransactionsResponse,
};
