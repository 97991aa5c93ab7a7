use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::blockchain::ShutdownHandle;
use crate::error::ValidationError;
use crate::models::{Address, Transaction};
use crate::parser::BlockParser;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(#[from] ValidationError),
    #[error("Server error: {0}")]
    Server(String),
}

impl From<&ApiError> for StatusCode {
    fn from(error: &ApiError) -> Self {
        match error {
            ApiError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            ApiError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ApiError> for (StatusCode, Json<ErrorResponse>) {
    fn from(error: ApiError) -> Self {
        let status = StatusCode::from(&error);
        let kind = match error {
            ApiError::InvalidParameter(_) => "invalid_parameter",
            ApiError::Server(_) => "server_error",
        };
        (
            status,
            Json(ErrorResponse {
                error: kind.to_string(),
                message: error.to_string(),
            }),
        )
    }
}

type ApiResult<T> = Result<T, (StatusCode, Json<ErrorResponse>)>;

/// Request body for `POST /subscriptions`
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    pub address: Address,
    /// `false` when the address was already watched
    pub subscribed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriptionsResponse {
    pub subscriptions: Vec<Address>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionsResponse {
    pub address: Address,
    pub transactions: Vec<Transaction>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub current_block: u64,
    pub subscriptions: usize,
    pub indexed_transactions: usize,
}

/// Error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub parser: BlockParser,
}

/// HTTP query surface over a [`BlockParser`]
pub struct ApiServer {
    parser: BlockParser,
    pub host: String,
    pub port: u16,
}

impl ApiServer {
    pub fn new(parser: BlockParser, host: &str, port: u16) -> Self {
        Self {
            parser,
            host: host.to_string(),
            port,
        }
    }

    pub fn router(&self) -> Router {
        router(AppState {
            parser: self.parser.clone(),
        })
    }

    /// Serve until `shutdown` is requested
    pub async fn start(&self, shutdown: ShutdownHandle) -> Result<(), ApiError> {
        let app = self.router();

        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ApiError::Server(format!("Failed to bind to {}: {}", addr, e)))?;

        log::info!("HTTP API server starting on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await
            .map_err(|e| ApiError::Server(format!("Server error: {}", e)))?;

        log::info!("HTTP API server stopped");
        Ok(())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/subscriptions", get(list_subscriptions).post(subscribe))
        .route("/transactions/:address", get(get_transactions))
        .route("/status", get(get_status))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// POST /subscriptions - Watch an address
pub async fn subscribe(
    State(state): State<AppState>,
    Json(request): Json<SubscribeRequest>,
) -> ApiResult<(StatusCode, Json<SubscriptionResponse>)> {
    let address = Address::parse(&request.address).map_err(ApiError::from)?;

    let subscribed = state.parser.subscribe(address.as_str());
    let status = if subscribed { StatusCode::CREATED } else { StatusCode::OK };

    Ok((status, Json(SubscriptionResponse { address, subscribed })))
}

/// GET /subscriptions - Watched addresses, sorted
pub async fn list_subscriptions(State(state): State<AppState>) -> Json<SubscriptionsResponse> {
    let subscriptions = state.parser.subscriptions();
    Json(SubscriptionsResponse {
        count: subscriptions.len(),
        subscriptions,
    })
}

/// GET /transactions/:address - Recorded transactions for an address
pub async fn get_transactions(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<TransactionsResponse>> {
    let address = Address::parse(&address).map_err(ApiError::from)?;
    let transactions = state.parser.get_transactions(address.as_str());

    Ok(Json(TransactionsResponse {
        address,
        count: transactions.len(),
        transactions,
    }))
}

/// GET /status - Cursor and index counters
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "running".to_string(),
        current_block: state.parser.get_current_block(),
        subscriptions: state.parser.subscriptions().len(),
        indexed_transactions: state.parser.indexed_transactions(),
    })
}
