use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::util::ServiceExt;

use eth_block_parser::api::{router, ApiServer, AppState};
use eth_block_parser::blockchain::{ChainClient, PollLoop, PollLoopConfig, StartPosition};
use eth_block_parser::error::RpcError;
use eth_block_parser::models::{Block, Transaction};
use eth_block_parser::BlockParser;

/// Two-block chain with traffic for 0xa and 0xb
struct FixtureChain;

#[async_trait]
impl ChainClient for FixtureChain {
    async fn get_latest_height(&self) -> Result<u64, RpcError> {
        Ok(102)
    }

    async fn get_block(&self, height: u64) -> Result<Block, RpcError> {
        let transactions = match height {
            101 => vec![
                Transaction::new("0x1", "0xA", "0xB", "0x10"),
                Transaction::new("0x2", "0xC", "0xD", "0x20"),
            ],
            102 => vec![Transaction::new("0x3", "0xB", "0xA", "0x30")],
            _ => Vec::new(),
        };
        Ok(Block::from_transactions(height, transactions))
    }
}

async fn setup_parser() -> BlockParser {
    let config = PollLoopConfig {
        start: StartPosition::After(100),
        ..PollLoopConfig::default()
    };
    let mut poll_loop = PollLoop::new(FixtureChain, config);
    let parser = poll_loop.parser();
    parser.subscribe("0xA");
    poll_loop.poll_once().await;
    parser
}

fn create_test_router(parser: BlockParser) -> Router {
    router(AppState { parser })
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn subscribe_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/subscriptions")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_get_status_endpoint() {
    let app = create_test_router(setup_parser().await);

    let request = Request::builder().uri("/status").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "running");
    assert_eq!(json["current_block"], 102);
    assert_eq!(json["subscriptions"], 1);
    assert_eq!(json["indexed_transactions"], 2);
}

#[tokio::test]
async fn test_get_transactions_endpoint() {
    let app = create_test_router(setup_parser().await);

    let request = Request::builder()
        .uri("/transactions/0xa")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["address"], "0xa");
    assert_eq!(json["count"], 2);
    assert_eq!(
        json["transactions"],
        json!([
            {"hash": "0x1", "from": "0xA", "to": "0xB", "value": "0x10"},
            {"hash": "0x3", "from": "0xB", "to": "0xA", "value": "0x30"}
        ])
    );
}

#[tokio::test]
async fn test_get_transactions_for_unknown_address() {
    let app = create_test_router(setup_parser().await);

    let request = Request::builder()
        .uri("/transactions/0xC")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["address"], "0xc");
    assert_eq!(json["count"], 0);
    assert_eq!(json["transactions"], json!([]));
}

#[tokio::test]
async fn test_subscribe_endpoint() {
    let parser = setup_parser().await;
    let app = create_test_router(parser.clone());

    let response = app
        .clone()
        .oneshot(subscribe_request(json!({"address": " 0xNEW "})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json_body(response).await, json!({"address": "0xnew", "subscribed": true}));
    assert!(parser.is_subscribed("0xnew"));

    let response = app
        .oneshot(subscribe_request(json!({"address": "0xnew"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["subscribed"], false);
}

#[tokio::test]
async fn test_subscribe_rejects_empty_address() {
    let app = create_test_router(setup_parser().await);

    let response = app
        .oneshot(subscribe_request(json!({"address": "   "})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "invalid_parameter");
    assert!(json["message"].as_str().unwrap().contains("address"));
}

#[tokio::test]
async fn test_subscribe_rejects_malformed_body() {
    let app = create_test_router(setup_parser().await);

    let response = app
        .oneshot(subscribe_request(json!({"addr": "0xA"})))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_list_subscriptions_is_sorted() {
    let parser = setup_parser().await;
    parser.subscribe("0xC");
    parser.subscribe("0xB");
    let app = ApiServer::new(parser, "127.0.0.1", 0).router();

    let request = Request::builder()
        .uri("/subscriptions")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["subscriptions"], json!(["0xa", "0xb", "0xc"]));
    assert_eq!(json["count"], 3);
}

#[tokio::test]
async fn test_cors_headers() {
    let app = create_test_router(setup_parser().await);

    let request = Request::builder()
        .uri("/status")
        .header(header::ORIGIN, "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn test_unknown_route() {
    let app = create_test_router(setup_parser().await);

    let request = Request::builder()
        .uri("/net-flow")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
