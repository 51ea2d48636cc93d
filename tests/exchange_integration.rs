//! Integration tests for the exchange REST client and market port
//!
//! Every test runs against a local `wiremock` server, so no network access or
//! real credentials are needed. Backoff is shortened to milliseconds.

mod common;

use common::{payloads, test_credentials, TEST_API_KEY};
use goal_shock_engine::common::errors::EngineError;
use goal_shock_engine::common::types::{OrderAction, OrderRequest, SnapshotSource};
use goal_shock_engine::exchange::retry::RetryKind;
use goal_shock_engine::{ExchangeClient, ExchangeRestClient, MarketPort, RetryPolicy};
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use std::time::{Duration, Instant};
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BASE_PATH: &str = "/trade-api/v2";
const BACKOFF_BASE_MS: u64 = 20;

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(5, Duration::from_millis(BACKOFF_BASE_MS))
}

fn rest_client(server: &MockServer) -> ExchangeRestClient {
    ExchangeRestClient::new(&format!("{}{}", server.uri(), BASE_PATH))
        .expect("Failed to create REST client")
        .with_credentials(test_credentials())
        .with_retry_policy(fast_retry())
}

// ============================================================================
// Market Quotes
// ============================================================================

#[tokio::test]
async fn test_get_market_converts_cents() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/trade-api/v2/markets/m1"))
        .and(header("ACCESS-KEY", TEST_API_KEY))
        .and(header_exists("ACCESS-SIGNATURE"))
        .and(header_exists("ACCESS-TIMESTAMP"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payloads::market(45, 600)))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = rest_client(&server).get_market("m1").await.unwrap();

    assert_eq!(snapshot.price, dec!(0.45));
    assert_eq!(snapshot.liquidity, 600);
    assert_eq!(snapshot.source, SnapshotSource::Live);
}

#[test_log::test(tokio::test)]
async fn test_rate_limit_exhausts_five_attempts_then_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/trade-api/v2/markets/m1"))
        .respond_with(ResponseTemplate::new(429))
        .expect(5)
        .mount(&server)
        .await;

    let port = ExchangeClient::new(rest_client(&server));

    let started = Instant::now();
    let snapshot = port.fetch("m1").await;
    let elapsed = started.elapsed();

    assert!(snapshot.is_fallback());
    assert_eq!(snapshot.price, dec!(0.50));
    assert_eq!(snapshot.liquidity, 0);

    // 20 + 40 + 80 + 160 ms between the five attempts
    let minimum: Duration = fast_retry().schedule(RetryKind::RateLimited).iter().sum();
    assert_eq!(minimum, Duration::from_millis(300));
    assert!(elapsed >= minimum, "backoff too short: {:?}", elapsed);
}

#[tokio::test]
async fn test_rate_limit_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/trade-api/v2/markets/m1"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/trade-api/v2/markets/m1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payloads::market(30, 1200)))
        .mount(&server)
        .await;

    let snapshot = rest_client(&server).get_market("m1").await.unwrap();

    assert_eq!(snapshot.price, dec!(0.30));
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
}

#[tokio::test]
async fn test_rate_limit_honours_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/trade-api/v2/markets/m1"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/trade-api/v2/markets/m1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payloads::market(30, 1200)))
        .mount(&server)
        .await;

    let started = Instant::now();
    let snapshot = rest_client(&server).get_market("m1").await.unwrap();

    assert_eq!(snapshot.price, dec!(0.30));
    // The 20 ms backoff is stretched to the requested second
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_unknown_market_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/trade-api/v2/markets/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let result = rest_client(&server).get_market("missing").await;
    assert!(matches!(result, Err(EngineError::MarketNotFound(id)) if id == "missing"));
}

#[tokio::test]
async fn test_out_of_range_price_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/trade-api/v2/markets/m1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payloads::market(150, 600)))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = ExchangeClient::new(rest_client(&server)).fetch("m1").await;
    assert!(snapshot.is_fallback());
}

#[tokio::test]
async fn test_transport_failure_retries_with_fixed_delay() {
    // Nothing listens on the discard port
    let client = ExchangeRestClient::new("http://127.0.0.1:9/trade-api/v2")
        .unwrap()
        .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(10)));

    let result = client.get_market("m1").await;
    assert!(matches!(
        result,
        Err(EngineError::RetriesExhausted { attempts: 3, .. })
    ));
}

// ============================================================================
// Order Entry
// ============================================================================

#[tokio::test]
async fn test_place_order_is_signed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/trade-api/v2/order"))
        .and(header("ACCESS-KEY", TEST_API_KEY))
        .and(header_exists("ACCESS-SIGNATURE"))
        .and(header_exists("ACCESS-TIMESTAMP"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(serde_json::json!({
            "market_id": "m1",
            "action": "BUY",
            "order_type": "IOC"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(payloads::order_ack("ord-1", 0.44)))
        .expect(1)
        .mount(&server)
        .await;

    let order = OrderRequest::buy("m1", dec!(0.45), dec!(50));
    let result = rest_client(&server).place_order(&order).await.unwrap();

    assert_eq!(result.order_id, "ord-1");
    assert_eq!(result.fill_price, dec!(0.44));
}

#[tokio::test]
async fn test_missing_fill_price_uses_order_price() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/trade-api/v2/order"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"order": {"order_id": "ord-2"}})),
        )
        .mount(&server)
        .await;

    let order = OrderRequest::sell("m1", dec!(0.52), dec!(50));
    let result = ExchangeClient::new(rest_client(&server))
        .submit(&order)
        .await
        .unwrap();

    assert_eq!(order.action, OrderAction::Sell);
    assert_eq!(result.fill_price, dec!(0.52));
}

#[tokio::test]
async fn test_server_error_fails_submit_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/trade-api/v2/order"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "code": "internal",
                "message": "matching engine down"
            })),
        )
        .expect(2)
        .mount(&server)
        .await;

    let order = OrderRequest::buy("m1", dec!(0.45), dec!(50));
    let client = rest_client(&server);

    match client.place_order(&order).await {
        Err(EngineError::InvalidResponse(message)) => {
            assert!(message.contains("matching engine down"), "{}", message)
        }
        other => panic!("expected InvalidResponse, got {:?}", other),
    }
    assert!(ExchangeClient::new(client).submit(&order).await.is_none());
}
