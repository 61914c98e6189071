use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use futures::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use order_engine::{build_router, AppState};
use order_engine_lifecycle::{LifecycleEngine, OrderService, StageTimings};
use order_engine_metrics::MetricsCollector;
use order_engine_queue::{JobScheduler, SchedulerConfig};
use order_engine_router::DexRouter;
use order_engine_store::{InMemoryOrderStore, OrderStore};
use order_engine_stream::{OrderStream, StreamSettings};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    router: Router,
    store: InMemoryOrderStore,
    scheduler: JobScheduler,
}

/// A fast pipeline: every simulated delay is a few milliseconds.
fn app(start: bool) -> TestApp {
    let store = InMemoryOrderStore::new();
    let stream = OrderStream::new(StreamSettings {
        heartbeat_interval: Duration::from_secs(3_600),
        observer_buffer: 64,
    });
    let metrics = Arc::new(MetricsCollector::new().unwrap());

    let engine = Arc::new(
        LifecycleEngine::new(
            Arc::new(store.clone()),
            Arc::new(DexRouter::simulated(Duration::from_millis(20), 250)),
            stream.clone(),
            StageTimings {
                build_delay: Duration::from_millis(10),
                submit_delay: Duration::from_millis(10),
                route_timeout: None,
            },
        )
        .with_metrics(metrics.clone()),
    );
    let scheduler = JobScheduler::new(SchedulerConfig::default(), engine).unwrap();
    if start {
        scheduler.start().unwrap();
    }

    let service = Arc::new(
        OrderService::new(Arc::new(store.clone()), scheduler.clone()).with_metrics(metrics.clone()),
    );
    let router = build_router(AppState::new(service, stream, metrics));

    TestApp {
        router,
        store,
        scheduler,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

fn post_json(body: Value) -> Request<Body> {
    Request::post("/api/orders/execute")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn as_json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
// REST
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_submit_returns_accepted_with_order_id() {
    let app = app(false);

    let (status, body) = send(
        &app.router,
        post_json(json!({
            "orderType": "market",
            "baseMint": "SOL",
            "quoteMint": "USDC",
            "side": "buy",
            "amount": 1
        })),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    let order_id: Uuid = as_json(&body)["orderId"].as_str().unwrap().parse().unwrap();

    let record = app.store.get(order_id).await.unwrap().unwrap();
    assert_eq!(record.base_mint, "SOL");
    assert_eq!(record.slippage_bps, 250);
    assert!(app.scheduler.job_state(order_id).is_some());
}

#[tokio::test]
async fn test_submit_rejects_empty_base_mint() {
    let app = app(false);

    let (status, body) = send(
        &app.router,
        post_json(json!({
            "baseMint": "",
            "quoteMint": "USDC",
            "side": "buy",
            "amount": 1
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body = as_json(&body);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["message"], "baseMint is required");
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_submit_rejects_bad_values() {
    let app = app(false);

    for payload in [
        json!({ "baseMint": "SOL", "quoteMint": "USDC", "side": "hold", "amount": 1 }),
        json!({ "baseMint": "SOL", "quoteMint": "USDC", "side": "buy", "amount": 0 }),
        json!({
            "baseMint": "SOL", "quoteMint": "USDC", "side": "buy", "amount": 1,
            "slippageBps": 5000
        }),
        json!({
            "orderType": "limit", "baseMint": "SOL", "quoteMint": "USDC", "side": "buy",
            "amount": 1
        }),
    ] {
        let (status, body) = send(&app.router, post_json(payload.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{payload}");
        assert_eq!(as_json(&body)["error"], "validation_error", "{payload}");
    }
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_submit_rejects_malformed_json() {
    let app = app(false);

    let request = Request::post("/api/orders/execute")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(as_json(&body)["error"], "bad_request");
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_get_order_after_confirmation() {
    let app = app(true);

    let (_, body) = send(
        &app.router,
        post_json(json!({
            "baseMint": "SOL", "quoteMint": "USDC", "side": "sell", "amount": "2.5"
        })),
    )
    .await;
    let order_id = as_json(&body)["orderId"].as_str().unwrap().to_string();

    let mut order = Value::Null;
    for _ in 0..100 {
        let (status, body) = send(
            &app.router,
            Request::get(format!("/api/orders/{order_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        order = as_json(&body);
        if order["status"] == "confirmed" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(order["status"], "confirmed");
    assert_eq!(order["side"], "sell");
    assert!(order["txHash"].as_str().unwrap().starts_with("0x"));
    assert_eq!(order["history"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_get_order_errors() {
    let app = app(false);

    let (status, _) = send(
        &app.router,
        Request::get("/api/orders/not-a-uuid").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app.router,
        Request::get(format!("/api/orders/{}", Uuid::new_v4()))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(as_json(&body)["error"], "not_found");
}

#[tokio::test]
async fn test_plain_get_requires_upgrade() {
    let app = app(false);

    let (status, body) = send(
        &app.router,
        Request::get(format!("/api/orders/execute?orderId={}", Uuid::new_v4()))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], "Upgrade Required");
    assert_eq!(body["message"], "Use WebSocket upgrade for status streaming.");
}

#[tokio::test]
async fn test_health_and_metrics() {
    let app = app(false);
    send(
        &app.router,
        post_json(json!({ "baseMint": "SOL", "quoteMint": "USDC", "side": "buy", "amount": 1 })),
    )
    .await;

    let (status, _) = send(&app.router, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app.router,
        Request::get("/metrics").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("order_engine_orders_submitted_total 1"));
}

// ═══════════════════════════════════════════════════════════════════════════
// WEBSOCKET
// ═══════════════════════════════════════════════════════════════════════════

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("127.0.0.1:{}", addr.port())
}

async fn next_text<S>(ws: &mut S) -> Value
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let message = tokio::time::timeout(Duration::from_secs(10), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("socket ended")
            .unwrap();
        match message {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_websocket_streams_order_to_confirmation() {
    // Dispatch starts only once the observer is registered.
    let app = app(false);

    let (_, body) = send(
        &app.router,
        post_json(json!({ "baseMint": "SOL", "quoteMint": "USDC", "side": "buy", "amount": 1 })),
    )
    .await;
    let order_id = as_json(&body)["orderId"].as_str().unwrap().to_string();

    let addr = serve(app.router.clone()).await;
    let url = format!("ws://{addr}/api/orders/execute?orderId={order_id}");
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    let ack = next_text(&mut ws).await;
    assert_eq!(ack["status"], "pending");
    assert_eq!(ack["orderId"], order_id);
    assert_eq!(ack["detail"]["message"], "WebSocket subscription registered");

    app.scheduler.start().unwrap();

    let mut seen = Vec::new();
    loop {
        let event = next_text(&mut ws).await;
        let status = event["status"].as_str().unwrap().to_string();
        seen.push(status.clone());
        if status == "confirmed" {
            let detail = &event["detail"];
            assert!(detail["txHash"].as_str().unwrap().starts_with("0x"));
            assert!(matches!(detail["venue"].as_str(), Some("raydium") | Some("meteora")));
            assert!(detail["executionPrice"].is_string());
            break;
        }
    }
    assert_eq!(seen.last().map(String::as_str), Some("confirmed"));
    assert!(seen.contains(&"submitted".to_string()));

    ws.send(Message::Close(None)).await.unwrap();
}

#[tokio::test]
async fn test_websocket_without_order_id_is_closed_with_policy_code() {
    let app = app(false);
    let addr = serve(app.router.clone()).await;

    for url in [
        format!("ws://{addr}/api/orders/execute"),
        format!("ws://{addr}/api/orders/execute?orderId=nope"),
        format!("ws://{addr}/api/orders/execute?orderId={}", Uuid::new_v4()),
    ] {
        let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();

        let frame = next_text(&mut ws).await;
        assert_eq!(frame["status"], "failed", "{url}");
        assert!(frame["error"].is_string(), "{url}");

        match ws.next().await {
            Some(Ok(Message::Close(Some(close)))) => {
                assert_eq!(u16::from(close.code), 1008, "{url}");
            }
            other => panic!("expected close frame for {url}, got {other:?}"),
        }
    }
}
