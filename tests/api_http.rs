// tests/api_http.rs
//
// End-to-end flow over the public router: ingest -> analyze -> reply queue
// -> approve -> export -> dashboard, all in dry-run (fallback) mode.

use std::sync::{Arc, RwLock};

use axum::body::{to_bytes, Body};
use axum::http::Request;
use http::StatusCode;
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot`

use guest_feedback_analyzer::analyze::FallbackClient;
use guest_feedback_analyzer::api::{create_router, AppState};
use guest_feedback_analyzer::config::voice::BrandVoice;
use guest_feedback_analyzer::store::MemoryStore;

fn test_router() -> axum::Router {
    create_router(AppState {
        store: Arc::new(MemoryStore::new()),
        voice: Arc::new(RwLock::new(BrandVoice::default_seed())),
        client: Arc::new(FallbackClient),
    })
}

async fn call(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let req = match body {
        Some(v) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn sample_rows() -> Value {
    json!([
        {
            "timestamp": "2025-06-02 10:00:00",
            "outlet": "Central Park",
            "brand": "Kopi Kita",
            "platform": "gofood",
            "rating": 1,
            "text": "Kuah tumpah semua, driver telat",
            "language": null,
            "username": "budi",
            "order_type": "delivery"
        },
        {
            "timestamp": "2025-06-03 12:30:00",
            "outlet": "Central Park",
            "brand": "Kopi Kita",
            "platform": "gofood",
            "rating": 5,
            "text": "Makanan enak sekali, pelayanan ramah",
            "language": null,
            "username": "dina",
            "order_type": "dine_in"
        }
    ])
}

#[tokio::test]
async fn health_is_ok() {
    let router = test_router();
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_column_is_rejected_up_front() {
    let router = test_router();
    let rows = json!([{ "text": "no other columns" }]);
    let (status, _) = call(&router, "POST", "/reviews", Some(rows)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn full_ops_flow() {
    let router = test_router();

    // Ingest
    let (status, body) = call(&router, "POST", "/reviews", Some(sample_rows())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["inserted"], 2);

    // Re-upload is harmless (insert-if-absent).
    let (_, body) = call(&router, "POST", "/reviews", Some(sample_rows())).await;
    assert_eq!(body["inserted"], 0);
    assert_eq!(body["skipped_existing"], 2);

    // Analyze pending
    let (status, body) = call(&router, "POST", "/analyze", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pending"], 2);
    assert_eq!(body["saved"], 2);

    // Second run finds nothing pending.
    let (_, body) = call(&router, "POST", "/analyze", None).await;
    assert_eq!(body["pending"], 0);
    assert_eq!(body["saved"], 0);

    // Reply queue: both analyses present, clean replies already approved.
    let (_, queue) = call(&router, "GET", "/replies", None).await;
    let queue = queue.as_array().unwrap();
    assert_eq!(queue.len(), 2);
    let negative = queue
        .iter()
        .find(|r| r["sentiment"] == "negative")
        .expect("spill review classifies negative");
    assert_eq!(negative["severity"], 5);
    assert_eq!(negative["status"], "approved");

    // Dashboard over everything.
    let (_, dash) = call(&router, "POST", "/dashboard", Some(json!({}))).await;
    assert_eq!(dash["summary"]["reviews_in_range"], 2);
    assert!((dash["summary"]["negative_share"].as_f64().unwrap() - 0.5).abs() < 1e-9);
    assert_eq!(dash["critical_incidents"].as_array().unwrap().len(), 1);

    // Outlet filter that matches nothing.
    let (_, empty) = call(
        &router,
        "POST",
        "/dashboard",
        Some(json!({ "outlets": ["Elsewhere"] })),
    )
    .await;
    assert_eq!(empty["summary"]["reviews_in_range"], 0);

    // Export marks approved rows as exported; a second export is empty.
    let (_, exported) = call(&router, "POST", "/export", None).await;
    assert_eq!(exported.as_array().unwrap().len(), 2);
    let (_, again) = call(&router, "POST", "/export", None).await;
    assert_eq!(again.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn banned_voice_holds_replies_as_draft_until_approved() {
    // A voice that bans a word the fallback templates actually use.
    let voice = BrandVoice {
        tone: "strict".into(),
        banned: vec!["thank".into()],
    };
    let router = create_router(AppState {
        store: Arc::new(MemoryStore::new()),
        voice: Arc::new(RwLock::new(voice)),
        client: Arc::new(FallbackClient),
    });

    let (_, _) = call(&router, "POST", "/reviews", Some(sample_rows())).await;
    let (_, _) = call(&router, "POST", "/analyze", None).await;

    let (_, queue) = call(&router, "GET", "/replies", None).await;
    let positive = queue
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["sentiment"] == "positive")
        .unwrap()
        .clone();
    // "Thank you for the great review!" trips the banned term.
    assert_eq!(positive["status"], "draft");

    let ids = json!({ "ids": [positive["id"]] });
    let (_, body) = call(&router, "POST", "/replies/approve", Some(ids)).await;
    assert_eq!(body["approved"], 1);

    let (_, queue) = call(&router, "GET", "/replies", None).await;
    let positive = queue
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["sentiment"] == "positive")
        .unwrap();
    assert_eq!(positive["status"], "approved");
}
