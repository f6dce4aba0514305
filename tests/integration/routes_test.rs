use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use subgrant::{routes::create_router, services::InMemoryEntitlementStore};
use tower::ServiceExt;

use crate::common::{test_state, FakeStatusApi};

const VERIFY_URI: &str = "/api/v1/subscriptions/verify";

fn app(api: Arc<FakeStatusApi>, store: Arc<InMemoryEntitlementStore>) -> (Router, String) {
    let state = test_state(api, store);
    let token = state.jwt_service.generate_token("uid-bob", 900).unwrap();
    (create_router(state), token)
}

fn verify_request(bearer: Option<&str>, body: Value) -> Request<Body> {
    raw_request(bearer, Some("application/json"), Body::from(body.to_string()))
}

fn raw_request(bearer: Option<&str>, content_type: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(VERIFY_URI);
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(body).unwrap()
}

/// Bodies that cannot be read as a verification request
fn malformed_bodies() -> Vec<(Option<&'static str>, Body)> {
    vec![
        (None, Body::empty()),
        (Some("application/json"), Body::empty()),
        (Some("application/json"), Body::from("null")),
        (Some("text/plain"), Body::from("purchaseToken=tok123")),
        (
            Some("application/json"),
            Body::from(
                json!({ "purchaseToken": 1, "productId": "pro_monthly", "source": "google_play" })
                    .to_string(),
            ),
        ),
    ]
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn monthly_purchase() -> Value {
    json!({
        "source": "google_play",
        "productId": "pro_monthly",
        "purchaseToken": "tok123",
    })
}

#[tokio::test]
async fn test_verify_grants_entitlement() {
    let api = FakeStatusApi::answering(1, true);
    let store = Arc::new(InMemoryEntitlementStore::new());
    let (app, token) = app(api.clone(), store.clone());

    let response = app
        .oneshot(verify_request(Some(&token), monthly_purchase()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "success": true, "message": "Subscription successfully granted." })
    );
    assert_eq!(api.calls(), 1);

    let user = store.get("uid-bob").await.unwrap();
    assert!(user.is_pro);
    assert_eq!(user.last_subscription_id.as_deref(), Some("pro_monthly"));
}

#[tokio::test]
async fn test_missing_authorization_is_unauthenticated() {
    let api = FakeStatusApi::answering(1, true);
    let store = Arc::new(InMemoryEntitlementStore::new());
    let (app, _) = app(api.clone(), store.clone());

    let response = app
        .oneshot(verify_request(None, monthly_purchase()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"]["code"], json!("unauthenticated"));
    assert_eq!(api.calls(), 0);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_bad_token_is_unauthenticated() {
    let api = FakeStatusApi::answering(1, true);
    let (app, _) = app(api.clone(), Arc::new(InMemoryEntitlementStore::new()));

    let response = app
        .oneshot(verify_request(Some("not-a-jwt"), monthly_purchase()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"]["code"], json!("unauthenticated"));
    assert_eq!(api.calls(), 0);
}

#[tokio::test]
async fn test_missing_fields_are_invalid_argument() {
    let api = FakeStatusApi::answering(1, true);
    let (app, token) = app(api.clone(), Arc::new(InMemoryEntitlementStore::new()));

    let response = app
        .oneshot(verify_request(
            Some(&token),
            json!({ "source": "google_play", "productId": "pro_monthly" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], json!("invalid-argument"));
    assert_eq!(
        body["error"]["message"],
        json!("Missing required purchase verification parameters.")
    );
    assert_eq!(api.calls(), 0);
}

#[tokio::test]
async fn test_rejected_purchase_is_permission_denied() {
    let api = FakeStatusApi::answering(1, false);
    let store = Arc::new(InMemoryEntitlementStore::new());
    let (app, token) = app(api.clone(), store.clone());

    let response = app
        .oneshot(verify_request(Some(&token), monthly_purchase()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], json!("permission-denied"));
    // No store detail leaks to the caller
    assert_eq!(
        body["error"]["message"],
        json!("Purchase verification failed with the store.")
    );
    assert_eq!(api.calls(), 1);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_malformed_body_without_token_is_unauthenticated() {
    let api = FakeStatusApi::answering(1, true);
    let (app, _) = app(api.clone(), Arc::new(InMemoryEntitlementStore::new()));

    for (content_type, body) in malformed_bodies() {
        let response = app
            .clone()
            .oneshot(raw_request(None, content_type, body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"]["code"], json!("unauthenticated"));
        assert_eq!(body["error"]["message"], json!("User must be logged in."));
    }
    assert_eq!(api.calls(), 0);
}

#[tokio::test]
async fn test_malformed_body_with_token_is_invalid_argument() {
    let api = FakeStatusApi::answering(1, true);
    let store = Arc::new(InMemoryEntitlementStore::new());
    let (app, token) = app(api.clone(), store.clone());

    for (content_type, body) in malformed_bodies() {
        let response = app
            .clone()
            .oneshot(raw_request(Some(&token), content_type, body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"]["code"], json!("invalid-argument"));
        // serde detail stays in the logs
        assert_eq!(
            body["error"]["message"],
            json!("Missing required purchase verification parameters.")
        );
    }
    assert_eq!(api.calls(), 0);
    assert!(store.is_empty().await);
}
