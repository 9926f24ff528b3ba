//! Read-through layer behaviour around a counting handler.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    body::Body,
    http::{Method, Request, StatusCode},
    middleware,
    routing::get,
};
use chapterdash::cache::{
    CacheClient, CacheInvalidator, CacheKeys, InMemoryBackend, KeyScope, ReadThroughState,
    RouteCache, read_through_layer,
};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;

struct Harness {
    router: Router,
    calls: Arc<AtomicUsize>,
    client: CacheClient,
}

fn harness(status: StatusCode) -> Harness {
    harness_with_limit(status, 1024 * 1024)
}

fn harness_with_limit(status: StatusCode, max_body_bytes: usize) -> Harness {
    let client = CacheClient::new(Arc::new(InMemoryBackend::new()), Duration::from_secs(1));
    let calls = Arc::new(AtomicUsize::new(0));
    let state = ReadThroughState {
        client: client.clone(),
        keys: CacheKeys::default(),
        route: RouteCache {
            scope: KeyScope::List,
            ttl: Duration::from_secs(60),
            max_body_bytes,
        },
        enabled: true,
    };

    let handler_calls = Arc::clone(&calls);
    let handler = move || {
        let calls = Arc::clone(&handler_calls);
        async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            (status, Json(json!({"success": true, "call": n})))
        }
    };

    let router = Router::new()
        .route("/api/v1/chapters", get(handler.clone()).post(handler))
        .layer(middleware::from_fn_with_state(state, read_through_layer));

    Harness {
        router,
        calls,
        client,
    }
}

async fn call(harness: &Harness, method: Method, uri: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    let response = harness
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes()
        .to_vec();
    (status, body)
}

#[tokio::test]
async fn identical_gets_run_the_handler_once() {
    let harness = harness(StatusCode::OK);
    let first = call(&harness, Method::GET, "/api/v1/chapters?class=11").await;
    let second = call(&harness, Method::GET, "/api/v1/chapters?class=11").await;

    assert_eq!(first, second);
    assert_eq!(first.0, StatusCode::OK);
    assert_eq!(harness.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn omitted_pagination_matches_explicit_defaults() {
    let harness = harness(StatusCode::OK);
    call(&harness, Method::GET, "/api/v1/chapters").await;
    call(&harness, Method::GET, "/api/v1/chapters?limit=10").await;
    call(&harness, Method::GET, "/api/v1/chapters?page=1&limit=").await;
    assert_eq!(harness.calls.load(Ordering::SeqCst), 1);

    call(&harness, Method::GET, "/api/v1/chapters?limit=20").await;
    assert_eq!(harness.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn non_ok_responses_are_never_stored() {
    let harness = harness(StatusCode::INTERNAL_SERVER_ERROR);
    for _ in 0..3 {
        let (status, _) = call(&harness, Method::GET, "/api/v1/chapters").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
    assert_eq!(harness.calls.load(Ordering::SeqCst), 3);
    assert!(harness.client.keys_with_prefix("chapters:").await.unwrap().is_empty());
}

#[tokio::test]
async fn bodies_over_the_limit_pass_through_uncached() {
    let harness = harness_with_limit(StatusCode::OK, 8);
    let (status, body) = call(&harness, Method::GET, "/api/v1/chapters").await;
    assert_eq!(status, StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({"success": true, "call": 1}));

    call(&harness, Method::GET, "/api/v1/chapters").await;
    assert_eq!(harness.calls.load(Ordering::SeqCst), 2);
    assert!(harness.client.keys_with_prefix("chapters:").await.unwrap().is_empty());
}

#[tokio::test]
async fn posts_bypass_the_cache_entirely() {
    let harness = harness(StatusCode::OK);
    call(&harness, Method::POST, "/api/v1/chapters").await;
    call(&harness, Method::POST, "/api/v1/chapters").await;
    assert_eq!(harness.calls.load(Ordering::SeqCst), 2);
    assert!(harness.client.keys_with_prefix("chapters:").await.unwrap().is_empty());

    // A cached GET is not served to a POST either.
    call(&harness, Method::GET, "/api/v1/chapters").await;
    let (_, body) = call(&harness, Method::POST, "/api/v1/chapters").await;
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["call"], 4);
}

#[tokio::test]
async fn invalidation_forces_a_fresh_handler_run() {
    let harness = harness(StatusCode::OK);
    call(&harness, Method::GET, "/api/v1/chapters?subject=Physics").await;
    call(&harness, Method::GET, "/api/v1/chapters?subject=Physics").await;
    assert_eq!(harness.calls.load(Ordering::SeqCst), 1);

    let invalidator = CacheInvalidator::new(harness.client.clone(), CacheKeys::default());
    assert_eq!(invalidator.invalidate_all().await, 1);
    assert_eq!(invalidator.invalidate_all().await, 0);

    call(&harness, Method::GET, "/api/v1/chapters?subject=Physics").await;
    assert_eq!(harness.calls.load(Ordering::SeqCst), 2);
}
