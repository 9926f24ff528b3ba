use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
    middleware,
    routing::get,
};
use chapterdash::cache::{
    CacheBackend, CacheBackendError, CacheClient, CacheInvalidator, CacheKeys, InMemoryBackend,
    KeyScope, ReadThroughState, RouteCache, read_through_layer,
};
use metrics_util::debugging::DebuggingRecorder;
use tower::ServiceExt;

struct RefusingBackend;

#[async_trait]
impl CacheBackend for RefusingBackend {
    fn name(&self) -> &'static str {
        "refusing"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, CacheBackendError> {
        Err(CacheBackendError::backend("refused"))
    }

    async fn set_ex(
        &self,
        _key: &str,
        _value: &str,
        _ttl: Duration,
    ) -> Result<(), CacheBackendError> {
        Err(CacheBackendError::backend("refused"))
    }

    async fn keys_with_prefix(&self, _prefix: &str) -> Result<Vec<String>, CacheBackendError> {
        Err(CacheBackendError::backend("refused"))
    }

    async fn delete_many(&self, _keys: &[String]) -> Result<u64, CacheBackendError> {
        Err(CacheBackendError::backend("refused"))
    }

    async fn close(&self) -> Result<(), CacheBackendError> {
        Ok(())
    }
}

fn cached_router(client: CacheClient, calls: Arc<AtomicUsize>) -> Router {
    let state = ReadThroughState {
        client,
        keys: CacheKeys::default(),
        route: RouteCache {
            scope: KeyScope::List,
            ttl: Duration::from_secs(60),
            max_body_bytes: 1024 * 1024,
        },
        enabled: true,
    };

    Router::new()
        .route(
            "/api/v1/chapters",
            get(move || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    axum::Json(serde_json::json!({"success": true, "chapters": []}))
                }
            }),
        )
        .layer(middleware::from_fn_with_state(state, read_through_layer))
}

async fn hit(router: &Router, uri: &str) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let client = CacheClient::new(Arc::new(InMemoryBackend::new()), Duration::from_secs(1));
    let calls = Arc::new(AtomicUsize::new(0));
    let router = cached_router(client.clone(), Arc::clone(&calls));

    // miss + store, then hit
    hit(&router, "/api/v1/chapters?subject=Physics").await;
    hit(&router, "/api/v1/chapters?subject=Physics").await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let invalidator = CacheInvalidator::new(client, CacheKeys::default());
    assert_eq!(invalidator.invalidate_all().await, 1);

    // backend failures degrade to bypass and are counted
    let broken = CacheClient::new(Arc::new(RefusingBackend), Duration::from_secs(1));
    let broken_router = cached_router(broken, Arc::clone(&calls));
    hit(&broken_router, "/api/v1/chapters").await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "chapterdash_cache_hit_total",
        "chapterdash_cache_miss_total",
        "chapterdash_cache_store_total",
        "chapterdash_cache_error_total",
        "chapterdash_cache_invalidated_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
