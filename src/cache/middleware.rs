//! Read-through response cache middleware.
//!
//! Wraps a read route: a hit is served straight from the store without running
//! the handler, a miss runs the handler and stores its body iff the status is
//! `200 OK`. Backend trouble never fails the request.

use std::time::Duration;

use axum::{
    body::{Body, HttpBody},
    extract::{Query, State},
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use metrics::counter;
use tracing::{debug, error, instrument, warn};

use crate::application::chapters::ChapterListQuery;

use super::{
    METRIC_CACHE_ERROR, METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_CACHE_STORE,
    client::CacheClient,
    codec,
    keys::{CacheKeys, KeyScope},
};

/// Key scope and lifetime for one cached route.
#[derive(Debug, Clone, Copy)]
pub struct RouteCache {
    pub scope: KeyScope,
    pub ttl: Duration,
    /// Larger (or unsized) bodies stream through uncached.
    pub max_body_bytes: usize,
}

/// Shared state for one `read_through_layer` instance.
#[derive(Clone)]
pub struct ReadThroughState {
    pub client: CacheClient,
    pub keys: CacheKeys,
    pub route: RouteCache,
    pub enabled: bool,
}

impl ReadThroughState {
    fn derive_key(&self, request: &Request<Body>) -> Option<String> {
        match self.route.scope {
            KeyScope::List => Query::<ChapterListQuery>::try_from_uri(request.uri())
                .ok()
                .map(|Query(query)| self.keys.derive_key(&query)),
            KeyScope::Item => request
                .uri()
                .path()
                .rsplit('/')
                .next()
                .filter(|id| !id.is_empty())
                .map(|id| self.keys.derive_item_key(id)),
        }
    }
}

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn read_through_layer(
    State(cache): State<ReadThroughState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.enabled || request.method() != Method::GET {
        return next.run(request).await;
    }

    // Queries the handler would reject anyway are not worth a key.
    let Some(key) = cache.derive_key(&request) else {
        return next.run(request).await;
    };

    if let Some(body) = lookup(&cache.client, &key).await {
        counter!(METRIC_CACHE_HIT).increment(1);
        debug!(
            target = "chapterdash::cache::read_through",
            key = %key,
            outcome = "hit",
            "serving cached response"
        );
        return cached_response(body);
    }

    counter!(METRIC_CACHE_MISS).increment(1);
    debug!(
        target = "chapterdash::cache::read_through",
        key = %key,
        outcome = "miss",
        "cache miss, executing handler"
    );

    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let limit = cache.route.max_body_bytes;
    match body.size_hint().exact() {
        Some(len) if len <= limit as u64 => {}
        len => {
            debug!(
                target = "chapterdash::cache::read_through",
                key = %key,
                body_bytes = ?len,
                limit,
                "response body over the cache limit; not storing"
            );
            return Response::from_parts(parts, body);
        }
    }

    let bytes = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(
                target = "chapterdash::cache::read_through",
                key = %key,
                error = %err,
                "failed to buffer handler response"
            );
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    store(&cache, &key, &bytes).await;
    Response::from_parts(parts, Body::from(bytes))
}

async fn lookup(client: &CacheClient, key: &str) -> Option<Bytes> {
    let stored = match client.get(key).await {
        Ok(stored) => stored?,
        Err(err) => {
            counter!(METRIC_CACHE_ERROR, "op" => "get").increment(1);
            warn!(
                target = "chapterdash::cache::read_through",
                key = %key,
                error = %err,
                "cache lookup failed; bypassing cache"
            );
            return None;
        }
    };

    match codec::decode(stored) {
        Ok(body) => Some(body),
        Err(err) => {
            warn!(
                target = "chapterdash::cache::read_through",
                key = %key,
                error = %err,
                "discarding undecodable cache entry"
            );
            None
        }
    }
}

async fn store(cache: &ReadThroughState, key: &str, body: &[u8]) {
    let encoded = match codec::encode(body) {
        Ok(encoded) => encoded,
        Err(err) => {
            debug!(
                target = "chapterdash::cache::read_through",
                key = %key,
                error = %err,
                "response body not cacheable"
            );
            return;
        }
    };

    match cache.client.set(key, &encoded, cache.route.ttl).await {
        Ok(()) => {
            counter!(METRIC_CACHE_STORE).increment(1);
        }
        Err(err) => {
            counter!(METRIC_CACHE_ERROR, "op" => "set").increment(1);
            warn!(
                target = "chapterdash::cache::read_through",
                key = %key,
                error = %err,
                "failed to store response"
            );
        }
    }
}

fn cached_response(body: Bytes) -> Response {
    let mut response = Response::new(Body::from(body));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::cache::InMemoryBackend;

    fn state(scope: KeyScope) -> ReadThroughState {
        ReadThroughState {
            client: CacheClient::new(
                Arc::new(InMemoryBackend::new()),
                Duration::from_millis(250),
            ),
            keys: CacheKeys::default(),
            route: RouteCache {
                scope,
                ttl: Duration::from_secs(60),
                max_body_bytes: 1024 * 1024,
            },
            enabled: true,
        }
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn list_keys_come_from_the_query_string() {
        let state = state(KeyScope::List);
        assert_eq!(
            state.derive_key(&get("/api/v1/chapters?class=11&limit=10")),
            Some("chapters:11:::::1:10".to_string())
        );
        assert_eq!(
            state.derive_key(&get("/api/v1/chapters?subject=Physics%20I")),
            Some("chapters:::::Physics I:1:10".to_string())
        );
    }

    #[test]
    fn item_keys_come_from_the_last_path_segment() {
        let state = state(KeyScope::Item);
        assert_eq!(
            state.derive_key(&get("/api/v1/chapters/abc?ignored=1")),
            Some("chapters:id:abc".to_string())
        );
    }

    #[test]
    fn cached_response_is_json_ok() {
        let response = cached_response(Bytes::from_static(b"{}"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
    }
}
