mod auth;
mod chapters;
mod error;
mod middleware;
mod models;
mod rate_limit;
mod upload;

pub use auth::AdminGate;
pub use error::ApiError;
pub use rate_limit::RateLimiter;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::application::chapters::ChapterService;
use crate::application::error::ErrorReport;
use crate::cache::{
    CacheClient, CacheConfig, CacheKeys, KeyScope, ReadThroughState, RouteCache,
    read_through_layer,
};

use self::middleware::{log_responses, set_request_context};
use self::models::{ServiceBanner, ServiceEndpoints};

const CHAPTERS_PATH: &str = "/api/v1/chapters";

#[derive(Clone)]
pub struct HttpState {
    pub chapters: Arc<ChapterService>,
}

/// Cache collaborators shared by the cached read routes.
#[derive(Clone)]
pub struct CacheWiring {
    pub client: CacheClient,
    pub keys: CacheKeys,
    pub config: CacheConfig,
}

impl CacheWiring {
    fn route_state(&self, scope: KeyScope) -> ReadThroughState {
        ReadThroughState {
            client: self.client.clone(),
            keys: self.keys.clone(),
            route: RouteCache {
                scope,
                ttl: self.config.ttl_for(scope),
                max_body_bytes: self.config.max_body_bytes,
            },
            enabled: self.config.enabled,
        }
    }
}

/// Everything the router needs besides handlers.
#[derive(Clone)]
pub struct RouterParts {
    pub state: HttpState,
    pub cache: CacheWiring,
    pub admin: AdminGate,
    pub rate_limiter: RateLimiter,
    pub max_upload_bytes: usize,
}

pub fn build_router(parts: RouterParts) -> Router {
    let RouterParts {
        state,
        cache,
        admin,
        rate_limiter,
        max_upload_bytes,
    } = parts;

    let list = get(chapters::list_chapters).layer(axum_middleware::from_fn_with_state(
        cache.route_state(KeyScope::List),
        read_through_layer,
    ));
    let upload = post(chapters::upload_chapters)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(axum_middleware::from_fn_with_state(admin, auth::admin_auth));
    let item = get(chapters::get_chapter).layer(axum_middleware::from_fn_with_state(
        cache.route_state(KeyScope::Item),
        read_through_layer,
    ));

    Router::new()
        .route("/", get(banner))
        .route("/_health/db", get(db_health))
        .route(CHAPTERS_PATH, list.merge(upload))
        .route(&format!("{CHAPTERS_PATH}/{{id}}"), item)
        .fallback(route_not_found)
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(
            rate_limiter,
            rate_limit::rate_limit,
        ))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn banner() -> Json<ServiceBanner> {
    Json(ServiceBanner {
        message: "Chapter Performance Dashboard API",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: ServiceEndpoints {
            chapters: CHAPTERS_PATH,
        },
    })
}

async fn db_health(State(state): State<HttpState>) -> Response {
    match state.chapters.ping_store().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

async fn route_not_found() -> ApiError {
    ApiError::not_found("Route not found").with_source("infra::http::fallback")
}
