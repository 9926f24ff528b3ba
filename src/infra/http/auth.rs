use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use super::error::ApiError;

const API_KEY_HEADER: &str = "x-api-key";

/// Shared-secret gate for write routes.
#[derive(Clone)]
pub struct AdminGate {
    api_key: Option<Arc<str>>,
}

impl AdminGate {
    /// With no key configured every request is rejected.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.map(Arc::from),
        }
    }

    pub fn permits(&self, presented: Option<&str>) -> bool {
        match (self.api_key.as_deref(), presented) {
            (Some(expected), Some(presented)) => {
                bool::from(expected.as_bytes().ct_eq(presented.as_bytes()))
            }
            _ => false,
        }
    }
}

pub async fn admin_auth(
    State(gate): State<AdminGate>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    if !gate.permits(presented) {
        return ApiError::unauthorized()
            .with_source("infra::http::auth")
            .into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_exact_key_passes() {
        let gate = AdminGate::new(Some("s3cret".to_string()));
        assert!(gate.permits(Some("s3cret")));
        assert!(!gate.permits(Some("s3cre")));
        assert!(!gate.permits(Some("s3cret ")));
        assert!(!gate.permits(None));
    }

    #[test]
    fn unset_key_rejects_everything() {
        let gate = AdminGate::new(None);
        assert!(!gate.permits(Some("")));
        assert!(!gate.permits(None));
    }
}
