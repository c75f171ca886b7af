// Liveness endpoint for the demo server.

use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};

use super::Controller;

const SUCCESS_RESPONSE: &str = r#"{"status":200,"message":"ok"}"#;

/// HealthController answers `/healthz` with a static liveness check — the
/// demo binary keeps no internal state whose health could vary.
pub struct HealthController;

impl HealthController {
    pub fn new() -> Self {
        Self
    }

    async fn healthz() -> impl IntoResponse {
        (StatusCode::OK, SUCCESS_RESPONSE)
    }
}

impl Default for HealthController {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller for HealthController {
    fn add_route(&self, router: Router) -> Router {
        router.route("/healthz", get(Self::healthz))
    }
}
