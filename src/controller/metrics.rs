// Prometheus metrics endpoint.

use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};

use crate::metrics::format_prometheus_metrics;

use super::Controller;

pub const PROMETHEUS_METRICS_PATH: &str = "/metrics";

/// PrometheusMetricsController serves the counters in `crate::metrics`.
pub struct PrometheusMetricsController;

impl PrometheusMetricsController {
    pub fn new() -> Self {
        Self
    }

    async fn get_metrics() -> impl IntoResponse {
        (
            StatusCode::OK,
            [("content-type", "text/plain; charset=utf-8")],
            format_prometheus_metrics(),
        )
    }
}

impl Default for PrometheusMetricsController {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller for PrometheusMetricsController {
    fn add_route(&self, router: Router) -> Router {
        router.route(PROMETHEUS_METRICS_PATH, get(Self::get_metrics))
    }
}
