// The outer FaaS boundary: accepts a Request envelope, runs the proxy
// engine, and always answers inside an HTTP-200 envelope (spec §6/§7).

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::engine::ProxyEngine;
use crate::model::Request;

use super::Controller;

pub struct ProxyController {
    engine: Arc<ProxyEngine>,
    shutdown: CancellationToken,
}

impl ProxyController {
    pub fn new(engine: Arc<ProxyEngine>, shutdown: CancellationToken) -> Self {
        Self { engine, shutdown }
    }

    async fn invoke(
        State(controller): State<Arc<Self>>,
        Json(req): Json<Request>,
    ) -> impl IntoResponse {
        match controller.engine.handle(req, controller.shutdown.clone()).await {
            Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
            Err(err) => {
                error!(component = "proxy-controller", error = %err, "proxy request failed");
                let status = StatusCode::from_u16(err.outer_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, Json(err)).into_response()
            }
        }
    }
}

impl Controller for ProxyController {
    fn add_route(&self, router: Router) -> Router {
        let state = Arc::new(Self {
            engine: self.engine.clone(),
            shutdown: self.shutdown.clone(),
        });
        let sub = Router::new().route("/", post(Self::invoke)).with_state(state);
        router.merge(sub)
    }
}
