// HTTP server implementation for the proxy application.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::engine::ProxyEngine;
use crate::http::{Controller, Middleware, Server as HttpServerTrait};

/// HTTP server implementation that wraps all dependencies.
pub struct HttpServer {
    #[allow(dead_code)]
    ctx: CancellationToken,
    server: Arc<dyn HttpServerTrait>,
    is_server_alive: Arc<AtomicBool>,
}

impl HttpServer {
    /// Creates a new HttpServer, initializing the router with all controllers
    /// and middlewares.
    pub fn new(ctx: CancellationToken, cfg: Config, engine: Arc<ProxyEngine>) -> Result<Self> {
        let server = Self::make_http_server(ctx.clone(), cfg, engine)?;

        Ok(Self {
            ctx,
            server,
            is_server_alive: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Returns true if the server is marked as alive.
    pub fn is_alive(&self) -> bool {
        self.is_server_alive.load(Ordering::Relaxed)
    }

    /// Starts the HTTP server (blocking call).
    pub async fn listen_and_serve(&self) -> Result<()> {
        self.is_server_alive.store(true, Ordering::Relaxed);

        let result = self.server.listen_and_serve().await;

        self.is_server_alive.store(false, Ordering::Relaxed);
        result
    }

    /// Closes the HTTP server.
    #[allow(dead_code)]
    pub fn close(&self) -> Result<()> {
        self.ctx.cancel();
        Ok(())
    }

    fn make_http_server(
        ctx: CancellationToken,
        cfg: Config,
        engine: Arc<ProxyEngine>,
    ) -> Result<Arc<dyn HttpServerTrait>> {
        let controllers = Self::controllers(ctx.clone(), engine);
        let middlewares = Self::middlewares();

        let server = crate::http::HttpServer::new(ctx, cfg, controllers, middlewares)?;
        Ok(server as Arc<dyn HttpServerTrait>)
    }

    /// Returns all HTTP controllers for the server.
    fn controllers(ctx: CancellationToken, engine: Arc<ProxyEngine>) -> Vec<Box<dyn Controller>> {
        use crate::controller;

        vec![
            // Liveness endpoint
            Box::new(controller::HealthController::new()),
            // Metrics endpoint
            Box::new(controller::PrometheusMetricsController::new()),
            // The proxy itself
            Box::new(controller::ProxyController::new(engine, ctx)),
        ]
    }

    /// Returns the request middlewares for the server, executed in reverse order.
    fn middlewares() -> Vec<Box<dyn Middleware>> {
        vec![
            // Exec first - panic recovery
            Box::new(crate::middleware::recover_middleware::PanicRecoverMiddleware::new()),
        ]
    }
}
