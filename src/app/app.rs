// Top-level application wiring: storage, proxy engine and HTTP server.

use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::{Config, ConfigTrait};
use crate::engine::ProxyEngine;
use crate::storage::memory::MemoryStorage;
use crate::storage::Storage;

use super::server::HttpServer;

/// Encapsulates the entire proxy application state.
pub struct App {
    shutdown_token: CancellationToken,
    server: Arc<HttpServer>,
}

impl App {
    /// Creates a new proxy application instance.
    pub async fn new(shutdown_token: CancellationToken, cfg: Config) -> Result<Self> {
        let bucket = cfg
            .storage()
            .and_then(|s| s.bucket_name.clone())
            .unwrap_or_else(|| "burrow-cache".to_string());
        let storage: Arc<dyn Storage> =
            Arc::new(MemoryStorage::new(format!("https://{}.s3.amazonaws.com", bucket)));

        let proxy_name = cfg
            .proxy()
            .and_then(|p| p.proxy_name.clone())
            .unwrap_or_else(|| "burrow".to_string());
        let region = cfg.region();

        let engine = Arc::new(ProxyEngine::new(storage.clone(), proxy_name, region));

        let server = Arc::new(HttpServer::new(shutdown_token.clone(), cfg, engine)?);

        Ok(Self {
            shutdown_token,
            server,
        })
    }

    /// Serves the HTTP server, handling graceful shutdown.
    pub async fn serve(&self, gsh: Arc<crate::shutdown::GracefulShutdown>) -> Result<()> {
        let server = self.server.clone();
        let app_for_close = self.clone();
        let gsh_clone = gsh.clone();

        tokio::task::spawn(async move {
            if let Err(e) = server.listen_and_serve().await {
                error!(
                    component = "app",
                    scope = "server",
                    event = "serve_failed",
                    error = %e,
                    "server failed to serve"
                );
            }

            app_for_close.close();

            gsh_clone.done();
        });

        info!(component = "app", event = "started", "application lifecycle");

        Ok(())
    }

    /// Checks whether the HTTP server is still alive.
    pub fn is_alive(&self) -> bool {
        self.server.is_alive()
    }

    /// Closes application resources.
    pub fn close(&self) {
        self.shutdown_token.cancel();

        info!(component = "app", event = "stopped", "application lifecycle");
    }
}

impl Clone for App {
    fn clone(&self) -> Self {
        Self {
            shutdown_token: self.shutdown_token.clone(),
            server: self.server.clone(),
        }
    }
}
