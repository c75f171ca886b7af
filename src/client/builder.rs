//! Option-based facade assembling a direct, single-proxy, or round-robin
//! transport from a bag of options (spec §4.4).

use std::sync::Arc;
use std::time::Duration;

use super::round_robin::DEFAULT_RETRYABLE_CODES;
use super::{Callback, DirectTransport, ProxyTransport, RoundRobinTransport, Transport};

#[derive(Default)]
pub struct ClientBuilder {
    proxy_urls: Vec<String>,
    retries: u32,
    retryable_codes: Option<Vec<u16>>,
    callback: Option<Callback>,
    timeout: Option<Duration>,
    allowed_content_types: Vec<String>,
    cache_max_age: Option<Duration>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The list of proxy endpoints. An empty list (the default) yields a
    /// direct, non-proxied client; every other option is then ignored.
    pub fn proxy_urls(mut self, urls: Vec<String>) -> Self {
        self.proxy_urls = urls;
        self
    }

    pub fn proxy_url(mut self, url: impl Into<String>) -> Self {
        self.proxy_urls = vec![url.into()];
        self
    }

    /// Retry budget for the dispatcher. Negative inputs don't exist in
    /// Rust's unsigned type, but a caller passing a signed count upstream
    /// should clamp to 0 before calling this (spec §4.4).
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn retryable_codes(mut self, codes: Vec<u16>) -> Self {
        self.retryable_codes = Some(codes);
        self
    }

    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&crate::model::Request, &crate::model::Response) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn allowed_content_types(mut self, types: Vec<String>) -> Self {
        self.allowed_content_types = types;
        self
    }

    pub fn cache_max_age(mut self, max_age: Duration) -> Self {
        self.cache_max_age = Some(max_age);
        self
    }

    /// Builds the final transport. Empty `proxy_urls` is the degenerate
    /// direct-client case; all other options are ignored there.
    pub fn build(self) -> Arc<dyn Transport> {
        if self.proxy_urls.is_empty() {
            return Arc::new(DirectTransport::new());
        }

        let children: Vec<Arc<dyn Transport>> = self
            .proxy_urls
            .into_iter()
            .map(|url| {
                let mut t = ProxyTransport::new(url);
                if let Some(timeout) = self.timeout {
                    t = t.with_timeout(timeout);
                }
                if !self.allowed_content_types.is_empty() {
                    t = t.with_allowed_content_types(self.allowed_content_types.clone());
                }
                if let Some(max_age) = self.cache_max_age {
                    t = t.with_cache_max_age(max_age);
                }
                if let Some(cb) = self.callback.clone() {
                    t = t.with_callback(cb);
                }
                Arc::new(t) as Arc<dyn Transport>
            })
            .collect();

        let codes = self.retryable_codes.unwrap_or_else(|| DEFAULT_RETRYABLE_CODES.to_vec());
        Arc::new(RoundRobinTransport::with_retryable_codes(children, self.retries, codes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_proxy_list_yields_direct_client() {
        use axum::routing::get;
        use axum::Router;

        let router = Router::new().route("/", get(|| async { "ok" }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let client = ClientBuilder::new().build();
        let resp = client
            .execute(crate::model::Request::new(format!("http://{addr}/")))
            .await
            .unwrap();
        assert_eq!(resp.status_code, 200);
    }

    #[test]
    fn single_proxy_url_builds_without_panicking() {
        let _client = ClientBuilder::new()
            .proxy_url("http://proxy.invalid")
            .retries(3)
            .timeout(Duration::from_secs(5))
            .build();
    }
}
