//! A single proxy hop (spec §4.2): packages an outbound request into the
//! wire envelope, issues it to one proxy endpoint, and reconstructs a
//! response — optionally hydrating the body from a signed URL.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::Bytes;
use hyper::Request as HyperRequest;
use tokio_util::sync::CancellationToken;

use crate::error::ProxyError;
use crate::http::client::hyper_client::{create_client, HyperClient};
use crate::model::{Request, Response};

use super::{Callback, Transport};

pub struct ProxyTransport {
    proxy_url: String,
    method: String,
    client: HyperClient,
    timeout: Option<Duration>,
    allowed_content_types: Vec<String>,
    cache_max_age: Option<Duration>,
    callback: Option<Callback>,
    cancel: CancellationToken,
}

impl ProxyTransport {
    /// Builds a transport with a fresh pooled client (spec default method:
    /// POST).
    pub fn new(proxy_url: impl Into<String>) -> Self {
        Self::with_client(proxy_url, "POST", create_client())
    }

    /// Builds a transport reusing an externally-owned client, e.g. one
    /// shared across several transports in a round-robin set.
    pub fn with_client(proxy_url: impl Into<String>, method: impl Into<String>, client: HyperClient) -> Self {
        Self {
            proxy_url: proxy_url.into(),
            method: method.into(),
            client,
            timeout: None,
            allowed_content_types: Vec::new(),
            cache_max_age: None,
            callback: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Ties signed-URL hydration to an ambient cancellation token (spec §5
    /// "(d) signed-URL hydration").
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_allowed_content_types(mut self, types: Vec<String>) -> Self {
        self.allowed_content_types = types;
        self
    }

    pub fn with_cache_max_age(mut self, max_age: Duration) -> Self {
        self.cache_max_age = Some(max_age);
        self
    }

    pub fn with_callback(mut self, callback: Callback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Fetches the signed URL's body and splices it into `resp`, replacing
    /// the (empty) inline body (spec §4.2 "Signed-URL hydration"), racing
    /// the whole fetch against ambient cancellation (spec §5 "(d) signed-URL
    /// hydration").
    async fn hydrate_from_signed_url(&self, resp: &mut Response, url: &str) -> Result<(), ProxyError> {
        tokio::select! {
            res = self.hydrate_from_signed_url_inner(resp, url) => res,
            _ = self.cancel.cancelled() => Err(ProxyError::timeout("request cancelled")),
        }
    }

    async fn hydrate_from_signed_url_inner(&self, resp: &mut Response, url: &str) -> Result<(), ProxyError> {
        let get_req = HyperRequest::builder()
            .method("GET")
            .uri(url)
            .body(Empty::<Bytes>::new().map_err(|never| match never {}).boxed())
            .map_err(|e| ProxyError::unknown(format!("failed to build signed url request: {e}")))?;

        let hydrated = self.client.request(get_req).await.map_err(|e| e.into_proxy_error())?;

        let headers: HashMap<String, String> = hydrated
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();

        let body_bytes = hydrated
            .into_body()
            .collect()
            .await
            .map_err(|e| ProxyError::unknown(format!("failed to read signed url body: {e}")))?
            .to_bytes();

        let content_length = resp
            .header("content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(body_bytes.len());

        resp.set_body(&body_bytes);
        for (k, v) in headers {
            resp.headers.entry(k).or_insert(v);
        }
        resp.headers
            .insert("Content-Length".to_string(), content_length.to_string());
        Ok(())
    }
}

#[async_trait]
impl Transport for ProxyTransport {
    async fn execute(&self, mut req: Request) -> Result<Response, ProxyError> {
        if let Some(timeout) = self.timeout {
            req.timeout = timeout.as_secs_f64();
        }
        if !self.allowed_content_types.is_empty() {
            req.allowed_content_types = self.allowed_content_types.clone();
        }
        if let Some(max_age) = self.cache_max_age {
            req.cache_max_age = max_age.as_secs_f64();
        }

        let payload = serde_json::to_vec(&req)
            .map_err(|e| ProxyError::unknown(format!("failed to marshal request: {e}")))?;

        let body = Full::new(Bytes::from(payload))
            .map_err(|never| match never {})
            .boxed();
        let http_req = HyperRequest::builder()
            .method(self.method.as_str())
            .uri(&self.proxy_url)
            .header("content-type", "application/json")
            .body(body)
            .map_err(|e| ProxyError::unknown(format!("failed to create proxy request: {e}")))?;

        let proxy_resp = self.client.request(http_req).await.map_err(|e| e.into_proxy_error())?;

        let status = proxy_resp.status();
        let body_bytes = proxy_resp
            .into_body()
            .collect()
            .await
            .map_err(|e| ProxyError::unknown(format!("failed to read proxy response body: {e}")))?
            .to_bytes();

        if !status.is_success() {
            if let Ok(proxy_err) = serde_json::from_slice::<ProxyError>(&body_bytes) {
                return Err(proxy_err);
            }
            return Err(ProxyError::unknown(format!(
                "proxy returned non-200 status code: {status}"
            )));
        }

        let mut resp: Response = serde_json::from_slice(&body_bytes)
            .map_err(|e| ProxyError::unknown(format!("failed to unmarshal response: {e}")))?;

        if let Some(signed_url) = resp.signed_url.clone() {
            if !signed_url.is_empty() {
                self.hydrate_from_signed_url(&mut resp, &signed_url).await?;
            }
        }

        if let Some(callback) = &self.callback {
            callback(&req, &resp);
        }

        Ok(resp)
    }
}
