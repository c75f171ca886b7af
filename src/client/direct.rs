//! The degenerate, non-proxied transport: executes the request directly
//! against its target, used when `ClientBuilder::proxy_urls` is empty
//! (spec §4.4). Grounded on the same "build request, execute, rebuild
//! response" shape the proxy engine uses for its own outbound fetch.

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::Request as HyperRequest;

use crate::error::ProxyError;
use crate::http::client::hyper_client::{create_client, HyperClient};
use crate::model::{Request, Response};

use super::Transport;

pub struct DirectTransport {
    client: HyperClient,
}

impl DirectTransport {
    pub fn new() -> Self {
        Self { client: create_client() }
    }
}

impl Default for DirectTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for DirectTransport {
    async fn execute(&self, req: Request) -> Result<Response, ProxyError> {
        if req.url.is_empty() {
            return Err(ProxyError::bad_request("url is required"));
        }
        let decoded_body = req.decode_body()?;

        let mut builder = HyperRequest::builder()
            .method(req.effective_method())
            .uri(&req.url);
        for (name, value) in &req.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !req.cookies.is_empty() {
            builder = builder.header("cookie", req.cookies.as_str());
        }
        let body = Full::new(Bytes::from(decoded_body))
            .map_err(|never| match never {})
            .boxed();
        let http_req = builder
            .body(body)
            .map_err(|e| ProxyError::bad_request(format!("failed to create http request: {e}")))?;

        let fut = self.client.request(http_req);
        let upstream = if let Some(timeout) = req.timeout_duration() {
            tokio::time::timeout(timeout, fut)
                .await
                .map_err(|_| ProxyError::timeout("request timed out"))?
                .map_err(|e| e.into_proxy_error())?
        } else {
            fut.await.map_err(|e| e.into_proxy_error())?
        };

        let status = upstream.status().as_u16();
        let headers = upstream
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();

        let body_bytes = upstream
            .into_body()
            .collect()
            .await
            .map_err(|e| ProxyError::unknown(format!("failed to read response body: {e}")))?
            .to_bytes();

        let mut resp = Response::new(status);
        resp.headers = headers;
        resp.set_body(&body_bytes);
        Ok(resp)
    }
}
