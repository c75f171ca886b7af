//! The proxy execution engine (spec §4.1): the server-side handler that
//! consumes a `Request` envelope, optionally serves from cache, otherwise
//! performs the outbound fetch with timeout, content-type gating, and
//! size-bounded inline/streamed response handling.

pub mod content_type;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use chrono::Utc;
use futures::StreamExt;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes as HyperBytes;
use hyper::{Request as HyperRequest, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cachekey::cache_key;
use crate::error::ProxyError;
use crate::http::client::hyper_client::{create_client, HyperClient};
use crate::model::{Request, Response};
use crate::storage::Storage;

/// Inline-vs-streamed threshold (spec §4.1).
pub const INLINE_LIMIT: i64 = 1 << 20;
const MAX_REDIRECTS: u32 = 5;

const HEAD_SIGNED_URL_TTL: Duration = Duration::from_secs(15 * 60);
const LARGE_OBJECT_SIGNED_URL_TTL: Duration = Duration::from_secs(60 * 60);
const STREAMED_SIGNED_URL_TTL: Duration = Duration::from_secs(15 * 60);

pub struct ProxyEngine {
    client: HyperClient,
    storage: Arc<dyn Storage>,
    proxy_name: String,
    region: String,
}

impl ProxyEngine {
    pub fn new(storage: Arc<dyn Storage>, proxy_name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            client: create_client(),
            storage,
            proxy_name: proxy_name.into(),
            region: region.into(),
        }
    }

    pub async fn handle(&self, req: Request, cancel: CancellationToken) -> Result<Response, ProxyError> {
        crate::metrics::inc_requests_total();
        let result = self.handle_inner(req, cancel).await;
        if result.is_err() {
            crate::metrics::inc_proxy_errors_total();
        }
        result
    }

    async fn handle_inner(&self, req: Request, cancel: CancellationToken) -> Result<Response, ProxyError> {
        let started = std::time::Instant::now();

        let url = self.validate(&req)?;
        let decoded_body = req.decode_body()?;
        let key = cache_key(req.effective_method(), &url, &decoded_body);

        if let Some(max_age) = req.cache_max_age_duration() {
            if let Some(resp) = race_cancel(&cancel, self.try_cache_hit(&req, &key, max_age)).await? {
                crate::metrics::inc_cache_hits_total();
                return Ok(self.finalize(resp, started));
            }
            crate::metrics::inc_cache_misses_total();
        }

        let fetch = self.fetch_upstream(&req, &url, decoded_body);
        let (status, headers, body) = match req.timeout_duration() {
            Some(timeout) => {
                tokio::select! {
                    res = tokio::time::timeout(timeout, fetch) => match res {
                        Ok(inner) => inner?,
                        Err(_) => return Err(ProxyError::timeout("request exceeded configured timeout")),
                    },
                    _ = cancel.cancelled() => return Err(ProxyError::timeout("request cancelled")),
                }
            }
            None => {
                tokio::select! {
                    res = fetch => res?,
                    _ = cancel.cancelled() => return Err(ProxyError::timeout("request cancelled")),
                }
            }
        };

        let content_type = headers
            .get("content-type")
            .cloned()
            .unwrap_or_default();
        if !content_type::is_allowed(&content_type, &req.allowed_content_types) {
            return Err(ProxyError::disallowed_content_type(format!(
                "content type {content_type:?} is not in the allowed set"
            )));
        }

        let effective_content_type = if content_type.trim().is_empty() {
            "text/html".to_string()
        } else {
            content_type
        };

        let advertised_len = headers
            .get("content-length")
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(-1);

        let cache_max_age = req.cache_max_age_duration();
        let mut resp = Response::new(status.as_u16());
        resp.proxy_name = self.proxy_name.clone();

        let cache_time;
        if advertised_len == -1 || advertised_len > INLINE_LIMIT {
            let (signed_url, stored_len, ts) = race_cancel(
                &cancel,
                self.store_streamed(
                    &key,
                    body,
                    &effective_content_type,
                    &url,
                    req.effective_method(),
                    advertised_len,
                ),
            )
            .await?;
            resp.signed_url = Some(signed_url);
            resp.headers.insert("Content-Length".to_string(), stored_len.to_string());
            cache_time = ts;
        } else {
            let bytes = race_cancel(&cancel, body_to_inline_bytes(body, advertised_len)).await?;
            if cache_max_age.is_some() {
                let ts = race_cancel(
                    &cancel,
                    self.store_inline(&key, bytes.clone(), &effective_content_type, &url, req.effective_method()),
                )
                .await?;
                cache_time = ts;
            } else {
                cache_time = Utc::now();
            }
            resp.set_body(&bytes);
            resp.headers.insert("Content-Length".to_string(), bytes.len().to_string());
        }

        resp.headers.insert("Content-Type".to_string(), effective_content_type);
        resp.headers.insert("Cache-Time".to_string(), cache_time.to_rfc3339());
        resp.headers.insert("Cache-Key".to_string(), key);

        Ok(self.finalize(resp, started))
    }

    fn validate(&self, req: &Request) -> Result<url::Url, ProxyError> {
        if req.url.is_empty() {
            return Err(ProxyError::bad_request("url is required"));
        }
        let url = url::Url::parse(&req.url)
            .map_err(|e| ProxyError::bad_request(format!("invalid url: {e}")))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ProxyError::bad_request(format!(
                "unsupported url scheme: {}",
                url.scheme()
            )));
        }
        Ok(url)
    }

    async fn try_cache_hit(
        &self,
        req: &Request,
        key: &str,
        max_age: Duration,
    ) -> Result<Option<Response>, ProxyError> {
        let info = match self.storage.head(key).await {
            Ok(Some(info)) => info,
            Ok(None) => return Ok(None),
            Err(e) => return Err(ProxyError::storage(format!("cache head failed: {e}"))),
        };

        let Some(cached_at) = info.cached_at() else {
            return Ok(None);
        };
        let age = Utc::now().signed_duration_since(cached_at);
        if age.num_milliseconds() < 0 || age.to_std().unwrap_or(Duration::MAX) >= max_age {
            return Ok(None);
        }

        let mut resp = Response::new(200);
        resp.proxy_name = self.proxy_name.clone();
        resp.headers.insert("Content-Type".to_string(), info.content_type.clone());
        resp.headers.insert("Content-Length".to_string(), info.content_length.to_string());
        resp.headers.insert("Cache-Time".to_string(), cached_at.to_rfc3339());
        resp.headers.insert("Cache-Key".to_string(), key.to_string());

        if req.head {
            resp.signed_url = Some(
                self.storage
                    .sign_url(key, HEAD_SIGNED_URL_TTL)
                    .await
                    .map_err(|e| ProxyError::storage(format!("failed to sign url: {e}")))?,
            );
            return Ok(Some(resp));
        }

        if info.content_length > INLINE_LIMIT {
            resp.signed_url = Some(
                self.storage
                    .sign_url(key, LARGE_OBJECT_SIGNED_URL_TTL)
                    .await
                    .map_err(|e| ProxyError::storage(format!("failed to sign url: {e}")))?,
            );
            return Ok(Some(resp));
        }

        let (bytes, _) = self
            .storage
            .get(key)
            .await
            .map_err(|e| ProxyError::storage(format!("cache get failed: {e}")))?
            .ok_or_else(|| ProxyError::storage("object vanished between head and get"))?;
        resp.set_body(&bytes);
        Ok(Some(resp))
    }

    /// Executes the outbound fetch, following redirects up to `MAX_REDIRECTS`.
    async fn fetch_upstream(
        &self,
        req: &Request,
        url: &url::Url,
        body: Vec<u8>,
    ) -> Result<(StatusCode, HashMap<String, String>, hyper::body::Incoming), ProxyError> {
        let mut current_url = url.clone();
        let mut redirects = 0u32;

        loop {
            let mut builder = HyperRequest::builder()
                .method(req.effective_method())
                .uri(current_url.as_str());
            for (name, value) in &req.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if !req.cookies.is_empty() {
                builder = builder.header("cookie", req.cookies.as_str());
            }
            let outgoing = Full::new(HyperBytes::from(body.clone()))
                .map_err(|never| match never {})
                .boxed();
            let http_req = builder
                .body(outgoing)
                .map_err(|e| ProxyError::bad_request(format!("failed to build outbound request: {e}")))?;

            let upstream = self
                .client
                .request(http_req)
                .await
                .map_err(classify_transport_error)?;

            let status = upstream.status();
            if status.is_redirection() && redirects < MAX_REDIRECTS {
                if let Some(location) = upstream.headers().get("location").and_then(|v| v.to_str().ok()) {
                    if let Ok(next) = current_url.join(location) {
                        current_url = next;
                        redirects += 1;
                        continue;
                    }
                }
            }

            let headers = upstream
                .headers()
                .iter()
                .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_ascii_lowercase(), v.to_string())))
                .collect();
            return Ok((status, headers, upstream.into_body()));
        }
    }

    async fn store_inline(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        url: &url::Url,
        method: &str,
    ) -> Result<chrono::DateTime<Utc>, ProxyError> {
        let now = Utc::now();
        let metadata = self.object_metadata(now, url, method);
        self.storage
            .put(key, bytes, content_type, metadata)
            .await
            .map_err(|e| ProxyError::storage(format!("cache write failed: {e}")))?;
        Ok(now)
    }

    /// Uploads a large or unknown-length body to the cache as it arrives
    /// over the wire, without holding the whole thing in a single
    /// contiguous allocation ahead of time, then reads back the
    /// authoritative length from storage.
    async fn store_streamed(
        &self,
        key: &str,
        body: hyper::body::Incoming,
        content_type: &str,
        url: &url::Url,
        method: &str,
        content_length: i64,
    ) -> Result<(String, i64, chrono::DateTime<Utc>), ProxyError> {
        let now = Utc::now();
        let metadata = self.object_metadata(now, url, method);

        let chunks = futures::stream::unfold(body, |mut body| async move {
            match body.frame().await {
                Some(Ok(frame)) => {
                    let data = frame.into_data().unwrap_or_default();
                    Some((Ok(data), body))
                }
                Some(Err(e)) => Some((
                    Err(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        format!("failed reading upstream body: {e}"),
                    )),
                    body,
                )),
                None => None,
            }
        })
        .boxed();

        self.storage
            .put_stream(key, chunks, content_type, content_length, metadata)
            .await
            .map_err(|e| ProxyError::storage(format!("cache write failed: {e}")))?;

        let info = self
            .storage
            .head(key)
            .await
            .map_err(|e| ProxyError::storage(format!("cache head failed after streamed write: {e}")))?
            .ok_or_else(|| ProxyError::storage("streamed object missing immediately after write"))?;

        let signed_url = self
            .storage
            .sign_url(key, STREAMED_SIGNED_URL_TTL)
            .await
            .map_err(|e| ProxyError::storage(format!("failed to sign streamed url: {e}")))?;

        Ok((signed_url, info.content_length, now))
    }

    fn object_metadata(&self, ts: chrono::DateTime<Utc>, url: &url::Url, method: &str) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        metadata.insert("timestamp".to_string(), ts.to_rfc3339());
        metadata.insert("url".to_string(), url.to_string());
        metadata.insert("method".to_string(), method.to_string());
        metadata.insert("region".to_string(), self.region.clone());
        metadata
    }

    fn finalize(&self, mut resp: Response, started: std::time::Instant) -> Response {
        resp.duration = started.elapsed().as_secs_f64();
        if resp.proxy_name.is_empty() {
            resp.proxy_name = self.proxy_name.clone();
        }
        info!(
            component = "engine",
            status = resp.status_code,
            duration_s = resp.duration,
            proxy_name = %resp.proxy_name,
            "handled proxy request"
        );
        resp
    }
}

async fn body_to_inline_bytes(mut body: hyper::body::Incoming, advertised_len: i64) -> Result<Bytes, ProxyError> {
    if advertised_len >= 0 && advertised_len > INLINE_LIMIT {
        return Err(ProxyError::exceeded_max_body_size(format!(
            "advertised content length {advertised_len} exceeds inline limit {INLINE_LIMIT}"
        )));
    }

    let mut buf = BytesMut::new();
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| ProxyError::unknown(format!("failed reading upstream body: {e}")))?;
        if let Ok(data) = frame.into_data() {
            if buf.len() + data.len() > INLINE_LIMIT as usize {
                return Err(ProxyError::exceeded_max_body_size(format!(
                    "response body exceeded inline limit of {INLINE_LIMIT} bytes"
                )));
            }
            buf.extend_from_slice(&data);
        }
    }
    Ok(buf.freeze())
}

/// Races any cache-hit check, storage write or body read against ambient
/// cancellation (spec §5: "(b) object-store operations" and the body-read
/// continuation of "(a) outbound fetch").
async fn race_cancel<T>(
    cancel: &CancellationToken,
    fut: impl std::future::Future<Output = Result<T, ProxyError>>,
) -> Result<T, ProxyError> {
    tokio::select! {
        res = fut => res,
        _ = cancel.cancelled() => Err(ProxyError::timeout("request cancelled")),
    }
}

fn classify_transport_error(e: crate::http::client::hyper_client::RequestError) -> ProxyError {
    if !e.is_timeout() {
        warn!(component = "engine", error = %e, "upstream fetch failed");
    }
    e.into_proxy_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;
    use axum::routing::get;
    use axum::Router;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn spawn_upstream(body: &'static [u8], content_type: &'static str) -> (String, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let router = Router::new().route(
            "/",
            get(move || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    ([("content-type", content_type)], body)
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{addr}/"), calls)
    }

    #[tokio::test]
    async fn cache_miss_inline_round_trip() {
        let (url, _calls) = spawn_upstream(b"hello", "text/plain").await;
        let storage = Arc::new(MemoryStorage::default());
        let engine = ProxyEngine::new(storage, "burrow-1", "us-east-1");

        let mut req = Request::new(url);
        req.cache_max_age = 60.0;
        let resp = engine.handle(req, CancellationToken::new()).await.unwrap();

        assert_eq!(resp.status_code, 200);
        assert_eq!(resp.header("content-length"), Some("5"));
        assert!(resp.header("cache-key").unwrap().starts_with("cache/"));
        assert_eq!(resp.decode_body().unwrap(), b"hello");
    }

    #[tokio::test]
    async fn cache_hit_skips_outbound_fetch() {
        let (url, calls) = spawn_upstream(b"hello", "text/plain").await;
        let storage = Arc::new(MemoryStorage::default());
        let engine = ProxyEngine::new(storage, "burrow-1", "us-east-1");

        let mut req = Request::new(url);
        req.cache_max_age = 60.0;
        engine.handle(req.clone(), CancellationToken::new()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let resp = engine.handle(req, CancellationToken::new()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(resp.decode_body().unwrap(), b"hello");
    }

    #[tokio::test]
    async fn cache_hit_head_mode_returns_signed_url_no_body() {
        let (url, _calls) = spawn_upstream(b"hello", "text/plain").await;
        let storage = Arc::new(MemoryStorage::default());
        let engine = ProxyEngine::new(storage, "burrow-1", "us-east-1");

        let mut req = Request::new(url);
        req.cache_max_age = 60.0;
        engine.handle(req.clone(), CancellationToken::new()).await.unwrap();

        req.head = true;
        let resp = engine.handle(req, CancellationToken::new()).await.unwrap();
        assert!(resp.signed_url.is_some());
        assert!(resp.body.is_empty());
        assert!(resp.header("cache-time").is_some());
    }

    #[tokio::test]
    async fn content_type_rejected_is_a_typed_error() {
        let (url, _calls) = spawn_upstream(b"<html></html>", "text/html").await;
        let storage = Arc::new(MemoryStorage::default());
        let engine = ProxyEngine::new(storage, "burrow-1", "us-east-1");

        let mut req = Request::new(url);
        req.allowed_content_types = vec!["application/json".to_string()];
        let err = engine.handle(req, CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.kind.code(), 3);
    }

    #[tokio::test]
    async fn bad_url_is_a_typed_error() {
        let storage = Arc::new(MemoryStorage::default());
        let engine = ProxyEngine::new(storage, "burrow-1", "us-east-1");
        let err = engine
            .handle(Request::new("not a url"), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind.code(), 1);
    }
}
