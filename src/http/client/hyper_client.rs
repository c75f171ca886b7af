//! Hyper HTTP client configuration for the outbound/upstream connection
//! pool shared across invocations within a process (spec §5 "Shared
//! resources"):
//! - 10 idle connections per host, 90s idle timeout
//! - 5s connect timeout (stands in for the spec's TLS-handshake bound —
//!   `hyper-rustls` exposes no separate handshake timer, and the TCP
//!   connect phase dominates the budget in practice)
//! - 30s TCP keep-alive
//! - 10s response-header timeout, enforced by racing the request future
//!   since `hyper_util`'s client has no native knob for it
//! - TCP_NODELAY enabled

use std::time::Duration;

use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::dns::GaiResolver;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

/// Idle connections retained per host (spec §5).
pub const MAX_IDLE_PER_HOST: usize = 10;
/// How long an idle pooled connection is kept before eviction (spec §5).
pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
/// TCP connect timeout, standing in for the spec's TLS-handshake bound.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// TCP keep-alive interval for pooled connections (spec §5).
pub const KEEPALIVE: Duration = Duration::from_secs(30);
/// Bound on the wait for response headers (spec §5).
pub const RESPONSE_HEADER_TIMEOUT: Duration = Duration::from_secs(10);

type InnerClient = Client<HttpsConnector<HttpConnector<GaiResolver>>, BoxBody<Bytes, hyper::Error>>;

/// Failure of a single request/response exchange against the shared client:
/// either the transport itself failed, or headers didn't arrive within
/// [`RESPONSE_HEADER_TIMEOUT`].
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("response headers not received within {0:?}")]
    HeaderTimeout(Duration),
    #[error(transparent)]
    Transport(#[from] hyper_util::client::legacy::Error),
}

impl RequestError {
    /// True for both a transport-level timeout and a header-wait timeout,
    /// mirroring how callers classify upstream failures (spec §4.5).
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::HeaderTimeout(_) => true,
            Self::Transport(e) => e.is_timeout(),
        }
    }

    /// Maps this error to the shared proxy error taxonomy (spec §4.5): a
    /// timeout of either kind becomes `Timeout`, anything else `Unknown`.
    pub fn into_proxy_error(self) -> crate::error::ProxyError {
        if self.is_timeout() {
            crate::error::ProxyError::timeout(format!("upstream request timed out: {self}"))
        } else {
            crate::error::ProxyError::unknown(format!("failed to perform http request: {self}"))
        }
    }
}

/// A pooled Hyper client bounded per spec §5's connection-pool shape.
///
/// Uses `BoxBody` for requests (supports `Empty`/`Full`) and `Incoming` for
/// responses.
#[derive(Clone)]
pub struct HyperClient {
    inner: InnerClient,
}

impl HyperClient {
    /// Issues `req`, racing it against [`RESPONSE_HEADER_TIMEOUT`].
    pub async fn request(
        &self,
        req: hyper::Request<BoxBody<Bytes, hyper::Error>>,
    ) -> Result<hyper::Response<hyper::body::Incoming>, RequestError> {
        match tokio::time::timeout(RESPONSE_HEADER_TIMEOUT, self.inner.request(req)).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(e)) => Err(RequestError::Transport(e)),
            Err(_) => Err(RequestError::HeaderTimeout(RESPONSE_HEADER_TIMEOUT)),
        }
    }
}

/// Creates a Hyper HTTP client tuned to the shared-resource pool shape
/// spec §5 mandates.
pub fn create_client() -> HyperClient {
    let resolver = GaiResolver::new();

    let mut http_connector = HttpConnector::new_with_resolver(resolver);
    http_connector.set_nodelay(true);
    http_connector.set_keepalive(Some(KEEPALIVE));
    http_connector.set_connect_timeout(Some(CONNECT_TIMEOUT));

    // HTTP/1.1 only, so Host is sent as an HTTP/1.1 header rather than :authority.
    let tls = hyper_rustls::HttpsConnectorBuilder::new()
        .with_native_roots()
        .expect("failed to load native root certificates")
        .https_or_http()
        .enable_http1()
        .wrap_connector(http_connector);

    let inner = Client::builder(TokioExecutor::new())
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
        .http1_title_case_headers(false)
        .http1_allow_obsolete_multiline_headers_in_responses(true)
        .retry_canceled_requests(true)
        .build(tls);

    HyperClient { inner }
}
