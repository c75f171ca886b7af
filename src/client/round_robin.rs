//! Fair rotation with retry over an ordered sequence of child transports
//! (spec §4.3), grounded on the original single-attempt rotation primitive
//! but generalized with the retry/backoff loop spec §9 mandates
//! (per-attempt rotation advancement).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ProxyError;
use crate::model::{Request, Response};

use super::Transport;

/// Default retryable status-code set (spec §3 "Dispatcher state").
pub const DEFAULT_RETRYABLE_CODES: &[u16] = &[408, 429, 502, 503, 504, 999];

pub struct RoundRobinTransport {
    transports: Vec<Arc<dyn Transport>>,
    index: AtomicUsize,
    retries: u32,
    retryable_codes: Vec<u16>,
    cancel: CancellationToken,
}

impl RoundRobinTransport {
    /// `transports` must be non-empty. `retries` is clamped to `>= 0` by the
    /// caller (the facade enforces this; see `ClientBuilder::retries`).
    pub fn new(transports: Vec<Arc<dyn Transport>>, retries: u32) -> Self {
        Self::with_retryable_codes(transports, retries, DEFAULT_RETRYABLE_CODES.to_vec())
    }

    pub fn with_retryable_codes(
        transports: Vec<Arc<dyn Transport>>,
        retries: u32,
        retryable_codes: Vec<u16>,
    ) -> Self {
        assert!(!transports.is_empty(), "round-robin requires at least one transport");
        Self {
            transports,
            index: AtomicUsize::new(0),
            retries,
            retryable_codes,
            cancel: CancellationToken::new(),
        }
    }

    /// Ties backoff sleeps to an ambient cancellation token so a caller can
    /// abort mid-retry (spec §5 "Cancellation").
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Atomically selects the next transport and advances the rotation
    /// index modulo the transport count.
    fn next_transport(&self) -> Arc<dyn Transport> {
        let n = self.transports.len();
        let index = self.index.fetch_add(1, Ordering::SeqCst) % n;
        self.transports[index].clone()
    }

    fn is_retryable(&self, status: u16) -> bool {
        self.retryable_codes.contains(&status)
    }
}

#[async_trait]
impl Transport for RoundRobinTransport {
    async fn execute(&self, req: Request) -> Result<Response, ProxyError> {
        let mut last_response: Option<Response> = None;

        for attempt in 0..=self.retries {
            crate::metrics::inc_dispatcher_attempts_total();
            let transport = self.next_transport();
            let resp = transport.execute(req.clone()).await?;

            if resp.is_success() || !self.is_retryable(resp.status_code) {
                return Ok(resp);
            }

            last_response = Some(resp);

            if attempt < self.retries {
                crate::metrics::inc_retries_total();
                let backoff = Duration::from_millis(100 * 2u64.pow(attempt));
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = self.cancel.cancelled() => {
                        let err = ProxyError::timeout("cancelled during retry backoff");
                        return Err(match last_response {
                            Some(resp) => err.with_last_response(resp),
                            None => err,
                        });
                    }
                }
            }
        }

        last_response.ok_or_else(|| ProxyError::unknown("round-robin dispatcher produced no response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Instant;

    struct FixedTransport {
        status: u16,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Transport for FixedTransport {
        async fn execute(&self, _req: Request) -> Result<Response, ProxyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Response::new(self.status))
        }
    }

    #[tokio::test]
    async fn returns_first_success_without_retry() {
        let t = Arc::new(FixedTransport { status: 200, calls: AtomicU32::new(0) });
        let rr = RoundRobinTransport::new(vec![t.clone()], 2);
        let resp = rr.execute(Request::new("https://example.com")).await.unwrap();
        assert_eq!(resp.status_code, 200);
        assert_eq!(t.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_on_retryable_status_until_success() {
        let failing = Arc::new(FixedTransport { status: 503, calls: AtomicU32::new(0) });
        let succeeding = Arc::new(FixedTransport { status: 200, calls: AtomicU32::new(0) });
        let rr = RoundRobinTransport::new(vec![failing.clone(), succeeding.clone()], 2);

        let start = Instant::now();
        let resp = rr.execute(Request::new("https://example.com")).await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(resp.status_code, 200);
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(succeeding.calls.load(Ordering::SeqCst), 1);
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(300));
    }

    #[tokio::test]
    async fn exhausts_retry_budget_returning_last_response() {
        let t = Arc::new(FixedTransport { status: 503, calls: AtomicU32::new(0) });
        let rr = RoundRobinTransport::new(vec![t.clone()], 2);
        let resp = rr.execute(Request::new("https://example.com")).await.unwrap();
        assert_eq!(resp.status_code, 503);
        assert_eq!(t.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_status_returns_immediately() {
        let t = Arc::new(FixedTransport { status: 418, calls: AtomicU32::new(0) });
        let rr = RoundRobinTransport::new(vec![t.clone()], 5);
        let resp = rr.execute(Request::new("https://example.com")).await.unwrap();
        assert_eq!(resp.status_code, 418);
        assert_eq!(t.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fairness_over_k_times_n_calls_with_no_retries() {
        let n = 3usize;
        let transports: Vec<_> = (0..n)
            .map(|_| Arc::new(FixedTransport { status: 200, calls: AtomicU32::new(0) }))
            .collect();
        let dyn_transports: Vec<Arc<dyn Transport>> = transports
            .iter()
            .map(|t| t.clone() as Arc<dyn Transport>)
            .collect();
        let rr = RoundRobinTransport::new(dyn_transports, 0);

        let k = 4;
        for _ in 0..(k * n) {
            rr.execute(Request::new("https://example.com")).await.unwrap();
        }

        for t in &transports {
            assert_eq!(t.calls.load(Ordering::SeqCst), k as u32);
        }
    }

    #[tokio::test]
    async fn cancellation_during_backoff_returns_last_response_and_is_fast() {
        let t = Arc::new(FixedTransport { status: 503, calls: AtomicU32::new(0) });
        let cancel = CancellationToken::new();
        let rr = RoundRobinTransport::new(vec![t], 5).with_cancellation(cancel.clone());

        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel_clone.cancel();
        });

        let start = Instant::now();
        let err = rr.execute(Request::new("https://example.com")).await.unwrap_err();
        let elapsed = start.elapsed();

        assert_eq!(err.kind.code(), 4);
        assert_eq!(err.last_response.as_deref().map(|r| r.status_code), Some(503));
        assert!(elapsed < Duration::from_millis(100));
    }
}
