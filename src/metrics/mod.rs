//! Simple atomic-counter metrics with Prometheus text exposition, scoped to
//! what the proxy engine and dispatcher actually count.

use std::sync::atomic::{AtomicU64, Ordering};

static REQUESTS_TOTAL: AtomicU64 = AtomicU64::new(0);
static CACHE_HITS_TOTAL: AtomicU64 = AtomicU64::new(0);
static CACHE_MISSES_TOTAL: AtomicU64 = AtomicU64::new(0);
static RETRIES_TOTAL: AtomicU64 = AtomicU64::new(0);
static DISPATCHER_ATTEMPTS_TOTAL: AtomicU64 = AtomicU64::new(0);
static PROXY_ERRORS_TOTAL: AtomicU64 = AtomicU64::new(0);

pub fn inc_requests_total() {
    REQUESTS_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_cache_hits_total() {
    CACHE_HITS_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_cache_misses_total() {
    CACHE_MISSES_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_retries_total() {
    RETRIES_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_dispatcher_attempts_total() {
    DISPATCHER_ATTEMPTS_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_proxy_errors_total() {
    PROXY_ERRORS_TOTAL.fetch_add(1, Ordering::Relaxed);
}

fn counter(output: &mut String, name: &str, help: &str, value: u64) {
    output.push_str("# HELP ");
    output.push_str(name);
    output.push(' ');
    output.push_str(help);
    output.push('\n');
    output.push_str("# TYPE ");
    output.push_str(name);
    output.push_str(" counter\n");
    output.push_str(name);
    output.push(' ');
    output.push_str(&value.to_string());
    output.push('\n');
}

/// Renders all counters in Prometheus text exposition format.
pub fn format_prometheus_metrics() -> String {
    let mut output = String::with_capacity(1024);
    counter(
        &mut output,
        "burrow_requests_total",
        "Total number of proxy requests handled",
        REQUESTS_TOTAL.load(Ordering::Relaxed),
    );
    counter(
        &mut output,
        "burrow_cache_hits_total",
        "Total number of cache hits",
        CACHE_HITS_TOTAL.load(Ordering::Relaxed),
    );
    counter(
        &mut output,
        "burrow_cache_misses_total",
        "Total number of cache misses",
        CACHE_MISSES_TOTAL.load(Ordering::Relaxed),
    );
    counter(
        &mut output,
        "burrow_retries_total",
        "Total number of dispatcher retries",
        RETRIES_TOTAL.load(Ordering::Relaxed),
    );
    counter(
        &mut output,
        "burrow_dispatcher_attempts_total",
        "Total number of dispatcher attempts across all top-level calls",
        DISPATCHER_ATTEMPTS_TOTAL.load(Ordering::Relaxed),
    );
    counter(
        &mut output,
        "burrow_proxy_errors_total",
        "Total number of proxy errors surfaced to callers",
        PROXY_ERRORS_TOTAL.load(Ordering::Relaxed),
    );
    output
}
