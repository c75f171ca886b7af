//! Integration tests driving the full axum router (controllers + middleware)
//! against an in-process mock upstream.

mod proxy_endpoint;
