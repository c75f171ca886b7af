//! Outbound-request capability and the transports that implement it
//! (spec §4.2–§4.4): a single proxy hop, a round-robin composite over
//! several hops, and the facade that assembles either from options.

pub mod builder;
pub mod direct;
pub mod round_robin;
pub mod transport;

use async_trait::async_trait;

use crate::error::ProxyError;
use crate::model::{Request, Response};

pub use builder::ClientBuilder;
pub use direct::DirectTransport;
pub use round_robin::RoundRobinTransport;
pub use transport::ProxyTransport;

/// A single operation: execute one outbound request and return the
/// reconstructed response, or a typed proxy error (spec §9 "Polymorphism
/// over child transports").
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, req: Request) -> Result<Response, ProxyError>;
}

/// Invoked once per successful envelope round-trip; must not mutate its
/// arguments or influence retry decisions (spec §4.2 "Post-response
/// callback").
pub type Callback = std::sync::Arc<dyn Fn(&Request, &Response) + Send + Sync>;
