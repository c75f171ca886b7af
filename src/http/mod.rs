// HTTP module: outbound client and inbound server plumbing.

pub mod client;
pub mod server;

pub use crate::middleware::middleware::Middleware;
pub use crate::middleware::recover_middleware::panics_counter;

// Re-export server types
pub use server::{HttpServer, Server};

// Common controller interface
pub use crate::controller::controller::Controller;
