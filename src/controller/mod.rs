// HTTP API controllers.

pub mod controller;
pub mod health;
pub mod metrics;
pub mod proxy;

pub use controller::Controller;
pub use health::HealthController;
pub use metrics::PrometheusMetricsController;
pub use proxy::ProxyController;
