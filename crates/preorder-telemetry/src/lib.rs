//! Prometheus metrics and structured logging for the preorder bot.
//!
//! - Structured logging with tracing (JSON in production)
//! - Prometheus counters and gauges for the price pipeline and broker session
//! - Optional `/metrics` HTTP endpoint

pub mod error;
pub mod logging;
pub mod metrics;
pub mod server;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
pub use server::serve_metrics;
