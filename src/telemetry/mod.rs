//! Observability: structured logging and Prometheus metrics.

pub mod metrics;
pub mod tracing;

pub use metrics::{record_access_decision, record_auth_attempt, AuthOutcome, MetricsState};
pub use tracing::init_telemetry;
