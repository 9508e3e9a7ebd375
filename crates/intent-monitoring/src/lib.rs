//! Observability for the intent node.
//!
//! # Components
//!
//! - `health`: registered health checks and aggregate node status
//! - `tracing`: subscriber setup with env-filter and optional JSON output

pub mod health;
pub mod tracing;

pub use health::{HealthCheck, HealthCheckResult, HealthChecker, HealthReport, HealthStatus};
pub use self::tracing::{init_tracing, TracingConfig};
