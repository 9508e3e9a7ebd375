use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
	Healthy,
	Degraded,
	Unhealthy,
}

impl HealthStatus {
	pub fn is_healthy(&self) -> bool {
		matches!(self, HealthStatus::Healthy)
	}

	pub fn is_unhealthy(&self) -> bool {
		matches!(self, HealthStatus::Unhealthy)
	}

	/// Worst of the given statuses; healthy when empty.
	pub fn aggregate<'a>(statuses: impl IntoIterator<Item = &'a HealthStatus>) -> HealthStatus {
		let mut overall = HealthStatus::Healthy;
		for status in statuses {
			match status {
				HealthStatus::Unhealthy => return HealthStatus::Unhealthy,
				HealthStatus::Degraded => overall = HealthStatus::Degraded,
				HealthStatus::Healthy => {}
			}
		}
		overall
	}
}

/// Health check result with details
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
	pub status: HealthStatus,
	pub message: String,
	pub duration: Duration,
	pub details: HashMap<String, String>,
}

impl HealthCheckResult {
	fn with_status(status: HealthStatus, message: impl Into<String>) -> Self {
		Self {
			status,
			message: message.into(),
			duration: Duration::ZERO,
			details: HashMap::new(),
		}
	}

	pub fn healthy(message: impl Into<String>) -> Self {
		Self::with_status(HealthStatus::Healthy, message)
	}

	pub fn degraded(message: impl Into<String>) -> Self {
		Self::with_status(HealthStatus::Degraded, message)
	}

	pub fn unhealthy(message: impl Into<String>) -> Self {
		Self::with_status(HealthStatus::Unhealthy, message)
	}

	pub fn with_detail(mut self, key: impl Into<String>, value: impl ToString) -> Self {
		self.details.insert(key.into(), value.to_string());
		self
	}
}

/// Trait for implementing health checks
#[async_trait::async_trait]
pub trait HealthCheck: Send + Sync {
	fn name(&self) -> &str;

	async fn check(&self) -> HealthCheckResult;
}

/// Aggregate result of one round of checks.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
	pub status: HealthStatus,
	pub checks: HashMap<String, HealthCheckResult>,
}

/// Health check manager
#[derive(Clone)]
pub struct HealthChecker {
	checks: Arc<RwLock<Vec<Arc<dyn HealthCheck>>>>,
	last_report: Arc<RwLock<Option<HealthReport>>>,
	check_interval: Duration,
}

impl HealthChecker {
	pub fn new(check_interval: Duration) -> Self {
		Self {
			checks: Arc::new(RwLock::new(Vec::new())),
			last_report: Arc::new(RwLock::new(None)),
			check_interval,
		}
	}

	/// Registers a check, replacing any check with the same name.
	pub async fn register_check(&self, check: Arc<dyn HealthCheck>) {
		let mut checks = self.checks.write().await;
		checks.retain(|c| c.name() != check.name());
		checks.push(check);
	}

	/// Runs every check concurrently and stores the report.
	pub async fn run_all_checks(&self) -> HealthReport {
		let checks = self.checks.read().await.clone();

		let results = join_all(checks.iter().map(|check| async move {
			let start = Instant::now();
			let mut result = check.check().await;
			result.duration = start.elapsed();
			(check.name().to_string(), result)
		}))
		.await;

		for (name, result) in &results {
			match result.status {
				HealthStatus::Healthy => {
					debug!("Health check '{}' passed in {:?}", name, result.duration)
				}
				HealthStatus::Degraded => warn!(
					"Health check '{}' degraded in {:?}: {}",
					name, result.duration, result.message
				),
				HealthStatus::Unhealthy => error!(
					"Health check '{}' failed in {:?}: {}",
					name, result.duration, result.message
				),
			}
		}

		let checks: HashMap<String, HealthCheckResult> = results.into_iter().collect();
		let report = HealthReport {
			status: HealthStatus::aggregate(checks.values().map(|r| &r.status)),
			checks,
		};

		*self.last_report.write().await = Some(report.clone());
		report
	}

	pub async fn last_report(&self) -> Option<HealthReport> {
		self.last_report.read().await.clone()
	}

	/// Runs the checks every interval until `shutdown` fires.
	pub fn start_periodic_checks(&self, shutdown: CancellationToken) -> JoinHandle<()> {
		let checker = self.clone();
		tokio::spawn(async move {
			let mut interval = tokio::time::interval(checker.check_interval);
			loop {
				tokio::select! {
					_ = shutdown.cancelled() => break,
					_ = interval.tick() => {
						let report = checker.run_all_checks().await;
						if !report.status.is_healthy() {
							warn!("Node health is {:?}", report.status);
						}
					}
				}
			}
			info!("Periodic health checks stopped");
		})
	}
}
