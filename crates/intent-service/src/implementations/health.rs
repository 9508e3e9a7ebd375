use async_trait::async_trait;
use intent_core::IntentManager;
use intent_monitoring::{HealthCheck, HealthCheckResult};

/// Store occupancy at which the node reports itself degraded.
const DEGRADED_OCCUPANCY: f64 = 0.9;

/// Reports the size of the intent store against its capacity.
pub struct StoreHealthCheck {
	manager: IntentManager,
}

impl StoreHealthCheck {
	pub fn new(manager: IntentManager) -> Self {
		Self { manager }
	}
}

#[async_trait]
impl HealthCheck for StoreHealthCheck {
	fn name(&self) -> &str {
		"intent_store"
	}

	async fn check(&self) -> HealthCheckResult {
		let metrics = self.manager.metrics().await;
		let capacity = self.manager.config().intents.max_concurrent_intents;
		let occupancy = metrics.stored_intents as f64 / capacity.max(1) as f64;

		let result = if metrics.stored_intents >= capacity {
			HealthCheckResult::unhealthy(format!("Intent store full ({} intents)", capacity))
		} else if occupancy >= DEGRADED_OCCUPANCY {
			HealthCheckResult::degraded(format!(
				"Intent store at {:.0}% of capacity",
				occupancy * 100.0
			))
		} else {
			HealthCheckResult::healthy("Intent store has capacity")
		};

		result
			.with_detail("stored_intents", metrics.stored_intents)
			.with_detail("capacity", capacity)
			.with_detail("tracked_intents", self.manager.lifecycle().tracked_count())
			.with_detail("active_subscriptions", metrics.active_subscriptions)
			.with_detail("intents_failed", metrics.intents_failed)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use intent_config::IntentConfig;
	use intent_core::IntentManagerBuilder;
	use intent_monitoring::HealthStatus;
	use intent_types::CreateIntentRequest;

	#[tokio::test]
	async fn test_reports_capacity() {
		let mut config = IntentConfig::default();
		config.intents.max_concurrent_intents = 2;
		let manager = IntentManagerBuilder::new(config).build().await.unwrap();
		let check = StoreHealthCheck::new(manager.clone());

		let result = check.check().await;
		assert_eq!(result.status, HealthStatus::Healthy);
		assert_eq!(result.details["stored_intents"], "0");

		for payload in [b"1", b"2"] {
			manager
				.create_intent(CreateIntentRequest::new("trade", payload.to_vec(), "alice"))
				.await
				.unwrap();
		}
		let result = check.check().await;
		assert_eq!(result.status, HealthStatus::Unhealthy);
		assert_eq!(result.details["tracked_intents"], "2");
	}
}
