use async_trait::async_trait;
use intent_config::IntentsConfig;
use intent_types::{priority, Intent, IntentError, IntentValidator, Result};

/// Intents may be stamped at most this far in the future.
const MAX_CLOCK_SKEW_SECS: i64 = 300;

/// Format and business-rule checks derived from the intents configuration.
pub struct BasicIntentValidator {
	allowed_types: Vec<String>,
	max_payload_size: usize,
	max_ttl_secs: u64,
}

impl BasicIntentValidator {
	pub fn new(config: &IntentsConfig) -> Self {
		Self {
			allowed_types: config
				.allowed_types
				.iter()
				.map(|t| t.to_lowercase())
				.collect(),
			max_payload_size: config.max_payload_size,
			max_ttl_secs: config.max_ttl_secs,
		}
	}
}

#[async_trait]
impl IntentValidator for BasicIntentValidator {
	async fn validate_format(&self, intent: &Intent) -> Result<()> {
		if intent.id.trim().is_empty() {
			return Err(IntentError::invalid_format("Intent ID is required"));
		}
		if intent.intent_type.trim().is_empty() {
			return Err(IntentError::invalid_format("Intent type is required"));
		}
		if intent.sender_id.trim().is_empty() {
			return Err(IntentError::invalid_format("Sender ID is required"));
		}
		if intent.payload.is_empty() {
			return Err(IntentError::invalid_format("Intent payload is required"));
		}
		if intent.payload.len() > self.max_payload_size {
			return Err(IntentError::invalid_format(format!(
				"Payload size {} exceeds maximum of {} bytes",
				intent.payload.len(),
				self.max_payload_size
			)));
		}
		if intent.signature.is_some() && intent.signature_algorithm.is_none() {
			return Err(IntentError::invalid_format(
				"Signed intent is missing its signature algorithm",
			));
		}
		Ok(())
	}

	async fn validate_business_rules(&self, intent: &Intent) -> Result<()> {
		let intent_type = intent.intent_type.trim().to_lowercase();
		if !self.allowed_types.contains(&intent_type) {
			return Err(IntentError::validation(format!(
				"Unsupported intent type '{}'",
				intent.intent_type
			)));
		}
		if !priority::is_valid(intent.priority) {
			return Err(IntentError::validation(format!(
				"Invalid priority {}",
				intent.priority
			)));
		}
		if intent.ttl > self.max_ttl_secs {
			return Err(IntentError::validation(format!(
				"TTL {}s exceeds maximum of {}s",
				intent.ttl, self.max_ttl_secs
			)));
		}
		let now = chrono::Utc::now().timestamp();
		if intent.timestamp > now + MAX_CLOCK_SKEW_SECS {
			return Err(IntentError::validation(format!(
				"Intent timestamp {} is in the future",
				intent.timestamp
			)));
		}
		Ok(())
	}
}
