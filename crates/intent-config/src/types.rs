//! Configuration types for the intent node.

use intent_types::{
	DEFAULT_INTENT_TYPES, DEFAULT_QUERY_LIMIT, DEFAULT_TTL_SECS, MAX_PAYLOAD_SIZE, MAX_TTL_SECS,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Complete node configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct IntentConfig {
	/// Node identity and signing
	pub node: NodeConfig,
	/// Intent admission limits
	pub intents: IntentsConfig,
	/// Processing pipeline settings
	pub pipeline: PipelineConfig,
	/// Handler dispatch settings
	pub processor: ProcessorConfig,
	/// Matching engine settings
	pub matching: MatchingConfig,
	/// Lifecycle tracking settings
	pub lifecycle: LifecycleConfig,
	/// Local subscription fan-out
	pub subscriptions: SubscriptionConfig,
	/// Log output
	pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
	/// Node identifier used as sender for locally created intents
	pub node_id: String,
	/// Hex encoded signing key. Intents stay unsigned when absent.
	pub signing_key: Option<String>,
	/// Sign intents at creation time
	pub sign_intents: bool,
	/// Topics the node listens on for incoming broadcasts
	pub listen_topics: Vec<String>,
}

impl Default for NodeConfig {
	fn default() -> Self {
		Self {
			node_id: "intent-node".to_string(),
			signing_key: None,
			sign_intents: false,
			listen_topics: Vec::new(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IntentsConfig {
	pub default_ttl_secs: u64,
	pub max_ttl_secs: u64,
	pub max_payload_size: usize,
	pub default_query_limit: usize,
	/// Maximum number of intents held in the store at once
	pub max_concurrent_intents: usize,
	/// Accepted intent types, compared case-insensitively
	pub allowed_types: Vec<String>,
}

impl Default for IntentsConfig {
	fn default() -> Self {
		Self {
			default_ttl_secs: DEFAULT_TTL_SECS,
			max_ttl_secs: MAX_TTL_SECS,
			max_payload_size: MAX_PAYLOAD_SIZE,
			default_query_limit: DEFAULT_QUERY_LIMIT,
			max_concurrent_intents: 1000,
			allowed_types: DEFAULT_INTENT_TYPES.iter().map(|t| t.to_string()).collect(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
	pub pipeline_timeout_secs: u64,
	pub stage_timeout_secs: u64,
	pub max_retries: u32,
	pub enable_signature: bool,
	pub enable_enrichment: bool,
	pub enable_transformation: bool,
	pub enable_filtering: bool,
	/// Types rejected by the filtering stage
	pub blocked_types: Vec<String>,
	/// Senders rejected by the filtering stage
	pub blocked_senders: Vec<String>,
}

impl Default for PipelineConfig {
	fn default() -> Self {
		Self {
			pipeline_timeout_secs: 60,
			stage_timeout_secs: 10,
			max_retries: 3,
			enable_signature: true,
			enable_enrichment: true,
			enable_transformation: true,
			enable_filtering: true,
			blocked_types: Vec::new(),
			blocked_senders: Vec::new(),
		}
	}
}

impl PipelineConfig {
	pub fn pipeline_timeout(&self) -> Duration {
		Duration::from_secs(self.pipeline_timeout_secs)
	}

	pub fn stage_timeout(&self) -> Duration {
		Duration::from_secs(self.stage_timeout_secs)
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProcessorConfig {
	pub handler_timeout_secs: u64,
	pub handler_max_retries: u32,
}

impl Default for ProcessorConfig {
	fn default() -> Self {
		Self {
			handler_timeout_secs: 30,
			handler_max_retries: 3,
		}
	}
}

impl ProcessorConfig {
	pub fn handler_timeout(&self) -> Duration {
		Duration::from_secs(self.handler_timeout_secs)
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MatchingConfig {
	pub enabled: bool,
	pub confidence_threshold: f64,
	pub max_matches_per_intent: usize,
	pub cache_enabled: bool,
	pub cache_size: usize,
	pub matching_timeout_secs: u64,
	/// Composite rule weights keyed by rule name
	pub composite_weights: HashMap<String, f64>,
}

impl Default for MatchingConfig {
	fn default() -> Self {
		let composite_weights = [
			("exact_match".to_string(), 0.4),
			("type_match".to_string(), 0.3),
			("metadata_match".to_string(), 0.3),
		]
		.into_iter()
		.collect();

		Self {
			enabled: true,
			confidence_threshold: 0.8,
			max_matches_per_intent: 10,
			cache_enabled: true,
			cache_size: 1000,
			matching_timeout_secs: 5,
			composite_weights,
		}
	}
}

impl MatchingConfig {
	pub fn matching_timeout(&self) -> Duration {
		Duration::from_secs(self.matching_timeout_secs)
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
	pub cleanup_interval_secs: u64,
	pub max_age_secs: u64,
}

impl Default for LifecycleConfig {
	fn default() -> Self {
		Self {
			cleanup_interval_secs: 300,
			max_age_secs: 24 * 3600,
		}
	}
}

impl LifecycleConfig {
	pub fn cleanup_interval(&self) -> Duration {
		Duration::from_secs(self.cleanup_interval_secs)
	}

	pub fn max_age(&self) -> Duration {
		Duration::from_secs(self.max_age_secs)
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SubscriptionConfig {
	/// Per-subscriber queue depth
	pub buffer_size: usize,
}

impl Default for SubscriptionConfig {
	fn default() -> Self {
		Self { buffer_size: 100 }
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
	pub level: String,
	pub json: bool,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			level: "info".to_string(),
			json: false,
		}
	}
}
