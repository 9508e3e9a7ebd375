// intent-config/src/lib.rs

use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub mod types;

pub use types::*;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Unsupported config format: {0}")]
	UnsupportedFormat(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

/// Configuration loader with environment variable overrides.
///
/// Without a file the loader starts from defaults, so a node can run with
/// nothing but environment variables.
pub struct ConfigLoader {
	file_path: Option<PathBuf>,
	env_prefix: String,
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "INTENT_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_path_buf());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	pub async fn load(&self) -> Result<IntentConfig, ConfigError> {
		let mut config = match &self.file_path {
			Some(path) => self.load_from_file(path).await?,
			None => {
				debug!("No configuration file given, starting from defaults");
				IntentConfig::default()
			}
		};

		self.apply_overrides(&mut config, |key| env::var(key).ok())?;

		config.validate()?;

		Ok(config)
	}

	async fn load_from_file(&self, path: &Path) -> Result<IntentConfig, ConfigError> {
		if !tokio::fs::try_exists(path).await? {
			return Err(ConfigError::FileNotFound(path.display().to_string()));
		}

		info!("Loading configuration from {:?}", path);
		let content = tokio::fs::read_to_string(path).await?;

		match path.extension().and_then(|s| s.to_str()) {
			Some("toml") => parse_toml(&content),
			Some("json") => parse_json(&content),
			Some("yaml") | Some("yml") => parse_yaml(&content),
			_ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
		}
	}

	/// Applies `<prefix>*` overrides using `lookup` to read variables.
	fn apply_overrides<F>(&self, config: &mut IntentConfig, lookup: F) -> Result<(), ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let var = |name: &str| lookup(&format!("{}{}", self.env_prefix, name));

		if let Some(node_id) = var("NODE_ID") {
			debug!("Overriding node id from environment");
			config.node.node_id = node_id;
		}

		if let Some(key) = var("SIGNING_KEY") {
			debug!("Overriding signing key from environment");
			config.node.signing_key = Some(key);
		}

		if let Some(level) = var("LOG_LEVEL") {
			config.logging.level = level;
		}

		if let Some(ttl) = var("DEFAULT_TTL") {
			config.intents.default_ttl_secs = ttl
				.parse()
				.map_err(|e| ConfigError::ValidationError(format!("Invalid default TTL: {}", e)))?;
		}

		if let Some(enabled) = var("MATCHING_ENABLED") {
			config.matching.enabled = enabled.parse().map_err(|e| {
				ConfigError::ValidationError(format!("Invalid matching flag: {}", e))
			})?;
		}

		if let Some(threshold) = var("CONFIDENCE_THRESHOLD") {
			config.matching.confidence_threshold = threshold.parse().map_err(|e| {
				ConfigError::ValidationError(format!("Invalid confidence threshold: {}", e))
			})?;
		}

		Ok(())
	}
}

pub fn parse_toml(content: &str) -> Result<IntentConfig, ConfigError> {
	toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

pub fn parse_json(content: &str) -> Result<IntentConfig, ConfigError> {
	serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

pub fn parse_yaml(content: &str) -> Result<IntentConfig, ConfigError> {
	serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

impl IntentConfig {
	pub fn validate(&self) -> Result<(), ConfigError> {
		let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

		if self.node.node_id.trim().is_empty() {
			return invalid("node.node_id must not be empty");
		}

		if let Some(key) = &self.node.signing_key {
			let key = key.strip_prefix("0x").unwrap_or(key);
			if key.is_empty() || key.len() % 2 != 0 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
				return invalid("node.signing_key must be a hex string");
			}
		} else if self.node.sign_intents {
			return invalid("node.sign_intents requires node.signing_key");
		}

		let intents = &self.intents;
		if intents.default_ttl_secs == 0 {
			return invalid("intents.default_ttl_secs must be greater than zero");
		}
		if intents.default_ttl_secs > intents.max_ttl_secs {
			return invalid("intents.default_ttl_secs exceeds intents.max_ttl_secs");
		}
		if intents.max_payload_size == 0 {
			return invalid("intents.max_payload_size must be greater than zero");
		}
		if intents.max_concurrent_intents == 0 {
			return invalid("intents.max_concurrent_intents must be greater than zero");
		}
		if intents.allowed_types.is_empty() {
			return invalid("intents.allowed_types must not be empty");
		}

		if self.pipeline.pipeline_timeout_secs == 0 || self.pipeline.stage_timeout_secs == 0 {
			return invalid("pipeline timeouts must be greater than zero");
		}
		if self.processor.handler_timeout_secs == 0 {
			return invalid("processor.handler_timeout_secs must be greater than zero");
		}

		let matching = &self.matching;
		if !(0.0..=1.0).contains(&matching.confidence_threshold) {
			return invalid("matching.confidence_threshold must be within [0, 1]");
		}
		if matching.cache_enabled && matching.cache_size == 0 {
			return invalid("matching.cache_size must be greater than zero when caching is enabled");
		}
		if matching.matching_timeout_secs == 0 {
			return invalid("matching.matching_timeout_secs must be greater than zero");
		}
		if matching.composite_weights.values().any(|w| *w < 0.0) {
			return invalid("matching.composite_weights must not be negative");
		}

		if self.lifecycle.cleanup_interval_secs == 0 {
			return invalid("lifecycle.cleanup_interval_secs must be greater than zero");
		}

		if self.subscriptions.buffer_size == 0 {
			return invalid("subscriptions.buffer_size must be greater than zero");
		}

		Ok(())
	}
}
