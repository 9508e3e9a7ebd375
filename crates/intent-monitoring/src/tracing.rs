use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Tracing configuration
#[derive(Debug, Clone)]
pub struct TracingConfig {
	/// Default filter directive, used when `RUST_LOG` is not set
	pub level: String,
	pub json_format: bool,
	pub with_target: bool,
	pub with_thread_ids: bool,
	pub with_file_and_line: bool,
}

impl Default for TracingConfig {
	fn default() -> Self {
		Self {
			level: "info".to_string(),
			json_format: false,
			with_target: true,
			with_thread_ids: false,
			with_file_and_line: false,
		}
	}
}

impl TracingConfig {
	pub fn new(level: impl Into<String>) -> Self {
		Self {
			level: level.into(),
			..Self::default()
		}
	}

	pub fn with_json_format(mut self, json: bool) -> Self {
		self.json_format = json;
		self
	}

	pub fn debug() -> Self {
		Self {
			level: "debug".to_string(),
			with_thread_ids: true,
			with_file_and_line: true,
			..Self::default()
		}
	}

	pub fn production() -> Self {
		Self {
			level: "info".to_string(),
			json_format: true,
			with_target: false,
			with_thread_ids: false,
			with_file_and_line: false,
		}
	}

	/// Resolves the filter: `RUST_LOG` wins, then the configured level.
	pub fn env_filter(&self) -> Result<EnvFilter, String> {
		match EnvFilter::try_from_default_env() {
			Ok(filter) => Ok(filter),
			Err(_) => EnvFilter::try_new(&self.level)
				.map_err(|e| format!("Invalid log level '{}': {}", self.level, e)),
		}
	}
}

/// Initialize tracing with the given configuration
pub fn init_tracing(config: TracingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
	let filter = config.env_filter()?;
	let subscriber = tracing_subscriber::registry().with(filter);

	if config.json_format {
		let json_layer = tracing_subscriber::fmt::layer()
			.json()
			.with_target(config.with_target)
			.with_thread_ids(config.with_thread_ids)
			.with_file(config.with_file_and_line)
			.with_line_number(config.with_file_and_line);

		subscriber
			.with(json_layer)
			.try_init()
			.map_err(|e| format!("Failed to initialize tracing: {}", e))?;
	} else {
		let fmt_layer = tracing_subscriber::fmt::layer()
			.with_target(config.with_target)
			.with_thread_ids(config.with_thread_ids)
			.with_file(config.with_file_and_line)
			.with_line_number(config.with_file_and_line);

		subscriber
			.with(fmt_layer)
			.try_init()
			.map_err(|e| format!("Failed to initialize tracing: {}", e))?;
	}

	info!("Tracing initialized with level: {}", config.level);
	Ok(())
}
