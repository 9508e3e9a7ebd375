use async_trait::async_trait;
use intent_core::IntentHandler;
use intent_types::{Intent, Result};
use tracing::info;

/// Acknowledges intents of the configured types by logging them.
///
/// Registered by the node for every allowed type so received broadcasts are
/// processed and become eligible for matching.
pub struct LoggingHandler {
	types: Vec<String>,
}

impl LoggingHandler {
	pub fn new<I, S>(types: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			types: types.into_iter().map(Into::into).collect(),
		}
	}
}

#[async_trait]
impl IntentHandler for LoggingHandler {
	fn name(&self) -> &str {
		"logging"
	}

	fn supported_types(&self) -> Vec<String> {
		self.types.clone()
	}

	fn priority(&self) -> i32 {
		0
	}

	async fn handle(&self, intent: &Intent) -> Result<()> {
		info!(
			"Handled {} intent {} from {} ({} byte payload)",
			intent.intent_type,
			intent.id,
			intent.sender_id,
			intent.payload.len()
		);
		Ok(())
	}
}
