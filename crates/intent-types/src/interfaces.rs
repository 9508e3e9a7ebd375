//! Collaborator traits consumed by the intent core.
//!
//! Implementations live outside the core: validation rule content, key
//! handling and the wire transport are supplied by the embedding service.

use crate::{Intent, Result, TransportMessage};
use async_trait::async_trait;
use std::sync::Arc;

/// Checks an intent against format and business rules.
#[async_trait]
pub trait IntentValidator: Send + Sync {
	/// Runs every check. The default runs format then business rules.
	async fn validate_intent(&self, intent: &Intent) -> Result<()> {
		self.validate_format(intent).await?;
		self.validate_business_rules(intent).await
	}

	async fn validate_format(&self, intent: &Intent) -> Result<()>;

	async fn validate_business_rules(&self, intent: &Intent) -> Result<()>;
}

/// Produces and checks intent signatures.
#[async_trait]
pub trait IntentSigner: Send + Sync {
	/// Signs the intent in place, setting `signature` and `signature_algorithm`.
	async fn sign_intent(&self, intent: &mut Intent, private_key: &[u8]) -> Result<()>;

	async fn verify_signature(&self, intent: &Intent) -> Result<()>;
}

/// Receives messages delivered on a subscribed topic.
#[async_trait]
pub trait MessageHandler: Send + Sync {
	async fn handle_message(&self, message: TransportMessage) -> Result<()>;
}

/// Handle for an active topic subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSubscription {
	pub id: String,
	pub topic: String,
}

/// Publish/subscribe layer that moves serialized intents between peers.
#[async_trait]
pub trait Transport: Send + Sync {
	async fn publish_message(&self, topic: &str, message: TransportMessage) -> Result<()>;

	async fn subscribe_to_topic(
		&self,
		topic: &str,
		handler: Arc<dyn MessageHandler>,
	) -> Result<TopicSubscription>;

	async fn unsubscribe(&self, subscription: &TopicSubscription) -> Result<()>;
}
