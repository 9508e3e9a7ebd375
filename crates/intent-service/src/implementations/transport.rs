use async_trait::async_trait;
use dashmap::DashMap;
use intent_types::{
	ErrorKind, IntentError, MessageHandler, Result, TopicSubscription, Transport, TransportMessage,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// In-process transport: published messages are delivered to every handler
/// subscribed to the topic in this process.
///
/// Each delivery runs on its own task, so publishing never waits on a
/// handler.
#[derive(Default)]
pub struct LoopbackTransport {
	topics: DashMap<String, Vec<(String, Arc<dyn MessageHandler>)>>,
	published: AtomicU64,
}

impl LoopbackTransport {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn published_count(&self) -> u64 {
		self.published.load(Ordering::Relaxed)
	}

	pub fn subscriber_count(&self, topic: &str) -> usize {
		self.topics.get(topic).map_or(0, |handlers| handlers.len())
	}
}

#[async_trait]
impl Transport for LoopbackTransport {
	async fn publish_message(&self, topic: &str, message: TransportMessage) -> Result<()> {
		if topic.trim().is_empty() {
			return Err(IntentError::new(
				ErrorKind::BroadcastFailed,
				"Cannot publish to an empty topic",
			));
		}

		let handlers: Vec<Arc<dyn MessageHandler>> = self
			.topics
			.get(topic)
			.map(|entry| entry.iter().map(|(_, h)| h.clone()).collect())
			.unwrap_or_default();
		self.published.fetch_add(1, Ordering::Relaxed);
		debug!(
			"Loopback publish of {} on {} to {} handlers",
			message.id,
			topic,
			handlers.len()
		);

		for handler in handlers {
			let message = message.clone();
			tokio::spawn(async move {
				let id = message.id.clone();
				if let Err(e) = handler.handle_message(message).await {
					warn!("Handler failed for message {}: {}", id, e);
				}
			});
		}
		Ok(())
	}

	async fn subscribe_to_topic(
		&self,
		topic: &str,
		handler: Arc<dyn MessageHandler>,
	) -> Result<TopicSubscription> {
		let subscription = TopicSubscription {
			id: uuid::Uuid::new_v4().to_string(),
			topic: topic.to_string(),
		};
		self.topics
			.entry(topic.to_string())
			.or_default()
			.push((subscription.id.clone(), handler));
		Ok(subscription)
	}

	async fn unsubscribe(&self, subscription: &TopicSubscription) -> Result<()> {
		if let Some(mut handlers) = self.topics.get_mut(&subscription.topic) {
			handlers.retain(|(id, _)| *id != subscription.id);
		}
		self.topics
			.remove_if(&subscription.topic, |_, handlers| handlers.is_empty());
		Ok(())
	}
}
