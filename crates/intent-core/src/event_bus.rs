//! Event bus for communication between intent components.
//!
//! A broadcast channel lets the lifecycle tracker report expiry back to the
//! manager without holding a reference to it, and lets the embedding
//! service observe every state change.

use intent_types::IntentEvent;
use tokio::sync::broadcast;

/// Broadcasts [`IntentEvent`]s to every subscriber.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<IntentEvent>,
}

impl EventBus {
	/// Creates a bus buffering up to `capacity` events per slow subscriber
	/// before the oldest are dropped.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<IntentEvent> {
		self.sender.subscribe()
	}

	/// Publishes to all current subscribers.
	///
	/// Having no subscribers is not an error for the intent core, so the
	/// send result is discarded.
	pub fn publish(&self, event: IntentEvent) {
		let _ = self.sender.send(event);
	}

	pub fn subscriber_count(&self) -> usize {
		self.sender.receiver_count()
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(1000)
	}
}
