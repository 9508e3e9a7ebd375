//! Local subscription fan-out.
//!
//! Delivery is at-most-once and lossy: each subscriber has a bounded queue
//! and an intent is dropped for a subscriber whose queue is full. The
//! producer never waits on a subscriber.

use intent_types::{Intent, SubscribeIntentsRequest};
use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

pub(crate) struct Subscriber {
	types: HashSet<String>,
	topics: HashSet<String>,
	sender: mpsc::Sender<Intent>,
}

impl Subscriber {
	pub(crate) fn new(request: &SubscribeIntentsRequest, sender: mpsc::Sender<Intent>) -> Self {
		Self {
			types: request.types.iter().map(|t| t.trim().to_lowercase()).collect(),
			topics: request.topics.iter().cloned().collect(),
			sender,
		}
	}

	fn accepts(&self, intent: &Intent, topic: &str) -> bool {
		(self.types.is_empty() || self.types.contains(&intent.intent_type.to_lowercase()))
			&& (self.topics.is_empty() || self.topics.contains(topic))
	}
}

/// Subscription table keyed by subscription id.
#[derive(Clone, Default)]
pub(crate) struct Subscribers {
	inner: Arc<RwLock<HashMap<String, Subscriber>>>,
}

impl Subscribers {
	pub(crate) async fn insert(&self, id: String, subscriber: Subscriber) {
		self.inner.write().await.insert(id, subscriber);
	}

	pub(crate) async fn remove(&self, id: &str) -> bool {
		self.inner.write().await.remove(id).is_some()
	}

	pub(crate) async fn len(&self) -> usize {
		self.inner.read().await.len()
	}

	/// Drops every subscriber, closing their streams.
	pub(crate) async fn clear(&self) {
		self.inner.write().await.clear();
	}

	/// Offers `intent` to every subscriber whose filter accepts it.
	///
	/// Returns the number of subscribers it was queued for. Subscribers whose
	/// receiving side is gone are removed.
	pub(crate) async fn notify(&self, intent: &Intent, topic: &str) -> usize {
		let mut delivered = 0;
		let mut closed = Vec::new();

		{
			let subscribers = self.inner.read().await;
			for (id, subscriber) in subscribers.iter() {
				if !subscriber.accepts(intent, topic) {
					continue;
				}
				match subscriber.sender.try_send(intent.clone()) {
					Ok(()) => delivered += 1,
					Err(TrySendError::Full(_)) => {
						warn!("Subscriber {} queue full, dropping intent {}", id, intent.id)
					}
					Err(TrySendError::Closed(_)) => closed.push(id.clone()),
				}
			}
		}

		if !closed.is_empty() {
			let mut subscribers = self.inner.write().await;
			for id in closed {
				debug!("Removing closed subscription {}", id);
				subscribers.remove(&id);
			}
		}

		delivered
	}
}

/// Stream of intents delivered to one subscriber.
///
/// The stream ends when the subscription's cancellation token fires or the
/// manager shuts down. Intents queued before that are still yielded.
pub struct IntentSubscription {
	id: String,
	stream: ReceiverStream<Intent>,
}

impl IntentSubscription {
	pub(crate) fn new(id: String, receiver: mpsc::Receiver<Intent>) -> Self {
		Self {
			id,
			stream: ReceiverStream::new(receiver),
		}
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	/// Waits for the next intent, or `None` once the subscription is closed.
	pub async fn recv(&mut self) -> Option<Intent> {
		self.stream.next().await
	}
}

impl Stream for IntentSubscription {
	type Item = Intent;

	fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		Pin::new(&mut self.stream).poll_next(cx)
	}
}
