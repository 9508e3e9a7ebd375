//! The intent manager: canonical store and orchestration.
//!
//! The manager is the only writer of canonical [`Intent`] records. The
//! lifecycle tracker keeps its own status mirror, which the manager updates
//! through [`LifecycleTracker::update_status`]. Expiry decided by the tracker
//! comes back as a lifecycle event and is applied to the store by a listener
//! task, so the two views are eventually consistent and the last write wins.

mod builder;
mod subscription;

pub use builder::IntentManagerBuilder;
pub use subscription::IntentSubscription;

use crate::event_bus::EventBus;
use crate::lifecycle::LifecycleTracker;
use crate::matching::MatchingEngine;
use crate::metrics::{Counter, ManagerMetrics, MetricsRecorder, ProcessorMetrics};
use crate::processor::Processor;
use crate::topics::resolve_topic;
use async_trait::async_trait;
use dashmap::DashMap;
use intent_config::IntentConfig;
use intent_types::{
	priority, BroadcastIntentRequest, BroadcastIntentResponse, CancelIntentResponse,
	CreateIntentRequest, CreateIntentResponse, ErrorKind, Intent, IntentError, IntentEvent,
	IntentSigner, IntentStatus, IntentValidator, LifecycleEvent, MessageHandler,
	QueryIntentsRequest, QueryIntentsResponse, Result, SubscribeIntentsRequest, TopicSubscription,
	Transport, TransportMessage,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use subscription::{Subscriber, Subscribers};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Progress of the background matching attempt for a processed intent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MatchingStatus {
	Pending,
	Complete { matches: Vec<String> },
	Failed { reason: String },
}

/// Cheap to clone; clones share the same store and components.
#[derive(Clone)]
pub struct IntentManager {
	config: Arc<IntentConfig>,
	intents: Arc<RwLock<HashMap<String, Intent>>>,
	subscribers: Subscribers,
	validator: Option<Arc<dyn IntentValidator>>,
	signer: Option<Arc<dyn IntentSigner>>,
	signing_key: Option<Vec<u8>>,
	transport: Option<Arc<dyn Transport>>,
	processor: Arc<Processor>,
	matching: Arc<MatchingEngine>,
	lifecycle: LifecycleTracker,
	matching_status: Arc<DashMap<String, MatchingStatus>>,
	metrics: MetricsRecorder,
	event_bus: EventBus,
	shutdown: CancellationToken,
	tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
	topic_subscriptions: Arc<Mutex<Vec<TopicSubscription>>>,
}

impl IntentManager {
	pub fn builder() -> IntentManagerBuilder {
		IntentManagerBuilder::default()
	}

	pub fn config(&self) -> &IntentConfig {
		&self.config
	}

	pub fn processor(&self) -> &Arc<Processor> {
		&self.processor
	}

	pub fn matching_engine(&self) -> &Arc<MatchingEngine> {
		&self.matching
	}

	pub fn lifecycle(&self) -> &LifecycleTracker {
		&self.lifecycle
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	/// Starts the lifecycle sweeper, the expiry listener, the periodic store
	/// cleanup and the configured topic listeners.
	pub async fn start(&self) -> Result<()> {
		self.lifecycle.start().await;

		let expiry = {
			let manager = self.clone();
			let mut events = self.event_bus.subscribe();
			tokio::spawn(async move {
				loop {
					tokio::select! {
						_ = manager.shutdown.cancelled() => break,
						event = events.recv() => match event {
							Ok(IntentEvent::Lifecycle(LifecycleEvent::Expired { intent_id })) => {
								manager.apply_expiry(&intent_id).await;
							}
							Ok(_) => {}
							Err(RecvError::Lagged(skipped)) => {
								warn!("Expiry listener lagged, skipped {} events", skipped);
							}
							Err(RecvError::Closed) => break,
						}
					}
				}
			})
		};

		let cleanup = {
			let manager = self.clone();
			let period = self.config.lifecycle.cleanup_interval();
			tokio::spawn(async move {
				let mut interval = tokio::time::interval(period);
				interval.tick().await;
				loop {
					tokio::select! {
						_ = manager.shutdown.cancelled() => break,
						_ = interval.tick() => {
							let removed = manager.cleanup_expired_intents().await;
							if removed > 0 {
								info!("Removed {} expired intents from the store", removed);
							}
						}
					}
				}
			})
		};

		self.tasks.lock().await.extend([expiry, cleanup]);

		for topic in &self.config.node.listen_topics {
			self.listen(topic).await?;
		}

		info!("Intent manager '{}' started", self.config.node.node_id);
		Ok(())
	}

	/// Stops background work, drops topic subscriptions and closes every
	/// local subscription stream.
	pub async fn shutdown(&self) {
		self.shutdown.cancel();

		let subscriptions: Vec<TopicSubscription> =
			self.topic_subscriptions.lock().await.drain(..).collect();
		if let Some(transport) = &self.transport {
			for subscription in subscriptions {
				if let Err(e) = transport.unsubscribe(&subscription).await {
					warn!("Failed to unsubscribe from {}: {}", subscription.topic, e);
				}
			}
		}

		self.lifecycle.shutdown().await;

		let tasks: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
		for task in tasks {
			if let Err(e) = task.await {
				warn!("Manager task ended abnormally: {}", e);
			}
		}

		self.subscribers.clear().await;
		info!("Intent manager '{}' stopped", self.config.node.node_id);
	}

	/// Subscribes to `topic` on the transport, feeding received broadcasts
	/// into [`IntentManager::handle_incoming_broadcast`].
	pub async fn listen(&self, topic: &str) -> Result<TopicSubscription> {
		let transport = self.require_transport()?;
		let subscription = transport
			.subscribe_to_topic(
				topic,
				Arc::new(BroadcastListener {
					manager: self.clone(),
				}),
			)
			.await?;
		info!("Listening for intents on {}", topic);
		self.topic_subscriptions
			.lock()
			.await
			.push(subscription.clone());
		Ok(subscription)
	}

	pub async fn create_intent(&self, request: CreateIntentRequest) -> Result<CreateIntentResponse> {
		self.validate_request(&request)?;

		let mut intent = Intent::new(
			request.intent_type.trim(),
			request.sender_id.trim(),
			request.payload,
		);
		intent.metadata = request.metadata;
		intent.priority = priority::normalize(request.priority);
		intent.ttl = if request.ttl == 0 {
			self.config.intents.default_ttl_secs
		} else {
			request.ttl
		};

		if let Some(validator) = &self.validator {
			validator.validate_intent(&intent).await?;
		}

		if let (Some(signer), Some(key)) = (&self.signer, &self.signing_key) {
			if let Err(e) = signer.sign_intent(&mut intent, key).await {
				return Err(IntentError::wrap(
					ErrorKind::SignatureFailed,
					format!("Failed to sign intent {}", intent.id),
					e,
				));
			}
		}

		intent.status = IntentStatus::Validated;

		{
			let mut store = self.intents.write().await;
			if store.len() >= self.config.intents.max_concurrent_intents {
				return Err(IntentError::processing(format!(
					"intent capacity reached ({} intents)",
					store.len()
				)));
			}
			store.insert(intent.id.clone(), intent.clone());
		}

		self.lifecycle.start_tracking(&intent).await?;
		self.metrics.increment(Counter::Created).await;
		self.event_bus.publish(IntentEvent::Created {
			intent_id: intent.id.clone(),
		});
		info!(
			"Created intent {} (type {}, sender {})",
			intent.id, intent.intent_type, intent.sender_id
		);

		Ok(CreateIntentResponse {
			intent: Some(intent),
			success: true,
			message: "Intent created successfully".to_string(),
		})
	}

	fn validate_request(&self, request: &CreateIntentRequest) -> Result<()> {
		let limits = &self.config.intents;
		let intent_type = request.intent_type.trim();

		if intent_type.is_empty() {
			return Err(IntentError::validation("Intent type is required"));
		}
		if !limits
			.allowed_types
			.iter()
			.any(|t| t.eq_ignore_ascii_case(intent_type))
		{
			return Err(IntentError::validation(format!(
				"Unsupported intent type '{}'",
				intent_type
			)));
		}
		if request.payload.is_empty() {
			return Err(IntentError::validation("Intent payload is required"));
		}
		if request.payload.len() > limits.max_payload_size {
			return Err(IntentError::validation(format!(
				"Payload size {} exceeds maximum of {} bytes",
				request.payload.len(),
				limits.max_payload_size
			)));
		}
		if request.sender_id.trim().is_empty() {
			return Err(IntentError::validation("Sender ID is required"));
		}
		if request.priority != 0 && !priority::is_valid(request.priority) {
			return Err(IntentError::validation(format!(
				"Invalid priority {}: must be between {} and {}",
				request.priority,
				priority::LOW,
				priority::URGENT
			)));
		}
		if request.ttl > limits.max_ttl_secs {
			return Err(IntentError::validation(format!(
				"TTL {}s exceeds maximum of {}s",
				request.ttl, limits.max_ttl_secs
			)));
		}
		Ok(())
	}

	/// Publishes a stored intent on its topic.
	///
	/// The topic defaults to the one resolved from the intent type. A
	/// transport failure leaves the intent `Failed` with the error recorded.
	pub async fn broadcast_intent(&self, request: BroadcastIntentRequest) -> Result<BroadcastIntentResponse> {
		let transport = self.require_transport()?;
		let intent = self.get_intent_status(&request.intent_id).await?;

		if intent.is_expired() {
			return Err(IntentError::expired(&intent.id));
		}
		if intent.status != IntentStatus::Broadcasted
			&& !intent.status.can_transition_to(IntentStatus::Broadcasted)
		{
			return Err(IntentError::new(
				ErrorKind::AlreadyProcessed,
				format!(
					"Intent {} cannot be broadcast from status '{}'",
					intent.id, intent.status
				),
			));
		}

		let topic = request
			.topic
			.filter(|t| !t.trim().is_empty())
			.unwrap_or_else(|| resolve_topic(&intent.intent_type));

		let mut outgoing = intent;
		outgoing.status = IntentStatus::Broadcasted;
		let message = TransportMessage::from_intent(&outgoing, &topic)?;
		self.store_status(&outgoing.id, IntentStatus::Broadcasted)
			.await?;

		if let Err(e) = transport.publish_message(&topic, message).await {
			warn!("Broadcast of intent {} on {} failed: {}", outgoing.id, topic, e);
			self.mark_failed(&outgoing.id, &e.to_string()).await;
			return Err(IntentError::wrap(
				ErrorKind::BroadcastFailed,
				format!("Failed to broadcast intent {}", outgoing.id),
				e,
			));
		}

		self.track_status(&outgoing.id, IntentStatus::Broadcasted)
			.await;
		self.metrics.increment(Counter::Broadcast).await;
		self.event_bus.publish(IntentEvent::Broadcasted {
			intent_id: outgoing.id.clone(),
			topic: topic.clone(),
		});
		self.subscribers.notify(&outgoing, &topic).await;
		info!("Broadcast intent {} on {}", outgoing.id, topic);

		Ok(BroadcastIntentResponse {
			success: true,
			intent_id: outgoing.id,
			topic,
			message: "Intent broadcast successfully".to_string(),
		})
	}

	/// Validates the intent, runs it through the processor and stores the
	/// result as `Processed`.
	///
	/// When matching is enabled a background attempt is started; its
	/// progress is available through [`IntentManager::matching_status`].
	/// Cancellation through `cancel` leaves the stored intent untouched.
	pub async fn process_intent(&self, intent: Intent, cancel: &CancellationToken) -> Result<Intent> {
		let started = Instant::now();

		if intent.is_expired() {
			return Err(IntentError::expired(&intent.id));
		}
		if !can_process(intent.status) {
			return Err(IntentError::new(
				ErrorKind::AlreadyProcessed,
				format!(
					"Intent {} cannot be processed from status '{}'",
					intent.id, intent.status
				),
			));
		}

		let mut working = intent;

		if let Some(validator) = &self.validator {
			if let Err(e) = validator.validate_intent(&working).await {
				self.mark_failed(&working.id, &e.to_string()).await;
				return Err(e);
			}
		}

		if let Err(e) = self.processor.process_intent(&mut working, cancel).await {
			if e.is(ErrorKind::Cancelled) {
				debug!("Processing of intent {} cancelled", working.id);
			} else {
				warn!("Processing of intent {} failed: {}", working.id, e);
				self.mark_failed(&working.id, &e.to_string()).await;
			}
			return Err(e);
		}

		self.commit_processed(working, started).await
	}

	async fn commit_processed(&self, mut intent: Intent, started: Instant) -> Result<Intent> {
		intent.status = IntentStatus::Processed;
		if intent.processed_at.is_none() {
			intent.processed_at = Some(chrono::Utc::now().timestamp());
		}

		{
			let mut store = self.intents.write().await;
			if let Some(stored) = store.get(&intent.id) {
				if !can_process(stored.status) {
					return Err(IntentError::new(
						ErrorKind::AlreadyProcessed,
						format!(
							"Intent {} became {} while processing",
							intent.id, stored.status
						),
					));
				}
			}
			store.insert(intent.id.clone(), intent.clone());
		}

		if self.lifecycle.is_tracked(&intent.id) {
			self.track_status(&intent.id, IntentStatus::Processed).await;
			if let Err(e) = self.lifecycle.refresh_intent(&intent).await {
				debug!("Could not refresh tracker for {}: {}", intent.id, e);
			}
		} else {
			self.lifecycle.start_tracking(&intent).await?;
		}

		self.metrics.record_processed(started.elapsed()).await;
		self.event_bus.publish(IntentEvent::Processed {
			intent_id: intent.id.clone(),
		});
		info!("Processed intent {} in {:?}", intent.id, started.elapsed());

		if self.config.matching.enabled {
			self.spawn_matching(intent.clone());
		}

		Ok(intent)
	}

	fn spawn_matching(&self, intent: Intent) {
		self.matching_status
			.insert(intent.id.clone(), MatchingStatus::Pending);
		let manager = self.clone();
		tokio::spawn(async move {
			let status = tokio::select! {
				_ = manager.shutdown.cancelled() => MatchingStatus::Failed {
					reason: "manager shut down".to_string(),
				},
				status = manager.run_matching(&intent) => status,
			};
			manager.matching_status.insert(intent.id.clone(), status);
		});
	}

	async fn run_matching(&self, intent: &Intent) -> MatchingStatus {
		let now = chrono::Utc::now().timestamp();
		let candidates: Vec<Intent> = self
			.intents
			.read()
			.await
			.values()
			.filter(|c| c.id != intent.id && !c.is_terminal() && !c.is_expired_at(now))
			.cloned()
			.collect();

		let results = match self.matching.find_matches(intent, &candidates).await {
			Ok(results) => results,
			Err(e) => {
				warn!("Matching failed for intent {}: {}", intent.id, e);
				return MatchingStatus::Failed {
					reason: e.to_string(),
				};
			}
		};

		let mut matches: Vec<String> = Vec::new();
		for id in results.iter().filter_map(|r| r.matched_intent_id()) {
			if !matches.iter().any(|m| m == id) {
				matches.push(id.to_string());
			}
		}

		if matches.is_empty() {
			debug!("No matches for intent {}", intent.id);
			return MatchingStatus::Complete { matches };
		}

		let recorded = {
			let mut store = self.intents.write().await;
			match store.get_mut(&intent.id) {
				Some(stored) if stored.status.can_transition_to(IntentStatus::Matched) => {
					stored.status = IntentStatus::Matched;
					for id in &matches {
						stored.add_match(id);
					}
					true
				}
				_ => false,
			}
		};

		if recorded {
			self.track_status(&intent.id, IntentStatus::Matched).await;
			self.metrics.increment(Counter::Matched).await;
			self.event_bus.publish(IntentEvent::Matched {
				intent_id: intent.id.clone(),
				matches: matches.clone(),
			});
			info!("Intent {} matched {} intents", intent.id, matches.len());
		}

		MatchingStatus::Complete { matches }
	}

	pub fn matching_status(&self, intent_id: &str) -> Option<MatchingStatus> {
		self.matching_status
			.get(intent_id)
			.map(|entry| entry.value().clone())
	}

	/// Stores a broadcast received from a peer and processes it.
	///
	/// Intents already in the store are ignored. A type without handlers
	/// leaves the intent `Received`.
	pub async fn handle_incoming_broadcast(&self, message: TransportMessage) -> Result<()> {
		let started = Instant::now();
		let mut intent = message.to_intent()?;

		if intent.is_expired() {
			debug!("Dropping expired broadcast {}", intent.id);
			return Err(IntentError::expired(&intent.id));
		}

		intent.status = IntentStatus::Received;
		{
			let mut store = self.intents.write().await;
			if store.contains_key(&intent.id) {
				debug!("Ignoring duplicate broadcast of intent {}", intent.id);
				return Ok(());
			}
			if store.len() >= self.config.intents.max_concurrent_intents {
				return Err(IntentError::processing(format!(
					"intent capacity reached ({} intents)",
					store.len()
				)));
			}
			store.insert(intent.id.clone(), intent.clone());
		}

		self.lifecycle.start_tracking(&intent).await?;
		self.metrics.increment(Counter::Received).await;
		self.event_bus.publish(IntentEvent::Received {
			intent_id: intent.id.clone(),
			sender_id: intent.sender_id.clone(),
		});
		self.subscribers.notify(&intent, &message.topic).await;
		info!(
			"Received intent {} from {} on {}",
			intent.id, intent.sender_id, message.topic
		);

		let mut working = intent;
		let cancel = self.shutdown.child_token();
		match self
			.processor
			.process_incoming_intent(&mut working, &cancel)
			.await
		{
			Ok(()) => self.commit_processed(working, started).await.map(|_| ()),
			Err(e) if e.is(ErrorKind::HandlerNotFound) => {
				debug!("No handler for received intent {}: {}", working.id, e);
				Ok(())
			}
			Err(e) if e.is(ErrorKind::Cancelled) => Err(e),
			Err(e) => {
				self.mark_failed(&working.id, &e.to_string()).await;
				Err(e)
			}
		}
	}

	/// Returns intents filtered by type and time range, ordered by
	/// timestamp then id, paginated by offset and limit.
	pub async fn query_intents(&self, request: QueryIntentsRequest) -> Result<QueryIntentsResponse> {
		if let (Some(start), Some(end)) = (request.start_time, request.end_time) {
			if start > end {
				return Err(IntentError::validation(format!(
					"start_time {} is after end_time {}",
					start, end
				)));
			}
		}

		let limit = if request.limit == 0 {
			self.config.intents.default_query_limit
		} else {
			request.limit
		};
		let intent_type = request.intent_type.filter(|t| !t.trim().is_empty());

		let store = self.intents.read().await;
		let mut selected: Vec<&Intent> = store
			.values()
			.filter(|i| {
				intent_type
					.as_ref()
					.map_or(true, |t| i.intent_type.eq_ignore_ascii_case(t.trim()))
			})
			.filter(|i| request.start_time.map_or(true, |s| i.timestamp >= s))
			.filter(|i| request.end_time.map_or(true, |e| i.timestamp <= e))
			.collect();
		selected.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

		let total = selected.len();
		let intents = selected
			.into_iter()
			.skip(request.offset)
			.take(limit)
			.cloned()
			.collect();

		Ok(QueryIntentsResponse { intents, total })
	}

	/// Opens a local subscription. The stream closes when `cancel` fires or
	/// the manager shuts down. Dropping the returned subscription releases
	/// its slot.
	pub async fn subscribe_intents(
		&self,
		request: SubscribeIntentsRequest,
		cancel: CancellationToken,
	) -> Result<IntentSubscription> {
		if self.shutdown.is_cancelled() {
			return Err(IntentError::cancelled("Intent manager is shut down"));
		}

		let id = format!("sub_{}", uuid::Uuid::new_v4().simple());
		let (sender, receiver) = mpsc::channel(self.config.subscriptions.buffer_size);
		let watch = sender.clone();
		self.subscribers
			.insert(id.clone(), Subscriber::new(&request, sender))
			.await;
		debug!(
			"Subscription {} opened (types {:?}, topics {:?})",
			id, request.types, request.topics
		);

		let subscribers = self.subscribers.clone();
		let shutdown = self.shutdown.clone();
		let sub_id = id.clone();
		tokio::spawn(async move {
			tokio::select! {
				_ = cancel.cancelled() => {}
				_ = shutdown.cancelled() => {}
				_ = watch.closed() => {}
			}
			drop(watch);
			if subscribers.remove(&sub_id).await {
				debug!("Subscription {} closed", sub_id);
			}
		});

		Ok(IntentSubscription::new(id, receiver))
	}

	/// Marks an intent `Failed` with reason "cancelled" and stops tracking it.
	pub async fn cancel_intent(&self, intent_id: &str) -> Result<CancelIntentResponse> {
		{
			let mut store = self.intents.write().await;
			let stored = store
				.get_mut(intent_id)
				.ok_or_else(|| IntentError::not_found(intent_id))?;
			if stored.is_terminal() {
				return Err(IntentError::new(
					ErrorKind::AlreadyProcessed,
					format!("Intent {} is already {}", intent_id, stored.status),
				));
			}
			stored.status = IntentStatus::Failed;
			stored.error = Some("cancelled".to_string());
		}

		self.lifecycle.stop_tracking(intent_id).await;
		self.matching.invalidate(intent_id).await;
		self.metrics.increment(Counter::Cancelled).await;
		self.event_bus.publish(IntentEvent::Cancelled {
			intent_id: intent_id.to_string(),
		});
		info!("Cancelled intent {}", intent_id);

		Ok(CancelIntentResponse {
			success: true,
			intent_id: intent_id.to_string(),
			message: "Intent cancelled".to_string(),
		})
	}

	pub async fn get_intent_status(&self, intent_id: &str) -> Result<Intent> {
		self.intents
			.read()
			.await
			.get(intent_id)
			.cloned()
			.ok_or_else(|| IntentError::not_found(intent_id))
	}

	/// Removes TTL-expired intents from the store and stops tracking them.
	pub async fn cleanup_expired_intents(&self) -> usize {
		let now = chrono::Utc::now().timestamp();
		let removed: Vec<Intent> = {
			let mut store = self.intents.write().await;
			let expired: Vec<String> = store
				.values()
				.filter(|i| i.is_expired_at(now))
				.map(|i| i.id.clone())
				.collect();
			expired.iter().filter_map(|id| store.remove(id)).collect()
		};

		for intent in &removed {
			self.lifecycle.stop_tracking(&intent.id).await;
			self.matching.invalidate(&intent.id).await;
			self.matching_status.remove(&intent.id);
			if intent.status != IntentStatus::Expired {
				self.metrics.increment(Counter::Expired).await;
			}
		}

		removed.len()
	}

	pub async fn metrics(&self) -> ManagerMetrics {
		let subscriptions = self.subscribers.len().await;
		let stored = self.intents.read().await.len();
		self.metrics.snapshot(subscriptions, stored).await
	}

	pub async fn processor_metrics(&self) -> ProcessorMetrics {
		self.processor.metrics().await
	}

	pub async fn intent_count(&self) -> usize {
		self.intents.read().await.len()
	}

	fn require_transport(&self) -> Result<Arc<dyn Transport>> {
		self.transport.clone().ok_or_else(|| {
			IntentError::new(ErrorKind::NetworkUnavailable, "No transport configured")
		})
	}

	async fn store_status(&self, intent_id: &str, status: IntentStatus) -> Result<()> {
		let mut store = self.intents.write().await;
		let stored = store
			.get_mut(intent_id)
			.ok_or_else(|| IntentError::not_found(intent_id))?;
		if stored.is_terminal() {
			return Err(IntentError::new(
				ErrorKind::AlreadyProcessed,
				format!("Intent {} is already {}", intent_id, stored.status),
			));
		}
		stored.status = status;
		Ok(())
	}

	/// Mirrors a status change into the lifecycle tracker. Untracked intents
	/// and rejected transitions are logged only.
	async fn track_status(&self, intent_id: &str, status: IntentStatus) {
		if let Err(e) = self.lifecycle.update_status(intent_id, status).await {
			debug!("Lifecycle not updated for {}: {}", intent_id, e);
		}
	}

	async fn mark_failed(&self, intent_id: &str, reason: &str) {
		let updated = {
			let mut store = self.intents.write().await;
			match store.get_mut(intent_id) {
				Some(stored) if !stored.is_terminal() => {
					stored.status = IntentStatus::Failed;
					stored.error = Some(reason.to_string());
					true
				}
				_ => false,
			}
		};

		if !updated {
			debug!("Intent {} not marked failed: unknown or already final", intent_id);
			return;
		}

		self.track_status(intent_id, IntentStatus::Failed).await;
		self.metrics.increment(Counter::Failed).await;
		self.event_bus.publish(IntentEvent::Failed {
			intent_id: intent_id.to_string(),
			reason: reason.to_string(),
		});
	}

	async fn apply_expiry(&self, intent_id: &str) {
		let expired = {
			let mut store = self.intents.write().await;
			match store.get_mut(intent_id) {
				Some(stored) if !stored.is_terminal() => {
					stored.status = IntentStatus::Expired;
					true
				}
				_ => false,
			}
		};

		if expired {
			self.matching.invalidate(intent_id).await;
			self.metrics.increment(Counter::Expired).await;
			info!("Intent {} marked expired", intent_id);
		}
	}
}

/// Processing may repeat on a `Processed` intent but never moves a status
/// backwards.
fn can_process(status: IntentStatus) -> bool {
	status == IntentStatus::Processed || status.can_transition_to(IntentStatus::Processed)
}

/// Routes transport deliveries into the manager.
struct BroadcastListener {
	manager: IntentManager,
}

#[async_trait]
impl MessageHandler for BroadcastListener {
	async fn handle_message(&self, message: TransportMessage) -> Result<()> {
		self.manager.handle_incoming_broadcast(message).await
	}
}

#[cfg(test)]
mod tests;
