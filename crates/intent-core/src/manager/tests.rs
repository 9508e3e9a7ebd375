use super::*;
use crate::pipeline::{
	EnrichmentStage, PipelineSettings, ProcessingPipeline, ProcessingStage, TransformationStage,
};
use crate::processor::IntentHandler;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Default)]
struct RecordingTransport {
	fail: bool,
	published: Mutex<Vec<(String, TransportMessage)>>,
	handlers: Mutex<Vec<(String, Arc<dyn MessageHandler>)>>,
	unsubscribed: Mutex<Vec<String>>,
}

impl RecordingTransport {
	fn failing() -> Self {
		Self {
			fail: true,
			..Default::default()
		}
	}

	async fn deliver(&self, message: TransportMessage) -> Result<()> {
		let handlers: Vec<Arc<dyn MessageHandler>> = self
			.handlers
			.lock()
			.await
			.iter()
			.filter(|(topic, _)| *topic == message.topic)
			.map(|(_, h)| h.clone())
			.collect();
		for handler in handlers {
			handler.handle_message(message.clone()).await?;
		}
		Ok(())
	}
}

#[async_trait]
impl Transport for RecordingTransport {
	async fn publish_message(&self, topic: &str, message: TransportMessage) -> Result<()> {
		if self.fail {
			return Err(IntentError::new(ErrorKind::NetworkUnavailable, "no peers"));
		}
		self.published.lock().await.push((topic.to_string(), message));
		Ok(())
	}

	async fn subscribe_to_topic(
		&self,
		topic: &str,
		handler: Arc<dyn MessageHandler>,
	) -> Result<TopicSubscription> {
		let mut handlers = self.handlers.lock().await;
		handlers.push((topic.to_string(), handler));
		Ok(TopicSubscription {
			id: format!("sub-{}", handlers.len()),
			topic: topic.to_string(),
		})
	}

	async fn unsubscribe(&self, subscription: &TopicSubscription) -> Result<()> {
		self.unsubscribed.lock().await.push(subscription.topic.clone());
		Ok(())
	}
}

struct AcceptingHandler;

#[async_trait]
impl IntentHandler for AcceptingHandler {
	fn name(&self) -> &str {
		"accepting"
	}

	fn supported_types(&self) -> Vec<String> {
		vec!["trade".to_string()]
	}

	fn priority(&self) -> i32 {
		1
	}

	async fn handle(&self, _intent: &Intent) -> Result<()> {
		Ok(())
	}
}

struct StuckStage;

#[async_trait]
impl ProcessingStage for StuckStage {
	fn name(&self) -> &str {
		"stuck"
	}

	fn priority(&self) -> i32 {
		50
	}

	fn should_process(&self, _intent: &Intent) -> bool {
		true
	}

	async fn process(&self, _intent: &mut Intent) -> Result<()> {
		tokio::time::sleep(Duration::from_secs(30)).await;
		Ok(())
	}
}

struct BrokenStage;

#[async_trait]
impl ProcessingStage for BrokenStage {
	fn name(&self) -> &str {
		"broken"
	}

	fn priority(&self) -> i32 {
		50
	}

	fn should_process(&self, _intent: &Intent) -> bool {
		true
	}

	async fn process(&self, _intent: &mut Intent) -> Result<()> {
		Err(IntentError::processing("stage exploded"))
	}
}

async fn manager() -> IntentManager {
	IntentManager::builder().build().await.unwrap()
}

async fn single_stage_manager(stage: Arc<dyn ProcessingStage>) -> IntentManager {
	let pipeline = Arc::new(ProcessingPipeline::new(PipelineSettings {
		pipeline_timeout: Duration::from_secs(5),
		stage_timeout: Duration::from_secs(5),
		max_retries: 0,
	}));
	pipeline.add_stage(stage).await;
	IntentManager::builder()
		.with_pipeline(pipeline)
		.build()
		.await
		.unwrap()
}

async fn create(manager: &IntentManager, intent_type: &str, payload: &[u8], sender: &str) -> Intent {
	manager
		.create_intent(CreateIntentRequest::new(intent_type, payload.to_vec(), sender))
		.await
		.unwrap()
		.intent
		.unwrap()
}

async fn wait_for<F, Fut>(mut check: F)
where
	F: FnMut() -> Fut,
	Fut: std::future::Future<Output = bool>,
{
	tokio::time::timeout(Duration::from_secs(5), async {
		while !check().await {
			tokio::time::sleep(Duration::from_millis(20)).await;
		}
	})
	.await
	.unwrap();
}

#[tokio::test]
async fn test_create_applies_defaults() {
	let manager = manager().await;
	let response = manager
		.create_intent(CreateIntentRequest::new("trade", b"buy 10 ETH".to_vec(), "alice"))
		.await
		.unwrap();
	assert!(response.success);

	let intent = response.intent.unwrap();
	assert_eq!(intent.status, IntentStatus::Validated);
	assert_eq!(intent.priority, priority::NORMAL);
	assert_eq!(intent.ttl, 3600);
	assert_eq!(
		manager.get_intent_status(&intent.id).await.unwrap(),
		intent
	);
	assert_eq!(
		manager.lifecycle().status(&intent.id),
		Some(IntentStatus::Validated)
	);
	assert_eq!(manager.metrics().await.intents_created, 1);
}

#[tokio::test]
async fn test_create_rejects_malformed_requests() {
	let manager = manager().await;
	let base = CreateIntentRequest::new("trade", b"x".to_vec(), "alice");

	let cases = vec![
		CreateIntentRequest {
			intent_type: " ".into(),
			..base.clone()
		},
		CreateIntentRequest {
			intent_type: "teleport".into(),
			..base.clone()
		},
		CreateIntentRequest {
			payload: Vec::new(),
			..base.clone()
		},
		CreateIntentRequest {
			payload: vec![0u8; manager.config().intents.max_payload_size + 1],
			..base.clone()
		},
		CreateIntentRequest {
			sender_id: String::new(),
			..base.clone()
		},
		CreateIntentRequest {
			priority: 25,
			..base.clone()
		},
		CreateIntentRequest {
			ttl: manager.config().intents.max_ttl_secs + 1,
			..base.clone()
		},
	];

	for request in cases {
		let err = manager.create_intent(request).await.unwrap_err();
		assert_eq!(err.kind, ErrorKind::ValidationFailed, "{}", err);
		let response = CreateIntentResponse::failure(&err);
		assert!(!response.success);
		assert!(response.intent.is_none());
	}
	assert_eq!(manager.intent_count().await, 0);

	// Type whitelist is case-insensitive.
	assert!(manager
		.create_intent(CreateIntentRequest {
			intent_type: "SWAP".into(),
			..base
		})
		.await
		.is_ok());
}

#[tokio::test]
async fn test_create_respects_capacity() {
	let mut config = IntentConfig::default();
	config.intents.max_concurrent_intents = 2;
	let manager = IntentManagerBuilder::new(config).build().await.unwrap();

	create(&manager, "trade", b"1", "alice").await;
	create(&manager, "trade", b"2", "alice").await;
	let err = manager
		.create_intent(CreateIntentRequest::new("trade", b"3".to_vec(), "alice"))
		.await
		.unwrap_err();
	assert_eq!(err.kind, ErrorKind::ProcessingFailed);
	assert!(err.message.contains("capacity"));
}

#[tokio::test]
async fn test_concurrent_creates_yield_distinct_ids() {
	let manager = manager().await;
	let mut handles = Vec::new();
	for n in 0..50 {
		let manager = manager.clone();
		handles.push(tokio::spawn(async move {
			create(&manager, "transfer", format!("send {}", n).as_bytes(), "alice")
				.await
				.id
		}));
	}

	let mut ids = HashSet::new();
	for handle in handles {
		ids.insert(handle.await.unwrap());
	}
	assert_eq!(ids.len(), 50);
	assert_eq!(manager.intent_count().await, 50);
}

#[tokio::test]
async fn test_create_then_process_scenario() {
	let pipeline = Arc::new(ProcessingPipeline::new(PipelineSettings::default()));
	pipeline.add_stage(Arc::new(EnrichmentStage)).await;
	pipeline.add_stage(Arc::new(TransformationStage::default())).await;
	let manager = IntentManager::builder()
		.with_pipeline(pipeline)
		.build()
		.await
		.unwrap();

	let created = create(&manager, "Trade", b"buy 10 ETH", "alice").await;
	assert_eq!(created.status, IntentStatus::Validated);
	assert_eq!(created.priority, 5);
	assert_eq!(created.ttl, 3600);

	let processed = manager
		.process_intent(created.clone(), &CancellationToken::new())
		.await
		.unwrap();
	assert_eq!(processed.status, IntentStatus::Processed);
	assert_eq!(processed.intent_type, "trade");
	assert_eq!(processed.metadata["processed_by"], "pipeline");
	assert!(processed.processed_at.is_some());

	let stored = manager.get_intent_status(&created.id).await.unwrap();
	assert_eq!(stored.intent_type, "trade");
	assert!(matches!(
		stored.status,
		IntentStatus::Processed | IntentStatus::Matched
	));
	assert_eq!(manager.metrics().await.intents_processed, 1);
}

#[tokio::test]
async fn test_matching_runs_in_background() {
	let manager = manager().await;
	let candidate = create(&manager, "trade", b"buy 10 ETH", "bob").await;
	let intent = create(&manager, "trade", b"buy 10 ETH", "alice").await;

	manager
		.process_intent(intent.clone(), &CancellationToken::new())
		.await
		.unwrap();

	let id = intent.id.clone();
	wait_for(|| {
		let manager = manager.clone();
		let id = id.clone();
		async move { matches!(manager.matching_status(&id), Some(MatchingStatus::Complete { .. })) }
	})
	.await;

	assert_eq!(
		manager.matching_status(&intent.id),
		Some(MatchingStatus::Complete {
			matches: vec![candidate.id.clone()]
		})
	);
	let stored = manager.get_intent_status(&intent.id).await.unwrap();
	assert_eq!(stored.status, IntentStatus::Matched);
	assert_eq!(stored.matched_intents, vec![candidate.id.clone()]);
	assert_eq!(
		manager.lifecycle().status(&intent.id),
		Some(IntentStatus::Matched)
	);
}

#[tokio::test]
async fn test_reprocessing_never_moves_status_backwards() {
	let manager = manager().await;
	create(&manager, "trade", b"buy 10 ETH", "bob").await;
	let intent = create(&manager, "trade", b"buy 10 ETH", "alice").await;

	manager
		.process_intent(intent.clone(), &CancellationToken::new())
		.await
		.unwrap();
	let id = intent.id.clone();
	wait_for(|| {
		let manager = manager.clone();
		let id = id.clone();
		async move { matches!(manager.matching_status(&id), Some(MatchingStatus::Complete { .. })) }
	})
	.await;

	let matched = manager.get_intent_status(&intent.id).await.unwrap();
	assert_eq!(matched.status, IntentStatus::Matched);
	let err = manager
		.process_intent(matched, &CancellationToken::new())
		.await
		.unwrap_err();
	assert_eq!(err.kind, ErrorKind::AlreadyProcessed);

	// A stale snapshot passes the entry check but not the commit.
	let err = manager
		.process_intent(intent.clone(), &CancellationToken::new())
		.await
		.unwrap_err();
	assert_eq!(err.kind, ErrorKind::AlreadyProcessed);

	let stored = manager.get_intent_status(&intent.id).await.unwrap();
	assert_eq!(stored.status, IntentStatus::Matched);
	assert_eq!(
		manager.lifecycle().status(&intent.id),
		Some(IntentStatus::Matched)
	);
}

#[tokio::test]
async fn test_processed_intent_can_be_reprocessed() {
	let mut config = IntentConfig::default();
	config.matching.enabled = false;
	let manager = IntentManagerBuilder::new(config).build().await.unwrap();
	let intent = create(&manager, "trade", b"buy", "alice").await;

	let first = manager
		.process_intent(intent, &CancellationToken::new())
		.await
		.unwrap();
	let second = manager
		.process_intent(first.clone(), &CancellationToken::new())
		.await
		.unwrap();
	assert_eq!(second.status, IntentStatus::Processed);
	assert_eq!(
		manager.get_intent_status(&first.id).await.unwrap().status,
		IntentStatus::Processed
	);
}

#[tokio::test]
async fn test_failure_of_unstored_intent_is_not_counted() {
	let manager = single_stage_manager(Arc::new(BrokenStage)).await;
	let mut events = manager.event_bus().subscribe();
	let detached = Intent::new("trade", "alice", b"x".to_vec()).with_ttl(60);

	let err = manager
		.process_intent(detached, &CancellationToken::new())
		.await
		.unwrap_err();
	assert_eq!(err.kind, ErrorKind::ProcessingFailed);
	assert_eq!(manager.metrics().await.intents_failed, 0);
	assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_process_failure_marks_intent_failed() {
	let manager = single_stage_manager(Arc::new(BrokenStage)).await;
	let intent = create(&manager, "trade", b"x", "alice").await;

	let err = manager
		.process_intent(intent.clone(), &CancellationToken::new())
		.await
		.unwrap_err();
	assert_eq!(err.kind, ErrorKind::ProcessingFailed);

	let stored = manager.get_intent_status(&intent.id).await.unwrap();
	assert_eq!(stored.status, IntentStatus::Failed);
	assert!(stored.error.unwrap().contains("broken"));
	assert_eq!(manager.metrics().await.intents_failed, 1);
}

#[tokio::test]
async fn test_cancelled_processing_leaves_intent_untouched() {
	let manager = single_stage_manager(Arc::new(StuckStage)).await;
	let intent = create(&manager, "trade", b"x", "alice").await;

	let cancel = CancellationToken::new();
	cancel.cancel();
	let err = manager.process_intent(intent.clone(), &cancel).await.unwrap_err();
	assert_eq!(err.kind, ErrorKind::Cancelled);

	let stored = manager.get_intent_status(&intent.id).await.unwrap();
	assert_eq!(stored.status, IntentStatus::Validated);
	assert!(stored.error.is_none());
}

#[tokio::test]
async fn test_process_rejects_expired_intent() {
	let manager = manager().await;
	let mut intent = Intent::new("trade", "alice", b"x".to_vec()).with_ttl(3600);
	intent.timestamp -= 7200;
	let err = manager
		.process_intent(intent, &CancellationToken::new())
		.await
		.unwrap_err();
	assert_eq!(err.kind, ErrorKind::IntentExpired);
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
	let manager = manager().await;
	assert_eq!(
		manager.get_intent_status("missing").await.unwrap_err().kind,
		ErrorKind::IntentNotFound
	);
	assert_eq!(
		manager.cancel_intent("missing").await.unwrap_err().kind,
		ErrorKind::IntentNotFound
	);
}

#[tokio::test]
async fn test_cancel_intent() {
	let manager = manager().await;
	let intent = create(&manager, "trade", b"x", "alice").await;

	let response = manager.cancel_intent(&intent.id).await.unwrap();
	assert!(response.success);

	let stored = manager.get_intent_status(&intent.id).await.unwrap();
	assert_eq!(stored.status, IntentStatus::Failed);
	assert_eq!(stored.error.as_deref(), Some("cancelled"));
	assert!(!manager.lifecycle().is_tracked(&intent.id));

	let err = manager.cancel_intent(&intent.id).await.unwrap_err();
	assert_eq!(err.kind, ErrorKind::AlreadyProcessed);
	assert_eq!(manager.metrics().await.intents_cancelled, 1);
}

#[tokio::test]
async fn test_query_filters_sorts_and_paginates() {
	let manager = manager().await;
	let mut ids = Vec::new();
	for n in 0..5 {
		ids.push(create(&manager, "trade", format!("{}", n).as_bytes(), "alice").await.id);
	}
	create(&manager, "swap", b"s", "bob").await;

	let all = manager
		.query_intents(QueryIntentsRequest::default())
		.await
		.unwrap();
	assert_eq!(all.total, 6);
	let timestamps: Vec<i64> = all.intents.iter().map(|i| i.timestamp).collect();
	let mut sorted = timestamps.clone();
	sorted.sort();
	assert_eq!(timestamps, sorted);

	let trades = manager
		.query_intents(QueryIntentsRequest {
			intent_type: Some("TRADE".into()),
			limit: 2,
			offset: 1,
			..Default::default()
		})
		.await
		.unwrap();
	assert_eq!(trades.total, 5);
	assert_eq!(trades.intents.len(), 2);
	assert!(trades.intents.iter().all(|i| i.intent_type == "trade"));

	let first_page = manager
		.query_intents(QueryIntentsRequest {
			intent_type: Some("trade".into()),
			limit: 1,
			..Default::default()
		})
		.await
		.unwrap();
	assert_ne!(first_page.intents[0].id, trades.intents[0].id);

	let future = manager
		.query_intents(QueryIntentsRequest {
			start_time: Some(chrono::Utc::now().timestamp() + 3600),
			..Default::default()
		})
		.await
		.unwrap();
	assert_eq!(future.total, 0);

	let err = manager
		.query_intents(QueryIntentsRequest {
			start_time: Some(10),
			end_time: Some(5),
			..Default::default()
		})
		.await
		.unwrap_err();
	assert_eq!(err.kind, ErrorKind::ValidationFailed);
}

#[tokio::test]
async fn test_broadcast_publishes_and_notifies() {
	let transport = Arc::new(RecordingTransport::default());
	let manager = IntentManager::builder()
		.with_transport(transport.clone())
		.build()
		.await
		.unwrap();
	let mut subscription = manager
		.subscribe_intents(
			SubscribeIntentsRequest {
				types: vec!["trade".into()],
				topics: Vec::new(),
			},
			CancellationToken::new(),
		)
		.await
		.unwrap();

	let intent = create(&manager, "trade", b"buy", "alice").await;
	let response = manager
		.broadcast_intent(BroadcastIntentRequest {
			intent_id: intent.id.clone(),
			topic: None,
		})
		.await
		.unwrap();
	assert!(response.success);
	assert_eq!(response.topic, resolve_topic("trade"));

	let published = transport.published.lock().await;
	assert_eq!(published.len(), 1);
	assert_eq!(published[0].0, "intent-broadcast.trade");
	let sent = published[0].1.to_intent().unwrap();
	assert_eq!(sent.id, intent.id);
	assert_eq!(sent.status, IntentStatus::Broadcasted);
	drop(published);

	let delivered = subscription.recv().await.unwrap();
	assert_eq!(delivered.id, intent.id);
	assert_eq!(
		manager.get_intent_status(&intent.id).await.unwrap().status,
		IntentStatus::Broadcasted
	);
	assert_eq!(
		manager.lifecycle().status(&intent.id),
		Some(IntentStatus::Broadcasted)
	);
}

#[tokio::test]
async fn test_broadcast_failure_marks_intent_failed() {
	let manager = IntentManager::builder()
		.with_transport(Arc::new(RecordingTransport::failing()))
		.build()
		.await
		.unwrap();
	let intent = create(&manager, "swap", b"x", "alice").await;

	let err = manager
		.broadcast_intent(BroadcastIntentRequest {
			intent_id: intent.id.clone(),
			topic: Some("custom".into()),
		})
		.await
		.unwrap_err();
	assert_eq!(err.kind, ErrorKind::BroadcastFailed);
	assert!(!BroadcastIntentResponse::failure(&intent.id, &err).success);

	let stored = manager.get_intent_status(&intent.id).await.unwrap();
	assert_eq!(stored.status, IntentStatus::Failed);
	assert!(stored.error.unwrap().contains("no peers"));
}

#[tokio::test]
async fn test_broadcast_without_transport() {
	let manager = manager().await;
	let intent = create(&manager, "trade", b"x", "alice").await;
	let err = manager
		.broadcast_intent(BroadcastIntentRequest {
			intent_id: intent.id,
			topic: None,
		})
		.await
		.unwrap_err();
	assert_eq!(err.kind, ErrorKind::NetworkUnavailable);
}

#[tokio::test]
async fn test_subscription_drops_on_full_queue_and_closes_on_cancel() {
	let mut config = IntentConfig::default();
	config.subscriptions.buffer_size = 1;
	let manager = IntentManagerBuilder::new(config)
		.with_transport(Arc::new(RecordingTransport::default()))
		.build()
		.await
		.unwrap();

	let cancel = CancellationToken::new();
	let mut subscription = manager
		.subscribe_intents(SubscribeIntentsRequest::default(), cancel.clone())
		.await
		.unwrap();
	assert_eq!(manager.metrics().await.active_subscriptions, 1);

	let first = create(&manager, "trade", b"1", "alice").await;
	let second = create(&manager, "trade", b"2", "alice").await;
	for intent in [&first, &second] {
		manager
			.broadcast_intent(BroadcastIntentRequest {
				intent_id: intent.id.clone(),
				topic: None,
			})
			.await
			.unwrap();
	}

	assert_eq!(subscription.recv().await.unwrap().id, first.id);

	cancel.cancel();
	let closed = tokio::time::timeout(Duration::from_secs(1), subscription.recv())
		.await
		.unwrap();
	assert!(closed.is_none());
	assert_eq!(manager.metrics().await.active_subscriptions, 0);
}

#[tokio::test]
async fn test_dropped_subscription_is_released() {
	let manager = manager().await;
	let subscription = manager
		.subscribe_intents(SubscribeIntentsRequest::default(), CancellationToken::new())
		.await
		.unwrap();
	assert_eq!(manager.metrics().await.active_subscriptions, 1);

	drop(subscription);
	wait_for(|| {
		let manager = manager.clone();
		async move { manager.metrics().await.active_subscriptions == 0 }
	})
	.await;
}

#[tokio::test]
async fn test_incoming_broadcast_is_deduplicated() {
	let manager = manager().await;
	let remote = Intent::new("trade", "peer-1", b"sell".to_vec()).with_ttl(600);
	let message = TransportMessage::from_intent(&remote, "intent-broadcast.trade").unwrap();

	manager
		.handle_incoming_broadcast(message.clone())
		.await
		.unwrap();
	manager.handle_incoming_broadcast(message).await.unwrap();

	assert_eq!(manager.intent_count().await, 1);
	// Without handlers the intent stays received.
	assert_eq!(
		manager.get_intent_status(&remote.id).await.unwrap().status,
		IntentStatus::Received
	);
	assert_eq!(manager.metrics().await.intents_received, 1);
}

#[tokio::test]
async fn test_listen_routes_incoming_to_handlers() {
	let transport = Arc::new(RecordingTransport::default());
	let mut config = IntentConfig::default();
	config.node.listen_topics = vec!["intent-broadcast.trade".into()];
	let manager = IntentManagerBuilder::new(config)
		.with_transport(transport.clone())
		.with_handler(Arc::new(AcceptingHandler))
		.build()
		.await
		.unwrap();
	manager.start().await.unwrap();

	let remote = Intent::new("trade", "peer-1", b"sell".to_vec()).with_ttl(600);
	transport
		.deliver(TransportMessage::from_intent(&remote, "intent-broadcast.trade").unwrap())
		.await
		.unwrap();

	let stored = manager.get_intent_status(&remote.id).await.unwrap();
	assert_eq!(stored.status, IntentStatus::Processed);

	manager.shutdown().await;
	assert_eq!(
		*transport.unsubscribed.lock().await,
		vec!["intent-broadcast.trade".to_string()]
	);
}

#[tokio::test]
async fn test_cleanup_removes_expired_intents() {
	let manager = manager().await;
	let stale = create(&manager, "trade", b"old", "alice").await;
	let fresh = create(&manager, "trade", b"new", "alice").await;

	manager
		.intents
		.write()
		.await
		.get_mut(&stale.id)
		.unwrap()
		.timestamp -= 7200;

	assert_eq!(manager.cleanup_expired_intents().await, 1);
	assert!(manager.get_intent_status(&stale.id).await.is_err());
	assert!(manager.get_intent_status(&fresh.id).await.is_ok());
	assert!(!manager.lifecycle().is_tracked(&stale.id));
	assert_eq!(manager.metrics().await.intents_expired, 1);
}

#[tokio::test]
async fn test_tracker_expiry_reaches_store() {
	let manager = manager().await;
	manager.start().await.unwrap();

	let intent = manager
		.create_intent(CreateIntentRequest {
			ttl: 1,
			..CreateIntentRequest::new("trade", b"quick".to_vec(), "alice")
		})
		.await
		.unwrap()
		.intent
		.unwrap();

	let id = intent.id.clone();
	wait_for(|| {
		let manager = manager.clone();
		let id = id.clone();
		async move {
			manager
				.get_intent_status(&id)
				.await
				.map(|i| i.status == IntentStatus::Expired)
				.unwrap_or(false)
		}
	})
	.await;

	manager.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_closes_subscriptions() {
	let manager = manager().await;
	manager.start().await.unwrap();
	let mut subscription = manager
		.subscribe_intents(SubscribeIntentsRequest::default(), CancellationToken::new())
		.await
		.unwrap();

	manager.shutdown().await;
	let closed = tokio::time::timeout(Duration::from_secs(1), subscription.recv())
		.await
		.unwrap();
	assert!(closed.is_none());
	assert!(manager
		.subscribe_intents(SubscribeIntentsRequest::default(), CancellationToken::new())
		.await
		.is_err());
}
