//! Handler registry and the processor that dispatches to it.

use crate::metrics::{ProcessorMetrics, ProcessorRecorder};
use crate::pipeline::ProcessingPipeline;
use async_trait::async_trait;
use intent_config::ProcessorConfig;
use intent_types::{ErrorKind, Intent, IntentError, IntentStatus, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Base delay for handler retries; attempt `n` waits `n² * HANDLER_RETRY_DELAY`.
const HANDLER_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Type-specific business logic run after the pipeline succeeds.
#[async_trait]
pub trait IntentHandler: Send + Sync {
	fn name(&self) -> &str;

	fn supported_types(&self) -> Vec<String>;

	/// Higher runs earlier.
	fn priority(&self) -> i32;

	async fn handle(&self, intent: &Intent) -> Result<()>;
}

/// Maps intent types to handlers ordered by descending priority.
#[derive(Default)]
pub struct HandlerRegistry {
	handlers: RwLock<HashMap<String, Vec<Arc<dyn IntentHandler>>>>,
}

impl HandlerRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `handler` for `intent_type`. Among equal priorities the
	/// earlier registration runs first.
	pub async fn register_handler(&self, intent_type: &str, handler: Arc<dyn IntentHandler>) {
		let mut handlers = self.handlers.write().await;
		let list = handlers.entry(intent_type.to_lowercase()).or_default();
		let position = list
			.iter()
			.position(|h| h.priority() < handler.priority())
			.unwrap_or(list.len());
		info!(
			"Registered handler '{}' for type '{}' at position {}",
			handler.name(),
			intent_type,
			position
		);
		list.insert(position, handler);
	}

	/// Registers `handler` for every type it declares.
	pub async fn register(&self, handler: Arc<dyn IntentHandler>) {
		for intent_type in handler.supported_types() {
			self.register_handler(&intent_type, handler.clone()).await;
		}
	}

	pub async fn unregister_handler(&self, intent_type: &str, name: &str) -> bool {
		let mut handlers = self.handlers.write().await;
		let key = intent_type.to_lowercase();
		let Some(list) = handlers.get_mut(&key) else {
			return false;
		};
		let before = list.len();
		list.retain(|h| h.name() != name);
		let removed = list.len() != before;
		if list.is_empty() {
			handlers.remove(&key);
		}
		removed
	}

	/// Handlers for `intent_type` in execution order.
	pub async fn get_handlers(&self, intent_type: &str) -> Result<Vec<Arc<dyn IntentHandler>>> {
		self.handlers
			.read()
			.await
			.get(&intent_type.to_lowercase())
			.filter(|list| !list.is_empty())
			.cloned()
			.ok_or_else(|| {
				IntentError::new(
					ErrorKind::HandlerNotFound,
					format!("No handler registered for intent type '{}'", intent_type),
				)
			})
	}

	pub async fn has_handlers(&self, intent_type: &str) -> bool {
		self.handlers
			.read()
			.await
			.get(&intent_type.to_lowercase())
			.is_some_and(|list| !list.is_empty())
	}

	pub async fn handler_count(&self) -> usize {
		self.handlers.read().await.values().map(Vec::len).sum()
	}

	pub async fn registered_types(&self) -> Vec<String> {
		let mut types: Vec<String> = self.handlers.read().await.keys().cloned().collect();
		types.sort();
		types
	}
}

#[derive(Debug, Clone)]
pub struct ProcessorSettings {
	pub handler_timeout: Duration,
	pub max_retries: u32,
}

impl Default for ProcessorSettings {
	fn default() -> Self {
		Self::from(&ProcessorConfig::default())
	}
}

impl From<&ProcessorConfig> for ProcessorSettings {
	fn from(config: &ProcessorConfig) -> Self {
		Self {
			handler_timeout: config.handler_timeout(),
			max_retries: config.handler_max_retries,
		}
	}
}

/// Runs the pipeline, then dispatches to the registered handlers.
pub struct Processor {
	pipeline: Arc<ProcessingPipeline>,
	registry: Arc<HandlerRegistry>,
	settings: ProcessorSettings,
	metrics: ProcessorRecorder,
}

impl Processor {
	pub fn new(
		pipeline: Arc<ProcessingPipeline>,
		registry: Arc<HandlerRegistry>,
		settings: ProcessorSettings,
	) -> Self {
		Self {
			pipeline,
			registry,
			settings,
			metrics: ProcessorRecorder::default(),
		}
	}

	pub fn pipeline(&self) -> &Arc<ProcessingPipeline> {
		&self.pipeline
	}

	pub fn registry(&self) -> &Arc<HandlerRegistry> {
		&self.registry
	}

	pub async fn metrics(&self) -> ProcessorMetrics {
		self.metrics.snapshot().await
	}

	/// Processes an intent received from a peer. Requires at least one
	/// handler for its type.
	pub async fn process_incoming_intent(
		&self,
		intent: &mut Intent,
		cancel: &CancellationToken,
	) -> Result<()> {
		self.run(intent, cancel, true).await
	}

	/// Processes a locally originated intent. Only `Created` or `Validated`
	/// intents are accepted; on success the intent is marked `Processed`.
	pub async fn process_outgoing_intent(
		&self,
		intent: &mut Intent,
		cancel: &CancellationToken,
	) -> Result<()> {
		if !matches!(intent.status, IntentStatus::Created | IntentStatus::Validated) {
			return Err(IntentError::new(
				ErrorKind::AlreadyProcessed,
				format!(
					"Intent {} has status '{}'; expected created or validated",
					intent.id, intent.status
				),
			));
		}

		self.pipeline.process(intent, cancel).await?;
		intent.status = IntentStatus::Processed;
		Ok(())
	}

	/// Runs the pipeline and, when handlers exist for the intent's type,
	/// dispatches to them. A type without handlers is not an error here.
	pub async fn process_intent(&self, intent: &mut Intent, cancel: &CancellationToken) -> Result<()> {
		self.run(intent, cancel, false).await
	}

	async fn run(&self, intent: &mut Intent, cancel: &CancellationToken, require_handlers: bool) -> Result<()> {
		self.metrics.begin().await;
		let started = Instant::now();

		let result = self.run_inner(intent, cancel, require_handlers).await;

		self.metrics.finish(started.elapsed(), result.is_ok()).await;
		result
	}

	async fn run_inner(
		&self,
		intent: &mut Intent,
		cancel: &CancellationToken,
		require_handlers: bool,
	) -> Result<()> {
		self.pipeline.process(intent, cancel).await?;

		// The pipeline may normalize the type, so resolve handlers afterwards.
		let handlers = match self.registry.get_handlers(&intent.intent_type).await {
			Ok(handlers) => handlers,
			Err(e) if !require_handlers => {
				debug!("No handlers for intent {}: {}", intent.id, e);
				return Ok(());
			}
			Err(e) => return Err(e),
		};

		self.execute_handlers(intent, &handlers, cancel).await
	}

	/// Runs every handler in order. Succeeds when at least one handler
	/// succeeds; otherwise reports the last failure.
	async fn execute_handlers(
		&self,
		intent: &Intent,
		handlers: &[Arc<dyn IntentHandler>],
		cancel: &CancellationToken,
	) -> Result<()> {
		let mut succeeded = 0usize;
		let mut last_error = None;

		for handler in handlers {
			match self.execute_handler(handler.as_ref(), intent, cancel).await {
				Ok(()) => succeeded += 1,
				Err(e) if e.is(ErrorKind::Cancelled) => return Err(e),
				Err(e) => {
					warn!(
						"Handler '{}' failed for intent {}: {}",
						handler.name(),
						intent.id,
						e
					);
					last_error = Some(e);
				}
			}
		}

		if succeeded > 0 {
			debug!(
				"{} of {} handlers succeeded for intent {}",
				succeeded,
				handlers.len(),
				intent.id
			);
			return Ok(());
		}

		let message = format!("All {} handlers failed for intent {}", handlers.len(), intent.id);
		Err(match last_error {
			Some(e) => IntentError::wrap(ErrorKind::ProcessingFailed, message, e),
			None => IntentError::processing(message),
		})
	}

	async fn execute_handler(
		&self,
		handler: &dyn IntentHandler,
		intent: &Intent,
		cancel: &CancellationToken,
	) -> Result<()> {
		let mut last_error = None;

		for attempt in 0..=self.settings.max_retries {
			if attempt > 0 {
				let backoff = HANDLER_RETRY_DELAY * (attempt * attempt);
				tokio::select! {
					biased;
					_ = cancel.cancelled() => return Err(IntentError::cancelled("Handler execution cancelled")),
					_ = tokio::time::sleep(backoff) => {}
				}
			}

			let outcome = tokio::select! {
				biased;
				_ = cancel.cancelled() => return Err(IntentError::cancelled("Handler execution cancelled")),
				res = tokio::time::timeout(self.settings.handler_timeout, handler.handle(intent)) => res,
			};

			match outcome {
				Ok(Ok(())) => return Ok(()),
				Ok(Err(e)) => last_error = Some(e),
				Err(_) => {
					last_error = Some(IntentError::timeout(format!(
						"Handler '{}' timed out after {:?}",
						handler.name(),
						self.settings.handler_timeout
					)))
				}
			}
		}

		Err(last_error.unwrap_or_else(|| IntentError::processing("Handler did not run")))
	}
}
