//! Staged processing pipeline.
//!
//! Stages run in descending priority order (ties keep insertion order).
//! Each stage runs on a working copy of the intent under its own deadline,
//! bounded by the overall pipeline deadline, and is retried with a linear
//! backoff. The copy is committed only when the stage succeeds, so a failed
//! attempt never leaves partial edits behind.

pub mod stages;

pub use stages::{
	EnrichmentStage, FilteringStage, IntentFilter, IntentTransformer, SenderBlockListFilter,
	SignatureStage, TransformationStage, TypeBlockListFilter, ValidationStage,
};

use async_trait::async_trait;
use intent_config::PipelineConfig;
use intent_types::{Intent, IntentError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Base delay for stage retries; attempt `n` waits `n * STAGE_RETRY_DELAY`.
const STAGE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// A named, prioritized unit of work applied to an intent.
#[async_trait]
pub trait ProcessingStage: Send + Sync {
	fn name(&self) -> &str;

	/// Higher runs earlier.
	fn priority(&self) -> i32;

	fn should_process(&self, intent: &Intent) -> bool;

	async fn process(&self, intent: &mut Intent) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
	pub pipeline_timeout: Duration,
	pub stage_timeout: Duration,
	pub max_retries: u32,
}

impl Default for PipelineSettings {
	fn default() -> Self {
		Self::from(&PipelineConfig::default())
	}
}

impl From<&PipelineConfig> for PipelineSettings {
	fn from(config: &PipelineConfig) -> Self {
		Self {
			pipeline_timeout: config.pipeline_timeout(),
			stage_timeout: config.stage_timeout(),
			max_retries: config.max_retries,
		}
	}
}

pub struct ProcessingPipeline {
	stages: RwLock<Vec<Arc<dyn ProcessingStage>>>,
	settings: PipelineSettings,
}

impl ProcessingPipeline {
	pub fn new(settings: PipelineSettings) -> Self {
		Self {
			stages: RwLock::new(Vec::new()),
			settings,
		}
	}

	pub fn settings(&self) -> &PipelineSettings {
		&self.settings
	}

	/// Adds a stage, keeping stages sorted by descending priority.
	pub async fn add_stage(&self, stage: Arc<dyn ProcessingStage>) {
		let mut stages = self.stages.write().await;
		debug!(
			"Adding pipeline stage '{}' with priority {}",
			stage.name(),
			stage.priority()
		);
		stages.push(stage);
		// Stable sort: equal priorities keep insertion order.
		stages.sort_by(|a, b| b.priority().cmp(&a.priority()));
	}

	/// Removes every stage with the given name. Returns whether any was removed.
	pub async fn remove_stage(&self, name: &str) -> bool {
		let mut stages = self.stages.write().await;
		let before = stages.len();
		stages.retain(|s| s.name() != name);
		stages.len() != before
	}

	/// Stage names in execution order.
	pub async fn stages(&self) -> Vec<String> {
		self.stages
			.read()
			.await
			.iter()
			.map(|s| s.name().to_string())
			.collect()
	}

	/// Runs every applicable stage against `intent`.
	///
	/// Fails when a stage fails after its retries, when the pipeline deadline
	/// passes, when `cancel` fires, or when no stage applied to the intent.
	pub async fn process(&self, intent: &mut Intent, cancel: &CancellationToken) -> Result<()> {
		let stages = self.stages.read().await.clone();
		let deadline = Instant::now() + self.settings.pipeline_timeout;
		let mut executed = 0usize;

		for (position, stage) in stages.iter().enumerate() {
			if !stage.should_process(intent) {
				debug!("Stage '{}' skipped for intent {}", stage.name(), intent.id);
				continue;
			}

			self.run_stage(stage.as_ref(), intent, deadline, cancel)
				.await
				.map_err(|e| {
					IntentError::new(
						e.kind,
						format!("Stage '{}' failed at position {}", stage.name(), position),
					)
					.with_details(e.to_string())
				})?;

			executed += 1;
			debug!("Stage '{}' completed for intent {}", stage.name(), intent.id);
		}

		if executed == 0 {
			return Err(IntentError::processing(
				"No pipeline stages processed the intent",
			));
		}

		Ok(())
	}

	async fn run_stage(
		&self,
		stage: &dyn ProcessingStage,
		intent: &mut Intent,
		deadline: Instant,
		cancel: &CancellationToken,
	) -> Result<()> {
		let mut last_error = None;

		for attempt in 0..=self.settings.max_retries {
			if attempt > 0 {
				let backoff = STAGE_RETRY_DELAY * attempt;
				let wake = (Instant::now() + backoff).min(deadline);
				tokio::select! {
					biased;
					_ = cancel.cancelled() => return Err(cancelled_error()),
					_ = tokio::time::sleep_until(wake) => {}
				}
			}

			if cancel.is_cancelled() {
				return Err(cancelled_error());
			}

			let remaining = deadline.saturating_duration_since(Instant::now());
			if remaining.is_zero() {
				return Err(last_error
					.unwrap_or_else(|| IntentError::timeout("Pipeline deadline exceeded")));
			}
			let budget = self.settings.stage_timeout.min(remaining);

			let mut working = intent.clone();
			let outcome = tokio::select! {
				biased;
				_ = cancel.cancelled() => return Err(cancelled_error()),
				res = tokio::time::timeout(budget, stage.process(&mut working)) => res,
			};

			match outcome {
				Ok(Ok(())) => {
					*intent = working;
					return Ok(());
				}
				Ok(Err(e)) => {
					warn!(
						"Stage '{}' attempt {} failed for intent {}: {}",
						stage.name(),
						attempt + 1,
						intent.id,
						e
					);
					last_error = Some(e);
				}
				Err(_) => {
					warn!(
						"Stage '{}' attempt {} timed out after {:?} for intent {}",
						stage.name(),
						attempt + 1,
						budget,
						intent.id
					);
					last_error = Some(IntentError::timeout(format!(
						"Stage '{}' timed out after {:?}",
						stage.name(),
						budget
					)));
				}
			}
		}

		Err(last_error.unwrap_or_else(|| IntentError::processing("Stage did not run")))
	}
}

fn cancelled_error() -> IntentError {
	IntentError::cancelled("Processing cancelled")
}
