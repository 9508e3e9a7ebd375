//! Assembles an [`IntentManager`] from configuration and collaborators.

use super::{subscription::Subscribers, IntentManager};
use crate::event_bus::EventBus;
use crate::lifecycle::{LifecycleSettings, LifecycleTracker};
use crate::matching::{MatchingEngine, MatchingRule, MatchingSettings};
use crate::metrics::MetricsRecorder;
use crate::pipeline::{
	EnrichmentStage, FilteringStage, IntentFilter, PipelineSettings, ProcessingPipeline,
	ProcessingStage, SenderBlockListFilter, SignatureStage, TransformationStage,
	TypeBlockListFilter, ValidationStage,
};
use crate::processor::{HandlerRegistry, IntentHandler, Processor, ProcessorSettings};
use dashmap::DashMap;
use intent_config::IntentConfig;
use intent_types::{IntentError, IntentSigner, IntentValidator, Result, Transport};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct IntentManagerBuilder {
	config: IntentConfig,
	validator: Option<Arc<dyn IntentValidator>>,
	signer: Option<Arc<dyn IntentSigner>>,
	transport: Option<Arc<dyn Transport>>,
	handlers: Vec<Arc<dyn IntentHandler>>,
	filters: Vec<Arc<dyn IntentFilter>>,
	stages: Vec<Arc<dyn ProcessingStage>>,
	pipeline: Option<Arc<ProcessingPipeline>>,
	rules: Vec<Arc<dyn MatchingRule>>,
	event_bus: Option<EventBus>,
}

impl Default for IntentManagerBuilder {
	fn default() -> Self {
		Self::new(IntentConfig::default())
	}
}

impl IntentManagerBuilder {
	pub fn new(config: IntentConfig) -> Self {
		Self {
			config,
			validator: None,
			signer: None,
			transport: None,
			handlers: Vec::new(),
			filters: Vec::new(),
			stages: Vec::new(),
			pipeline: None,
			rules: Vec::new(),
			event_bus: None,
		}
	}

	pub fn with_config(mut self, config: IntentConfig) -> Self {
		self.config = config;
		self
	}

	pub fn with_validator(mut self, validator: Arc<dyn IntentValidator>) -> Self {
		self.validator = Some(validator);
		self
	}

	pub fn with_signer(mut self, signer: Arc<dyn IntentSigner>) -> Self {
		self.signer = Some(signer);
		self
	}

	pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.transport = Some(transport);
		self
	}

	pub fn with_handler(mut self, handler: Arc<dyn IntentHandler>) -> Self {
		self.handlers.push(handler);
		self
	}

	/// Adds a filter to the default pipeline's filtering stage.
	pub fn with_filter(mut self, filter: Arc<dyn IntentFilter>) -> Self {
		self.filters.push(filter);
		self
	}

	/// Adds a stage on top of the default or supplied pipeline.
	pub fn with_stage(mut self, stage: Arc<dyn ProcessingStage>) -> Self {
		self.stages.push(stage);
		self
	}

	/// Replaces the pipeline built from configuration.
	pub fn with_pipeline(mut self, pipeline: Arc<ProcessingPipeline>) -> Self {
		self.pipeline = Some(pipeline);
		self
	}

	pub fn with_matching_rule(mut self, rule: Arc<dyn MatchingRule>) -> Self {
		self.rules.push(rule);
		self
	}

	pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
		self.event_bus = Some(event_bus);
		self
	}

	pub async fn build(self) -> Result<IntentManager> {
		self.config
			.validate()
			.map_err(|e| IntentError::configuration(e.to_string()))?;

		let signing_key = match (&self.config.node.signing_key, self.config.node.sign_intents) {
			(Some(key), true) => {
				if self.signer.is_none() {
					return Err(IntentError::configuration(
						"Intent signing is enabled but no signer is configured",
					));
				}
				let key = hex::decode(key.trim_start_matches("0x"))
					.map_err(|e| IntentError::configuration(format!("Invalid signing key: {}", e)))?;
				Some(key)
			}
			_ => None,
		};

		let event_bus = self.event_bus.unwrap_or_default();

		let pipeline = match self.pipeline {
			Some(pipeline) => pipeline,
			None => Arc::new(
				default_pipeline(
					&self.config,
					self.validator.clone(),
					self.signer.clone(),
					self.filters,
				)
				.await,
			),
		};
		for stage in self.stages {
			pipeline.add_stage(stage).await;
		}

		let registry = Arc::new(HandlerRegistry::new());
		for handler in self.handlers {
			registry.register(handler).await;
		}

		let processor = Arc::new(Processor::new(
			pipeline.clone(),
			registry,
			ProcessorSettings::from(&self.config.processor),
		));

		let matching =
			MatchingEngine::with_default_rules(MatchingSettings::from(&self.config.matching)).await?;
		for rule in self.rules {
			matching.add_rule(rule).await;
		}

		let lifecycle = LifecycleTracker::new(
			LifecycleSettings::from(&self.config.lifecycle),
			event_bus.clone(),
		);

		info!(
			"Intent manager '{}' built with stages {:?}",
			self.config.node.node_id,
			pipeline.stages().await
		);

		Ok(IntentManager {
			config: Arc::new(self.config),
			intents: Arc::new(RwLock::new(std::collections::HashMap::new())),
			subscribers: Subscribers::default(),
			validator: self.validator,
			signer: self.signer,
			signing_key,
			transport: self.transport,
			processor,
			matching: Arc::new(matching),
			lifecycle,
			matching_status: Arc::new(DashMap::new()),
			metrics: MetricsRecorder::default(),
			event_bus,
			shutdown: CancellationToken::new(),
			tasks: Arc::new(Mutex::new(Vec::new())),
			topic_subscriptions: Arc::new(Mutex::new(Vec::new())),
		})
	}
}

/// Builds the stage set enabled by configuration.
async fn default_pipeline(
	config: &IntentConfig,
	validator: Option<Arc<dyn IntentValidator>>,
	signer: Option<Arc<dyn IntentSigner>>,
	mut filters: Vec<Arc<dyn IntentFilter>>,
) -> ProcessingPipeline {
	let pipeline = ProcessingPipeline::new(PipelineSettings::from(&config.pipeline));
	let stages = &config.pipeline;

	if let Some(validator) = validator {
		pipeline.add_stage(Arc::new(ValidationStage::new(validator))).await;
	}
	if let (Some(signer), true) = (signer, stages.enable_signature) {
		pipeline.add_stage(Arc::new(SignatureStage::new(signer))).await;
	}
	if stages.enable_enrichment {
		pipeline.add_stage(Arc::new(EnrichmentStage)).await;
	}
	if stages.enable_transformation {
		pipeline
			.add_stage(Arc::new(TransformationStage::new(
				config.intents.default_ttl_secs,
			)))
			.await;
	}
	if stages.enable_filtering {
		if !stages.blocked_types.is_empty() {
			filters.push(Arc::new(TypeBlockListFilter::new(&stages.blocked_types)));
		}
		if !stages.blocked_senders.is_empty() {
			filters.push(Arc::new(SenderBlockListFilter::new(
				stages.blocked_senders.iter().cloned(),
			)));
		}
		pipeline.add_stage(Arc::new(FilteringStage::new(filters))).await;
	}

	pipeline
}
