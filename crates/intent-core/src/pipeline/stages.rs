//! Built-in pipeline stages.

use super::ProcessingStage;
use async_trait::async_trait;
use intent_types::{
	priority, ErrorKind, Intent, IntentError, IntentSigner, IntentValidator, Result,
	DEFAULT_TTL_SECS,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

pub const VALIDATION_PRIORITY: i32 = 100;
pub const SIGNATURE_PRIORITY: i32 = 90;
pub const ENRICHMENT_PRIORITY: i32 = 80;
pub const TRANSFORMATION_PRIORITY: i32 = 70;
pub const FILTERING_PRIORITY: i32 = 60;

/// Delegates to the validator collaborator. Always runs.
pub struct ValidationStage {
	validator: Arc<dyn IntentValidator>,
}

impl ValidationStage {
	pub fn new(validator: Arc<dyn IntentValidator>) -> Self {
		Self { validator }
	}
}

#[async_trait]
impl ProcessingStage for ValidationStage {
	fn name(&self) -> &str {
		"validation"
	}

	fn priority(&self) -> i32 {
		VALIDATION_PRIORITY
	}

	fn should_process(&self, _intent: &Intent) -> bool {
		true
	}

	async fn process(&self, intent: &mut Intent) -> Result<()> {
		self.validator.validate_intent(intent).await.map_err(|e| {
			if e.is(ErrorKind::ValidationFailed) || e.is(ErrorKind::InvalidFormat) {
				e
			} else {
				IntentError::wrap(ErrorKind::ValidationFailed, "Intent validation failed", e)
			}
		})
	}
}

/// Verifies signatures through the signer collaborator. Runs only for
/// signed intents.
pub struct SignatureStage {
	signer: Arc<dyn IntentSigner>,
}

impl SignatureStage {
	pub fn new(signer: Arc<dyn IntentSigner>) -> Self {
		Self { signer }
	}
}

#[async_trait]
impl ProcessingStage for SignatureStage {
	fn name(&self) -> &str {
		"signature"
	}

	fn priority(&self) -> i32 {
		SIGNATURE_PRIORITY
	}

	fn should_process(&self, intent: &Intent) -> bool {
		intent.is_signed()
	}

	async fn process(&self, intent: &mut Intent) -> Result<()> {
		self.signer
			.verify_signature(intent)
			.await
			.map_err(|e| IntentError::wrap(ErrorKind::SignatureFailed, "Signature verification failed", e))
	}
}

/// Stamps processing time and processing metadata.
#[derive(Default)]
pub struct EnrichmentStage;

#[async_trait]
impl ProcessingStage for EnrichmentStage {
	fn name(&self) -> &str {
		"enrichment"
	}

	fn priority(&self) -> i32 {
		ENRICHMENT_PRIORITY
	}

	fn should_process(&self, _intent: &Intent) -> bool {
		true
	}

	async fn process(&self, intent: &mut Intent) -> Result<()> {
		let now = chrono::Utc::now();
		if intent.processed_at.is_none() {
			intent.processed_at = Some(now.timestamp());
		}
		intent
			.metadata
			.insert("processed_by".to_string(), "pipeline".to_string());
		intent
			.metadata
			.insert("processing_stage".to_string(), "enrichment".to_string());
		intent
			.metadata
			.insert("enriched_at".to_string(), now.to_rfc3339());
		Ok(())
	}
}

/// Type-specific rewrite applied by the transformation stage.
#[async_trait]
pub trait IntentTransformer: Send + Sync {
	fn name(&self) -> &str;

	async fn transform(&self, intent: &mut Intent) -> Result<()>;
}

/// Normalizes type casing, clamps priority and fills the default TTL, then
/// applies any transformers registered for the intent's type.
pub struct TransformationStage {
	default_ttl: u64,
	transformers: RwLock<HashMap<String, Vec<Arc<dyn IntentTransformer>>>>,
}

impl Default for TransformationStage {
	fn default() -> Self {
		Self::new(DEFAULT_TTL_SECS)
	}
}

impl TransformationStage {
	pub fn new(default_ttl: u64) -> Self {
		Self {
			default_ttl,
			transformers: RwLock::new(HashMap::new()),
		}
	}

	pub async fn add_transformer(&self, intent_type: &str, transformer: Arc<dyn IntentTransformer>) {
		self.transformers
			.write()
			.await
			.entry(intent_type.to_lowercase())
			.or_default()
			.push(transformer);
	}
}

#[async_trait]
impl ProcessingStage for TransformationStage {
	fn name(&self) -> &str {
		"transformation"
	}

	fn priority(&self) -> i32 {
		TRANSFORMATION_PRIORITY
	}

	fn should_process(&self, _intent: &Intent) -> bool {
		true
	}

	async fn process(&self, intent: &mut Intent) -> Result<()> {
		intent.intent_type = intent.intent_type.trim().to_lowercase();
		intent.priority = priority::normalize(intent.priority);
		if intent.ttl == 0 {
			intent.ttl = self.default_ttl;
		}

		let transformers = self
			.transformers
			.read()
			.await
			.get(&intent.intent_type)
			.cloned()
			.unwrap_or_default();

		for transformer in transformers {
			debug!(
				"Applying transformer '{}' to intent {}",
				transformer.name(),
				intent.id
			);
			transformer.transform(intent).await?;
		}

		Ok(())
	}
}

/// Decides whether an intent may continue through the pipeline.
#[async_trait]
pub trait IntentFilter: Send + Sync {
	fn name(&self) -> &str;

	async fn should_allow(&self, intent: &Intent) -> Result<bool>;
}

/// Rejects intents when any filter disallows them. Runs only when at least
/// one filter is configured.
pub struct FilteringStage {
	filters: Vec<Arc<dyn IntentFilter>>,
}

impl FilteringStage {
	pub fn new(filters: Vec<Arc<dyn IntentFilter>>) -> Self {
		Self { filters }
	}
}

#[async_trait]
impl ProcessingStage for FilteringStage {
	fn name(&self) -> &str {
		"filtering"
	}

	fn priority(&self) -> i32 {
		FILTERING_PRIORITY
	}

	fn should_process(&self, _intent: &Intent) -> bool {
		!self.filters.is_empty()
	}

	async fn process(&self, intent: &mut Intent) -> Result<()> {
		for filter in &self.filters {
			if !filter.should_allow(intent).await? {
				return Err(IntentError::processing(format!(
					"Intent rejected by filter '{}'",
					filter.name()
				)));
			}
		}
		Ok(())
	}
}

/// Rejects intents of the listed types.
pub struct TypeBlockListFilter {
	blocked: HashSet<String>,
}

impl TypeBlockListFilter {
	pub fn new<I, S>(types: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		Self {
			blocked: types.into_iter().map(|t| t.as_ref().to_lowercase()).collect(),
		}
	}
}

#[async_trait]
impl IntentFilter for TypeBlockListFilter {
	fn name(&self) -> &str {
		"type_block_list"
	}

	async fn should_allow(&self, intent: &Intent) -> Result<bool> {
		Ok(!self.blocked.contains(&intent.intent_type.to_lowercase()))
	}
}

/// Rejects intents from the listed senders.
pub struct SenderBlockListFilter {
	blocked: HashSet<String>,
}

impl SenderBlockListFilter {
	pub fn new<I, S>(senders: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			blocked: senders.into_iter().map(Into::into).collect(),
		}
	}
}

#[async_trait]
impl IntentFilter for SenderBlockListFilter {
	fn name(&self) -> &str {
		"sender_block_list"
	}

	async fn should_allow(&self, intent: &Intent) -> Result<bool> {
		Ok(!self.blocked.contains(&intent.sender_id))
	}
}
