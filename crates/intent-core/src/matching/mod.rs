//! Rule-based matching engine.
//!
//! Every candidate is scored by every registered rule; results that match
//! with at least the configured confidence are kept, sorted by confidence
//! and truncated. Results are cached per query intent in an LRU cache.
//! Cached results are returned as-is even if the candidate set has changed
//! since they were computed.

pub mod rules;

pub use rules::{
	CompositeMatchRule, ContentMatchRule, ContentSimilarity, ExactMatchRule, MetadataMatchRule,
	TypeMatchRule,
};

use async_trait::async_trait;
use intent_config::MatchingConfig;
use intent_types::{
	Intent, IntentError, MatchResult, Result, DETAIL_MATCHED_INTENT_ID, DETAIL_RULE,
};
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// Scores how well a candidate matches an intent.
#[async_trait]
pub trait MatchingRule: Send + Sync {
	fn name(&self) -> &str;

	/// Higher is evaluated earlier.
	fn priority(&self) -> i32;

	async fn evaluate(&self, intent: &Intent, candidate: &Intent) -> Result<MatchResult>;
}

#[derive(Debug, Clone)]
pub struct MatchingSettings {
	pub confidence_threshold: f64,
	pub max_matches_per_intent: usize,
	pub cache_enabled: bool,
	pub cache_size: usize,
	pub matching_timeout: Duration,
	pub composite_weights: HashMap<String, f64>,
}

impl Default for MatchingSettings {
	fn default() -> Self {
		Self::from(&MatchingConfig::default())
	}
}

impl From<&MatchingConfig> for MatchingSettings {
	fn from(config: &MatchingConfig) -> Self {
		Self {
			confidence_threshold: config.confidence_threshold,
			max_matches_per_intent: config.max_matches_per_intent,
			cache_enabled: config.cache_enabled,
			cache_size: config.cache_size,
			matching_timeout: config.matching_timeout(),
			composite_weights: config.composite_weights.clone(),
		}
	}
}

pub struct MatchingEngine {
	rules: RwLock<Vec<Arc<dyn MatchingRule>>>,
	cache: Option<Mutex<LruCache<String, Vec<MatchResult>>>>,
	settings: MatchingSettings,
}

impl MatchingEngine {
	/// Creates an engine without rules.
	pub fn new(settings: MatchingSettings) -> Result<Self> {
		let cache = if settings.cache_enabled {
			let size = NonZeroUsize::new(settings.cache_size).ok_or_else(|| {
				IntentError::configuration("Matching cache size must be greater than zero")
			})?;
			Some(Mutex::new(LruCache::new(size)))
		} else {
			None
		};

		Ok(Self {
			rules: RwLock::new(Vec::new()),
			cache,
			settings,
		})
	}

	/// Creates an engine with the exact, type, metadata and composite rules.
	pub async fn with_default_rules(settings: MatchingSettings) -> Result<Self> {
		let weights = settings.composite_weights.clone();
		let engine = Self::new(settings)?;

		let exact: Arc<dyn MatchingRule> = Arc::new(ExactMatchRule);
		let type_match: Arc<dyn MatchingRule> = Arc::new(TypeMatchRule::default());
		let metadata: Arc<dyn MatchingRule> = Arc::new(MetadataMatchRule);
		let composite = CompositeMatchRule::new(
			vec![exact.clone(), type_match.clone(), metadata.clone()],
			weights,
		);

		engine.add_rule(exact).await;
		engine.add_rule(type_match).await;
		engine.add_rule(metadata).await;
		engine.add_rule(Arc::new(composite)).await;
		Ok(engine)
	}

	pub fn settings(&self) -> &MatchingSettings {
		&self.settings
	}

	pub async fn add_rule(&self, rule: Arc<dyn MatchingRule>) {
		let mut rules = self.rules.write().await;
		rules.push(rule);
		rules.sort_by(|a, b| b.priority().cmp(&a.priority()));
	}

	pub async fn remove_rule(&self, name: &str) -> bool {
		let mut rules = self.rules.write().await;
		let before = rules.len();
		rules.retain(|r| r.name() != name);
		rules.len() != before
	}

	pub async fn rule_names(&self) -> Vec<String> {
		self.rules
			.read()
			.await
			.iter()
			.map(|r| r.name().to_string())
			.collect()
	}

	pub async fn clear_cache(&self) {
		if let Some(cache) = &self.cache {
			cache.lock().await.clear();
		}
	}

	pub async fn cache_len(&self) -> usize {
		match &self.cache {
			Some(cache) => cache.lock().await.len(),
			None => 0,
		}
	}

	pub async fn invalidate(&self, intent_id: &str) {
		if let Some(cache) = &self.cache {
			cache.lock().await.pop(intent_id);
		}
	}

	/// Finds candidates matching `intent`.
	///
	/// The intent itself, candidates in a terminal status and expired
	/// candidates are never returned. Rule errors and candidate timeouts are
	/// logged and skipped.
	pub async fn find_matches(&self, intent: &Intent, candidates: &[Intent]) -> Result<Vec<MatchResult>> {
		if let Some(cache) = &self.cache {
			if let Some(hit) = cache.lock().await.get(&intent.id) {
				debug!("Matching cache hit for intent {}", intent.id);
				return Ok(hit.clone());
			}
		}

		let rules = self.rules.read().await.clone();
		let now = chrono::Utc::now().timestamp();
		let mut results = Vec::new();

		for candidate in candidates {
			if candidate.id == intent.id || candidate.is_terminal() || candidate.is_expired_at(now) {
				continue;
			}

			match tokio::time::timeout(
				self.settings.matching_timeout,
				self.evaluate_candidate(&rules, intent, candidate),
			)
			.await
			{
				Ok(mut matched) => results.append(&mut matched),
				Err(_) => warn!(
					"Matching intent {} against {} timed out after {:?}",
					intent.id, candidate.id, self.settings.matching_timeout
				),
			}
		}

		results.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
		results.truncate(self.settings.max_matches_per_intent);

		debug!(
			"Found {} matches for intent {} among {} candidates",
			results.len(),
			intent.id,
			candidates.len()
		);

		if let Some(cache) = &self.cache {
			cache.lock().await.put(intent.id.clone(), results.clone());
		}

		Ok(results)
	}

	async fn evaluate_candidate(
		&self,
		rules: &[Arc<dyn MatchingRule>],
		intent: &Intent,
		candidate: &Intent,
	) -> Vec<MatchResult> {
		let mut kept = Vec::new();

		for rule in rules {
			match rule.evaluate(intent, candidate).await {
				Ok(result) if result.is_match && result.confidence >= self.settings.confidence_threshold => {
					kept.push(
						result
							.with_detail(DETAIL_RULE, rule.name())
							.with_detail(DETAIL_MATCHED_INTENT_ID, candidate.id.as_str()),
					);
				}
				Ok(_) => {}
				Err(e) => warn!(
					"Rule '{}' failed for {} against {}: {}",
					rule.name(),
					intent.id,
					candidate.id,
					e
				),
			}
		}

		kept
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use intent_types::IntentStatus;

	fn settings() -> MatchingSettings {
		MatchingSettings::default()
	}

	fn trade(payload: &[u8]) -> Intent {
		Intent::new("trade", "alice", payload.to_vec())
	}

	/// Rule returning a fixed confidence per candidate sender.
	struct FixedRule(HashMap<String, f64>);

	#[async_trait]
	impl MatchingRule for FixedRule {
		fn name(&self) -> &str {
			"fixed"
		}

		fn priority(&self) -> i32 {
			1
		}

		async fn evaluate(&self, _intent: &Intent, candidate: &Intent) -> Result<MatchResult> {
			let confidence = self.0.get(&candidate.sender_id).copied().unwrap_or(0.0);
			Ok(MatchResult::new(confidence > 0.0, confidence))
		}
	}

	struct FailingRule;

	#[async_trait]
	impl MatchingRule for FailingRule {
		fn name(&self) -> &str {
			"failing"
		}

		fn priority(&self) -> i32 {
			1000
		}

		async fn evaluate(&self, _intent: &Intent, _candidate: &Intent) -> Result<MatchResult> {
			Err(IntentError::new(intent_types::ErrorKind::MatchingFailed, "boom"))
		}
	}

	#[tokio::test]
	async fn test_excludes_self_terminal_and_expired() {
		let engine = MatchingEngine::with_default_rules(settings()).await.unwrap();
		let query = trade(b"buy 10 ETH");

		let mut completed = trade(b"buy 10 ETH");
		completed.status = IntentStatus::Completed;
		let mut failed = trade(b"buy 10 ETH");
		failed.status = IntentStatus::Failed;
		let mut expired = trade(b"buy 10 ETH").with_ttl(60);
		expired.timestamp -= 3600;
		let live = trade(b"buy 10 ETH");

		let candidates = vec![query.clone(), completed, failed, expired, live.clone()];
		let results = engine.find_matches(&query, &candidates).await.unwrap();

		assert!(!results.is_empty());
		for result in &results {
			assert_eq!(result.matched_intent_id(), Some(live.id.as_str()));
		}
	}

	#[tokio::test]
	async fn test_identical_intents_match_exactly() {
		let engine = MatchingEngine::with_default_rules(settings()).await.unwrap();
		let query = trade(b"buy 10 ETH");
		let twin = trade(b"buy 10 ETH");

		let results = engine.find_matches(&query, &[twin]).await.unwrap();
		let exact = results
			.iter()
			.find(|r| r.rule() == Some("exact_match"))
			.unwrap();
		assert_eq!(exact.confidence, 1.0);
		assert_eq!(results[0].confidence, 1.0);
	}

	#[tokio::test]
	async fn test_sorted_and_truncated() {
		let mut s = settings();
		s.confidence_threshold = 0.1;
		s.max_matches_per_intent = 3;
		s.cache_enabled = false;
		let engine = MatchingEngine::new(s).unwrap();

		let scores: HashMap<String, f64> = [("a", 0.2), ("b", 0.9), ("c", 0.5), ("d", 0.7), ("e", 0.3)]
			.into_iter()
			.map(|(k, v)| (k.to_string(), v))
			.collect();
		engine.add_rule(Arc::new(FixedRule(scores))).await;

		let query = trade(b"q");
		let candidates: Vec<Intent> = ["a", "b", "c", "d", "e"]
			.iter()
			.map(|s| Intent::new("trade", *s, b"x".to_vec()))
			.collect();

		let results = engine.find_matches(&query, &candidates).await.unwrap();
		let confidences: Vec<f64> = results.iter().map(|r| r.confidence).collect();
		assert_eq!(confidences, vec![0.9, 0.7, 0.5]);
	}

	#[tokio::test]
	async fn test_threshold_filters_results() {
		let mut s = settings();
		s.confidence_threshold = 0.8;
		let engine = MatchingEngine::new(s).unwrap();
		let scores: HashMap<String, f64> = [("a".to_string(), 0.79)].into_iter().collect();
		engine.add_rule(Arc::new(FixedRule(scores))).await;

		let candidate = Intent::new("trade", "a", b"x".to_vec());
		let results = engine.find_matches(&trade(b"q"), &[candidate]).await.unwrap();
		assert!(results.is_empty());
	}

	#[tokio::test]
	async fn test_rule_errors_are_skipped() {
		let engine = MatchingEngine::with_default_rules(settings()).await.unwrap();
		engine.add_rule(Arc::new(FailingRule)).await;
		assert_eq!(engine.rule_names().await[0], "failing");

		let query = trade(b"same");
		let results = engine.find_matches(&query, &[trade(b"same")]).await.unwrap();
		assert!(!results.is_empty());
	}

	#[tokio::test]
	async fn test_cache_returns_stale_results() {
		let engine = MatchingEngine::with_default_rules(settings()).await.unwrap();
		let query = trade(b"same");

		let first = engine.find_matches(&query, &[trade(b"same")]).await.unwrap();
		assert!(!first.is_empty());
		assert_eq!(engine.cache_len().await, 1);

		let second = engine.find_matches(&query, &[]).await.unwrap();
		assert_eq!(first, second);

		engine.invalidate(&query.id).await;
		assert!(engine.find_matches(&query, &[]).await.unwrap().is_empty());

		engine.clear_cache().await;
		assert_eq!(engine.cache_len().await, 0);
	}

	#[tokio::test]
	async fn test_zero_cache_size_is_rejected() {
		let mut s = settings();
		s.cache_size = 0;
		let err = MatchingEngine::new(s).err().unwrap();
		assert_eq!(err.kind, intent_types::ErrorKind::InvalidConfiguration);
	}

	#[tokio::test]
	async fn test_lru_evicts_least_recently_used() {
		let mut s = settings();
		s.cache_size = 2;
		let engine = MatchingEngine::with_default_rules(s).await.unwrap();

		let a = trade(b"a");
		let b = trade(b"b");
		let c = trade(b"c");
		engine.find_matches(&a, &[]).await.unwrap();
		engine.find_matches(&b, &[]).await.unwrap();
		// Touch `a` so `b` becomes the eviction victim.
		engine.find_matches(&a, &[]).await.unwrap();
		engine.find_matches(&c, &[]).await.unwrap();

		let cache = engine.cache.as_ref().unwrap().lock().await;
		assert!(cache.contains(&a.id));
		assert!(!cache.contains(&b.id));
		assert!(cache.contains(&c.id));
	}
}
