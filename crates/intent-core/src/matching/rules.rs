//! Built-in matching rules.

use super::MatchingRule;
use async_trait::async_trait;
use intent_types::{Intent, MatchResult, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::warn;

/// Confidence 1.0 when type and payload are byte-identical.
pub struct ExactMatchRule;

#[async_trait]
impl MatchingRule for ExactMatchRule {
	fn name(&self) -> &str {
		"exact_match"
	}

	fn priority(&self) -> i32 {
		100
	}

	async fn evaluate(&self, intent: &Intent, candidate: &Intent) -> Result<MatchResult> {
		if intent.intent_type == candidate.intent_type && intent.payload == candidate.payload {
			Ok(MatchResult::new(true, 1.0))
		} else {
			Ok(MatchResult::no_match())
		}
	}
}

/// Scores type compatibility: identical 1.0, compatible 0.8, related 0.6.
///
/// Pair tables are consulted in both directions, so the score does not
/// depend on which intent is the query.
pub struct TypeMatchRule {
	compatible: HashMap<String, Vec<String>>,
	related: HashMap<String, Vec<String>>,
}

fn pair_table(entries: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
	entries
		.iter()
		.map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
		.collect()
}

impl Default for TypeMatchRule {
	fn default() -> Self {
		Self {
			compatible: pair_table(&[
				("trade", &["swap", "exchange"][..]),
				("swap", &["trade", "exchange"][..]),
				("transfer", &["send", "payment"][..]),
				("lending", &["borrow", "loan"][..]),
			]),
			related: pair_table(&[
				("trade", &["lending", "transfer"][..]),
				("transfer", &["trade", "payment"][..]),
				("lending", &["trade", "investment"][..]),
			]),
		}
	}
}

impl TypeMatchRule {
	pub fn new(compatible: HashMap<String, Vec<String>>, related: HashMap<String, Vec<String>>) -> Self {
		Self { compatible, related }
	}

	fn declared(table: &HashMap<String, Vec<String>>, a: &str, b: &str) -> bool {
		let contains = |from: &str, to: &str| table.get(from).is_some_and(|list| list.iter().any(|t| t == to));
		contains(a, b) || contains(b, a)
	}
}

#[async_trait]
impl MatchingRule for TypeMatchRule {
	fn name(&self) -> &str {
		"type_match"
	}

	fn priority(&self) -> i32 {
		90
	}

	async fn evaluate(&self, intent: &Intent, candidate: &Intent) -> Result<MatchResult> {
		let a = intent.intent_type.to_lowercase();
		let b = candidate.intent_type.to_lowercase();

		let (confidence, relationship) = if a == b {
			(1.0, "identical")
		} else if Self::declared(&self.compatible, &a, &b) {
			(0.8, "compatible")
		} else if Self::declared(&self.related, &a, &b) {
			(0.6, "related")
		} else {
			return Ok(MatchResult::no_match());
		};

		Ok(MatchResult::new(true, confidence).with_detail("relationship", relationship))
	}
}

/// Scores metadata overlap: entries present in both intents with equal
/// values, divided by the union of keys. Similarity of at least 0.8, 0.6
/// and 0.4 maps to confidence 0.9, 0.7 and 0.5.
pub struct MetadataMatchRule;

impl MetadataMatchRule {
	pub fn similarity(a: &HashMap<String, String>, b: &HashMap<String, String>) -> f64 {
		let union: HashSet<&String> = a.keys().chain(b.keys()).collect();
		if union.is_empty() {
			return 0.0;
		}
		let shared = a
			.iter()
			.filter(|(k, v)| b.get(*k).is_some_and(|other| other == *v))
			.count();
		shared as f64 / union.len() as f64
	}
}

#[async_trait]
impl MatchingRule for MetadataMatchRule {
	fn name(&self) -> &str {
		"metadata_match"
	}

	fn priority(&self) -> i32 {
		80
	}

	async fn evaluate(&self, intent: &Intent, candidate: &Intent) -> Result<MatchResult> {
		if intent.metadata.is_empty() || candidate.metadata.is_empty() {
			return Ok(MatchResult::no_match());
		}

		let similarity = Self::similarity(&intent.metadata, &candidate.metadata);
		let confidence = if similarity >= 0.8 {
			0.9
		} else if similarity >= 0.6 {
			0.7
		} else if similarity >= 0.4 {
			0.5
		} else {
			return Ok(MatchResult::new(false, 0.0).with_detail("similarity", similarity));
		};

		Ok(MatchResult::new(true, confidence).with_detail("similarity", similarity))
	}
}

/// Weighted average of other rules' confidences.
///
/// Rules without a configured weight get an equal share `1 / n`. A match is
/// reported when the combined confidence exceeds 0.5.
pub struct CompositeMatchRule {
	rules: Vec<Arc<dyn MatchingRule>>,
	weights: HashMap<String, f64>,
}

impl CompositeMatchRule {
	pub fn new(rules: Vec<Arc<dyn MatchingRule>>, weights: HashMap<String, f64>) -> Self {
		Self { rules, weights }
	}
}

#[async_trait]
impl MatchingRule for CompositeMatchRule {
	fn name(&self) -> &str {
		"composite_match"
	}

	fn priority(&self) -> i32 {
		70
	}

	async fn evaluate(&self, intent: &Intent, candidate: &Intent) -> Result<MatchResult> {
		if self.rules.is_empty() {
			return Ok(MatchResult::no_match());
		}

		let equal_share = 1.0 / self.rules.len() as f64;
		let mut total_score = 0.0;
		let mut total_weight = 0.0;
		let mut scores = serde_json::Map::new();

		for rule in &self.rules {
			let result = match rule.evaluate(intent, candidate).await {
				Ok(result) => result,
				Err(e) => {
					warn!("Composite constituent '{}' failed: {}", rule.name(), e);
					continue;
				}
			};
			let weight = self.weights.get(rule.name()).copied().unwrap_or(equal_share);
			total_score += result.confidence * weight;
			total_weight += weight;
			scores.insert(rule.name().to_string(), result.confidence.into());
		}

		if total_weight <= 0.0 {
			return Ok(MatchResult::no_match());
		}

		let confidence = total_score / total_weight;
		Ok(MatchResult::new(confidence > 0.5, confidence).with_detail("scores", scores))
	}
}

/// Pluggable content-similarity scorer, for example an embedding model.
#[async_trait]
pub trait ContentSimilarity: Send + Sync {
	/// Similarity of two payloads in `[0, 1]`.
	async fn similarity(&self, a: &[u8], b: &[u8]) -> Result<f64>;
}

/// Adapts a [`ContentSimilarity`] scorer into a matching rule. Not part of
/// the default rule set.
pub struct ContentMatchRule {
	scorer: Arc<dyn ContentSimilarity>,
	min_similarity: f64,
}

impl ContentMatchRule {
	pub fn new(scorer: Arc<dyn ContentSimilarity>, min_similarity: f64) -> Self {
		Self {
			scorer,
			min_similarity,
		}
	}
}

#[async_trait]
impl MatchingRule for ContentMatchRule {
	fn name(&self) -> &str {
		"content_match"
	}

	fn priority(&self) -> i32 {
		60
	}

	async fn evaluate(&self, intent: &Intent, candidate: &Intent) -> Result<MatchResult> {
		let similarity = self.scorer.similarity(&intent.payload, &candidate.payload).await?;
		Ok(MatchResult::new(similarity >= self.min_similarity, similarity))
	}
}
