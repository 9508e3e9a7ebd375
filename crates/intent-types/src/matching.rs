//! Match results produced by the matching engine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Detail key naming the rule that produced a result.
pub const DETAIL_RULE: &str = "rule";
/// Detail key naming the candidate a result refers to.
pub const DETAIL_MATCHED_INTENT_ID: &str = "matched_intent_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
	Exact,
	Semantic,
	Pattern,
	Partial,
}

impl MatchType {
	/// Classifies a confidence score: >= 0.9 exact, >= 0.7 semantic,
	/// >= 0.5 pattern, otherwise partial.
	pub fn from_confidence(confidence: f64) -> Self {
		if confidence >= 0.9 {
			Self::Exact
		} else if confidence >= 0.7 {
			Self::Semantic
		} else if confidence >= 0.5 {
			Self::Pattern
		} else {
			Self::Partial
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
	pub is_match: bool,
	/// Match strength in `[0, 1]`.
	pub confidence: f64,
	pub match_type: MatchType,
	#[serde(default)]
	pub details: HashMap<String, serde_json::Value>,
}

impl MatchResult {
	pub fn new(is_match: bool, confidence: f64) -> Self {
		let confidence = confidence.clamp(0.0, 1.0);
		Self {
			is_match,
			confidence,
			match_type: MatchType::from_confidence(confidence),
			details: HashMap::new(),
		}
	}

	pub fn no_match() -> Self {
		Self::new(false, 0.0)
	}

	pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		self.details.insert(key.into(), value.into());
		self
	}

	pub fn rule(&self) -> Option<&str> {
		self.details.get(DETAIL_RULE).and_then(|v| v.as_str())
	}

	pub fn matched_intent_id(&self) -> Option<&str> {
		self.details
			.get(DETAIL_MATCHED_INTENT_ID)
			.and_then(|v| v.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_match_type_thresholds() {
		assert_eq!(MatchType::from_confidence(1.0), MatchType::Exact);
		assert_eq!(MatchType::from_confidence(0.9), MatchType::Exact);
		assert_eq!(MatchType::from_confidence(0.89), MatchType::Semantic);
		assert_eq!(MatchType::from_confidence(0.7), MatchType::Semantic);
		assert_eq!(MatchType::from_confidence(0.5), MatchType::Pattern);
		assert_eq!(MatchType::from_confidence(0.49), MatchType::Partial);
	}

	#[test]
	fn test_confidence_is_clamped() {
		assert_eq!(MatchResult::new(true, 1.5).confidence, 1.0);
		assert_eq!(MatchResult::new(false, -0.2).confidence, 0.0);
	}
}
