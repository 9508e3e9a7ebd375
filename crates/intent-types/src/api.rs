//! Request and response types for the public intent operations.
//!
//! Every operation returns a typed `Result`; adapters that need a response
//! object on failure build one with the `failure` constructors, which carry
//! `success: false` and the error's message.

use crate::{Intent, IntentError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default page size for queries.
pub const DEFAULT_QUERY_LIMIT: usize = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateIntentRequest {
	#[serde(rename = "type")]
	pub intent_type: String,
	pub payload: Vec<u8>,
	pub sender_id: String,
	#[serde(default)]
	pub metadata: HashMap<String, String>,
	/// Seconds; zero applies the default TTL.
	#[serde(default)]
	pub ttl: u64,
	/// Zero applies normal priority.
	#[serde(default)]
	pub priority: i32,
}

impl CreateIntentRequest {
	pub fn new(intent_type: impl Into<String>, payload: impl Into<Vec<u8>>, sender_id: impl Into<String>) -> Self {
		Self {
			intent_type: intent_type.into(),
			payload: payload.into(),
			sender_id: sender_id.into(),
			..Default::default()
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIntentResponse {
	pub intent: Option<Intent>,
	pub success: bool,
	pub message: String,
}

impl CreateIntentResponse {
	pub fn failure(err: &IntentError) -> Self {
		Self {
			intent: None,
			success: false,
			message: err.to_string(),
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BroadcastIntentRequest {
	pub intent_id: String,
	/// Resolved from the intent type when absent.
	#[serde(default)]
	pub topic: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastIntentResponse {
	pub success: bool,
	pub intent_id: String,
	pub topic: String,
	pub message: String,
}

impl BroadcastIntentResponse {
	pub fn failure(intent_id: &str, err: &IntentError) -> Self {
		Self {
			success: false,
			intent_id: intent_id.to_string(),
			topic: String::new(),
			message: err.to_string(),
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryIntentsRequest {
	#[serde(default, rename = "type")]
	pub intent_type: Option<String>,
	/// Inclusive lower bound on `timestamp`, unix seconds.
	#[serde(default)]
	pub start_time: Option<i64>,
	/// Inclusive upper bound on `timestamp`, unix seconds.
	#[serde(default)]
	pub end_time: Option<i64>,
	/// Zero applies [`DEFAULT_QUERY_LIMIT`].
	#[serde(default)]
	pub limit: usize,
	#[serde(default)]
	pub offset: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryIntentsResponse {
	pub intents: Vec<Intent>,
	/// Number of intents matching the filter before pagination.
	pub total: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscribeIntentsRequest {
	/// Intent types to receive. Empty accepts every type.
	#[serde(default)]
	pub types: Vec<String>,
	/// Topics to receive. Empty accepts every topic.
	#[serde(default)]
	pub topics: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelIntentResponse {
	pub success: bool,
	pub intent_id: String,
	pub message: String,
}

impl CancelIntentResponse {
	pub fn failure(intent_id: &str, err: &IntentError) -> Self {
		Self {
			success: false,
			intent_id: intent_id.to_string(),
			message: err.to_string(),
		}
	}
}
