//! The intent record and its status machine.

use crate::serde_helpers::hex_bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Priority levels. Stored priorities are always within `[LOW, URGENT]`.
pub mod priority {
	pub const LOW: i32 = 1;
	pub const NORMAL: i32 = 5;
	pub const HIGH: i32 = 10;
	pub const URGENT: i32 = 20;

	/// Clamps a requested priority into range; zero selects `NORMAL`.
	pub fn normalize(requested: i32) -> i32 {
		if requested == 0 {
			NORMAL
		} else {
			requested.clamp(LOW, URGENT)
		}
	}

	pub fn is_valid(value: i32) -> bool {
		(LOW..=URGENT).contains(&value)
	}
}

/// Default time-to-live applied when a request leaves `ttl` at zero.
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Upper bound on a requested time-to-live.
pub const MAX_TTL_SECS: u64 = 24 * 3600;

/// Upper bound on payload size.
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Intent types accepted by default.
pub const DEFAULT_INTENT_TYPES: &[&str] = &[
	"trade",
	"swap",
	"exchange",
	"transfer",
	"send",
	"payment",
	"lending",
	"borrow",
	"loan",
	"investment",
	"staking",
	"yield",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
	Created,
	Validated,
	Broadcasted,
	Received,
	Processed,
	Matched,
	Completed,
	Failed,
	Expired,
}

impl IntentStatus {
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Completed | Self::Failed | Self::Expired)
	}

	/// Returns whether moving from `self` to `next` is an allowed transition.
	///
	/// Re-applying the current status is not a transition and returns false;
	/// callers treat it as a no-op.
	pub fn can_transition_to(&self, next: IntentStatus) -> bool {
		use IntentStatus::*;

		if self.is_terminal() || *self == next {
			return false;
		}

		match (self, next) {
			(_, Failed) | (_, Expired) => true,
			(Created, Validated | Broadcasted | Processed) => true,
			(Validated, Broadcasted | Processed | Matched) => true,
			(Broadcasted, Received | Processed | Matched) => true,
			(Received, Processed) => true,
			(Processed, Matched | Completed) => true,
			(Matched, Completed) => true,
			_ => false,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Created => "created",
			Self::Validated => "validated",
			Self::Broadcasted => "broadcasted",
			Self::Received => "received",
			Self::Processed => "processed",
			Self::Matched => "matched",
			Self::Completed => "completed",
			Self::Failed => "failed",
			Self::Expired => "expired",
		}
	}
}

impl fmt::Display for IntentStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A typed unit of work broadcast by a peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
	pub id: String,
	#[serde(rename = "type")]
	pub intent_type: String,
	pub sender_id: String,
	/// Opaque payload, hex encoded on the wire.
	#[serde(with = "hex_bytes")]
	pub payload: Vec<u8>,
	#[serde(default)]
	pub metadata: HashMap<String, String>,
	/// Creation time, unix seconds.
	pub timestamp: i64,
	/// Time-to-live in seconds. Zero never expires.
	pub ttl: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub processed_at: Option<i64>,
	/// Hex encoded signature. `None` means unsigned.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub signature: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub signature_algorithm: Option<String>,
	pub status: IntentStatus,
	pub priority: i32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	#[serde(default)]
	pub matched_intents: Vec<String>,
}

impl Intent {
	/// Creates a fresh intent with a generated id, the current timestamp,
	/// `Created` status and normal priority.
	pub fn new(intent_type: impl Into<String>, sender_id: impl Into<String>, payload: Vec<u8>) -> Self {
		Self {
			id: generate_intent_id(),
			intent_type: intent_type.into(),
			sender_id: sender_id.into(),
			payload,
			metadata: HashMap::new(),
			timestamp: chrono::Utc::now().timestamp(),
			ttl: 0,
			processed_at: None,
			signature: None,
			signature_algorithm: None,
			status: IntentStatus::Created,
			priority: priority::NORMAL,
			error: None,
			matched_intents: Vec::new(),
		}
	}

	pub fn with_ttl(mut self, ttl: u64) -> Self {
		self.ttl = ttl;
		self
	}

	pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.metadata.insert(key.into(), value.into());
		self
	}

	pub fn is_signed(&self) -> bool {
		self.signature.is_some()
	}

	/// Unix second at which the intent expires, or `None` when it never does.
	pub fn expires_at(&self) -> Option<i64> {
		if self.ttl == 0 {
			None
		} else {
			Some(
				self.timestamp
					.saturating_add(i64::try_from(self.ttl).unwrap_or(i64::MAX)),
			)
		}
	}

	pub fn is_expired_at(&self, now: i64) -> bool {
		match self.expires_at() {
			Some(deadline) => now > deadline,
			None => false,
		}
	}

	pub fn is_expired(&self) -> bool {
		self.is_expired_at(chrono::Utc::now().timestamp())
	}

	pub fn is_terminal(&self) -> bool {
		self.status.is_terminal()
	}

	/// Adds a matched intent id, ignoring duplicates.
	pub fn add_match(&mut self, intent_id: &str) {
		if !self.matched_intents.iter().any(|id| id == intent_id) {
			self.matched_intents.push(intent_id.to_string());
		}
	}
}

pub fn generate_intent_id() -> String {
	format!("intent_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_expiry_respects_ttl() {
		let now = chrono::Utc::now().timestamp();

		let mut stale = Intent::new("trade", "alice", b"x".to_vec()).with_ttl(3600);
		stale.timestamp = now - 7200;
		assert!(stale.is_expired());

		let mut forever = Intent::new("trade", "alice", b"x".to_vec());
		forever.timestamp = now - 10 * 365 * 24 * 3600;
		assert!(!forever.is_expired());
		assert_eq!(forever.expires_at(), None);
	}

	#[test]
	fn test_expiry_boundary() {
		let mut intent = Intent::new("trade", "alice", b"x".to_vec()).with_ttl(10);
		intent.timestamp = 1_000;
		assert!(!intent.is_expired_at(1_010));
		assert!(intent.is_expired_at(1_011));
	}

	#[test]
	fn test_oversized_ttl_saturates() {
		let mut intent = Intent::new("trade", "alice", b"x".to_vec()).with_ttl(u64::MAX);
		intent.timestamp = 1_000;
		assert_eq!(intent.expires_at(), Some(i64::MAX));
		assert!(!intent.is_expired());
	}

	#[test]
	fn test_priority_normalize() {
		assert_eq!(priority::normalize(0), priority::NORMAL);
		assert_eq!(priority::normalize(-3), priority::LOW);
		assert_eq!(priority::normalize(99), priority::URGENT);
		assert_eq!(priority::normalize(priority::HIGH), priority::HIGH);
	}

	#[test]
	fn test_status_transitions() {
		use IntentStatus::*;

		assert!(Created.can_transition_to(Validated));
		assert!(Validated.can_transition_to(Broadcasted));
		assert!(Broadcasted.can_transition_to(Received));
		assert!(Received.can_transition_to(Processed));
		assert!(Processed.can_transition_to(Matched));
		assert!(Matched.can_transition_to(Completed));
		assert!(Received.can_transition_to(Expired));
		assert!(Validated.can_transition_to(Failed));

		assert!(!Completed.can_transition_to(Failed));
		assert!(!Expired.can_transition_to(Processed));
		assert!(!Processed.can_transition_to(Validated));
		assert!(!Processed.can_transition_to(Processed));
	}

	#[test]
	fn test_ids_are_unique() {
		let a = Intent::new("trade", "alice", vec![1]);
		let b = Intent::new("trade", "alice", vec![1]);
		assert_ne!(a.id, b.id);
		assert!(a.id.starts_with("intent_"));
	}

	#[test]
	fn test_json_uses_type_field_and_hex_payload() {
		let intent = Intent::new("swap", "bob", b"hi".to_vec());
		let value = serde_json::to_value(&intent).unwrap();
		assert_eq!(value["type"], "swap");
		assert_eq!(value["payload"], "6869");
		assert_eq!(value["status"], "created");

		let back: Intent = serde_json::from_value(value).unwrap();
		assert_eq!(back, intent);
	}
}
