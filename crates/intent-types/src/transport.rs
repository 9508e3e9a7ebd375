//! Wire envelope used to move intents between peers.

use crate::serde_helpers::hex_bytes;
use crate::{Intent, IntentError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const INTENT_BROADCAST_MESSAGE: &str = "intent_broadcast";

/// Metadata keys set on every broadcast envelope.
pub const META_INTENT_ID: &str = "intent_id";
pub const META_INTENT_TYPE: &str = "intent_type";
pub const META_BROADCAST_TOPIC: &str = "broadcast_topic";
/// Prefix applied to each intent metadata entry copied into the envelope.
pub const META_INTENT_PREFIX: &str = "intent_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportMessage {
	pub id: String,
	#[serde(rename = "type")]
	pub message_type: String,
	pub topic: String,
	pub sender_id: String,
	/// JSON-serialized intent.
	#[serde(with = "hex_bytes")]
	pub payload: Vec<u8>,
	#[serde(default)]
	pub metadata: HashMap<String, String>,
	pub timestamp: i64,
}

impl TransportMessage {
	pub fn from_intent(intent: &Intent, topic: &str) -> Result<Self> {
		let payload = serde_json::to_vec(intent)?;

		let mut metadata = HashMap::with_capacity(intent.metadata.len() + 3);
		metadata.insert(META_INTENT_ID.to_string(), intent.id.clone());
		metadata.insert(META_INTENT_TYPE.to_string(), intent.intent_type.clone());
		metadata.insert(META_BROADCAST_TOPIC.to_string(), topic.to_string());
		for (key, value) in &intent.metadata {
			metadata.insert(format!("{}{}", META_INTENT_PREFIX, key), value.clone());
		}

		Ok(Self {
			id: uuid::Uuid::new_v4().to_string(),
			message_type: INTENT_BROADCAST_MESSAGE.to_string(),
			topic: topic.to_string(),
			sender_id: intent.sender_id.clone(),
			payload,
			metadata,
			timestamp: chrono::Utc::now().timestamp(),
		})
	}

	/// Decodes the carried intent. Fails for non-broadcast messages.
	pub fn to_intent(&self) -> Result<Intent> {
		if self.message_type != INTENT_BROADCAST_MESSAGE {
			return Err(IntentError::invalid_format(format!(
				"Unexpected message type: {}",
				self.message_type
			)));
		}

		let intent: Intent = serde_json::from_slice(&self.payload)?;
		if intent.id.is_empty() {
			return Err(IntentError::invalid_format("Broadcast intent has no id"));
		}
		Ok(intent)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_envelope_metadata() {
		let intent = Intent::new("trade", "alice", b"buy".to_vec()).with_metadata("pair", "ETH/USDC");
		let message = TransportMessage::from_intent(&intent, "intent-broadcast.trade").unwrap();

		assert_eq!(message.message_type, "intent_broadcast");
		assert_eq!(message.metadata["intent_id"], intent.id);
		assert_eq!(message.metadata["intent_type"], "trade");
		assert_eq!(message.metadata["broadcast_topic"], "intent-broadcast.trade");
		assert_eq!(message.metadata["intent_pair"], "ETH/USDC");
		assert_eq!(message.to_intent().unwrap(), intent);
	}

	#[test]
	fn test_rejects_foreign_message_type() {
		let intent = Intent::new("trade", "alice", b"buy".to_vec());
		let mut message = TransportMessage::from_intent(&intent, "t").unwrap();
		message.message_type = "ping".to_string();
		let err = message.to_intent().unwrap_err();
		assert_eq!(err.kind, crate::ErrorKind::InvalidFormat);
	}
}
