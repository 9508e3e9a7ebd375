//! Events published on the node's event bus.

use crate::IntentStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IntentEvent {
	Created { intent_id: String },
	Broadcasted { intent_id: String, topic: String },
	Received { intent_id: String, sender_id: String },
	Processed { intent_id: String },
	Matched { intent_id: String, matches: Vec<String> },
	Cancelled { intent_id: String },
	Failed { intent_id: String, reason: String },
	Lifecycle(LifecycleEvent),
}

/// Events emitted by the lifecycle tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LifecycleEvent {
	StatusChanged {
		intent_id: String,
		old: IntentStatus,
		new: IntentStatus,
	},
	/// The intent's deadline passed or it outlived the maximum tracked age.
	Expired { intent_id: String },
}

impl IntentEvent {
	pub fn intent_id(&self) -> &str {
		match self {
			Self::Created { intent_id }
			| Self::Broadcasted { intent_id, .. }
			| Self::Received { intent_id, .. }
			| Self::Processed { intent_id }
			| Self::Matched { intent_id, .. }
			| Self::Cancelled { intent_id }
			| Self::Failed { intent_id, .. } => intent_id,
			Self::Lifecycle(LifecycleEvent::StatusChanged { intent_id, .. })
			| Self::Lifecycle(LifecycleEvent::Expired { intent_id }) => intent_id,
		}
	}
}
