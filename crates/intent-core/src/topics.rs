// intent-core/src/topics.rs

pub const TOPIC_PREFIX: &str = "intent-broadcast";
pub const GENERAL_TOPIC: &str = "intent-broadcast.general";

const TOPIC_TABLE: &[(&str, &str)] = &[
	("trade", "intent-broadcast.trade"),
	("swap", "intent-broadcast.swap"),
	("exchange", "intent-broadcast.exchange"),
	("transfer", "intent-broadcast.transfer"),
	("send", "intent-broadcast.send"),
	("payment", "intent-broadcast.payment"),
	("lending", "intent-broadcast.lending"),
	("borrow", "intent-broadcast.borrow"),
	("loan", "intent-broadcast.loan"),
	("investment", "intent-broadcast.investment"),
	("staking", "intent-broadcast.staking"),
	("yield", "intent-broadcast.yield"),
];

/// Maps an intent type to its broadcast topic, falling back to the general
/// topic for unknown types.
pub fn resolve_topic(intent_type: &str) -> String {
	let normalized = intent_type.trim().to_lowercase();
	TOPIC_TABLE
		.iter()
		.find(|(t, _)| *t == normalized)
		.map(|(_, topic)| topic.to_string())
		.unwrap_or_else(|| GENERAL_TOPIC.to_string())
}
