//! Error taxonomy shared by every intent component.

use std::fmt;
use thiserror::Error;

/// Classification of an [`IntentError`].
///
/// Each kind maps to a stable machine-readable code so API adapters can
/// surface failures without matching on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	IntentNotFound,
	InvalidFormat,
	ValidationFailed,
	SignatureFailed,
	ProcessingFailed,
	HandlerNotFound,
	IntentExpired,
	AlreadyProcessed,
	NetworkUnavailable,
	BroadcastFailed,
	InvalidConfiguration,
	MatchingFailed,
	ProcessingTimeout,
	Cancelled,
}

impl ErrorKind {
	pub fn code(&self) -> &'static str {
		match self {
			Self::IntentNotFound => "INTENT_NOT_FOUND",
			Self::InvalidFormat => "INVALID_FORMAT",
			Self::ValidationFailed => "VALIDATION_FAILED",
			Self::SignatureFailed => "SIGNATURE_FAILED",
			Self::ProcessingFailed => "PROCESSING_FAILED",
			Self::HandlerNotFound => "HANDLER_NOT_FOUND",
			Self::IntentExpired => "INTENT_EXPIRED",
			Self::AlreadyProcessed => "ALREADY_PROCESSED",
			Self::NetworkUnavailable => "NETWORK_UNAVAILABLE",
			Self::BroadcastFailed => "BROADCAST_FAILED",
			Self::InvalidConfiguration => "INVALID_CONFIGURATION",
			Self::MatchingFailed => "MATCHING_FAILED",
			Self::ProcessingTimeout => "PROCESSING_TIMEOUT",
			Self::Cancelled => "CANCELLED",
		}
	}
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.code())
	}
}

/// Error returned by intent operations.
///
/// Wrapping another error keeps its rendered text in `details` instead of
/// discarding it.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}: {message}{}", details_suffix(.details))]
pub struct IntentError {
	pub kind: ErrorKind,
	pub message: String,
	pub details: Option<String>,
}

fn details_suffix(details: &Option<String>) -> String {
	match details {
		Some(d) => format!(" ({})", d),
		None => String::new(),
	}
}

pub type Result<T> = std::result::Result<T, IntentError>;

impl IntentError {
	pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
		Self {
			kind,
			message: message.into(),
			details: None,
		}
	}

	/// Wraps `cause` under a new kind and message, keeping the cause text.
	pub fn wrap(kind: ErrorKind, message: impl Into<String>, cause: impl fmt::Display) -> Self {
		Self {
			kind,
			message: message.into(),
			details: Some(cause.to_string()),
		}
	}

	pub fn with_details(mut self, details: impl Into<String>) -> Self {
		self.details = Some(details.into());
		self
	}

	pub fn code(&self) -> &'static str {
		self.kind.code()
	}

	pub fn is(&self, kind: ErrorKind) -> bool {
		self.kind == kind
	}

	pub fn not_found(intent_id: &str) -> Self {
		Self::new(
			ErrorKind::IntentNotFound,
			format!("Intent not found: {}", intent_id),
		)
	}

	pub fn invalid_format(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::InvalidFormat, message)
	}

	pub fn validation(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::ValidationFailed, message)
	}

	pub fn processing(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::ProcessingFailed, message)
	}

	pub fn configuration(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::InvalidConfiguration, message)
	}

	pub fn expired(intent_id: &str) -> Self {
		Self::new(
			ErrorKind::IntentExpired,
			format!("Intent has expired: {}", intent_id),
		)
	}

	pub fn cancelled(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::Cancelled, message)
	}

	pub fn timeout(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::ProcessingTimeout, message)
	}
}

impl From<serde_json::Error> for IntentError {
	fn from(err: serde_json::Error) -> Self {
		Self::wrap(ErrorKind::InvalidFormat, "Serialization error", err)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_wrap_preserves_cause_text() {
		let cause = IntentError::validation("payload is empty");
		let err = IntentError::wrap(ErrorKind::ProcessingFailed, "stage failed", &cause);

		assert_eq!(err.code(), "PROCESSING_FAILED");
		assert_eq!(
			err.details.as_deref(),
			Some("VALIDATION_FAILED: payload is empty")
		);
		assert_eq!(
			err.to_string(),
			"PROCESSING_FAILED: stage failed (VALIDATION_FAILED: payload is empty)"
		);
	}

	#[test]
	fn test_not_found_display() {
		let err = IntentError::not_found("abc");
		assert!(err.is(ErrorKind::IntentNotFound));
		assert_eq!(err.to_string(), "INTENT_NOT_FOUND: Intent not found: abc");
	}
}
