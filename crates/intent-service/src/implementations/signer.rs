use async_trait::async_trait;
use intent_types::{ErrorKind, Intent, IntentError, IntentSigner, Result};
use sha3::{Digest, Keccak256};

pub const SIGNATURE_ALGORITHM: &str = "keccak256-keyed";

/// Keyed Keccak-256 digest over the intent's identifying fields.
///
/// Verification recomputes the digest with the shared network key, so every
/// node in a network must be configured with the same key.
pub struct Sha3Signer {
	key: Vec<u8>,
}

impl Sha3Signer {
	pub fn new(key: impl Into<Vec<u8>>) -> Self {
		Self { key: key.into() }
	}

	fn digest(key: &[u8], intent: &Intent) -> String {
		let mut hasher = Keccak256::new();
		hasher.update(key);
		hasher.update(intent.id.as_bytes());
		hasher.update(intent.intent_type.as_bytes());
		hasher.update(intent.sender_id.as_bytes());
		hasher.update(&intent.payload);
		hasher.update(intent.timestamp.to_be_bytes());
		hasher.update(intent.ttl.to_be_bytes());
		hex::encode(hasher.finalize())
	}
}

#[async_trait]
impl IntentSigner for Sha3Signer {
	async fn sign_intent(&self, intent: &mut Intent, private_key: &[u8]) -> Result<()> {
		if private_key.is_empty() {
			return Err(IntentError::new(
				ErrorKind::SignatureFailed,
				"Signing key is empty",
			));
		}
		intent.signature = Some(Self::digest(private_key, intent));
		intent.signature_algorithm = Some(SIGNATURE_ALGORITHM.to_string());
		Ok(())
	}

	async fn verify_signature(&self, intent: &Intent) -> Result<()> {
		let signature = intent.signature.as_deref().ok_or_else(|| {
			IntentError::new(ErrorKind::SignatureFailed, "Intent is not signed")
		})?;

		match intent.signature_algorithm.as_deref() {
			Some(SIGNATURE_ALGORITHM) => {}
			other => {
				return Err(IntentError::new(
					ErrorKind::SignatureFailed,
					format!("Unsupported signature algorithm: {:?}", other),
				))
			}
		}

		if Self::digest(&self.key, intent) != signature.trim_start_matches("0x").to_lowercase() {
			return Err(IntentError::new(
				ErrorKind::SignatureFailed,
				format!("Signature mismatch for intent {}", intent.id),
			));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_sign_and_verify() {
		let key = b"network-key".to_vec();
		let signer = Sha3Signer::new(key.clone());
		let mut intent = Intent::new("trade", "alice", b"buy".to_vec()).with_ttl(60);

		signer.sign_intent(&mut intent, &key).await.unwrap();
		assert_eq!(intent.signature_algorithm.as_deref(), Some(SIGNATURE_ALGORITHM));
		assert_eq!(intent.signature.as_ref().unwrap().len(), 64);
		assert!(signer.verify_signature(&intent).await.is_ok());

		// Metadata is not covered by the signature.
		intent.metadata.insert("note".into(), "x".into());
		assert!(signer.verify_signature(&intent).await.is_ok());

		intent.payload = b"sell".to_vec();
		let err = signer.verify_signature(&intent).await.unwrap_err();
		assert_eq!(err.kind, ErrorKind::SignatureFailed);
	}

	#[tokio::test]
	async fn test_rejects_foreign_key_and_unsigned() {
		let signer = Sha3Signer::new(b"ours".to_vec());
		let mut intent = Intent::new("trade", "alice", b"buy".to_vec());
		assert!(signer.verify_signature(&intent).await.is_err());

		signer.sign_intent(&mut intent, b"theirs").await.unwrap();
		assert!(signer.verify_signature(&intent).await.is_err());

		assert!(signer.sign_intent(&mut intent, &[]).await.is_err());
	}
}
