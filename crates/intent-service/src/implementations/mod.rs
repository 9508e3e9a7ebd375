//! Default collaborator implementations for the intent node.

/// Logging intent handler.
pub mod handler;
/// Store size and capacity health check.
pub mod health;
/// Keyed SHA3 intent signatures.
pub mod signer;
/// In-process publish/subscribe transport.
pub mod transport;
/// Format and business-rule checks driven by configuration.
pub mod validator;

pub use handler::LoggingHandler;
pub use health::StoreHealthCheck;
pub use signer::Sha3Signer;
pub use transport::LoopbackTransport;
pub use validator::BasicIntentValidator;
