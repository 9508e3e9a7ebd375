//! Shared types for the intent broadcast node.
//!
//! This crate holds the data model exchanged between the node's components:
//! the `Intent` record and its status machine, match results, request and
//! response types for the public operations, the error taxonomy, and the
//! collaborator traits the core consumes (validation, signing, transport).

pub mod api;
pub mod errors;
pub mod events;
pub mod intent;
pub mod interfaces;
pub mod matching;
pub mod serde_helpers;
pub mod transport;

pub use api::*;
pub use errors::*;
pub use events::*;
pub use intent::*;
pub use interfaces::*;
pub use matching::*;
pub use transport::*;
