//! Service wiring for the intent node.
//!
//! This crate assembles the intent core with the node's default
//! collaborators and runs it as a standalone process.
//!
//! # Components
//!
//! - `implementations`: validator, signer, loopback transport and health
//!   checks used when no external collaborator is supplied
//! - `service`: node lifecycle, signal handling and the demo scenario

pub mod implementations;
pub mod service;
