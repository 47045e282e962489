// Path: crates/types/src/lib.rs
#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # Masternode Quorum Types
//!
//! This crate is the foundational library of the workspace, containing the
//! primitive identifiers, provider-transaction payloads, final commitments,
//! configuration objects and error enums shared by every other crate.
//!
//! ## Architectural Role
//!
//! As the base crate, `mnq-types` has minimal dependencies and is itself a
//! dependency for almost every other crate in the workspace. Keeping these
//! definitions in one place prevents circular dependencies between the
//! membership, quorum and signing layers.

/// A top-level, crate-wide `Result` type alias with a default error type.
pub type Result<T, E = crate::error::CoreError> = std::result::Result<T, E>;

/// Block, transaction and quorum-commitment structures consumed from the chain.
pub mod app;
/// The canonical, deterministic binary codec for consensus-critical data.
pub mod codec;
/// Node configuration, consensus parameters and LLMQ presets.
pub mod config;
/// A unified set of all error types used across the workspace.
pub mod error;
/// Key prefixes for everything persisted in the ordered key-value store.
pub mod keys;
/// Fixed-width identifiers: hashes, outpoints, key ids, BLS key and signature bytes.
pub mod primitives;

pub use primitives::*;
