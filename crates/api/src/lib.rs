// Path: crates/api/src/lib.rs

//! # Masternode Quorum API Crate Lints
//!
//! This crate enforces a strict set of lints to ensure high-quality,
//! panic-free, and well-documented code. Panics are disallowed in non-test
//! code to promote robust error handling.
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::todo,
        clippy::unimplemented,
        clippy::indexing_slicing
    )
)]
//! # Masternode Quorum API
//!
//! The stable contracts between the quorum core and the node around it: the
//! chain index and coin view, the peer-management and relay hooks, and the
//! abstract ordered key-value store that every persistent index maps onto.

/// Read-only views of the block index and the UTXO set.
pub mod chain;
/// Hash-signing and compressed wire-form traits for BLS keys.
pub mod crypto;
/// Re-exports all core error types from the central `mnq-types` crate.
pub mod error;
/// Peer identities, misbehavior reporting and inventory relay.
pub mod network;
/// The ordered key-value store contract and batched writes.
pub mod storage;
/// Wall-clock access.
pub mod time;
