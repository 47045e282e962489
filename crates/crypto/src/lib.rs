// Path: crates/crypto/src/lib.rs
//! # Masternode Quorum Crypto Crate Lints
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
        clippy::indexing_slicing
    )
)]
//! # Masternode Quorum Cryptography
//!
//! SHA-256 based object hashing and BLS12-381 operator/quorum signatures,
//! including the insecure (non rogue-key-safe) aggregation used to verify
//! many messages from distinct signers in one pairing check.

pub mod algorithms;
pub mod error;
pub mod sign;
