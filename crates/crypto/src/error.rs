// Path: crates/crypto/src/error.rs
//! Local error types for the `mnq-crypto` crate.

// Re-export the canonical error type from the API crate.
pub use mnq_api::error::CryptoError;
