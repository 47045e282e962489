// Path: crates/llmq/src/signing/mod.rs
//! Recovered threshold signatures: persistence, batch acceptance and local signing.

pub mod manager;
pub mod recsig;
pub mod store;
pub mod worker;

pub use manager::{RecoveredSigListener, SigShareSigner, SigningManager};
pub use recsig::{build_sign_hash, RecoveredSignature};
pub use store::RecoveredSigStore;
pub use worker::spawn_signing_worker;
