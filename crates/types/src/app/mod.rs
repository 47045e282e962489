// Path: crates/types/src/app/mod.rs
//! Chain-level data structures consumed by the membership and quorum layers.

/// Blocks, transactions and outputs as seen by block processing.
pub mod chain;
/// Final commitments produced by a completed DKG round.
pub mod commitment;
/// Provider transaction payloads: registration, service update, registrar update, revocation.
pub mod provider;

pub use chain::*;
pub use commitment::*;
pub use provider::*;
