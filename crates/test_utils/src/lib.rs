// Path: crates/test_utils/src/lib.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! # Quorum Core Test Utilities
//!
//! Deterministic identifiers and keys, an in-memory chain, a recording peer
//! reporter and assertion macros shared by the integration tests of every
//! crate in the workspace.

pub mod assertions;
pub mod chain;
pub mod clock;
pub mod fixtures;
pub mod network;
pub mod randomness;

pub use chain::{MockChain, MockCoins};
pub use clock::ManualClock;
pub use network::RecordingPeers;
pub use randomness::TestRng;
