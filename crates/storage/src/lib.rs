// Path: crates/storage/src/lib.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! Implementations of the ordered `KvStore` contract.
//!
//! `MemoryKvStore` backs tests and nodes running without a data directory.
//! `RedbKvStore` persists everything in a single redb table whose keys are the
//! prefix-encoded composite keys built by the callers.

pub mod memory;
pub mod metrics;
pub mod redb_store;

pub use memory::MemoryKvStore;
pub use redb_store::RedbKvStore;
