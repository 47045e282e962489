// Path: crates/membership/src/lib.rs
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
//! The deterministic masternode list.
//!
//! A [`MembershipLedger`] is the full set of registered masternodes as of one
//! block. The [`MembershipManager`] derives each block's ledger from its
//! parent's by applying the provider transactions, collateral spends, quorum
//! commitments and PoSe bookkeeping of the block, and persists the result.

pub mod diff;
pub mod ledger;
pub mod listener;
pub mod manager;
pub mod penalty;
pub mod processor;
pub mod record;
pub mod state;
pub mod unique;

pub use diff::{AuxAddressDiff, LedgerDiff};
pub use ledger::MembershipLedger;
pub use listener::MembershipListener;
pub use manager::MembershipManager;
pub use processor::{build_new_list_from_block, BlockContext, QuorumMembers};
pub use record::MasternodeRecord;
pub use state::{MasternodeState, StateDelta, StateFields};
