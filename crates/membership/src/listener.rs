// Path: crates/membership/src/listener.rs

use crate::diff::{AuxAddressDiff, LedgerDiff};
use crate::ledger::MembershipLedger;

/// Receives ledger transitions from the [`crate::manager::MembershipManager`].
///
/// Callbacks run synchronously on the thread that connected or disconnected
/// the block. Implementations must return quickly and must not call back into
/// the manager's mutating methods.
pub trait MembershipListener: Send + Sync {
    /// `ledger` is the ledger after the transition. On undo it is the parent's ledger.
    fn on_membership_changed(
        &self,
        is_undo: bool,
        ledger: &MembershipLedger,
        diff: &LedgerDiff,
        aux: &AuxAddressDiff,
    );
}
