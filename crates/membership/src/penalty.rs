// Path: crates/membership/src/penalty.rs
//! Proof-of-service penalty arithmetic.
//!
//! These are pure functions over counters so the ledger's stateful wrappers
//! stay thin and the rules can be tested without building a ledger.

use mnq_types::config::ConsensusParams;

/// The floor of the penalty cap.
pub const MIN_MAX_PENALTY: u32 = 100;
/// Percentage of the cap charged to a member that failed a DKG round.
pub const DKG_FAILURE_PERCENT: u32 = 66;
/// Outside regtest, penalties decay on every n-th height.
pub const DECREASE_EVERY: u32 = 3;

/// The cap grows with the number of valid records so that a banned node has
/// waited roughly one payment cycle before its penalty decays to zero.
pub fn compute_max_penalty(valid_count: usize) -> u32 {
    u32::try_from(valid_count)
        .unwrap_or(u32::MAX)
        .max(MIN_MAX_PENALTY)
}

pub fn compute_penalty(max_penalty: u32, percent: u32) -> u32 {
    (u64::from(max_penalty) * u64::from(percent) / 100) as u32
}

/// The effect of one punishment on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PunishOutcome {
    pub penalty: u32,
    /// True if this punishment reached the cap on a not-yet-banned record.
    pub ban: bool,
}

pub fn compute_punishment(current: u32, added: u32, max_penalty: u32, banned: bool) -> PunishOutcome {
    let penalty = current.saturating_add(added).min(max_penalty);
    PunishOutcome {
        penalty,
        ban: penalty >= max_penalty && !banned,
    }
}

/// Returns the decayed penalty, or `None` if the record is not eligible.
pub fn compute_decrease(current: u32, banned: bool) -> Option<u32> {
    if current == 0 || banned {
        return None;
    }
    Some(current - 1)
}

/// Whether penalties decay at `height`.
pub fn decreases_at(params: &ConsensusParams, height: u32) -> bool {
    params.is_regtest() || height % DECREASE_EVERY == 0
}
