// Path: crates/llmq/src/phase.rs
//! DKG phases and their mapping onto block heights.

use mnq_types::config::LlmqParams;
use serde::{Deserialize, Serialize};

/// A phase of one DKG cycle. Discriminants follow the on-chain numbering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum QuorumPhase {
    Initialized = 1,
    Contribute = 2,
    Complain = 3,
    Justify = 4,
    Commit = 5,
    Finalize = 6,
    Idle = 7,
}

impl QuorumPhase {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            1 => Self::Initialized,
            2 => Self::Contribute,
            3 => Self::Complain,
            4 => Self::Justify,
            5 => Self::Commit,
            6 => Self::Finalize,
            7 => Self::Idle,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialized => "Initialized",
            Self::Contribute => "Contribute",
            Self::Complain => "Complain",
            Self::Justify => "Justify",
            Self::Commit => "Commit",
            Self::Finalize => "Finalize",
            Self::Idle => "Idle",
        }
    }

    /// The phase that follows this one within a cycle.
    pub fn next(&self) -> Self {
        match self {
            Self::Initialized => Self::Contribute,
            Self::Contribute => Self::Complain,
            Self::Complain => Self::Justify,
            Self::Justify => Self::Commit,
            Self::Commit => Self::Finalize,
            Self::Finalize | Self::Idle => Self::Idle,
        }
    }

    /// Fraction of the per-member phase time a member sleeps before acting.
    pub fn sleep_factor(&self) -> f64 {
        match self {
            Self::Contribute | Self::Complain | Self::Justify => 0.05,
            Self::Commit => 0.10,
            _ => 0.0,
        }
    }
}

impl std::fmt::Display for QuorumPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Offset of `height` inside its DKG cycle.
pub fn quorum_stage(params: &LlmqParams, height: u32) -> u32 {
    height % params.dkg_interval.max(1)
}

/// Height of the base block of the cycle containing `height`.
pub fn quorum_base_height(params: &LlmqParams, height: u32) -> u32 {
    height - quorum_stage(params, height)
}

/// The phase that starts at `height`, if a phase boundary falls on it.
///
/// Heights inside a phase return `None`: the current phase is kept.
pub fn phase_starting_at(params: &LlmqParams, height: u32) -> Option<QuorumPhase> {
    let stage = quorum_stage(params, height);
    let blocks = params.dkg_phase_blocks.max(1);
    if stage % blocks != 0 {
        return None;
    }
    u8::try_from(stage / blocks + 1).ok().and_then(QuorumPhase::from_u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_follow_phase_blocks() {
        let params = LlmqParams::regtest();
        let phases: Vec<_> = (24..=40).map(|h| phase_starting_at(&params, h)).collect();
        assert_eq!(phases[0], Some(QuorumPhase::Initialized));
        assert_eq!(phases[1], None);
        assert_eq!(phases[2], Some(QuorumPhase::Contribute));
        assert_eq!(phases[10], Some(QuorumPhase::Finalize));
        assert_eq!(phases[12], Some(QuorumPhase::Idle));
        // Past the idle boundary no new phase starts until the next cycle.
        assert_eq!(phases[14], None);
        assert_eq!(quorum_base_height(&params, 37), 24);
    }

    #[test]
    fn ordering_matches_cycle() {
        let mut phase = QuorumPhase::Initialized;
        let mut seen = vec![phase];
        while phase != QuorumPhase::Idle {
            phase = phase.next();
            seen.push(phase);
        }
        let mut sorted = seen.clone();
        sorted.sort();
        assert_eq!(seen, sorted);
        assert_eq!(seen.len(), 7);
    }
}
