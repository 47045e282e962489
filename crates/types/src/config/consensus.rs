// Path: crates/types/src/config/consensus.rs
//! Consensus parameters: network selection and LLMQ quorum presets.

use serde::{Deserialize, Serialize};

/// The network a node is running on.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum NetworkKind {
    /// Production network.
    #[default]
    Main,
    /// Public test network.
    Test,
    /// Local regression-test network. Penalties decay every block.
    Regtest,
}

/// Parameters of one long-living masternode quorum (LLMQ) type.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LlmqParams {
    /// Human-readable name, used in logs and metrics.
    pub name: String,
    /// Number of members in the quorum.
    pub size: usize,
    /// Minimum number of valid members and signers for a commitment to be accepted.
    pub min_size: usize,
    /// Signature shares required to recover a threshold signature.
    pub threshold: usize,
    /// Blocks between the starts of two DKG cycles.
    pub dkg_interval: u32,
    /// Blocks per DKG phase.
    pub dkg_phase_blocks: u32,
    /// Number of recent quorums eligible for signing requests.
    pub signing_active_quorum_count: usize,
    /// Number of recent quorums to stay connected to.
    pub keep_old_connections: usize,
    /// Connect every member to every other member instead of using relay rings.
    #[serde(default)]
    pub all_members_connected: bool,
}

impl LlmqParams {
    /// The mainnet chain-locking quorum: 400 members, 60% threshold.
    pub fn chainlocks_400_60() -> Self {
        Self {
            name: "llmq_400_60".into(),
            size: 400,
            min_size: 300,
            threshold: 240,
            dkg_interval: 360,
            dkg_phase_blocks: 2,
            signing_active_quorum_count: 4,
            keep_old_connections: 5,
            all_members_connected: false,
        }
    }

    /// A tiny quorum for regression tests.
    pub fn regtest() -> Self {
        Self {
            name: "llmq_test".into(),
            size: 3,
            min_size: 2,
            threshold: 2,
            dkg_interval: 24,
            dkg_phase_blocks: 2,
            signing_active_quorum_count: 2,
            keep_old_connections: 3,
            all_members_connected: true,
        }
    }
}

impl Default for LlmqParams {
    fn default() -> Self {
        Self::chainlocks_400_60()
    }
}

/// Chain-wide consensus parameters consumed by membership and quorum logic.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ConsensusParams {
    /// The network kind.
    #[serde(default)]
    pub network: NetworkKind,
    /// Height at which deterministic membership tracking starts.
    #[serde(default)]
    pub membership_start_height: u32,
    /// Exact value an external collateral output must hold.
    #[serde(default = "default_collateral_amount")]
    pub collateral_amount: u64,
    /// Target block spacing in seconds.
    #[serde(default = "default_target_spacing")]
    pub pow_target_spacing_secs: u64,
    /// Blocks are produced instantly on request (test chains).
    #[serde(default)]
    pub mine_blocks_on_demand: bool,
    /// The quorum type used for DKG and signing.
    #[serde(default)]
    pub llmq: LlmqParams,
}

fn default_collateral_amount() -> u64 {
    100_000 * 100_000_000
}
fn default_target_spacing() -> u64 {
    150
}

impl ConsensusParams {
    /// Parameters for a local regression-test network.
    pub fn regtest() -> Self {
        Self {
            network: NetworkKind::Regtest,
            membership_start_height: 0,
            collateral_amount: default_collateral_amount(),
            pow_target_spacing_secs: default_target_spacing(),
            mine_blocks_on_demand: true,
            llmq: LlmqParams::regtest(),
        }
    }

    /// Returns true when running on the regression-test network.
    pub fn is_regtest(&self) -> bool {
        self.network == NetworkKind::Regtest
    }
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            network: NetworkKind::Main,
            membership_start_height: 0,
            collateral_amount: default_collateral_amount(),
            pow_target_spacing_secs: default_target_spacing(),
            mine_blocks_on_demand: false,
            llmq: LlmqParams::default(),
        }
    }
}
