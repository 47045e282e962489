// Path: crates/types/src/config/mod.rs

//! Shared configuration structures for the node and its components.
use crate::error::ConfigError;
use crate::primitives::Hash256;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Network selection, LLMQ presets and chain-wide consensus parameters.
pub mod consensus;
pub use consensus::*;

/// Tuning of the recovered-signature pipeline.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SigningConfig {
    /// Recovered signatures and votes older than this are pruned.
    #[serde(default = "default_max_recsig_age")]
    pub max_recovered_sig_age_secs: u64,
    /// Minimum spacing between two pruning passes.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_ms: u64,
    /// Maximum distinct `(peer, signHash)` sessions verified in one batch.
    #[serde(default = "default_max_batch_sessions")]
    pub max_batch_sessions: usize,
    /// Sleep between worker passes when no batch was saturated.
    #[serde(default = "default_worker_idle")]
    pub worker_idle_ms: u64,
    /// Capacity of each existence cache in front of the store.
    #[serde(default = "default_recsig_cache_size")]
    pub recovered_sig_cache_size: usize,
}

fn default_max_recsig_age() -> u64 {
    60 * 60 * 24 * 7
}
fn default_cleanup_interval() -> u64 {
    5_000
}
fn default_max_batch_sessions() -> usize {
    32
}
fn default_worker_idle() -> u64 {
    100
}
fn default_recsig_cache_size() -> usize {
    30_000
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            max_recovered_sig_age_secs: default_max_recsig_age(),
            cleanup_interval_ms: default_cleanup_interval(),
            max_batch_sessions: default_max_batch_sessions(),
            worker_idle_ms: default_worker_idle(),
            recovered_sig_cache_size: default_recsig_cache_size(),
        }
    }
}

/// Tuning of the DKG phase handler.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DkgConfig {
    /// Polling interval of every phase wait loop.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Messages of one kind drained from the pending queue per wait iteration.
    #[serde(default = "default_message_batch_size")]
    pub message_batch_size: usize,
}

fn default_poll_interval() -> u64 {
    100
}
fn default_message_batch_size() -> usize {
    8
}

impl Default for DkgConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            message_batch_size: default_message_batch_size(),
        }
    }
}

/// Where persistent state lives.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Path of the redb database file. `None` keeps everything in memory.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Number of decoded ledger snapshots memoised in front of the store.
    #[serde(default = "default_snapshot_cache")]
    pub snapshot_cache_size: usize,
}

fn default_snapshot_cache() -> usize {
    64
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            snapshot_cache_size: default_snapshot_cache(),
        }
    }
}

/// Logging and metrics endpoint settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// An `EnvFilter` directive. `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Address for the `/metrics` endpoint. Disabled when absent.
    #[serde(default)]
    pub metrics_addr: Option<SocketAddr>,
}

fn default_log_filter() -> String {
    "info".into()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            metrics_addr: None,
        }
    }
}

/// The identity of the local masternode, if it runs as one.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct MasternodeConfig {
    /// The local node's registration hash.
    #[serde(default)]
    pub pro_tx_hash: Option<Hash256>,
}

impl MasternodeConfig {
    /// Returns true if the node runs as a masternode.
    pub fn is_masternode(&self) -> bool {
        self.pro_tx_hash.is_some()
    }
}

/// Top-level node configuration.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct NodeConfig {
    /// Consensus parameters.
    #[serde(default)]
    pub consensus: ConsensusParams,
    /// Recovered-signature pipeline settings.
    #[serde(default)]
    pub signing: SigningConfig,
    /// DKG phase handler settings.
    #[serde(default)]
    pub dkg: DkgConfig,
    /// Persistent storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging and metrics settings.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Local masternode identity.
    #[serde(default)]
    pub masternode: MasternodeConfig,
}

impl NodeConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Rejects parameter combinations the quorum logic cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let llmq = &self.consensus.llmq;
        if llmq.size == 0 || llmq.min_size > llmq.size || llmq.threshold > llmq.min_size {
            return Err(ConfigError::Invalid(format!(
                "llmq {} requires 0 < threshold <= min_size <= size (got {}/{}/{})",
                llmq.name, llmq.threshold, llmq.min_size, llmq.size
            )));
        }
        if llmq.dkg_phase_blocks == 0 || llmq.dkg_interval < llmq.dkg_phase_blocks * 6 {
            return Err(ConfigError::Invalid(format!(
                "llmq {} dkg_interval {} cannot hold six phases of {} blocks",
                llmq.name, llmq.dkg_interval, llmq.dkg_phase_blocks
            )));
        }
        if self.signing.max_batch_sessions == 0 || self.dkg.message_batch_size == 0 {
            return Err(ConfigError::Invalid("batch sizes must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = NodeConfig::from_toml_str("").unwrap();
        assert_eq!(config, NodeConfig::default());
        assert_eq!(config.signing.max_recovered_sig_age_secs, 604_800);
        assert_eq!(config.consensus.llmq.size, 400);
    }

    #[test]
    fn regtest_overrides_parse() {
        let text = r#"
            [consensus]
            network = "Regtest"
            mine_blocks_on_demand = true

            [consensus.llmq]
            name = "llmq_test"
            size = 3
            min_size = 2
            threshold = 2
            dkg_interval = 24
            dkg_phase_blocks = 2
            signing_active_quorum_count = 2
            keep_old_connections = 3

            [telemetry]
            metrics_addr = "127.0.0.1:9615"
        "#;
        let config = NodeConfig::from_toml_str(text).unwrap();
        assert!(config.consensus.is_regtest());
        assert_eq!(config.consensus.llmq, LlmqParams::regtest_without_full_mesh());
        assert!(config.telemetry.metrics_addr.is_some());
    }

    #[test]
    fn inconsistent_thresholds_are_rejected() {
        let mut config = NodeConfig::default();
        config.consensus.llmq.threshold = config.consensus.llmq.size + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    impl LlmqParams {
        fn regtest_without_full_mesh() -> Self {
            Self {
                all_members_connected: false,
                ..Self::regtest()
            }
        }
    }
}
