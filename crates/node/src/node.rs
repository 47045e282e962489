// Path: crates/node/src/node.rs

use mnq_api::chain::{ChainView, CoinView};
use mnq_api::network::PeerReporter;
use mnq_api::storage::KvStore;
use mnq_api::time::Clock;
use mnq_llmq::quorums::QuorumConnectionPlan;
use mnq_llmq::{
    DkgDebugManager, DkgSession, HandlerDeps, QuorumBlockProcessor, QuorumManager, QuorumMemberSource,
    QuorumQueries, QuorumSessionHandler, RecoveredSigStore, SigShareSigner, SigningManager,
};
use mnq_membership::{LedgerDiff, MembershipManager};
use mnq_storage::{MemoryKvStore, RedbKvStore};
use mnq_types::app::{Block, BlockRef};
use mnq_types::config::NodeConfig;
use mnq_types::error::{CoreError, MembershipError};
use mnq_types::Hash256;
use parking_lot::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handles the embedding node provides.
pub struct NodeDependencies {
    pub chain: Arc<dyn ChainView>,
    pub peers: Arc<dyn PeerReporter>,
    pub signer: Arc<dyn SigShareSigner>,
    pub clock: Arc<dyn Clock>,
    /// The DKG protocol engine. Without one the node follows quorums but never runs a phase handler.
    pub session: Option<Arc<dyn DkgSession>>,
    /// Overrides the store selected by `storage.path`.
    pub store: Option<Arc<dyn KvStore>>,
}

/// Every quorum-core component, built once and shared.
pub struct QuorumNode {
    pub(crate) config: NodeConfig,
    pub(crate) chain: Arc<dyn ChainView>,
    /// The persistent store shared by every component.
    pub store: Arc<dyn KvStore>,
    pub membership: Arc<MembershipManager>,
    /// Mined and mineable final commitments.
    pub blocks: Arc<QuorumBlockProcessor>,
    pub quorums: Arc<QuorumManager>,
    pub signing: Arc<SigningManager>,
    pub debug: Arc<DkgDebugManager>,
    pub queries: QuorumQueries,
    /// Present only when a DKG session was supplied.
    pub handler: Option<Arc<QuorumSessionHandler>>,
    pub(crate) shutdown_sender: watch::Sender<bool>,
    pub(crate) task_handles: Mutex<Vec<JoinHandle<()>>>,
    pub(crate) is_running: AtomicBool,
}

impl std::fmt::Debug for QuorumNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuorumNode").field("is_running", &self.is_running).finish_non_exhaustive()
    }
}

fn open_store(config: &NodeConfig) -> Result<Arc<dyn KvStore>, CoreError> {
    match &config.storage.path {
        Some(path) => {
            let store = RedbKvStore::open(path).map_err(|e| CoreError::Storage(e.to_string()))?;
            tracing::info!(target: "node", event = "store_opened", path = %path.display());
            Ok(Arc::new(store))
        }
        None => {
            tracing::info!(target: "node", event = "store_opened", path = "memory");
            Ok(Arc::new(MemoryKvStore::new()))
        }
    }
}

impl QuorumNode {
    /// Validates `config` and builds every component.
    pub fn build(config: NodeConfig, deps: NodeDependencies) -> Result<Self, CoreError> {
        config.validate()?;
        let store = match deps.store {
            Some(store) => store,
            None => open_store(&config)?,
        };
        let params = config.consensus.clone();
        let local = config.masternode.pro_tx_hash;

        let membership = Arc::new(MembershipManager::new(
            params.clone(),
            store.clone(),
            deps.chain.clone(),
            config.storage.snapshot_cache_size,
        ));
        let members: Arc<dyn QuorumMemberSource> = membership.clone();
        let blocks = Arc::new(QuorumBlockProcessor::new(
            params.clone(),
            store.clone(),
            deps.chain.clone(),
            members.clone(),
            deps.peers.clone(),
        ));
        let quorums = Arc::new(QuorumManager::new(
            params.clone(),
            deps.chain.clone(),
            blocks.clone(),
            members.clone(),
        ));
        let recsigs = RecoveredSigStore::new(store.clone(), deps.clock.clone(), config.signing.recovered_sig_cache_size);
        let signing = Arc::new(SigningManager::new(
            config.signing.clone(),
            local,
            deps.chain.clone(),
            quorums.clone(),
            recsigs,
            deps.peers.clone(),
            deps.signer,
            deps.clock,
        ));
        let debug = Arc::new(DkgDebugManager::new());
        let handler = deps.session.map(|session| {
            Arc::new(QuorumSessionHandler::new(
                params.clone(),
                config.dkg.clone(),
                local,
                HandlerDeps {
                    chain: deps.chain.clone(),
                    members,
                    session,
                    pool: blocks.clone(),
                    peers: deps.peers.clone(),
                    debug: debug.clone(),
                },
            ))
        });
        let queries = QuorumQueries::new(quorums.clone(), signing.clone(), debug.clone(), local);
        let (shutdown_sender, _) = watch::channel(false);

        tracing::info!(
            target: "node",
            event = "built",
            llmq = %params.llmq.name,
            masternode = local.is_some(),
            dkg = handler.is_some()
        );
        Ok(Self {
            config,
            chain: deps.chain,
            store,
            membership,
            blocks,
            quorums,
            signing,
            debug,
            queries,
            handler,
            shutdown_sender,
            task_handles: Mutex::new(Vec::new()),
            is_running: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn local_pro_tx_hash(&self) -> Option<Hash256> {
        self.config.masternode.pro_tx_hash
    }

    /// Applies the quorum commitments and the provider transactions of `block`.
    ///
    /// When the ledger rejects the block after its commitments were stored,
    /// the commitments are rolled back before the error is returned.
    pub fn connect_block(
        &self,
        block: &Block,
        coins: &dyn CoinView,
        just_check: bool,
    ) -> Result<LedgerDiff, MembershipError> {
        self.blocks.process_block(block, just_check)?;
        match self.membership.process_block(block, coins, just_check) {
            Ok(diff) => Ok(diff),
            Err(e) => {
                if !just_check {
                    if let Err(undo) = self.blocks.undo_block(block) {
                        tracing::error!(
                            target: "node",
                            event = "commitment_rollback_failed",
                            hash = %block.header.hash,
                            error = %undo
                        );
                    }
                }
                tracing::warn!(
                    target: "node",
                    event = "block_rejected",
                    height = block.header.height,
                    hash = %block.header.hash,
                    error = %e
                );
                Err(e)
            }
        }
    }

    /// Reverts `block`, returning the ledger diff back to its parent.
    pub fn disconnect_block(&self, block: &Block) -> Result<LedgerDiff, MembershipError> {
        let inverse = self.membership.undo_block(&block.header)?;
        self.blocks.undo_block(block)?;
        tracing::info!(
            target: "node",
            event = "block_disconnected",
            height = block.header.height,
            hash = %block.header.hash
        );
        Ok(inverse)
    }

    /// Announces a new active tip to the ledger and the phase handler.
    pub fn updated_block_tip(&self, tip: &BlockRef) {
        self.membership.updated_block_tip(tip);
        if let Some(handler) = &self.handler {
            handler.updated_block_tip(tip);
        }
        mnq_telemetry::http::set_ready(true);
        tracing::debug!(target: "node", event = "tip_updated", height = tip.height, hash = %tip.hash);
    }

    /// Quorum connections to hold at the current tip.
    ///
    /// Nodes without a registration only receive watch connections, and only when `watch_seed` is set.
    pub fn connection_plan(&self, watch_seed: Option<Hash256>) -> Vec<(Hash256, QuorumConnectionPlan)> {
        let local = self.local_pro_tx_hash().unwrap_or(Hash256::ZERO);
        self.quorums.connection_plan(&local, watch_seed)
    }
}
