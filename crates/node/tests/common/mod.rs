// Path: crates/node/tests/common/mod.rs
#![allow(dead_code)]

use mnq_crypto::sign::bls::{aggregate_signatures_insecure, BlsSecretKey};
use mnq_llmq::commitment::commitment_hash;
use mnq_llmq::{DkgMessage, DkgMessageKind, DkgSession, PreVerifyFailure, Quorum, SigShareSigner};
use mnq_membership::QuorumMembers;
use mnq_node::{NodeDependencies, QuorumNode};
use mnq_test_utils::fixtures::{bls_key, hash, payload_tx, pro_reg, pro_reg_tx};
use mnq_test_utils::{ManualClock, MockChain, MockCoins, RecordingPeers};
use mnq_types::app::{BlockRef, ChainTx, FinalCommitment, FinalCommitmentTxPayload, ProviderTx};
use mnq_types::config::{ConsensusParams, NodeConfig};
use mnq_types::error::{DkgError, MembershipError};
use mnq_types::{BlsPublicKeyBytes, Hash256};
use parking_lot::Mutex;
use std::sync::Arc;

pub const MEMBER_SEEDS: [u8; 3] = [1, 2, 3];

pub fn regtest_config(local: Option<u8>) -> NodeConfig {
    let mut config = NodeConfig {
        consensus: ConsensusParams::regtest(),
        ..NodeConfig::default()
    };
    config.masternode.pro_tx_hash = local.map(hash);
    config
}

/// The threshold key of the quorum based at `base_height`.
pub fn quorum_key(base_height: u32) -> BlsSecretKey {
    bls_key(1000 + u64::from(base_height))
}

/// Fixture registrations hash to `hash(seed)`, so the seed is any byte of the hash.
fn member_key(pro_tx_hash: &Hash256) -> BlsSecretKey {
    bls_key(u64::from(pro_tx_hash.0[0]))
}

/// A commitment signed by every member, in the order the ledger selected them.
pub fn signed_commitment(base: &BlockRef, members: &QuorumMembers) -> FinalCommitment {
    let qsk = quorum_key(base.height);
    let mut commitment = FinalCommitment {
        version: 1,
        quorum_hash: base.hash,
        signers: vec![true; members.len()],
        valid_members: vec![true; members.len()],
        quorum_public_key: qsk.public_key().compress(),
        vvec_hash: hash(0xee),
        ..FinalCommitment::default()
    };
    let h = commitment_hash(&commitment);
    let sigs: Vec<_> = members.iter().map(|m| member_key(&m.pro_tx_hash).sign_hash(&h)).collect();
    commitment.members_sig = aggregate_signatures_insecure(&sigs).unwrap().compress();
    commitment.quorum_sig = qsk.sign_hash(&h).compress();
    commitment
}

pub fn commitment_tx(height: u32, commitment: FinalCommitment) -> ChainTx {
    payload_tx(
        0x90,
        ProviderTx::QuorumCommitment(FinalCommitmentTxPayload {
            version: 1,
            height,
            commitment,
        }),
    )
}

/// Records signing requests.
#[derive(Default)]
pub struct RecordingSigner {
    pub signed: Mutex<Vec<(Hash256, Hash256, Hash256)>>,
}

impl SigShareSigner for RecordingSigner {
    fn async_sign(&self, quorum: &Arc<Quorum>, id: &Hash256, msg_hash: &Hash256) {
        self.signed.lock().push((quorum.quorum_hash(), *id, *msg_hash));
    }

    fn force_reannouncement(&self, _quorum: &Arc<Quorum>, _id: &Hash256, _msg_hash: &Hash256) {}
}

/// A session that produces nothing and records the cycles it was started for.
#[derive(Default)]
pub struct CycleProbe {
    pub inits: Mutex<Vec<(u32, Vec<Hash256>)>>,
    me: Mutex<Option<usize>>,
}

impl DkgSession for CycleProbe {
    fn init(&self, base: &BlockRef, members: QuorumMembers, my_pro_tx_hash: Option<Hash256>) -> Result<(), DkgError> {
        let hashes: Vec<Hash256> = members.iter().map(|m| m.pro_tx_hash).collect();
        *self.me.lock() = my_pro_tx_hash.and_then(|me| hashes.iter().position(|h| *h == me));
        self.inits.lock().push((base.height, hashes));
        Ok(())
    }

    fn are_we_member(&self) -> bool {
        self.me.lock().is_some()
    }

    fn my_member_index(&self) -> Option<usize> {
        *self.me.lock()
    }

    fn member_operator_key(&self, _pro_tx_hash: &Hash256) -> Option<BlsPublicKeyBytes> {
        None
    }

    fn contribute(&self) -> Vec<DkgMessage> {
        Vec::new()
    }

    fn verify_and_complain(&self) -> Vec<DkgMessage> {
        Vec::new()
    }

    fn verify_and_justify(&self) -> Vec<DkgMessage> {
        Vec::new()
    }

    fn verify_and_commit(&self) -> Vec<DkgMessage> {
        Vec::new()
    }

    fn pre_verify(&self, _msg: &DkgMessage) -> Result<(), PreVerifyFailure> {
        Err(PreVerifyFailure::Skip)
    }

    fn receive_message(&self, _hash: Hash256, _msg: DkgMessage) {}

    fn message(&self, _kind: DkgMessageKind, _hash: &Hash256) -> Option<DkgMessage> {
        None
    }

    fn finalize_commitments(&self) -> Vec<FinalCommitment> {
        Vec::new()
    }
}

/// A node over a mock chain with registered members.
pub struct TestNode {
    pub chain: Arc<MockChain>,
    pub coins: MockCoins,
    pub peers: Arc<RecordingPeers>,
    pub signer: Arc<RecordingSigner>,
    pub clock: Arc<ManualClock>,
    pub node: QuorumNode,
}

impl TestNode {
    pub fn new(len: u32, config: NodeConfig) -> Self {
        Self::with_session(len, config, None)
    }

    pub fn with_session(len: u32, config: NodeConfig, session: Option<Arc<dyn DkgSession>>) -> Self {
        let chain = Arc::new(MockChain::with_height(len));
        let peers = Arc::new(RecordingPeers::default());
        let signer = Arc::new(RecordingSigner::default());
        let clock = Arc::new(ManualClock::default());
        let node = QuorumNode::build(
            config,
            NodeDependencies {
                chain: chain.clone(),
                peers: peers.clone(),
                signer: signer.clone(),
                clock: clock.clone(),
                session,
                store: None,
            },
        )
        .unwrap();
        Self {
            chain,
            coins: MockCoins::default(),
            peers,
            signer,
            clock,
            node,
        }
    }

    /// Connects the block at `height` and makes it the tip.
    pub fn connect(&self, height: u32, txs: Vec<ChainTx>) -> Result<(), MembershipError> {
        let header = self.chain.at(height).unwrap();
        self.node.connect_block(&self.chain.block(header, txs), &self.coins, false)?;
        self.node.updated_block_tip(&header);
        Ok(())
    }

    /// Registers the member seeds at height 1 and connects empty blocks up to `height`.
    pub fn sync_with_members(&self, height: u32) {
        let collateral = self.node.config().consensus.collateral_amount;
        let regs = MEMBER_SEEDS
            .iter()
            .map(|s| pro_reg_tx(*s, pro_reg(*s), collateral))
            .collect();
        self.connect(1, regs).unwrap();
        self.connect_empty(2, height);
    }

    pub fn connect_empty(&self, from: u32, to: u32) {
        for h in from..=to {
            self.connect(h, Vec::new()).unwrap();
        }
    }

    /// Mines the commitment of the quorum at `base_height` in the block at `mined_height`.
    pub fn mine_quorum(&self, base_height: u32, mined_height: u32) -> Arc<Quorum> {
        let base = self.chain.at(base_height).unwrap();
        let members = self.node.membership.quorum_members(&base).unwrap();
        let commitment = signed_commitment(&base, &members);
        self.connect(mined_height, vec![commitment_tx(mined_height, commitment)])
            .unwrap();
        self.node.quorums.get_quorum(&base.hash).unwrap()
    }
}
