// Path: crates/llmq/tests/common/mod.rs
#![allow(dead_code)]

use mnq_api::network::{Inventory, InventoryKind};
use mnq_crypto::sign::bls::{aggregate_signatures_insecure, BlsSecretKey};
use mnq_llmq::commitment::commitment_hash;
use mnq_llmq::signing::{RecoveredSigListener, RecoveredSignature, SigShareSigner};
use mnq_llmq::{
    CommitmentPool, DkgMessage, DkgMessageKind, DkgSession, PreVerifyFailure, Quorum, QuorumBlockProcessor,
    QuorumManager, QuorumMemberSource,
};
use mnq_membership::{MasternodeRecord, MasternodeState, QuorumMembers};
use mnq_storage::MemoryKvStore;
use mnq_test_utils::fixtures::{bls_key, hash, operator_key, payload_tx};
use mnq_test_utils::{MockChain, RecordingPeers};
use mnq_types::app::{BlockRef, FinalCommitment, FinalCommitmentTxPayload, ProviderTx};
use mnq_types::config::ConsensusParams;
use mnq_types::error::{DkgError, MembershipError};
use mnq_types::{BlsPublicKeyBytes, Hash256, OutPoint};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const MEMBER_SEEDS: [u8; 3] = [1, 2, 3];

/// Payload byte that makes the mock session ban the sender.
pub const BAN_PAYLOAD: u8 = 0xba;
/// Payload byte that makes the mock session skip the message.
pub const SKIP_PAYLOAD: u8 = 0x5c;

pub fn member_record(seed: u8) -> Arc<MasternodeRecord> {
    let state = MasternodeState {
        operator_pubkey: operator_key(u64::from(seed)),
        ..MasternodeState::default()
    };
    Arc::new(MasternodeRecord::new(
        hash(seed),
        u64::from(seed),
        OutPoint::new(hash(seed), 0),
        0,
        state,
    ))
}

/// Returns the same members for every base block.
pub struct FixedMembers {
    pub members: QuorumMembers,
}

impl FixedMembers {
    pub fn new(seeds: &[u8]) -> Self {
        Self {
            members: Arc::new(seeds.iter().map(|s| member_record(*s)).collect()),
        }
    }
}

impl QuorumMemberSource for FixedMembers {
    fn quorum_members(&self, _base: &BlockRef) -> Result<QuorumMembers, MembershipError> {
        Ok(self.members.clone())
    }
}

/// The threshold key of the quorum based at `base_height`.
pub fn quorum_key(base_height: u32) -> BlsSecretKey {
    bls_key(1000 + u64::from(base_height))
}

/// A fully signed commitment for the quorum at `base` with the given signer bits.
pub fn signed_commitment(base: &BlockRef, signers: &[bool]) -> FinalCommitment {
    let qsk = quorum_key(base.height);
    let mut commitment = FinalCommitment {
        version: 1,
        quorum_hash: base.hash,
        signers: signers.to_vec(),
        valid_members: vec![true; signers.len()],
        quorum_public_key: qsk.public_key().compress(),
        vvec_hash: hash(0xee),
        ..FinalCommitment::default()
    };
    let h = commitment_hash(&commitment);
    let sigs: Vec<_> = MEMBER_SEEDS
        .iter()
        .zip(signers)
        .filter(|(_, signed)| **signed)
        .map(|(seed, _)| bls_key(u64::from(*seed)).sign_hash(&h))
        .collect();
    commitment.members_sig = aggregate_signatures_insecure(&sigs).unwrap().compress();
    commitment.quorum_sig = qsk.sign_hash(&h).compress();
    commitment
}

/// A chain, a store and mined quorums for the test quorum type.
pub struct Env {
    pub params: ConsensusParams,
    pub chain: Arc<MockChain>,
    pub store: Arc<MemoryKvStore>,
    pub members: Arc<FixedMembers>,
    pub peers: Arc<RecordingPeers>,
    pub processor: Arc<QuorumBlockProcessor>,
    pub quorums: Arc<QuorumManager>,
}

impl Env {
    pub fn new(len: u32) -> Self {
        let params = ConsensusParams::regtest();
        let chain = Arc::new(MockChain::with_height(len));
        let store = Arc::new(MemoryKvStore::new());
        let members = Arc::new(FixedMembers::new(&MEMBER_SEEDS));
        let peers = Arc::new(RecordingPeers::default());
        let processor = Arc::new(QuorumBlockProcessor::new(
            params.clone(),
            store.clone(),
            chain.clone(),
            members.clone(),
            peers.clone(),
        ));
        let quorums = Arc::new(QuorumManager::new(
            params.clone(),
            chain.clone(),
            processor.clone(),
            members.clone(),
        ));
        Self {
            params,
            chain,
            store,
            members,
            peers,
            processor,
            quorums,
        }
    }

    /// Mines a fully signed commitment for the quorum at `base_height` in the block at `mined_height`.
    pub fn mine_quorum(&self, base_height: u32, mined_height: u32) -> Arc<Quorum> {
        let base = self.chain.at(base_height).unwrap();
        let commitment = signed_commitment(&base, &[true; 3]);
        self.processor
            .process_block(&self.commitment_block(mined_height, commitment), false)
            .unwrap();
        self.quorums.get_quorum(&base.hash).unwrap()
    }

    pub fn commitment_block(&self, height: u32, commitment: FinalCommitment) -> mnq_types::app::Block {
        let header = self.chain.at(height).unwrap();
        let payload = ProviderTx::QuorumCommitment(FinalCommitmentTxPayload {
            version: 1,
            height,
            commitment,
        });
        self.chain.block(header, vec![payload_tx(0x90, payload)])
    }
}

/// A threshold signature by `quorum` over `(id, msg_hash)`.
pub fn recovered_sig(quorum: &Quorum, id: Hash256, msg_hash: Hash256) -> RecoveredSignature {
    let mut sig = RecoveredSignature {
        quorum_hash: quorum.quorum_hash(),
        id,
        msg_hash,
        sig: Default::default(),
    };
    sig.sig = quorum_key(quorum.base.height).sign_hash(&sig.sign_hash()).compress();
    sig
}

/// Records every new recovered signature.
#[derive(Default)]
pub struct RecordingListener {
    pub seen: Mutex<Vec<RecoveredSignature>>,
}

impl RecoveredSigListener for RecordingListener {
    fn on_new_recovered_sig(&self, sig: &RecoveredSignature) {
        self.seen.lock().push(sig.clone());
    }
}

/// Records signing requests.
#[derive(Default)]
pub struct RecordingSigner {
    pub signed: Mutex<Vec<(Hash256, Hash256, Hash256)>>,
    pub reannounced: Mutex<Vec<(Hash256, Hash256)>>,
}

impl SigShareSigner for RecordingSigner {
    fn async_sign(&self, quorum: &Arc<Quorum>, id: &Hash256, msg_hash: &Hash256) {
        self.signed.lock().push((quorum.quorum_hash(), *id, *msg_hash));
    }

    fn force_reannouncement(&self, _quorum: &Arc<Quorum>, id: &Hash256, msg_hash: &Hash256) {
        self.reannounced.lock().push((*id, *msg_hash));
    }
}

/// Accepts every commitment and records it.
#[derive(Default)]
pub struct RecordingPool {
    pub commitments: Mutex<Vec<FinalCommitment>>,
}

impl CommitmentPool for RecordingPool {
    fn add_mineable_commitment(&self, commitment: FinalCommitment) -> Option<Inventory> {
        let hash = mnq_crypto::algorithms::hash::hash_canonical(&commitment);
        self.commitments.lock().push(commitment);
        Some(Inventory {
            kind: InventoryKind::QuorumFinalCommitment,
            hash,
        })
    }
}

/// A DKG session that signs with fixture keys and records what the handler asks of it.
pub struct MockSession {
    keys: HashMap<Hash256, BlsSecretKey>,
    me: Mutex<Option<Hash256>>,
    members: Mutex<Vec<Hash256>>,
    quorum_hash: Mutex<Hash256>,
    pub fail_init: AtomicBool,
    pub calls: Mutex<Vec<&'static str>>,
    pub received: Mutex<Vec<DkgMessage>>,
}

impl MockSession {
    pub fn new(seeds: &[u8]) -> Self {
        Self {
            keys: seeds.iter().map(|s| (hash(*s), bls_key(u64::from(*s)))).collect(),
            me: Mutex::new(None),
            members: Mutex::new(Vec::new()),
            quorum_hash: Mutex::new(Hash256::ZERO),
            fail_init: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    /// A message from member `seed`, signed with its operator key.
    pub fn signed(&self, kind: DkgMessageKind, quorum_hash: Hash256, seed: u8, payload: Vec<u8>) -> DkgMessage {
        let mut msg = DkgMessage {
            kind,
            quorum_hash,
            pro_tx_hash: hash(seed),
            payload,
            sig: Default::default(),
        };
        msg.sig = bls_key(u64::from(seed)).sign_hash(&msg.sign_hash()).compress();
        msg
    }

    fn local_action(&self, name: &'static str, kind: DkgMessageKind) -> Vec<DkgMessage> {
        self.calls.lock().push(name);
        let Some(me) = *self.me.lock() else {
            return Vec::new();
        };
        let Some(key) = self.keys.get(&me) else {
            return Vec::new();
        };
        let mut msg = DkgMessage {
            kind,
            quorum_hash: *self.quorum_hash.lock(),
            pro_tx_hash: me,
            payload: name.as_bytes().to_vec(),
            sig: Default::default(),
        };
        msg.sig = key.sign_hash(&msg.sign_hash()).compress();
        vec![msg]
    }
}

impl DkgSession for MockSession {
    fn init(&self, base: &BlockRef, members: QuorumMembers, my_pro_tx_hash: Option<Hash256>) -> Result<(), DkgError> {
        self.calls.lock().push("init");
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(DkgError::SessionInit("refused".into()));
        }
        let hashes: Vec<Hash256> = members.iter().map(|m| m.pro_tx_hash).collect();
        *self.me.lock() = my_pro_tx_hash.filter(|me| hashes.contains(me));
        *self.members.lock() = hashes;
        *self.quorum_hash.lock() = base.hash;
        self.received.lock().clear();
        Ok(())
    }

    fn are_we_member(&self) -> bool {
        self.me.lock().is_some()
    }

    fn my_member_index(&self) -> Option<usize> {
        let me = (*self.me.lock())?;
        self.members.lock().iter().position(|m| *m == me)
    }

    fn member_operator_key(&self, pro_tx_hash: &Hash256) -> Option<BlsPublicKeyBytes> {
        self.keys.get(pro_tx_hash).map(|k| k.public_key().compress())
    }

    fn contribute(&self) -> Vec<DkgMessage> {
        self.local_action("contribute", DkgMessageKind::Contribution)
    }

    fn verify_and_complain(&self) -> Vec<DkgMessage> {
        self.local_action("complain", DkgMessageKind::Complaint)
    }

    fn verify_and_justify(&self) -> Vec<DkgMessage> {
        self.local_action("justify", DkgMessageKind::Justification)
    }

    fn verify_and_commit(&self) -> Vec<DkgMessage> {
        self.local_action("commit", DkgMessageKind::PrematureCommitment)
    }

    fn pre_verify(&self, msg: &DkgMessage) -> Result<(), PreVerifyFailure> {
        if !self.keys.contains_key(&msg.pro_tx_hash) {
            return Err(PreVerifyFailure::Ban);
        }
        match msg.payload.first() {
            Some(&BAN_PAYLOAD) => Err(PreVerifyFailure::Ban),
            Some(&SKIP_PAYLOAD) => Err(PreVerifyFailure::Skip),
            _ => Ok(()),
        }
    }

    fn receive_message(&self, _hash: Hash256, msg: DkgMessage) {
        self.received.lock().push(msg);
    }

    fn message(&self, kind: DkgMessageKind, hash: &Hash256) -> Option<DkgMessage> {
        self.received
            .lock()
            .iter()
            .find(|m| m.kind == kind && m.hash() == *hash)
            .cloned()
    }

    fn finalize_commitments(&self) -> Vec<FinalCommitment> {
        self.calls.lock().push("finalize");
        vec![FinalCommitment {
            version: 1,
            quorum_hash: *self.quorum_hash.lock(),
            signers: vec![true; 3],
            valid_members: vec![true; 3],
            ..FinalCommitment::default()
        }]
    }
}
