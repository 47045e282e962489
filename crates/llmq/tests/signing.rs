// Path: crates/llmq/tests/signing.rs
mod common;

use common::{quorum_key, recovered_sig, Env, RecordingListener, RecordingSigner};
use mnq_api::network::InventoryKind;
use mnq_llmq::signing::spawn_signing_worker;
use mnq_llmq::{Quorum, RecoveredSigListener, RecoveredSigStore, SigningManager};
use mnq_test_utils::fixtures::hash;
use mnq_test_utils::ManualClock;
use mnq_types::config::SigningConfig;
use mnq_types::Hash256;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

struct Signing {
    env: Env,
    q24: Arc<Quorum>,
    q48: Arc<Quorum>,
    clock: Arc<ManualClock>,
    signer: Arc<RecordingSigner>,
    listener: Arc<RecordingListener>,
    manager: Arc<SigningManager>,
}

impl Signing {
    fn new(local: Option<u8>, config: SigningConfig) -> Self {
        let env = Env::new(60);
        let q24 = env.mine_quorum(24, 30);
        let q48 = env.mine_quorum(48, 54);
        let clock = Arc::new(ManualClock::default());
        let signer = Arc::new(RecordingSigner::default());
        let listener = Arc::new(RecordingListener::default());
        let store = RecoveredSigStore::new(env.store.clone(), clock.clone(), config.recovered_sig_cache_size);
        let manager = Arc::new(SigningManager::new(
            config,
            local.map(hash),
            env.chain.clone(),
            env.quorums.clone(),
            store,
            env.peers.clone(),
            signer.clone(),
            clock.clone(),
        ));
        manager.register_listener(listener.clone());
        Self {
            env,
            q24,
            q48,
            clock,
            signer,
            listener,
            manager,
        }
    }

    fn member() -> Self {
        Self::new(Some(1), SigningConfig::default())
    }

    /// The hash of a block signatures may commit to.
    fn signable(&self, height: u32) -> Hash256 {
        self.env.chain.at(height).unwrap().hash
    }

    fn relayed_recsigs(&self) -> usize {
        self.env
            .peers
            .relayed()
            .iter()
            .filter(|inv| inv.kind == InventoryKind::RecoveredSig)
            .count()
    }

    fn seen(&self) -> usize {
        self.listener.seen.lock().len()
    }
}

#[test]
fn relayed_signature_is_accepted_once() {
    let t = Signing::member();
    let s = recovered_sig(&t.q24, hash(0x70), t.signable(55));

    t.manager.process_message_recovered_sig(1, s.clone());
    t.manager.process_message_recovered_sig(2, s.clone());
    assert_eq!(t.manager.pending_count(), 2);
    assert!(!t.manager.process_pending_recovered_sigs());

    assert!(t.manager.has_recovered_sig(&s.id, &s.msg_hash));
    assert!(t.manager.has_recovered_sig_for_session(&s.sign_hash()));
    assert!(t.manager.already_have(&s.hash()));
    assert_eq!(t.seen(), 1);
    assert_eq!(t.relayed_recsigs(), 1);
    assert!(t.env.peers.misbehaviors().is_empty());

    t.manager.process_message_recovered_sig(3, s);
    assert_eq!(t.manager.pending_count(), 0);
    assert_eq!(t.seen(), 1);
}

#[test]
fn invalid_signature_is_blamed_on_its_sender() {
    let t = Signing::member();
    let good = recovered_sig(&t.q24, hash(0x70), t.signable(55));
    let mut bad = recovered_sig(&t.q24, hash(0x71), t.signable(55));
    bad.sig = quorum_key(48).sign_hash(&bad.sign_hash()).compress();

    t.manager.process_message_recovered_sig(4, bad.clone());
    t.manager.process_message_recovered_sig(5, good.clone());
    t.manager.process_pending_recovered_sigs();

    assert_eq!(t.env.peers.score_of(4), 100);
    assert_eq!(t.env.peers.score_of(5), 0);
    assert!(!t.manager.has_recovered_sig_for_id(&bad.id));
    assert!(t.manager.has_recovered_sig_for_id(&good.id));
}

#[test]
fn undecodable_signature_is_blamed_on_its_sender() {
    let t = Signing::member();
    let mut s = recovered_sig(&t.q24, hash(0x70), t.signable(55));
    s.sig = Default::default();
    t.manager.process_message_recovered_sig(6, s.clone());
    t.manager.process_pending_recovered_sigs();
    assert_eq!(t.env.peers.score_of(6), 100);
    assert!(!t.manager.has_recovered_sig_for_id(&s.id));
}

#[test]
fn signatures_over_unusable_blocks_are_penalised_lightly() {
    let t = Signing::member();
    t.env.chain.mark_unvalidated(t.signable(50));
    let cases = [
        (7, t.signable(56)),
        (8, hash(0x99)),
        (9, t.signable(50)),
    ];
    for (peer, msg) in cases {
        let s = recovered_sig(&t.q24, hash(peer as u8), msg);
        t.manager.process_message_recovered_sig(peer, s);
    }
    t.manager.process_pending_recovered_sigs();
    for (peer, msg) in cases {
        assert_eq!(t.env.peers.score_of(peer), 10, "peer {peer}");
        assert!(!t.manager.has_recovered_sig(&hash(peer as u8), &msg));
    }
    assert_eq!(t.seen(), 0);
}

#[test]
fn signature_from_an_unknown_quorum_is_dropped_quietly() {
    let t = Signing::member();
    let mut s = recovered_sig(&t.q24, hash(0x70), t.signable(55));
    s.quorum_hash = hash(0x12);
    t.manager.process_message_recovered_sig(1, s);
    assert_eq!(t.manager.pending_count(), 0);
    assert!(t.env.peers.misbehaviors().is_empty());
}

#[test]
fn conflicting_signature_for_an_id_is_not_stored() {
    let t = Signing::member();
    let id = hash(0x70);
    let first = recovered_sig(&t.q24, id, t.signable(55));
    let second = recovered_sig(&t.q48, id, t.signable(50));

    t.manager.process_message_recovered_sig(1, first.clone());
    t.manager.process_pending_recovered_sigs();
    t.manager.process_message_recovered_sig(2, second.clone());
    t.manager.process_pending_recovered_sigs();

    assert!(t.manager.has_recovered_sig(&id, &first.msg_hash));
    assert!(!t.manager.has_recovered_sig(&id, &second.msg_hash));
    assert!(t.manager.is_conflicting(&id, &second.msg_hash));
    assert!(!t.manager.is_conflicting(&id, &first.msg_hash));
    assert_eq!(t.manager.get_recovered_sig_for_id(&id, &first.msg_hash), Some(first.clone()));
    assert_eq!(t.manager.get_recovered_sig_for_id(&id, &second.msg_hash), None);
    assert_eq!(t.seen(), 1);
    assert_eq!(t.env.peers.score_of(2), 0);
}

#[test]
fn reconstructed_signature_skips_the_queue() {
    let t = Signing::member();
    let s = recovered_sig(&t.q48, hash(0x70), t.signable(55));
    t.manager.push_reconstructed_recovered_sig(s.clone());
    assert!(t.manager.already_have(&s.hash()));

    // A relayed copy of a signature we are about to accept is not queued again.
    t.manager.process_message_recovered_sig(3, s.clone());
    assert_eq!(t.manager.pending_count(), 0);

    t.manager.process_pending_recovered_sigs();
    assert!(t.manager.has_recovered_sig(&s.id, &s.msg_hash));
    assert_eq!(t.seen(), 1);
    assert_eq!(t.relayed_recsigs(), 1);
    assert!(t.env.peers.misbehaviors().is_empty());
}

#[test]
fn nodes_without_a_masternode_identity_do_not_relay() {
    let t = Signing::new(None, SigningConfig::default());
    let s = recovered_sig(&t.q24, hash(0x70), t.signable(55));
    t.manager.process_message_recovered_sig(1, s.clone());
    t.manager.process_pending_recovered_sigs();
    assert!(t.manager.has_recovered_sig(&s.id, &s.msg_hash));
    assert_eq!(t.relayed_recsigs(), 0);
    assert_eq!(t.seen(), 1);
}

#[test]
fn served_signatures_come_from_active_quorums() {
    let t = Signing::member();
    let s = recovered_sig(&t.q24, hash(0x70), t.signable(55));
    t.manager.process_message_recovered_sig(1, s.clone());
    t.manager.process_pending_recovered_sigs();
    assert_eq!(t.manager.get_recovered_sig_for_get_data(&s.hash()), Some(s));
    assert_eq!(t.manager.get_recovered_sig_for_get_data(&hash(0x01)), None);
}

#[test]
fn truncated_signature_stays_known_by_hash() {
    let t = Signing::member();
    let s = recovered_sig(&t.q24, hash(0x70), t.signable(55));
    t.manager.process_message_recovered_sig(1, s.clone());
    t.manager.process_pending_recovered_sigs();

    t.manager.truncate_recovered_sig(&s.id);
    assert!(!t.manager.has_recovered_sig_for_id(&s.id));
    assert!(t.manager.already_have(&s.hash()));
    t.manager.process_message_recovered_sig(2, s);
    assert_eq!(t.manager.pending_count(), 0);
}

#[test]
fn saturated_pass_asks_for_another() {
    let config = SigningConfig {
        max_batch_sessions: 2,
        ..SigningConfig::default()
    };
    let t = Signing::new(Some(1), config);
    let sigs: Vec<_> = (0..3u8)
        .map(|n| recovered_sig(&t.q24, hash(0x70 + n), t.signable(55)))
        .collect();
    for (peer, s) in sigs.iter().enumerate() {
        t.manager.process_message_recovered_sig(peer as i64 + 1, s.clone());
    }

    assert!(t.manager.process_pending_recovered_sigs());
    assert_eq!(t.manager.pending_count(), 1);
    assert!(!t.manager.process_pending_recovered_sigs());
    assert!(sigs.iter().all(|s| t.manager.has_recovered_sig(&s.id, &s.msg_hash)));
}

#[test]
fn member_signs_each_id_once() {
    let t = Signing::member();
    let id = hash(0x70);
    let msg = hash(0x80);

    assert!(t.manager.async_sign_if_member(&id, &msg, None, false));
    assert!(t.manager.has_voted_on_id(&id));
    assert_eq!(t.manager.get_vote_for_id(&id), Some(msg));
    assert_eq!(t.signer.signed.lock().len(), 1);

    assert!(!t.manager.async_sign_if_member(&id, &msg, None, false));
    assert!(!t.manager.async_sign_if_member(&id, &hash(0x81), None, true));
    assert_eq!(t.signer.signed.lock().len(), 1);

    assert!(t.manager.async_sign_if_member(&id, &msg, None, true));
    assert_eq!(t.signer.signed.lock().len(), 2);
    assert_eq!(t.signer.reannounced.lock().clone(), vec![(id, msg)]);
}

#[test]
fn signing_uses_the_requested_quorum() {
    let t = Signing::member();
    let id = hash(0x70);
    assert!(t
        .manager
        .async_sign_if_member(&id, &hash(0x80), Some(t.q24.quorum_hash()), false));
    assert_eq!(t.signer.signed.lock()[0].0, t.q24.quorum_hash());
    assert!(!t.manager.async_sign_if_member(&hash(0x71), &hash(0x80), Some(hash(0x12)), false));
}

#[test]
fn existing_recovered_signature_answers_without_signing() {
    let t = Signing::member();
    let s = recovered_sig(&t.q24, hash(0x70), t.signable(55));
    t.manager.process_message_recovered_sig(1, s.clone());
    t.manager.process_pending_recovered_sigs();

    assert!(t.manager.async_sign_if_member(&s.id, &s.msg_hash, None, false));
    assert!(t.signer.signed.lock().is_empty());
}

#[test]
fn outsiders_never_sign() {
    let outsider = Signing::new(Some(9), SigningConfig::default());
    assert!(!outsider.manager.async_sign_if_member(&hash(0x70), &hash(0x80), None, false));
    assert!(!outsider.manager.has_voted_on_id(&hash(0x70)));

    let plain = Signing::new(None, SigningConfig::default());
    assert!(!plain.manager.async_sign_if_member(&hash(0x70), &hash(0x80), None, false));
    assert!(plain.signer.signed.lock().is_empty());
}

#[test]
fn cleanup_prunes_old_signatures_and_votes() {
    let config = SigningConfig {
        max_recovered_sig_age_secs: 3_600,
        ..SigningConfig::default()
    };
    let t = Signing::new(Some(1), config);
    let s = recovered_sig(&t.q24, hash(0x70), t.signable(55));
    t.manager.process_message_recovered_sig(1, s.clone());
    t.manager.process_pending_recovered_sigs();
    assert!(t.manager.async_sign_if_member(&hash(0x71), &hash(0x80), None, false));

    t.clock.advance_secs(1_800);
    t.manager.cleanup();
    assert!(t.manager.has_recovered_sig(&s.id, &s.msg_hash));
    assert!(t.manager.has_voted_on_id(&hash(0x71)));

    t.clock.advance_secs(1_801);
    t.manager.cleanup();
    assert!(!t.manager.has_recovered_sig(&s.id, &s.msg_hash));
    assert!(!t.manager.already_have(&s.hash()));
    assert!(!t.manager.has_voted_on_id(&hash(0x71)));
}

#[test]
fn cleanup_waits_for_its_interval() {
    let config = SigningConfig {
        max_recovered_sig_age_secs: 10,
        cleanup_interval_ms: 60_000,
        ..SigningConfig::default()
    };
    let t = Signing::new(Some(1), config);
    let s = recovered_sig(&t.q24, hash(0x70), t.signable(55));
    t.manager.process_message_recovered_sig(1, s.clone());
    t.manager.process_pending_recovered_sigs();

    t.clock.advance_secs(30);
    t.manager.cleanup();
    assert!(t.manager.has_recovered_sig(&s.id, &s.msg_hash));

    t.clock.advance_secs(31);
    t.manager.cleanup();
    assert!(!t.manager.has_recovered_sig(&s.id, &s.msg_hash));
}

#[test]
fn unregistered_listener_is_not_notified() {
    let t = Signing::member();
    let listener: Arc<dyn RecoveredSigListener> = t.listener.clone();
    t.manager.unregister_listener(&listener);
    let s = recovered_sig(&t.q24, hash(0x70), t.signable(55));
    t.manager.process_message_recovered_sig(1, s);
    t.manager.process_pending_recovered_sigs();
    assert_eq!(t.seen(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn worker_processes_queued_signatures_until_shutdown() {
    let config = SigningConfig {
        worker_idle_ms: 10,
        ..SigningConfig::default()
    };
    let t = Signing::new(Some(1), config);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = spawn_signing_worker(t.manager.clone(), shutdown_rx);

    let s = recovered_sig(&t.q48, hash(0x70), t.signable(55));
    t.manager.process_message_recovered_sig(1, s.clone());
    let mut stored = false;
    for _ in 0..500 {
        if t.manager.has_recovered_sig(&s.id, &s.msg_hash) {
            stored = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(stored, "worker never accepted the signature");

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), worker)
        .await
        .expect("worker stops")
        .unwrap();
}
