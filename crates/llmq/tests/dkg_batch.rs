// Path: crates/llmq/tests/dkg_batch.rs
mod common;

use common::{MockSession, BAN_PAYLOAD, MEMBER_SEEDS, SKIP_PAYLOAD};
use mnq_llmq::batch::{process_pending_batch, verify_message_sigs, DKG_MISBEHAVIOR_SCORE};
use mnq_llmq::{DkgMessage, DkgMessageKind, PendingMessageQueue};
use mnq_test_utils::fixtures::{bls_key, hash};
use mnq_test_utils::RecordingPeers;

const KIND: DkgMessageKind = DkgMessageKind::Contribution;

fn session() -> MockSession {
    MockSession::new(&MEMBER_SEEDS)
}

/// A message claiming to be from `seed` but signed with another key.
fn forged(session: &MockSession, seed: u8, payload: Vec<u8>) -> DkgMessage {
    let mut msg = session.signed(KIND, hash(0x24), seed, payload);
    msg.sig = bls_key(99).sign_hash(&msg.sign_hash()).compress();
    msg
}

#[test]
fn valid_messages_from_many_peers_pass_the_aggregate_check() {
    let s = session();
    let messages: Vec<_> = MEMBER_SEEDS
        .iter()
        .map(|seed| (i64::from(*seed), s.signed(KIND, hash(0x24), *seed, vec![*seed])))
        .collect();
    assert!(verify_message_sigs(&s, &messages).is_empty());
}

#[test]
fn a_single_sender_is_blamed_for_any_bad_signature() {
    let s = session();
    let messages = vec![
        (7, s.signed(KIND, hash(0x24), 1, vec![1])),
        (7, forged(&s, 2, vec![2])),
    ];
    let bad = verify_message_sigs(&s, &messages);
    assert_eq!(bad.into_iter().collect::<Vec<_>>(), vec![7]);
}

#[test]
fn mixed_senders_fall_back_to_individual_checks() {
    let s = session();
    let messages = vec![
        (1, s.signed(KIND, hash(0x24), 1, vec![1])),
        (2, forged(&s, 2, vec![2])),
        (3, s.signed(KIND, hash(0x24), 3, vec![3])),
    ];
    let bad = verify_message_sigs(&s, &messages);
    assert_eq!(bad.into_iter().collect::<Vec<_>>(), vec![2]);
}

#[test]
fn repeated_sign_hash_skips_the_aggregate() {
    let s = session();
    let good = s.signed(KIND, hash(0x24), 1, vec![1]);
    let mut bad_copy = good.clone();
    bad_copy.sig = bls_key(99).sign_hash(&good.sign_hash()).compress();
    let messages = vec![(1, good), (2, bad_copy)];
    let bad = verify_message_sigs(&s, &messages);
    assert_eq!(bad.into_iter().collect::<Vec<_>>(), vec![2]);
}

#[test]
fn unknown_member_key_marks_the_sender_bad() {
    let s = session();
    let stranger = MockSession::new(&[42]);
    let messages = vec![(5, stranger.signed(KIND, hash(0x24), 42, vec![0]))];
    assert!(verify_message_sigs(&s, &messages).contains(&5));
}

#[test]
fn batch_delivers_good_messages_and_punishes_the_rest() {
    let s = session();
    let peers = RecordingPeers::default();
    let queue = PendingMessageQueue::new(KIND, 6);

    let good = s.signed(KIND, hash(0x24), 1, vec![1]);
    assert!(queue.push(1, good.to_bytes()));
    assert!(queue.push(2, forged(&s, 2, vec![2]).to_bytes()));
    assert!(queue.push(3, vec![0xff, 0x00, 0x01]));
    assert!(queue.push(4, s.signed(KIND, hash(0x24), 3, vec![BAN_PAYLOAD]).to_bytes()));
    assert!(queue.push(5, s.signed(KIND, hash(0x24), 3, vec![SKIP_PAYLOAD]).to_bytes()));
    assert!(queue.push(6, s.signed(DkgMessageKind::Complaint, hash(0x24), 3, vec![3]).to_bytes()));

    assert_eq!(process_pending_batch(&s, &queue, 16, &peers), Some(1));
    assert_eq!(s.received.lock().clone(), vec![good]);
    for peer in [2, 3, 4, 6] {
        assert_eq!(peers.score_of(peer), DKG_MISBEHAVIOR_SCORE, "peer {peer}");
    }
    assert_eq!(peers.score_of(1), 0);
    assert_eq!(peers.score_of(5), 0);
    assert_eq!(process_pending_batch(&s, &queue, 16, &peers), None);
}

#[test]
fn batch_respects_its_size_limit() {
    let s = session();
    let peers = RecordingPeers::default();
    let queue = PendingMessageQueue::new(KIND, 6);
    for n in 0..4u8 {
        queue.push(1, s.signed(KIND, hash(0x24), 1, vec![n]).to_bytes());
    }
    assert_eq!(process_pending_batch(&s, &queue, 3, &peers), Some(3));
    assert_eq!(process_pending_batch(&s, &queue, 3, &peers), Some(1));
    assert_eq!(process_pending_batch(&s, &queue, 3, &peers), None);
}

#[test]
fn batch_with_only_skipped_messages_reports_no_delivery() {
    let s = session();
    let peers = RecordingPeers::default();
    let queue = PendingMessageQueue::new(KIND, 6);
    queue.push(1, s.signed(KIND, hash(0x24), 1, vec![SKIP_PAYLOAD]).to_bytes());
    assert_eq!(process_pending_batch(&s, &queue, 8, &peers), Some(0));
    assert!(peers.misbehaviors().is_empty());
}
