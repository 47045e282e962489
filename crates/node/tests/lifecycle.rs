// Path: crates/node/tests/lifecycle.rs
mod common;

use common::{regtest_config, CycleProbe, TestNode, MEMBER_SEEDS};
use mnq_llmq::QuorumPhase;
use mnq_test_utils::fixtures::hash;
use mnq_types::error::CoreError;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn start_and_stop_are_idempotent_and_restartable() {
    let t = TestNode::new(4, regtest_config(None));
    assert!(!t.node.is_running());

    t.node.start().unwrap();
    assert!(t.node.is_running());
    assert!(matches!(t.node.start(), Err(CoreError::Custom(_))));

    tokio::time::timeout(Duration::from_secs(5), t.node.stop())
        .await
        .expect("tasks stop")
        .unwrap();
    assert!(!t.node.is_running());
    t.node.stop().await.unwrap();

    t.node.start().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    tokio::time::timeout(Duration::from_secs(5), t.node.stop())
        .await
        .expect("tasks stop after restart")
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn metrics_endpoint_stops_with_the_node() {
    let mut config = regtest_config(None);
    config.telemetry.metrics_addr = Some("127.0.0.1:0".parse().unwrap());
    let t = TestNode::new(4, config);

    t.node.start().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    tokio::time::timeout(Duration::from_secs(5), t.node.stop())
        .await
        .expect("metrics server stops")
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connected_tips_drive_the_phase_handler() {
    let probe = Arc::new(CycleProbe::default());
    let t = TestNode::with_session(40, regtest_config(Some(1)), Some(probe.clone()));
    assert!(t.node.handler.is_some());
    t.sync_with_members(23);
    t.node.start().unwrap();

    for h in 24..=27 {
        t.connect(h, Vec::new()).unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
    }
    let handler = t.node.handler.as_ref().unwrap();
    assert_eq!(handler.phase_state().height, 27);
    assert_eq!(handler.phase_state().phase, QuorumPhase::Contribute);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while probe.inits.lock().is_empty() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let inits = probe.inits.lock().clone();
    assert_eq!(inits.len(), 1);
    let (base_height, members) = &inits[0];
    assert_eq!(*base_height, 24);
    let expected: BTreeSet<_> = MEMBER_SEEDS.iter().map(|s| hash(*s)).collect();
    assert_eq!(members.iter().copied().collect::<BTreeSet<_>>(), expected);
    assert_eq!(t.node.debug.status().quorum_hash, t.chain.at(24).unwrap().hash);

    tokio::time::timeout(Duration::from_secs(5), t.node.stop())
        .await
        .expect("handler stops")
        .unwrap();
}
