// Path: crates/telemetry/src/prometheus.rs
//! A concrete implementation of the metrics sinks using the Prometheus crate.

use crate::sinks::*;
use once_cell::sync::OnceCell;
use prometheus::{
    exponential_buckets, register_gauge_vec, register_histogram, register_int_counter,
    register_int_counter_vec, register_int_gauge, GaugeVec, Histogram, IntCounter, IntCounterVec,
    IntGauge,
};

// --- Metric Statics ---

static STORAGE_BYTES_WRITTEN_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static STORAGE_KEYS_DELETED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static MN_BLOCK_PROCESSING_SECONDS: OnceCell<Histogram> = OnceCell::new();
static MN_TOTAL: OnceCell<IntGauge> = OnceCell::new();
static MN_VALID: OnceCell<IntGauge> = OnceCell::new();
static MN_BLOCKS_REJECTED_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static MN_POSE_PUNISHMENTS_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static MN_POSE_BANS_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static DKG_PHASE: OnceCell<GaugeVec> = OnceCell::new();
static DKG_PHASE_ABORTS_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static DKG_MESSAGES_RECEIVED_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static DKG_MESSAGES_DROPPED_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static DKG_BAD_SOURCES_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static SIGNING_RECOVERED_SIGS_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static SIGNING_BATCH_VERIFY_SECONDS: OnceCell<Histogram> = OnceCell::new();
static SIGNING_BAD_SOURCES_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static SIGNING_PRUNED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static SIGNING_CONFLICTS_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static ERRORS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();

const DKG_PHASES: [&str; 7] = [
    "Idle",
    "Initialized",
    "Contribute",
    "Complain",
    "Justify",
    "Commit",
    "Finalize",
];

#[derive(Debug, Clone, Copy)]
pub struct PrometheusSink;

/// Fetches an installed collector. Panics if `install()` has not run, which
/// is a setup error in the binary.
macro_rules! get_metric {
    ($metric:ident) => {
        $metric
            .get()
            .expect("Prometheus sink not initialized. Call telemetry::prometheus::install() first.")
    };
}

impl StorageMetricsSink for PrometheusSink {
    fn inc_bytes_written_total(&self, bytes: u64) {
        get_metric!(STORAGE_BYTES_WRITTEN_TOTAL).inc_by(bytes);
    }
    fn inc_keys_deleted(&self, count: u64) {
        get_metric!(STORAGE_KEYS_DELETED_TOTAL).inc_by(count);
    }
}

impl MembershipMetricsSink for PrometheusSink {
    fn observe_block_processing(&self, duration_secs: f64) {
        get_metric!(MN_BLOCK_PROCESSING_SECONDS).observe(duration_secs);
    }
    fn set_masternode_counts(&self, total: usize, valid: usize) {
        get_metric!(MN_TOTAL).set(total as i64);
        get_metric!(MN_VALID).set(valid as i64);
    }
    fn inc_blocks_rejected(&self, reason: &'static str) {
        get_metric!(MN_BLOCKS_REJECTED_TOTAL)
            .with_label_values(&[reason])
            .inc();
    }
    fn inc_pose_punishments(&self) {
        get_metric!(MN_POSE_PUNISHMENTS_TOTAL).inc();
    }
    fn inc_pose_bans(&self) {
        get_metric!(MN_POSE_BANS_TOTAL).inc();
    }
}

impl DkgMetricsSink for PrometheusSink {
    fn set_phase(&self, phase: &'static str) {
        for p in DKG_PHASES {
            get_metric!(DKG_PHASE)
                .with_label_values(&[p])
                .set(if p == phase { 1.0 } else { 0.0 });
        }
    }
    fn inc_phase_aborts(&self) {
        get_metric!(DKG_PHASE_ABORTS_TOTAL).inc();
    }
    fn inc_messages_received(&self, kind: &'static str) {
        get_metric!(DKG_MESSAGES_RECEIVED_TOTAL)
            .with_label_values(&[kind])
            .inc();
    }
    fn inc_messages_dropped(&self, kind: &'static str, reason: &'static str) {
        get_metric!(DKG_MESSAGES_DROPPED_TOTAL)
            .with_label_values(&[kind, reason])
            .inc();
    }
    fn inc_bad_sources(&self, kind: &'static str, count: u64) {
        get_metric!(DKG_BAD_SOURCES_TOTAL)
            .with_label_values(&[kind])
            .inc_by(count);
    }
}

impl SigningMetricsSink for PrometheusSink {
    fn inc_recovered_sigs(&self) {
        get_metric!(SIGNING_RECOVERED_SIGS_TOTAL).inc();
    }
    fn observe_batch_verify_duration(&self, duration_secs: f64) {
        get_metric!(SIGNING_BATCH_VERIFY_SECONDS).observe(duration_secs);
    }
    fn inc_bad_sources(&self, count: u64) {
        get_metric!(SIGNING_BAD_SOURCES_TOTAL).inc_by(count);
    }
    fn inc_pruned(&self, count: u64) {
        get_metric!(SIGNING_PRUNED_TOTAL).inc_by(count);
    }
    fn inc_conflicts(&self) {
        get_metric!(SIGNING_CONFLICTS_TOTAL).inc();
    }
}

impl ErrorMetricsSink for PrometheusSink {
    fn inc_error(&self, kind: &'static str, variant: &'static str) {
        get_metric!(ERRORS_TOTAL)
            .with_label_values(&[kind, variant])
            .inc();
    }
}

/// Registers all collectors with the default registry and returns the sink.
/// Must be called once at startup, before the sink is published in `SINK`.
#[allow(clippy::expect_used)]
pub fn install() -> Result<&'static dyn MetricsSink, prometheus::Error> {
    STORAGE_BYTES_WRITTEN_TOTAL
        .set(register_int_counter!(
            "mnq_storage_bytes_written_total",
            "Total bytes written by committed storage batches."
        )?)
        .expect("static already initialized");
    STORAGE_KEYS_DELETED_TOTAL
        .set(register_int_counter!(
            "mnq_storage_keys_deleted_total",
            "Total keys removed by committed storage batches."
        )?)
        .expect("static already initialized");
    MN_BLOCK_PROCESSING_SECONDS
        .set(register_histogram!(
            "mnq_membership_block_processing_seconds",
            "Latency of deriving the masternode list of one block.",
            exponential_buckets(0.0005, 2.0, 15)?
        )?)
        .expect("static already initialized");
    MN_TOTAL
        .set(register_int_gauge!(
            "mnq_membership_masternodes",
            "Number of registered masternodes at the tip."
        )?)
        .expect("static already initialized");
    MN_VALID
        .set(register_int_gauge!(
            "mnq_membership_valid_masternodes",
            "Number of registered, non-banned masternodes at the tip."
        )?)
        .expect("static already initialized");
    MN_BLOCKS_REJECTED_TOTAL
        .set(register_int_counter_vec!(
            "mnq_membership_blocks_rejected_total",
            "Blocks whose provider transactions violated consensus, by reason.",
            &["reason"]
        )?)
        .expect("static already initialized");
    MN_POSE_PUNISHMENTS_TOTAL
        .set(register_int_counter!(
            "mnq_membership_pose_punishments_total",
            "Total PoSe punishments applied."
        )?)
        .expect("static already initialized");
    MN_POSE_BANS_TOTAL
        .set(register_int_counter!(
            "mnq_membership_pose_bans_total",
            "Total masternodes banned by PoSe."
        )?)
        .expect("static already initialized");
    DKG_PHASE
        .set(register_gauge_vec!(
            "mnq_dkg_phase",
            "Current DKG phase of the handler (1 if active, 0 otherwise).",
            &["phase"]
        )?)
        .expect("static already initialized");
    DKG_PHASE_ABORTS_TOTAL
        .set(register_int_counter!(
            "mnq_dkg_phase_aborts_total",
            "Total DKG cycles abandoned before finalization."
        )?)
        .expect("static already initialized");
    DKG_MESSAGES_RECEIVED_TOTAL
        .set(register_int_counter_vec!(
            "mnq_dkg_messages_received_total",
            "DKG messages accepted into the pending queues, by kind.",
            &["kind"]
        )?)
        .expect("static already initialized");
    DKG_MESSAGES_DROPPED_TOTAL
        .set(register_int_counter_vec!(
            "mnq_dkg_messages_dropped_total",
            "DKG messages refused by the pending queues, by kind and reason.",
            &["kind", "reason"]
        )?)
        .expect("static already initialized");
    DKG_BAD_SOURCES_TOTAL
        .set(register_int_counter_vec!(
            "mnq_dkg_bad_sources_total",
            "Peers flagged by DKG batch verification, by message kind.",
            &["kind"]
        )?)
        .expect("static already initialized");
    SIGNING_RECOVERED_SIGS_TOTAL
        .set(register_int_counter!(
            "mnq_signing_recovered_sigs_total",
            "Total recovered signatures accepted."
        )?)
        .expect("static already initialized");
    SIGNING_BATCH_VERIFY_SECONDS
        .set(register_histogram!(
            "mnq_signing_batch_verify_seconds",
            "Latency of one recovered-signature batch verification pass.",
            exponential_buckets(0.0005, 2.0, 15)?
        )?)
        .expect("static already initialized");
    SIGNING_BAD_SOURCES_TOTAL
        .set(register_int_counter!(
            "mnq_signing_bad_sources_total",
            "Peers flagged for sending invalid recovered signatures."
        )?)
        .expect("static already initialized");
    SIGNING_PRUNED_TOTAL
        .set(register_int_counter!(
            "mnq_signing_pruned_total",
            "Recovered signatures and votes pruned by age."
        )?)
        .expect("static already initialized");
    SIGNING_CONFLICTS_TOTAL
        .set(register_int_counter!(
            "mnq_signing_conflicts_total",
            "Recovered signatures conflicting with an existing one for the same id."
        )?)
        .expect("static already initialized");
    ERRORS_TOTAL
        .set(register_int_counter_vec!(
            "mnq_errors_total",
            "Total number of errors, categorized by type and variant.",
            &["kind", "variant"]
        )?)
        .expect("static already initialized");

    static SINK: PrometheusSink = PrometheusSink;
    Ok(&SINK)
}
