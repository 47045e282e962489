// Path: crates/telemetry/src/sinks.rs
//! Defines abstract traits for metrics reporting, decoupling core logic from the backend.

use once_cell::sync::OnceCell;

// --- Static Sink Access ---

/// A no-op sink for use in tests or when telemetry is disabled.
#[derive(Debug, Clone, Copy)]
pub struct NopSink;

/// A lazily-initialized static reference to the global `MetricsSink` implementation.
pub static SINK: OnceCell<&'static dyn MetricsSink> = OnceCell::new();
static NOP_SINK: NopSink = NopSink;

/// Returns the configured error metrics sink, or a no-op sink.
pub fn error_metrics() -> &'static dyn ErrorMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Returns the configured membership metrics sink, or a no-op sink.
pub fn membership_metrics() -> &'static dyn MembershipMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Returns the configured DKG metrics sink, or a no-op sink.
pub fn dkg_metrics() -> &'static dyn DkgMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Returns the configured signing metrics sink, or a no-op sink.
pub fn signing_metrics() -> &'static dyn SigningMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

// --- Trait Definitions ---

/// A sink for metrics related to the persistent key-value store.
pub trait StorageMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments the total number of bytes written by committed batches.
    fn inc_bytes_written_total(&self, bytes: u64);
    /// Increments the total number of keys removed by committed batches.
    fn inc_keys_deleted(&self, count: u64);
}
impl StorageMetricsSink for NopSink {
    fn inc_bytes_written_total(&self, _bytes: u64) {}
    fn inc_keys_deleted(&self, _count: u64) {}
}

/// A sink for metrics of the masternode membership ledger.
pub trait MembershipMetricsSink: Send + Sync + std::fmt::Debug {
    /// Observes the time spent deriving the ledger of one block.
    fn observe_block_processing(&self, duration_secs: f64);
    /// Sets the gauges for the total and valid record counts at the tip.
    fn set_masternode_counts(&self, total: usize, valid: usize);
    /// Increments the counter of blocks rejected, labeled by reject reason.
    fn inc_blocks_rejected(&self, reason: &'static str);
    /// Increments the counter of PoSe punishments applied.
    fn inc_pose_punishments(&self);
    /// Increments the counter of records newly banned by PoSe.
    fn inc_pose_bans(&self);
}
impl MembershipMetricsSink for NopSink {
    fn observe_block_processing(&self, _duration_secs: f64) {}
    fn set_masternode_counts(&self, _total: usize, _valid: usize) {}
    fn inc_blocks_rejected(&self, _reason: &'static str) {}
    fn inc_pose_punishments(&self) {}
    fn inc_pose_bans(&self) {}
}

/// A sink for metrics of the DKG phase handler.
pub trait DkgMetricsSink: Send + Sync + std::fmt::Debug {
    /// Sets a gauge vector marking the phase the handler is in.
    fn set_phase(&self, phase: &'static str);
    /// Increments the counter of abandoned DKG cycles.
    fn inc_phase_aborts(&self);
    /// Increments the counter of DKG messages accepted into a pending queue, labeled by kind.
    fn inc_messages_received(&self, kind: &'static str);
    /// Increments the counter of DKG messages dropped by a pending queue, labeled by kind and reason.
    fn inc_messages_dropped(&self, kind: &'static str, reason: &'static str);
    /// Increments the counter of peers flagged by batch verification, labeled by kind.
    fn inc_bad_sources(&self, kind: &'static str, count: u64);
}
impl DkgMetricsSink for NopSink {
    fn set_phase(&self, _phase: &'static str) {}
    fn inc_phase_aborts(&self) {}
    fn inc_messages_received(&self, _kind: &'static str) {}
    fn inc_messages_dropped(&self, _kind: &'static str, _reason: &'static str) {}
    fn inc_bad_sources(&self, _kind: &'static str, _count: u64) {}
}

/// A sink for metrics of the recovered-signature pipeline.
pub trait SigningMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments the counter of recovered signatures accepted.
    fn inc_recovered_sigs(&self);
    /// Observes the duration of one batch verification pass.
    fn observe_batch_verify_duration(&self, duration_secs: f64);
    /// Increments the counter of peers flagged for bad recovered signatures.
    fn inc_bad_sources(&self, count: u64);
    /// Increments the counter of recovered signatures and votes pruned by age.
    fn inc_pruned(&self, count: u64);
    /// Increments the counter of recovered signatures conflicting with an existing one.
    fn inc_conflicts(&self);
}
impl SigningMetricsSink for NopSink {
    fn inc_recovered_sigs(&self) {}
    fn observe_batch_verify_duration(&self, _duration_secs: f64) {}
    fn inc_bad_sources(&self, _count: u64) {}
    fn inc_pruned(&self, _count: u64) {}
    fn inc_conflicts(&self) {}
}

/// A sink for recording structured error metrics.
pub trait ErrorMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments a counter for a specific error, categorized by its kind and variant.
    fn inc_error(&self, kind: &'static str, variant: &'static str);
}
impl ErrorMetricsSink for NopSink {
    fn inc_error(&self, _kind: &'static str, _variant: &'static str) {}
}

/// A unified sink that implements all domain-specific traits, providing a single
/// point of implementation for metrics backends like Prometheus.
pub trait MetricsSink:
    StorageMetricsSink + MembershipMetricsSink + DkgMetricsSink + SigningMetricsSink + ErrorMetricsSink
{
}

impl<T> MetricsSink for T where
    T: StorageMetricsSink
        + MembershipMetricsSink
        + DkgMetricsSink
        + SigningMetricsSink
        + ErrorMetricsSink
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_fall_back_to_nop() {
        // Never installed in unit tests; every call must be a silent no-op.
        membership_metrics().set_masternode_counts(3, 2);
        dkg_metrics().set_phase("Contribute");
        signing_metrics().inc_pruned(4);
        error_metrics().inc_error("membership", "bad-protx-hash");
    }
}
