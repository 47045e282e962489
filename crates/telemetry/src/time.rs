// Path: crates/telemetry/src/time.rs
use crate::sinks::MembershipMetricsSink;
use std::time::Instant;

/// Observes the time spent applying one block to the membership ledger when dropped.
pub struct Timer<'a> {
    sink: &'a dyn MembershipMetricsSink,
    start: Instant,
}

impl<'a> Timer<'a> {
    pub fn new(sink: &'a dyn MembershipMetricsSink) -> Self {
        Self {
            sink,
            start: Instant::now(),
        }
    }
}

impl Drop for Timer<'_> {
    fn drop(&mut self) {
        self.sink
            .observe_block_processing(self.start.elapsed().as_secs_f64());
    }
}
