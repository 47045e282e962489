// Path: crates/llmq/src/signing/worker.rs

use super::manager::SigningManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Spawns the signing worker: verify pending signatures, prune, then idle
/// unless the last pass was saturated.
pub fn spawn_signing_worker(manager: Arc<SigningManager>, mut shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
    let idle = Duration::from_millis(manager.config().worker_idle_ms);
    tokio::spawn(async move {
        tracing::info!(target: "llmq::signing", event = "worker_started");
        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            let pass = manager.clone();
            let more = match tokio::task::spawn_blocking(move || {
                let more = pass.process_pending_recovered_sigs();
                pass.cleanup();
                more
            })
            .await
            {
                Ok(more) => more,
                Err(e) => {
                    tracing::error!(target: "llmq::signing", event = "worker_pass_failed", error = %e);
                    false
                }
            };
            if more {
                tokio::task::yield_now().await;
                continue;
            }
            tokio::select! {
                _ = tokio::time::sleep(idle) => {}
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!(target: "llmq::signing", event = "worker_stopped");
    })
}
