// Path: crates/node/src/runtime.rs
//! Background task lifecycle.

use crate::node::QuorumNode;
use mnq_llmq::signing::spawn_signing_worker;
use mnq_types::error::CoreError;
use std::sync::atomic::Ordering;

impl QuorumNode {
    /// Spawns the signing worker, the phase handler and the metrics endpoint.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), CoreError> {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return Err(CoreError::Custom("node already running".into()));
        }
        self.shutdown_sender.send_replace(false);
        let shutdown_rx = self.shutdown_sender.subscribe();
        let mut handles = self.task_handles.lock();

        handles.push(spawn_signing_worker(self.signing.clone(), shutdown_rx.clone()));
        if let Some(handler) = &self.handler {
            handles.push(handler.clone().spawn(shutdown_rx.clone()));
        }
        if let Some(addr) = self.config.telemetry.metrics_addr {
            handles.push(tokio::spawn(mnq_telemetry::http::run_server(addr, shutdown_rx)));
        }

        tracing::info!(target: "node", event = "started", tasks = handles.len());
        Ok(())
    }

    /// Signals every task to stop and waits for them.
    pub async fn stop(&self) -> Result<(), CoreError> {
        if !self.is_running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!(target: "node", event = "stopping");
        self.shutdown_sender.send_replace(true);
        mnq_telemetry::http::set_ready(false);

        let handles: Vec<_> = self.task_handles.lock().drain(..).collect();
        for handle in handles {
            handle
                .await
                .map_err(|e| CoreError::Custom(format!("task panicked: {e}")))?;
        }
        tracing::info!(target: "node", event = "stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }
}
