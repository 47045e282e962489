// Path: crates/node/src/lib.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::todo,
        clippy::unimplemented,
        clippy::indexing_slicing
    )
)]
//! Node assembly for the masternode quorum core.
//!
//! [`QuorumNode::build`] creates every component exactly once from a
//! [`NodeConfig`](mnq_types::config::NodeConfig) and the collaborator handles
//! the embedding node provides. The embedding node feeds connected and
//! disconnected blocks through the node, and [`QuorumNode::start`] /
//! [`QuorumNode::stop`] own the background tasks.

pub mod node;
pub mod runtime;
pub mod telemetry;

pub use node::{NodeDependencies, QuorumNode};
pub use telemetry::init_telemetry;
