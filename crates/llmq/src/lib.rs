// Path: crates/llmq/src/lib.rs
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
//! Long-living masternode quorums.
//!
//! The [`QuorumSessionHandler`] runs the DKG phase machine for a quorum type
//! and hands finished commitments to the [`QuorumBlockProcessor`]. Once mined,
//! quorums are served by the [`QuorumManager`], and the [`SigningManager`]
//! accepts, verifies and persists the threshold signatures they recover.

pub mod batch;
pub mod blockprocessor;
pub mod commitment;
pub mod debug;
pub mod handler;
pub mod messages;
pub mod pending;
pub mod phase;
pub mod queries;
pub mod quorums;
pub mod session;
pub mod signing;
pub mod utils;

pub use blockprocessor::{MinedCommitment, QuorumBlockProcessor};
pub use debug::{DkgDebugManager, DkgDebugStatus};
pub use handler::{HandlerDeps, PhaseState, QuorumSessionHandler};
pub use messages::{DkgMessage, DkgMessageKind};
pub use pending::PendingMessageQueue;
pub use phase::QuorumPhase;
pub use queries::QuorumQueries;
pub use quorums::{Quorum, QuorumManager, RecoveredSigVerdict, SIGN_HEIGHT_OFFSET};
pub use session::{CommitmentPool, DkgSession, PreVerifyFailure, QuorumMemberSource};
pub use signing::{RecoveredSigListener, RecoveredSigStore, RecoveredSignature, SigShareSigner, SigningManager};
