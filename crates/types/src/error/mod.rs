// Path: crates/types/src/error/mod.rs
//! Core error types for the masternode quorum core.

use crate::primitives::Hash256;
use std::fmt;
use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// A unique property of a masternode record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyField {
    /// The collateral outpoint.
    Collateral,
    /// The service address.
    ServiceAddr,
    /// The owner key id.
    OwnerKey,
    /// The operator public key.
    OperatorKey,
    /// The auxiliary-chain address.
    NevmAddress,
}

impl fmt::Display for PropertyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Collateral => "collateralOutpoint",
            Self::ServiceAddr => "addr",
            Self::OwnerKey => "keyIDOwner",
            Self::OperatorKey => "pubKeyOperator",
            Self::NevmAddress => "nevmAddress",
        })
    }
}

/// Contract violations of ledger mutations. Each failing call leaves the ledger untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A record with this `proTxHash` already exists.
    #[error("duplicate masternode identity {0}")]
    DuplicateIdentity(Hash256),
    /// A record with this internal id already exists.
    #[error("duplicate internal id {0}")]
    DuplicateInternalId(u64),
    /// A unique property collides with another live record.
    #[error("duplicate {field} for masternode {pro_tx_hash} (held by {holder})")]
    DuplicateProperty {
        /// The offending property.
        field: PropertyField,
        /// The record being added or updated.
        pro_tx_hash: Hash256,
        /// The record already holding the property.
        holder: Hash256,
    },
    /// A unique property expected in the index was missing or held by another record.
    #[error("{field} of masternode {pro_tx_hash} is not indexed")]
    PropertyNotIndexed {
        /// The property that could not be removed.
        field: PropertyField,
        /// The record whose property was expected.
        pro_tx_hash: Hash256,
    },
    /// The referenced record does not exist.
    #[error("masternode not found: {0}")]
    NotFound(String),
    /// A persisted snapshot could not be decoded.
    #[error("corrupt ledger snapshot: {0}")]
    Corrupt(String),
}

impl ErrorCode for LedgerError {
    fn code(&self) -> &'static str {
        match self {
            Self::DuplicateIdentity(_) => "LEDGER_DUPLICATE_IDENTITY",
            Self::DuplicateInternalId(_) => "LEDGER_DUPLICATE_INTERNAL_ID",
            Self::DuplicateProperty { .. } => "LEDGER_DUPLICATE_PROPERTY",
            Self::PropertyNotIndexed { .. } => "LEDGER_PROPERTY_NOT_INDEXED",
            Self::NotFound(_) => "LEDGER_NOT_FOUND",
            Self::Corrupt(_) => "LEDGER_CORRUPT",
        }
    }
}

/// Errors raised while deriving the membership ledger of a block.
#[derive(Error, Debug)]
pub enum MembershipError {
    /// On-chain data is malformed or contradicts the current ledger. The block must be rejected.
    #[error("consensus violation {reason}: {detail}")]
    ConsensusViolation {
        /// The stable reject reason, e.g. `bad-protx-dup-addr`.
        reason: &'static str,
        /// Human-readable context.
        detail: String,
    },
    /// A ledger contract violation.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    /// The persistent store failed.
    #[error("storage error: {0}")]
    Storage(String),
    /// A block the operation depends on is unknown to the chain view.
    #[error("unknown block {0}")]
    UnknownBlock(Hash256),
}

impl MembershipError {
    /// Builds a consensus violation.
    pub fn violation(reason: &'static str, detail: impl Into<String>) -> Self {
        Self::ConsensusViolation {
            reason,
            detail: detail.into(),
        }
    }

    /// Returns the consensus reject reason, if this is a consensus violation.
    pub fn reject_reason(&self) -> Option<&'static str> {
        match self {
            Self::ConsensusViolation { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

impl ErrorCode for MembershipError {
    fn code(&self) -> &'static str {
        match self {
            Self::ConsensusViolation { .. } => "MEMBERSHIP_CONSENSUS_VIOLATION",
            Self::Ledger(_) => "MEMBERSHIP_LEDGER",
            Self::Storage(_) => "MEMBERSHIP_STORAGE",
            Self::UnknownBlock(_) => "MEMBERSHIP_UNKNOWN_BLOCK",
        }
    }
}

/// Errors and control-flow signals of the DKG phase handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DkgError {
    /// The current cycle was abandoned: stop requested, quorum changed, or phase regressed.
    #[error("phase aborted")]
    PhaseAborted,
    /// The DKG session could not be initialised for the new quorum.
    #[error("session init failed: {0}")]
    SessionInit(String),
    /// A pending message could not be decoded.
    #[error("decode failed: {0}")]
    Decode(String),
}

impl ErrorCode for DkgError {
    fn code(&self) -> &'static str {
        match self {
            Self::PhaseAborted => "DKG_PHASE_ABORTED",
            Self::SessionInit(_) => "DKG_SESSION_INIT",
            Self::Decode(_) => "DKG_DECODE",
        }
    }
}

/// Internal errors of the signing pipeline. Public signing entry points log these and return `bool`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    /// No quorum could be selected or found.
    #[error("no quorum available: {0}")]
    NoQuorum(String),
    /// The local node is not a valid member of the quorum.
    #[error("not a member of quorum {0}")]
    NotMember(Hash256),
    /// The local node already voted for a different message under this id.
    #[error("conflicting vote for id {id}: voted {voted}, requested {requested}")]
    ConflictingVote {
        /// The request id.
        id: Hash256,
        /// The message hash already voted for.
        voted: Hash256,
        /// The message hash requested now.
        requested: Hash256,
    },
    /// The persistent store failed.
    #[error("storage error: {0}")]
    Storage(String),
    /// A stored or received object could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl ErrorCode for SigningError {
    fn code(&self) -> &'static str {
        match self {
            Self::NoQuorum(_) => "SIGNING_NO_QUORUM",
            Self::NotMember(_) => "SIGNING_NOT_MEMBER",
            Self::ConflictingVote { .. } => "SIGNING_CONFLICTING_VOTE",
            Self::Storage(_) => "SIGNING_STORAGE",
            Self::Decode(_) => "SIGNING_DECODE",
        }
    }
}

/// Reasons a final commitment fails verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommitmentError {
    /// Version zero is reserved.
    #[error("invalid commitment version {0}")]
    Version(u16),
    /// The commitment names a different quorum base block.
    #[error("quorum hash {got} does not match base block {expected}")]
    QuorumHash {
        /// The base block hash.
        expected: Hash256,
        /// The hash carried by the commitment.
        got: Hash256,
    },
    /// A bitset length differs from the quorum size.
    #[error("{field} has {got} bits, expected {expected}")]
    Size {
        /// `signers` or `validMembers`.
        field: &'static str,
        /// The configured quorum size.
        expected: usize,
        /// The bitset length.
        got: usize,
    },
    /// Too few valid members or signers.
    #[error("{field} count {got} below minimum {min}")]
    TooFew {
        /// `signers` or `validMembers`.
        field: &'static str,
        /// Bits set.
        got: usize,
        /// The configured minimum.
        min: usize,
    },
    /// A bit is set for a slot beyond the member count.
    #[error("{field} bit {index} set beyond member count")]
    BitBeyondMembers {
        /// `signers` or `validMembers`.
        field: &'static str,
        /// The offending index.
        index: usize,
    },
    /// A key, hash or signature field is null or malformed.
    #[error("malformed {0}")]
    Malformed(&'static str),
    /// A signature does not verify.
    #[error("invalid {0}")]
    BadSignature(&'static str),
    /// The non-null commitment was expected to be null, or the reverse.
    #[error("unexpected null commitment")]
    Null,
}

impl ErrorCode for CommitmentError {
    fn code(&self) -> &'static str {
        match self {
            Self::Version(_) => "COMMITMENT_VERSION",
            Self::QuorumHash { .. } => "COMMITMENT_QUORUM_HASH",
            Self::Size { .. } => "COMMITMENT_SIZE",
            Self::TooFew { .. } => "COMMITMENT_TOO_FEW",
            Self::BitBeyondMembers { .. } => "COMMITMENT_BIT_BEYOND_MEMBERS",
            Self::Malformed(_) => "COMMITMENT_MALFORMED",
            Self::BadSignature(_) => "COMMITMENT_BAD_SIGNATURE",
            Self::Null => "COMMITMENT_NULL",
        }
    }
}

/// Errors of the operator query surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// A parameter is missing or malformed.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// The requested object does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// A collaborator failed while answering.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ErrorCode for QueryError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidParameter(_) => "QUERY_INVALID_PARAMETER",
            Self::NotFound(_) => "QUERY_NOT_FOUND",
            Self::Internal(_) => "QUERY_INTERNAL",
        }
    }
}

/// Errors from cryptographic primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Bytes do not encode a valid public key.
    #[error("invalid public key")]
    InvalidKey,
    /// Bytes do not encode a valid signature.
    #[error("invalid signature")]
    InvalidSignature,
    /// An aggregation was attempted over an empty set.
    #[error("nothing to aggregate")]
    EmptyAggregate,
    /// The underlying library rejected the operation.
    #[error("bls operation failed: {0}")]
    Bls(String),
}

impl ErrorCode for CryptoError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidKey => "CRYPTO_INVALID_KEY",
            Self::InvalidSignature => "CRYPTO_INVALID_SIGNATURE",
            Self::EmptyAggregate => "CRYPTO_EMPTY_AGGREGATE",
            Self::Bls(_) => "CRYPTO_BLS",
        }
    }
}

/// Errors loading or validating configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// The configuration text is not valid TOML for this schema.
    #[error("config parse error: {0}")]
    Parse(String),
    /// The values are inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "CONFIG_IO",
            Self::Parse(_) => "CONFIG_PARSE",
            Self::Invalid(_) => "CONFIG_INVALID",
        }
    }
}

/// The workspace-wide umbrella error.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A ledger contract violation.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// A membership processing failure.
    #[error(transparent)]
    Membership(#[from] MembershipError),
    /// A DKG failure or abort.
    #[error(transparent)]
    Dkg(#[from] DkgError),
    /// A signing pipeline failure.
    #[error(transparent)]
    Signing(#[from] SigningError),
    /// A final commitment failed verification.
    #[error(transparent)]
    Commitment(#[from] CommitmentError),
    /// A query could not be answered.
    #[error(transparent)]
    Query(#[from] QueryError),
    /// A cryptographic failure.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    /// A configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A persistent store failure.
    #[error("storage error: {0}")]
    Storage(String),
    /// Any other failure.
    #[error("{0}")]
    Custom(String),
}

impl ErrorCode for CoreError {
    fn code(&self) -> &'static str {
        match self {
            Self::Ledger(e) => e.code(),
            Self::Membership(e) => e.code(),
            Self::Dkg(e) => e.code(),
            Self::Signing(e) => e.code(),
            Self::Commitment(e) => e.code(),
            Self::Query(e) => e.code(),
            Self::Crypto(e) => e.code(),
            Self::Config(e) => e.code(),
            Self::Storage(_) => "CORE_STORAGE",
            Self::Custom(_) => "CORE_CUSTOM",
        }
    }
}
