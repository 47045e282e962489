// Path: crates/api/src/error/mod.rs
// Re-export all core error types from the central types crate.
pub use crate::storage::StorageError;
pub use mnq_types::error::{
    CommitmentError, ConfigError, CoreError, CryptoError, DkgError, ErrorCode, LedgerError,
    MembershipError, PropertyField, QueryError, SigningError,
};
pub use mnq_types::Result;

impl From<StorageError> for CoreError {
    fn from(e: StorageError) -> Self {
        CoreError::Storage(e.to_string())
    }
}

impl From<StorageError> for MembershipError {
    fn from(e: StorageError) -> Self {
        MembershipError::Storage(e.to_string())
    }
}

impl From<StorageError> for SigningError {
    fn from(e: StorageError) -> Self {
        SigningError::Storage(e.to_string())
    }
}
