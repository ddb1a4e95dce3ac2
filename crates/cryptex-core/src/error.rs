//! Error types for the Vault engine.

use cryptex_crypto::CryptoError;
use cryptex_keystore::KeyStoreError;
use cryptex_proto::{ErrorCode, Handle};
use thiserror::Error;

use crate::handle_table::TableError;

/// Result type for Vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

/// Errors raised by the [`crate::Vault`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    /// Handle names an object of another kind
    #[error("handle {handle:?} is a {actual}, expected a {expected}")]
    WrongKind {
        /// The presented handle
        handle: Handle,
        /// Kind the operation needs
        expected: &'static str,
        /// Kind actually stored
        actual: &'static str,
    },

    /// Argument rejected before reaching Crypto Core
    #[error("invalid parameter: {reason}")]
    InvalidParameter {
        /// What was wrong
        reason: &'static str,
    },

    /// Input larger than the per-call payload bound
    #[error("payload of {len} bytes exceeds limit of {max}")]
    PayloadTooLarge {
        /// Bytes offered
        len: usize,
        /// Configured bound
        max: usize,
    },

    /// Operation is declared but not provided
    #[error("not supported: {what}")]
    NotSupported {
        /// What was requested
        what: &'static str,
    },

    /// Key store operation on a vault without a key store
    #[error("no key store attached")]
    NoKeyStore,

    /// Crypto Core failure
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Key store failure
    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),

    /// Handle table failure
    #[error(transparent)]
    Table(#[from] TableError),
}

impl VaultError {
    /// Boundary code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::WrongKind { .. } => ErrorCode::InvalidHandle,
            Self::InvalidParameter { .. } | Self::PayloadTooLarge { .. } => {
                ErrorCode::InvalidParameter
            },
            Self::NotSupported { .. } | Self::NoKeyStore => ErrorCode::NotSupported,
            Self::Crypto(err) => err.code(),
            Self::KeyStore(err) => err.code(),
            Self::Table(err) => err.code(),
        }
    }
}

impl From<VaultError> for ErrorCode {
    fn from(err: VaultError) -> Self {
        err.code()
    }
}
