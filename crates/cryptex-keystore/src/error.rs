//! Key store error types.

use cryptex_crypto::CryptoError;
use cryptex_proto::ErrorCode;
use thiserror::Error;

use crate::file_store::FileStoreError;

/// Result type for key store operations.
pub type Result<T> = std::result::Result<T, KeyStoreError>;

/// Errors raised by the key store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyStoreError {
    /// Entry name violates the naming rules
    #[error("invalid key name: {reason}")]
    InvalidName {
        /// Which rule was broken
        reason: &'static str,
    },

    /// Only symmetric keys can be stored
    #[error("key type {key_type} cannot be stored")]
    UnsupportedKeyType {
        /// Numeric key type id
        key_type: u32,
    },

    /// Raw key is longer than the configured maximum
    #[error("key of {len} bytes exceeds the {max} byte limit")]
    KeyTooLong {
        /// Raw key length
        len: usize,
        /// Configured maximum
        max: usize,
    },

    /// An entry with this name exists already
    #[error("key '{name}' already stored")]
    Duplicate {
        /// Entry name
        name: String,
    },

    /// No entry with this name
    #[error("key '{name}' not found")]
    NotFound {
        /// Entry name
        name: String,
    },

    /// Stored entry failed authentication or decoding
    #[error("key '{name}' is corrupt: {reason}")]
    Corrupt {
        /// Entry name
        name: String,
        /// What failed
        reason: &'static str,
    },

    /// Entry write failed and the partial file is still on the medium
    #[error("key '{name}' write failed ({write}); partial entry left behind: {cleanup}")]
    PartialEntry {
        /// Entry name
        name: String,
        /// Failure that aborted the write
        write: FileStoreError,
        /// Failure removing the partial file
        cleanup: FileStoreError,
    },

    /// Crypto Core rejected the key or failed
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// File store failed
    #[error(transparent)]
    File(#[from] FileStoreError),
}

impl KeyStoreError {
    /// Boundary code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidName { .. } | Self::KeyTooLong { .. } => ErrorCode::InvalidParameter,
            Self::UnsupportedKeyType { .. } => ErrorCode::NotSupported,
            Self::Duplicate { .. } => ErrorCode::InsufficientSpace,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Corrupt { .. } => ErrorCode::Generic,
            Self::PartialEntry { write, .. } => write.code(),
            Self::Crypto(err) => err.code(),
            Self::File(err) => err.code(),
        }
    }
}

impl From<KeyStoreError> for ErrorCode {
    fn from(err: KeyStoreError) -> Self {
        err.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_codes() {
        assert_eq!(
            KeyStoreError::Duplicate { name: "k".to_string() }.code(),
            ErrorCode::InsufficientSpace
        );
        assert_eq!(KeyStoreError::NotFound { name: "k".to_string() }.code(), ErrorCode::NotFound);
        assert_eq!(
            KeyStoreError::Corrupt { name: "k".to_string(), reason: "tag" }.code(),
            ErrorCode::Generic
        );
        assert_eq!(KeyStoreError::UnsupportedKeyType { key_type: 2 }.code(), ErrorCode::NotSupported);
        assert_eq!(
            KeyStoreError::File(FileStoreError::Io("disk".to_string())).code(),
            ErrorCode::Generic
        );
        assert_eq!(KeyStoreError::Crypto(CryptoError::NoKeyMaterial).code(), ErrorCode::NotFound);
    }
}
