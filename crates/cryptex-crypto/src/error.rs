//! Error types for Crypto Core.

use cryptex_proto::ErrorCode;
use thiserror::Error;

/// Result type for Crypto Core operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors raised by Crypto Core sessions and key objects.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Argument is malformed, out of range, or of the wrong kind
    #[error("invalid parameter: {reason}")]
    InvalidParameter {
        /// What was wrong
        reason: &'static str,
    },

    /// Algorithm or combination is not supported
    #[error("not supported: {what}")]
    NotSupported {
        /// What was requested
        what: &'static str,
    },

    /// Operation is not defined for the session's current state
    #[error("invalid state: cannot {operation} in state {state}")]
    InvalidState {
        /// State the session was in
        state: &'static str,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// AEAD tag did not match
    #[error("authentication tag mismatch")]
    AuthenticationFailed,

    /// Signature did not verify
    #[error("signature verification failed")]
    VerificationFailed,

    /// Key flags forbid the operation
    #[error("access denied: {reason}")]
    AccessDenied {
        /// Which permission is missing
        reason: &'static str,
    },

    /// Key has no material attached yet
    #[error("key has no material")]
    NoKeyMaterial,

    /// Key already has material attached
    #[error("key material already attached")]
    MaterialAttached,

    /// Output buffer is too small
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall {
        /// Bytes required
        needed: usize,
        /// Bytes offered
        available: usize,
    },

    /// Entropy source failed
    #[error("entropy source failure: {0}")]
    Entropy(String),

    /// Underlying primitive library failed
    #[error("primitive failure: {0}")]
    Backend(String),
}

impl CryptoError {
    /// Boundary code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidParameter { .. } => ErrorCode::InvalidParameter,
            Self::NotSupported { .. } => ErrorCode::NotSupported,
            Self::InvalidState { .. } | Self::AuthenticationFailed | Self::VerificationFailed => {
                ErrorCode::Aborted
            },
            Self::AccessDenied { .. } => ErrorCode::AccessDenied,
            Self::NoKeyMaterial => ErrorCode::NotFound,
            Self::MaterialAttached => ErrorCode::InsufficientSpace,
            Self::BufferTooSmall { .. } => ErrorCode::BufferTooSmall,
            Self::Entropy(_) | Self::Backend(_) => ErrorCode::Generic,
        }
    }

    pub(crate) fn invalid(reason: &'static str) -> Self {
        Self::InvalidParameter { reason }
    }

    pub(crate) fn check_output(needed: usize, available: usize) -> Result<()> {
        if available < needed {
            return Err(Self::BufferTooSmall { needed, available });
        }
        Ok(())
    }
}

impl From<CryptoError> for ErrorCode {
    fn from(err: CryptoError) -> Self {
        err.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_and_authentication_failures_abort() {
        assert_eq!(
            CryptoError::InvalidState { state: "Finalized", operation: "update" }.code(),
            ErrorCode::Aborted
        );
        assert_eq!(CryptoError::AuthenticationFailed.code(), ErrorCode::Aborted);
        assert_eq!(CryptoError::VerificationFailed.code(), ErrorCode::Aborted);
    }

    #[test]
    fn key_material_conditions_are_distinct() {
        assert_eq!(CryptoError::NoKeyMaterial.code(), ErrorCode::NotFound);
        assert_eq!(CryptoError::MaterialAttached.code(), ErrorCode::InsufficientSpace);
        assert_ne!(CryptoError::NoKeyMaterial.code(), CryptoError::invalid("x").code());
    }

    #[test]
    fn output_check() {
        assert!(CryptoError::check_output(16, 16).is_ok());
        assert_eq!(
            CryptoError::check_output(16, 15),
            Err(CryptoError::BufferTooSmall { needed: 16, available: 15 })
        );
    }
}
