//! Server error types.

use cryptex_core::VaultError;
use cryptex_crypto::CryptoError;
use cryptex_keystore::KeyStoreError;
use cryptex_proto::{ErrorCode, ProtocolError};
use thiserror::Error;

/// Errors raised while configuring the server or serving a call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// Startup configuration is unusable.
    ///
    /// Fatal: fix the arguments and restart.
    #[error("configuration error: {reason}")]
    Config {
        /// What was wrong
        reason: String,
    },

    /// Request header failed to parse
    #[error("malformed request: {0}")]
    Protocol(ProtocolError),

    /// Opcode not served by this build
    #[error("unknown opcode {opcode:#06x}")]
    UnknownOpcode {
        /// Raw opcode
        opcode: u16,
    },

    /// A register or payload could not be decoded
    #[error("bad {field}: {code}")]
    Request {
        /// Which part of the request
        field: &'static str,
        /// Code reported to the caller
        code: ErrorCode,
    },

    /// Operation failed in the Vault
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// Key store could not be opened
    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),

    /// Crypto Core could not be initialized
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// A previous call panicked while holding the vault lock
    #[error("vault lock poisoned")]
    Poisoned,

    /// A startup self-test check failed
    #[error("self-test {check} failed: {code}")]
    SelfTest {
        /// Name of the failing check
        check: &'static str,
        /// Code it failed with
        code: ErrorCode,
    },
}

impl ServerError {
    /// Boundary code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Config { .. } | Self::Poisoned => ErrorCode::Generic,
            Self::Protocol(err) => err.code(),
            Self::UnknownOpcode { .. } => ErrorCode::NotSupported,
            Self::Request { code, .. } | Self::SelfTest { code, .. } => *code,
            Self::Vault(err) => err.code(),
            Self::KeyStore(err) => err.code(),
            Self::Crypto(err) => err.code(),
        }
    }
}

impl From<ProtocolError> for ServerError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::UnknownOpcode(opcode) => Self::UnknownOpcode { opcode },
            other => Self::Protocol(other),
        }
    }
}

impl From<ServerError> for ErrorCode {
    fn from(err: ServerError) -> Self {
        err.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_opcode_is_not_supported() {
        let err = ServerError::from(ProtocolError::UnknownOpcode(0x7777));
        assert_eq!(err, ServerError::UnknownOpcode { opcode: 0x7777 });
        assert_eq!(err.code(), ErrorCode::NotSupported);
        assert_eq!(ServerError::from(ProtocolError::InvalidMagic).code(), ErrorCode::InvalidParameter);
    }
}
