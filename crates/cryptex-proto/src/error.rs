//! Error codes surfaced across the trust boundary.
//!
//! Components keep rich, typed errors internally (`CryptoError`,
//! `KeyStoreError`, ...). Only the symbolic [`ErrorCode`] crosses a channel, so
//! local and remote bindings of the same API report identical outcomes.

use thiserror::Error;

/// Result type used by the facade APIs.
pub type Result<T, E = ErrorCode> = std::result::Result<T, E>;

/// Symbolic status reported to callers.
///
/// The numeric values are only meaningful on the wire; code should match on
/// the variants.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Operation completed.
    #[error("success")]
    Success,

    /// Unclassified failure, including storage faults.
    #[error("generic failure")]
    Generic,

    /// Argument out of range, malformed, or of the wrong kind.
    #[error("invalid parameter")]
    InvalidParameter,

    /// Handle unknown, closed, or owned by someone else.
    #[error("invalid handle")]
    InvalidHandle,

    /// Operation rejected in the current state, or authentication failed.
    #[error("aborted")]
    Aborted,

    /// Operation not permitted by the object's flags.
    #[error("access denied")]
    AccessDenied,

    /// Named object or key material does not exist.
    #[error("not found")]
    NotFound,

    /// Algorithm, key type, or combination is not supported.
    #[error("not supported")]
    NotSupported,

    /// No room left: table full, material already attached, or duplicate
    /// entry.
    #[error("insufficient space")]
    InsufficientSpace,

    /// Caller-provided output buffer is too small.
    #[error("buffer too small")]
    BufferTooSmall,

    /// Transport-level failure.
    #[error("connection closed")]
    ConnectionClosed,
}

impl ErrorCode {
    /// Wire value.
    pub fn to_u32(self) -> u32 {
        match self {
            Self::Success => 0,
            Self::Generic => 1,
            Self::InvalidParameter => 2,
            Self::InvalidHandle => 3,
            Self::Aborted => 4,
            Self::AccessDenied => 5,
            Self::NotFound => 6,
            Self::NotSupported => 7,
            Self::InsufficientSpace => 8,
            Self::BufferTooSmall => 9,
            Self::ConnectionClosed => 10,
        }
    }

    /// Parse a wire value. Unknown values collapse to [`ErrorCode::Generic`]
    /// so a peer can never smuggle "success" through an unrecognized code.
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => Self::Success,
            2 => Self::InvalidParameter,
            3 => Self::InvalidHandle,
            4 => Self::Aborted,
            5 => Self::AccessDenied,
            6 => Self::NotFound,
            7 => Self::NotSupported,
            8 => Self::InsufficientSpace,
            9 => Self::BufferTooSmall,
            10 => Self::ConnectionClosed,
            _ => Self::Generic,
        }
    }

    /// `Ok(())` for [`ErrorCode::Success`], `Err(self)` otherwise.
    pub fn into_result(self) -> Result<()> {
        if self == Self::Success { Ok(()) } else { Err(self) }
    }
}

/// Errors from parsing call and reply headers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer shorter than the fixed header size
    #[error("header too short: expected {expected} bytes, got {actual}")]
    TooShort {
        /// Required size
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// Magic number mismatch
    #[error("invalid magic number")]
    InvalidMagic,

    /// Unsupported protocol version
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Opcode not recognized by this build
    #[error("unknown opcode: {0:#06x}")]
    UnknownOpcode(u16),
}

impl ProtocolError {
    /// Boundary code for a malformed request.
    pub fn code(&self) -> ErrorCode {
        ErrorCode::InvalidParameter
    }
}
