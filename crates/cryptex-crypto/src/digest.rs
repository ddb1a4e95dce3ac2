//! Digest sessions.
//!
//! ```text
//! Open --update--> Open --finalize--> Finalized --close--> Closed
//! ```
//!
//! `finalize` takes an optional last chunk, so a one-shot digest is just
//! `init` followed by `finalize(data)`. A short output buffer fails without
//! consuming the session.

use cryptex_proto::DigestAlgorithm;
use md5::Md5;
use sha2::{Digest, Sha256};

use crate::{CryptoError, Result};

enum Hasher {
    Md5(Md5),
    Sha256(Sha256),
}

impl Hasher {
    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
        }
    }

    fn finish_into(self, out: &mut [u8]) -> usize {
        match self {
            Self::Md5(h) => {
                let digest = h.finalize();
                out[..digest.len()].copy_from_slice(&digest);
                digest.len()
            },
            Self::Sha256(h) => {
                let digest = h.finalize();
                out[..digest.len()].copy_from_slice(&digest);
                digest.len()
            },
        }
    }
}

enum DigestState {
    Open(Hasher),
    Finalized,
    Closed,
}

impl DigestState {
    fn name(&self) -> &'static str {
        match self {
            Self::Open(_) => "Open",
            Self::Finalized => "Finalized",
            Self::Closed => "Closed",
        }
    }
}

/// A running digest computation.
pub struct DigestSession {
    algorithm: DigestAlgorithm,
    state: DigestState,
}

impl std::fmt::Debug for DigestSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestSession")
            .field("algorithm", &self.algorithm)
            .field("state", &self.state.name())
            .finish()
    }
}

impl DigestSession {
    /// Start a digest.
    ///
    /// # Errors
    ///
    /// `CryptoError::NotSupported` for [`DigestAlgorithm::None`].
    pub fn init(algorithm: DigestAlgorithm) -> Result<Self> {
        let hasher = match algorithm {
            DigestAlgorithm::Md5 => Hasher::Md5(Md5::new()),
            DigestAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
            DigestAlgorithm::None => {
                return Err(CryptoError::NotSupported { what: "digest algorithm none" });
            },
        };
        Ok(Self { algorithm, state: DigestState::Open(hasher) })
    }

    /// Algorithm fixed at init.
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Absorb `data`.
    ///
    /// # Errors
    ///
    /// `CryptoError::InvalidState` after finalize or close.
    pub fn update(&mut self, data: &[u8]) -> Result<()> {
        match &mut self.state {
            DigestState::Open(hasher) => {
                hasher.update(data);
                Ok(())
            },
            other => Err(CryptoError::InvalidState { state: other.name(), operation: "update" }),
        }
    }

    /// Absorb the final chunk and write the digest into `out`.
    ///
    /// # Errors
    ///
    /// - `CryptoError::BufferTooSmall` if `out` cannot hold the digest; the
    ///   session stays open
    /// - `CryptoError::InvalidState` after finalize or close
    pub fn finalize(&mut self, data: &[u8], out: &mut [u8]) -> Result<usize> {
        match std::mem::replace(&mut self.state, DigestState::Finalized) {
            DigestState::Open(mut hasher) => {
                if let Err(err) = CryptoError::check_output(self.algorithm.output_len(), out.len()) {
                    self.state = DigestState::Open(hasher);
                    return Err(err);
                }
                hasher.update(data);
                Ok(hasher.finish_into(out))
            },
            other => {
                let state = other.name();
                self.state = other;
                Err(CryptoError::InvalidState { state, operation: "finalize" })
            },
        }
    }

    /// Release the session.
    pub fn close(&mut self) {
        self.state = DigestState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MD5_0123456789: &str = "781e5e245d69b566979b86e28d23f2c7";
    const SHA256_0123456789: &str =
        "84d89877f0d4041efb6bf91a16f0248f2fd573e6af05c19f96bedb9f882f7882";

    fn digest(algorithm: DigestAlgorithm, updates: &[&[u8]], last: &[u8]) -> Vec<u8> {
        let mut session = DigestSession::init(algorithm).expect("supported algorithm");
        for chunk in updates {
            session.update(chunk).expect("open session accepts updates");
        }
        let mut out = [0u8; 32];
        let len = session.finalize(last, &mut out).expect("finalize succeeds");
        out[..len].to_vec()
    }

    #[test]
    fn md5_vector() {
        assert_eq!(hex::encode(digest(DigestAlgorithm::Md5, &[], b"0123456789")), MD5_0123456789);
    }

    #[test]
    fn sha256_vector() {
        assert_eq!(
            hex::encode(digest(DigestAlgorithm::Sha256, &[], b"0123456789")),
            SHA256_0123456789
        );
    }

    #[test]
    fn chunking_does_not_change_digest() {
        let split = digest(DigestAlgorithm::Sha256, &[b"0123", b"456"], b"789");
        assert_eq!(hex::encode(split), SHA256_0123456789);
        let all_updates = digest(DigestAlgorithm::Md5, &[b"0123456789"], b"");
        assert_eq!(hex::encode(all_updates), MD5_0123456789);
    }

    #[test]
    fn state_machine_rejects_reuse() {
        let mut session = DigestSession::init(DigestAlgorithm::Md5).expect("md5");
        let mut out = [0u8; 16];
        session.finalize(b"x", &mut out).expect("first finalize");
        assert!(matches!(session.update(b"y"), Err(CryptoError::InvalidState { .. })));
        assert_eq!(
            session.finalize(b"", &mut out),
            Err(CryptoError::InvalidState { state: "Finalized", operation: "finalize" })
        );
        session.close();
        assert!(matches!(
            session.update(b"y"),
            Err(CryptoError::InvalidState { state: "Closed", .. })
        ));
        assert_eq!(
            session.finalize(b"", &mut out),
            Err(CryptoError::InvalidState { state: "Closed", operation: "finalize" })
        );
    }

    #[test]
    fn short_output_keeps_session_open() {
        let mut session = DigestSession::init(DigestAlgorithm::Sha256).expect("sha256");
        let mut short = [0u8; 31];
        assert!(matches!(
            session.finalize(b"0123456789", &mut short),
            Err(CryptoError::BufferTooSmall { needed: 32, available: 31 })
        ));
        assert_eq!(short, [0u8; 31]);

        let mut out = [0u8; 32];
        assert_eq!(session.finalize(b"0123456789", &mut out), Ok(32));
        assert_eq!(hex::encode(out), SHA256_0123456789);
    }

    #[test]
    fn none_is_not_a_digest() {
        assert!(matches!(
            DigestSession::init(DigestAlgorithm::None),
            Err(CryptoError::NotSupported { .. })
        ));
    }
}
