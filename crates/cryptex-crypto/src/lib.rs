//! Crypto Core.
//!
//! Primitive operations against local memory, with no awareness of handles or
//! RPC. Everything here is a plain owned object: a [`Key`] slot, or a session
//! ([`DigestSession`], [`CipherSession`], [`SignatureSession`],
//! [`AgreementSession`]) holding its own copy of whatever key material it was
//! bound to. Sessions are explicit state machines and reject out-of-order
//! calls with [`CryptoError::InvalidState`] instead of panicking.
//!
//! Randomness comes from one [`Drbg`] per [`Crypto`] instance, seeded from an
//! injectable [`Entropy`] source.

pub mod agreement;
pub mod cipher;
pub mod digest;
pub mod error;
pub mod key;
pub mod rng;
pub mod signature;

pub use agreement::AgreementSession;
pub use cipher::{BLOCK_SIZE, CipherSession, NONCE_LEN, TAG_LEN};
pub use digest::DigestSession;
pub use error::{CryptoError, Result};
pub use key::Key;
pub use rng::{Drbg, Entropy, OsEntropy, SeededEntropy};
pub use signature::SignatureSession;

use rand::RngCore;

/// Crypto Core instance: owns the DRBG.
#[derive(Debug)]
pub struct Crypto {
    rng: Drbg,
}

impl Crypto {
    /// Instance seeded from `entropy`.
    pub fn new(entropy: &dyn Entropy) -> Result<Self> {
        Ok(Self { rng: Drbg::new(entropy)? })
    }

    /// Deterministic instance for tests and reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&seed.to_le_bytes());
        Self { rng: Drbg::from_seed(bytes) }
    }

    /// Fill `out` with random bytes, first mixing in `salt` if non-empty.
    ///
    /// # Errors
    ///
    /// `CryptoError::InvalidParameter` if `out` is empty.
    pub fn random(&mut self, salt: &[u8], out: &mut [u8]) -> Result<()> {
        if out.is_empty() {
            return Err(CryptoError::InvalidParameter { reason: "empty output buffer" });
        }
        if !salt.is_empty() {
            self.rng.reseed(salt);
        }
        self.rng.fill_bytes(out);
        Ok(())
    }

    /// The instance DRBG, for key generation and signing.
    pub fn rng(&mut self) -> &mut Drbg {
        &mut self.rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_rejects_empty_output() {
        let mut crypto = Crypto::with_seed(1);
        assert!(matches!(crypto.random(&[], &mut []), Err(CryptoError::InvalidParameter { .. })));
    }

    #[test]
    fn same_seed_same_stream_until_salted() {
        let mut a = Crypto::with_seed(42);
        let mut b = Crypto::with_seed(42);
        let (mut x, mut y) = ([0u8; 32], [0u8; 32]);
        a.random(&[], &mut x).expect("random");
        b.random(&[], &mut y).expect("random");
        assert_eq!(x, y);

        a.random(b"salt", &mut x).expect("random");
        b.random(&[], &mut y).expect("random");
        assert_ne!(x, y);
    }

    #[test]
    fn os_seeded_instances_differ() {
        let mut a = Crypto::new(&OsEntropy).expect("os entropy");
        let mut b = Crypto::new(&OsEntropy).expect("os entropy");
        let (mut x, mut y) = ([0u8; 32], [0u8; 32]);
        a.random(&[], &mut x).expect("random");
        b.random(&[], &mut y).expect("random");
        assert_ne!(x, y);
    }
}
