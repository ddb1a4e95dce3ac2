//! Entropy sources and the deterministic random bit generator.
//!
//! Crypto Core never reads the OS directly outside [`OsEntropy`]. Everything
//! random (nonces, generated keys, RSA blinding) flows from a [`Drbg`] that is
//! seeded once from an [`Entropy`] source, so tests can swap in
//! [`SeededEntropy`] and get byte-identical runs.

use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::{CryptoError, Result};

/// Source of seed material.
///
/// # Invariants
///
/// - Production implementations return cryptographically secure bytes
/// - Failure is reported, never papered over with weak bytes
pub trait Entropy: Send + Sync + 'static {
    /// Fill `buf` with seed material.
    fn fill(&self, buf: &mut [u8]) -> Result<()>;
}

/// OS entropy via getrandom.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl Entropy for OsEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        getrandom::fill(buf).map_err(|e| CryptoError::Entropy(e.to_string()))
    }
}

/// Reproducible entropy for tests and simulation.
///
/// Every call yields the same stream prefix for the same seed.
#[derive(Debug, Clone, Copy)]
pub struct SeededEntropy {
    seed: u64,
}

impl SeededEntropy {
    /// Entropy derived from `seed`.
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl Entropy for SeededEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        ChaCha20Rng::seed_from_u64(self.seed).fill_bytes(buf);
        Ok(())
    }
}

/// ChaCha20-based DRBG.
pub struct Drbg {
    inner: ChaCha20Rng,
}

impl std::fmt::Debug for Drbg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Drbg").finish_non_exhaustive()
    }
}

impl Drbg {
    /// Seed a new generator from `entropy`.
    pub fn new(entropy: &dyn Entropy) -> Result<Self> {
        let mut seed = [0u8; 32];
        entropy.fill(&mut seed)?;
        let drbg = Self::from_seed(seed);
        seed.zeroize();
        Ok(drbg)
    }

    /// Generator with an explicit seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self { inner: ChaCha20Rng::from_seed(seed) }
    }

    /// Mix `salt` into the state. The new seed is
    /// `SHA-256(current output || salt)`, so the salt can only add entropy.
    pub fn reseed(&mut self, salt: &[u8]) {
        let mut current = [0u8; 32];
        self.inner.fill_bytes(&mut current);
        let mut seed: [u8; 32] = Sha256::new().chain_update(current).chain_update(salt).finalize().into();
        self.inner = ChaCha20Rng::from_seed(seed);
        current.zeroize();
        seed.zeroize();
    }
}

impl RngCore for Drbg {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}

impl CryptoRng for Drbg {}
