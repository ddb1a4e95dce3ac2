//! Chaotic file store wrapper for fault injection testing
//!
//! Randomly fails stream operations (open, read, write, seek, available,
//! exists) so tests can check that the key store fails clean. `close` and
//! `delete` always reach the inner store, so cleanup paths run to completion
//! and a leftover file can only mean the key store forgot to clean up.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use super::{FileId, FileStore, FileStoreError, OpenMode, Result, SeekFrom};

/// File store wrapper that randomly injects I/O failures.
#[derive(Clone)]
pub struct ChaoticFileStore<F: FileStore> {
    inner: F,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    rng: Arc<Mutex<ChaoticRng>>,
    operation_count: Arc<AtomicUsize>,
    injected: Arc<AtomicUsize>,
}

/// Linear congruential generator, so chaos runs replay from a seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next value in [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // LCG constants from Numerical Recipes
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

impl<F: FileStore> ChaoticFileStore<F> {
    /// Wrap `inner` with a fixed default seed.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: F, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Wrap `inner` with an explicit seed for reproducible chaos.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: F, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            operation_count: Arc::new(AtomicUsize::new(0)),
            injected: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Underlying store, for checking invariants after chaos.
    pub fn inner(&self) -> &F {
        &self.inner
    }

    /// Operations attempted through this wrapper.
    pub fn operation_count(&self) -> usize {
        self.operation_count.load(Ordering::Relaxed)
    }

    /// Failures injected so far.
    pub fn injected_failures(&self) -> usize {
        self.injected.load(Ordering::Relaxed)
    }

    fn chaos(&self, operation: &str) -> Result<()> {
        self.operation_count.fetch_add(1, Ordering::Relaxed);
        let fail = self
            .rng
            .lock()
            .map_err(|_| FileStoreError::Io("chaos rng lock poisoned".to_string()))?
            .next()
            < self.failure_rate;
        if fail {
            self.injected.fetch_add(1, Ordering::Relaxed);
            return Err(FileStoreError::Io(format!("chaotic failure injection ({operation})")));
        }
        Ok(())
    }
}

impl<F: FileStore> FileStore for ChaoticFileStore<F> {
    fn open(&self, name: &str, mode: OpenMode) -> Result<FileId> {
        self.chaos("open")?;
        self.inner.open(name, mode)
    }

    fn read(&self, file: FileId, buf: &mut [u8]) -> Result<usize> {
        self.chaos("read")?;
        self.inner.read(file, buf)
    }

    fn write(&self, file: FileId, data: &[u8]) -> Result<usize> {
        self.chaos("write")?;
        self.inner.write(file, data)
    }

    fn seek(&self, file: FileId, pos: SeekFrom) -> Result<u64> {
        self.chaos("seek")?;
        self.inner.seek(file, pos)
    }

    fn close(&self, file: FileId) -> Result<()> {
        self.operation_count.fetch_add(1, Ordering::Relaxed);
        self.inner.close(file)
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.operation_count.fetch_add(1, Ordering::Relaxed);
        self.inner.delete(name)
    }

    fn exists(&self, name: &str) -> Result<bool> {
        self.chaos("exists")?;
        self.inner.exists(name)
    }

    fn available(&self, file: FileId) -> Result<u64> {
        self.chaos("available")?;
        self.inner.available(file)
    }
}
