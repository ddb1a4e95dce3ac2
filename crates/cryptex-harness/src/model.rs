//! Reference model of the handle lifecycle.
//!
//! Operations are applied to both [`ModelVault`] and a real facade through
//! [`Driver`]; each step's outcome, success or error code, must match. The
//! model knows nothing about cryptography. It only tracks which handles are
//! live, what kind of object each names, and whether a key has material, which
//! is enough to predict every handle-level error the service reports.

use arbitrary::Arbitrary;
use cryptex_core::{ApiResult, CryptoApi};
use cryptex_proto::{
    CipherAlgorithm, CipherHandle, CipherMode, DigestAlgorithm, DigestHandle, ErrorCode, Handle, KeyFlags,
    KeyHandle, KeyType,
};

/// Index into the list of handles issued so far (taken modulo its length).
pub type Slot = u8;

/// Operations that can be applied to the system.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Start a SHA-256 digest session.
    OpenDigest,
    /// Allocate an empty 128-bit AES cipher key.
    OpenKey,
    /// Start an ECB encryption session on a key.
    OpenCipher {
        /// Key to bind
        slot: Slot,
    },
    /// Generate material for a key.
    Generate {
        /// Key to fill
        slot: Slot,
    },
    /// Feed one byte to a digest session.
    Update {
        /// Digest session
        slot: Slot,
        /// Byte to absorb
        byte: u8,
    },
    /// Close a handle with the close call for its own kind.
    Close {
        /// Handle to close
        slot: Slot,
    },
    /// Close a handle with the digest close call, whatever its kind.
    CloseAsDigest {
        /// Handle to close
        slot: Slot,
    },
}

/// Kind of object a handle names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Digest session
    Digest,
    /// Key object
    Key,
    /// Cipher session
    Cipher,
}

#[derive(Debug, Clone)]
struct ModelHandle {
    kind: Kind,
    live: bool,
    has_material: bool,
}

/// Predicted state of the handle table.
#[derive(Debug, Clone)]
pub struct ModelVault {
    capacity: usize,
    issued: Vec<ModelHandle>,
}

impl ModelVault {
    /// Empty model with room for `capacity` live handles.
    pub fn new(capacity: usize) -> Self {
        Self { capacity, issued: Vec::new() }
    }

    /// Live handle count.
    pub fn live(&self) -> usize {
        self.issued.iter().filter(|h| h.live).count()
    }

    /// Handles issued so far, live or not.
    pub fn issued(&self) -> usize {
        self.issued.len()
    }

    fn resolve(&self, slot: Slot) -> Option<usize> {
        (!self.issued.is_empty()).then(|| usize::from(slot) % self.issued.len())
    }

    fn open(&mut self, kind: Kind) -> ApiResult<()> {
        if self.live() >= self.capacity {
            return Err(ErrorCode::InsufficientSpace);
        }
        self.issued.push(ModelHandle { kind, live: true, has_material: false });
        Ok(())
    }

    fn live_of(&self, index: usize, kind: Kind) -> ApiResult<&ModelHandle> {
        let handle = &self.issued[index];
        if handle.live && handle.kind == kind { Ok(handle) } else { Err(ErrorCode::InvalidHandle) }
    }

    fn close(&mut self, index: usize, kind: Kind) -> ApiResult<()> {
        self.live_of(index, kind)?;
        self.issued[index].live = false;
        Ok(())
    }

    /// Predicted outcome of `op`, or `None` if it targets a slot before any
    /// handle exists.
    pub fn apply(&mut self, op: &Operation) -> Option<ApiResult<()>> {
        let outcome = match *op {
            Operation::OpenDigest => self.open(Kind::Digest),
            Operation::OpenKey => self.open(Kind::Key),
            Operation::OpenCipher { slot } => {
                let index = self.resolve(slot)?;
                if self.live() >= self.capacity {
                    Err(ErrorCode::InsufficientSpace)
                } else {
                    match self.live_of(index, Kind::Key) {
                        Ok(key) if !key.has_material => Err(ErrorCode::NotFound),
                        Ok(_) => self.open(Kind::Cipher),
                        Err(code) => Err(code),
                    }
                }
            },
            Operation::Generate { slot } => {
                let index = self.resolve(slot)?;
                match self.live_of(index, Kind::Key) {
                    Ok(key) if key.has_material => Err(ErrorCode::InsufficientSpace),
                    Ok(_) => {
                        self.issued[index].has_material = true;
                        Ok(())
                    },
                    Err(code) => Err(code),
                }
            },
            Operation::Update { slot, .. } => {
                let index = self.resolve(slot)?;
                self.live_of(index, Kind::Digest).map(|_| ())
            },
            Operation::Close { slot } => {
                let index = self.resolve(slot)?;
                let kind = self.issued[index].kind;
                self.close(index, kind)
            },
            Operation::CloseAsDigest { slot } => {
                let index = self.resolve(slot)?;
                self.close(index, Kind::Digest)
            },
        };
        Some(outcome)
    }
}

/// Applies operations to a real facade, tracking the handles it was issued.
#[derive(Debug, Default)]
pub struct Driver {
    issued: Vec<(Kind, Handle)>,
}

impl Driver {
    /// Driver with no handles.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `op`. `None` when `op` targets a slot before any handle exists.
    pub fn apply<A: CryptoApi>(&mut self, api: &mut A, op: &Operation) -> Option<ApiResult<()>> {
        let outcome = match *op {
            Operation::OpenDigest => {
                api.digest_init(DigestAlgorithm::Sha256).map(|h| self.issued.push((Kind::Digest, h.handle())))
            },
            Operation::OpenKey => api
                .key_init(KeyType::Aes, KeyFlags::IS_ALGO_CIPHER, 128)
                .map(|h| self.issued.push((Kind::Key, h.handle()))),
            Operation::OpenCipher { slot } => {
                let (_, key) = self.resolve(slot)?;
                api.cipher_init(KeyHandle::from_handle(key), CipherAlgorithm::AesEcb, CipherMode::Encrypt, &[])
                    .map(|h| self.issued.push((Kind::Cipher, h.handle())))
            },
            Operation::Generate { slot } => {
                let (_, key) = self.resolve(slot)?;
                api.key_generate(KeyHandle::from_handle(key))
            },
            Operation::Update { slot, byte } => {
                let (_, digest) = self.resolve(slot)?;
                api.digest_update(DigestHandle::from_handle(digest), &[byte])
            },
            Operation::Close { slot } => {
                let (kind, handle) = self.resolve(slot)?;
                match kind {
                    Kind::Digest => api.digest_close(DigestHandle::from_handle(handle)),
                    Kind::Key => api.key_close(KeyHandle::from_handle(handle)),
                    Kind::Cipher => api.cipher_close(CipherHandle::from_handle(handle)),
                }
            },
            Operation::CloseAsDigest { slot } => {
                let (_, handle) = self.resolve(slot)?;
                api.digest_close(DigestHandle::from_handle(handle))
            },
        };
        Some(outcome)
    }

    fn resolve(&self, slot: Slot) -> Option<(Kind, Handle)> {
        (!self.issued.is_empty()).then(|| self.issued[usize::from(slot) % self.issued.len()])
    }

    /// Close every handle that is still open, ignoring ones already closed.
    pub fn close_all<A: CryptoApi>(&mut self, api: &mut A) {
        for (kind, handle) in self.issued.drain(..) {
            let _ = match kind {
                Kind::Digest => api.digest_close(DigestHandle::from_handle(handle)),
                Kind::Key => api.key_close(KeyHandle::from_handle(handle)),
                Kind::Cipher => api.cipher_close(CipherHandle::from_handle(handle)),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_predicts_capacity_and_kinds() {
        let mut model = ModelVault::new(2);
        assert_eq!(model.apply(&Operation::Close { slot: 0 }), None);
        assert_eq!(model.apply(&Operation::OpenKey), Some(Ok(())));
        assert_eq!(model.apply(&Operation::OpenCipher { slot: 0 }), Some(Err(ErrorCode::NotFound)));
        assert_eq!(model.apply(&Operation::Generate { slot: 0 }), Some(Ok(())));
        assert_eq!(model.apply(&Operation::Generate { slot: 0 }), Some(Err(ErrorCode::InsufficientSpace)));
        assert_eq!(model.apply(&Operation::OpenCipher { slot: 0 }), Some(Ok(())));
        assert_eq!(model.apply(&Operation::OpenDigest), Some(Err(ErrorCode::InsufficientSpace)));
        assert_eq!(model.apply(&Operation::CloseAsDigest { slot: 1 }), Some(Err(ErrorCode::InvalidHandle)));
        assert_eq!(model.apply(&Operation::Close { slot: 1 }), Some(Ok(())));
        assert_eq!(model.apply(&Operation::Close { slot: 1 }), Some(Err(ErrorCode::InvalidHandle)));
        assert_eq!(model.live(), 1);
        assert_eq!(model.apply(&Operation::OpenDigest), Some(Ok(())));
        assert_eq!(model.apply(&Operation::CloseAsDigest { slot: 2 }), Some(Ok(())));
        assert_eq!(model.apply(&Operation::CloseAsDigest { slot: 2 }), Some(Err(ErrorCode::InvalidHandle)));
        assert_eq!(model.live(), 1);
    }
}
