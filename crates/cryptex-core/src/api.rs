//! Facade traits callers are written against.
//!
//! [`CryptoApi`] and [`KeyStoreApi`] are implemented both in-process
//! ([`crate::LocalContext`]) and over an RPC channel (the client crate).
//! Everything returns a bare [`ErrorCode`] so the two bindings are
//! observably identical.

use cryptex_proto::{
    AgreementAlgorithm, AgreementHandle, CipherAlgorithm, CipherHandle, CipherMode, DigestAlgorithm,
    DigestHandle, ErrorCode, KeyFlags, KeyHandle, KeyType, SignatureAlgorithm, SignatureHandle,
};

/// Result type for facade calls.
pub type ApiResult<T> = Result<T, ErrorCode>;

/// Crypto operations on handle-addressed objects.
pub trait CryptoApi {
    /// Fill `out` with random bytes, reseeding with `salt` when non-empty.
    fn get_random_data(&mut self, salt: &[u8], out: &mut [u8]) -> ApiResult<()>;

    /// Start a digest session.
    fn digest_init(&mut self, algorithm: DigestAlgorithm) -> ApiResult<DigestHandle>;
    /// Absorb `data`.
    fn digest_update(&mut self, digest: DigestHandle, data: &[u8]) -> ApiResult<()>;
    /// Absorb the optional final chunk and write the digest; returns its length.
    fn digest_finalize(&mut self, digest: DigestHandle, data: &[u8], out: &mut [u8]) -> ApiResult<usize>;
    /// Release a digest session.
    fn digest_close(&mut self, digest: DigestHandle) -> ApiResult<()>;

    /// Start a cipher session keyed from `key`.
    fn cipher_init(
        &mut self,
        key: KeyHandle,
        algorithm: CipherAlgorithm,
        mode: CipherMode,
        iv: &[u8],
    ) -> ApiResult<CipherHandle>;
    /// Transform `input` into `out`; returns bytes written.
    fn cipher_update(&mut self, cipher: CipherHandle, input: &[u8], out: &mut [u8]) -> ApiResult<usize>;
    /// Absorb GCM associated data.
    fn cipher_update_ad(&mut self, cipher: CipherHandle, ad: &[u8]) -> ApiResult<()>;
    /// Finish the stream; returns bytes written (the tag for GCM encryption).
    fn cipher_finalize(&mut self, cipher: CipherHandle, out: &mut [u8]) -> ApiResult<usize>;
    /// Check a GCM tag on a decrypt session.
    fn cipher_verify_tag(&mut self, cipher: CipherHandle, tag: &[u8]) -> ApiResult<()>;
    /// Release a cipher session.
    fn cipher_close(&mut self, cipher: CipherHandle) -> ApiResult<()>;

    /// Start a signature session.
    fn signature_init(
        &mut self,
        private: Option<KeyHandle>,
        public: Option<KeyHandle>,
        algorithm: SignatureAlgorithm,
    ) -> ApiResult<SignatureHandle>;
    /// Sign `hash`; returns the signature length.
    fn signature_sign(
        &mut self,
        signature: SignatureHandle,
        digest: DigestAlgorithm,
        hash: &[u8],
        out: &mut [u8],
    ) -> ApiResult<usize>;
    /// Verify `sig` over `hash`.
    fn signature_verify(
        &mut self,
        signature: SignatureHandle,
        digest: DigestAlgorithm,
        hash: &[u8],
        sig: &[u8],
    ) -> ApiResult<()>;
    /// Release a signature session.
    fn signature_close(&mut self, signature: SignatureHandle) -> ApiResult<()>;

    /// Start an agreement session over a local private key.
    fn agreement_init(&mut self, private: KeyHandle, algorithm: AgreementAlgorithm) -> ApiResult<AgreementHandle>;
    /// Derive the shared secret with `peer`; returns its length.
    fn agreement_compute_shared(
        &mut self,
        agreement: AgreementHandle,
        peer: KeyHandle,
        out: &mut [u8],
    ) -> ApiResult<usize>;
    /// Release an agreement session.
    fn agreement_close(&mut self, agreement: AgreementHandle) -> ApiResult<()>;

    /// Allocate an empty key slot.
    fn key_init(&mut self, key_type: KeyType, flags: KeyFlags, len_bits: u32) -> ApiResult<KeyHandle>;
    /// Attach encoded material; `wrap` must be `None`.
    fn key_import(&mut self, key: KeyHandle, wrap: Option<KeyHandle>, data: &[u8]) -> ApiResult<()>;
    /// Export encoded material; `wrap` must be `None`. Returns bytes written.
    fn key_export(&mut self, key: KeyHandle, wrap: Option<KeyHandle>, out: &mut [u8]) -> ApiResult<usize>;
    /// Attach fresh symmetric material.
    fn key_generate(&mut self, key: KeyHandle) -> ApiResult<()>;
    /// Attach a fresh key pair to two empty slots.
    fn key_generate_pair(&mut self, private: KeyHandle, public: KeyHandle) -> ApiResult<()>;
    /// Release a key slot.
    fn key_close(&mut self, key: KeyHandle) -> ApiResult<()>;
}

/// Named, persistent key storage.
pub trait KeyStoreApi {
    /// Persist raw key bytes under `name`; returns a handle to the key.
    fn import_key(
        &mut self,
        name: &str,
        bytes: &[u8],
        key_type: KeyType,
        flags: KeyFlags,
        len_bits: u32,
    ) -> ApiResult<KeyHandle>;
    /// Load `name` into a fresh handle.
    fn get_key(&mut self, name: &str) -> ApiResult<KeyHandle>;
    /// Raw size in bytes of the entry `name`.
    fn get_key_size_bytes(&mut self, name: &str) -> ApiResult<usize>;
    /// Delete `name`, closing `key` too when given.
    fn delete_key(&mut self, name: &str, key: Option<KeyHandle>) -> ApiResult<()>;
    /// Generate and persist a key under `name`; returns a handle to it.
    fn generate_key(&mut self, name: &str, key_type: KeyType, flags: KeyFlags, len_bits: u32) -> ApiResult<KeyHandle>;
    /// Whether an entry named `name` exists.
    fn key_exists(&mut self, name: &str) -> ApiResult<bool>;
}
