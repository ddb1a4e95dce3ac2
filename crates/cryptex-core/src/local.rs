//! In-process binding of the facade traits.

use cryptex_proto::{
    AgreementAlgorithm, AgreementHandle, CipherAlgorithm, CipherHandle, CipherMode, DigestAlgorithm,
    DigestHandle, KeyFlags, KeyHandle, KeyType, SignatureAlgorithm, SignatureHandle,
};

use crate::{
    Vault,
    api::{ApiResult, CryptoApi, KeyStoreApi},
    handle_table::OwnerId,
};

/// Owner id used by a [`LocalContext`].
pub const LOCAL_OWNER: OwnerId = 0;

/// Calls a [`Vault`] directly, with no marshalling.
#[derive(Debug)]
pub struct LocalContext {
    vault: Vault,
}

impl LocalContext {
    /// Bind to `vault`.
    pub fn new(vault: Vault) -> Self {
        Self { vault }
    }

    /// The underlying vault.
    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    /// Unbind, returning the vault.
    pub fn into_inner(self) -> Vault {
        self.vault
    }
}

impl CryptoApi for LocalContext {
    fn get_random_data(&mut self, salt: &[u8], out: &mut [u8]) -> ApiResult<()> {
        Ok(self.vault.random(salt, out)?)
    }

    fn digest_init(&mut self, algorithm: DigestAlgorithm) -> ApiResult<DigestHandle> {
        Ok(self.vault.digest_init(LOCAL_OWNER, algorithm)?)
    }

    fn digest_update(&mut self, digest: DigestHandle, data: &[u8]) -> ApiResult<()> {
        Ok(self.vault.digest_update(LOCAL_OWNER, digest, data)?)
    }

    fn digest_finalize(&mut self, digest: DigestHandle, data: &[u8], out: &mut [u8]) -> ApiResult<usize> {
        Ok(self.vault.digest_finalize(LOCAL_OWNER, digest, data, out)?)
    }

    fn digest_close(&mut self, digest: DigestHandle) -> ApiResult<()> {
        Ok(self.vault.digest_close(LOCAL_OWNER, digest)?)
    }

    fn cipher_init(
        &mut self,
        key: KeyHandle,
        algorithm: CipherAlgorithm,
        mode: CipherMode,
        iv: &[u8],
    ) -> ApiResult<CipherHandle> {
        Ok(self.vault.cipher_init(LOCAL_OWNER, key, algorithm, mode, iv)?)
    }

    fn cipher_update(&mut self, cipher: CipherHandle, input: &[u8], out: &mut [u8]) -> ApiResult<usize> {
        Ok(self.vault.cipher_update(LOCAL_OWNER, cipher, input, out)?)
    }

    fn cipher_update_ad(&mut self, cipher: CipherHandle, ad: &[u8]) -> ApiResult<()> {
        Ok(self.vault.cipher_update_ad(LOCAL_OWNER, cipher, ad)?)
    }

    fn cipher_finalize(&mut self, cipher: CipherHandle, out: &mut [u8]) -> ApiResult<usize> {
        Ok(self.vault.cipher_finalize(LOCAL_OWNER, cipher, out)?)
    }

    fn cipher_verify_tag(&mut self, cipher: CipherHandle, tag: &[u8]) -> ApiResult<()> {
        Ok(self.vault.cipher_verify_tag(LOCAL_OWNER, cipher, tag)?)
    }

    fn cipher_close(&mut self, cipher: CipherHandle) -> ApiResult<()> {
        Ok(self.vault.cipher_close(LOCAL_OWNER, cipher)?)
    }

    fn signature_init(
        &mut self,
        private: Option<KeyHandle>,
        public: Option<KeyHandle>,
        algorithm: SignatureAlgorithm,
    ) -> ApiResult<SignatureHandle> {
        Ok(self.vault.signature_init(LOCAL_OWNER, private, public, algorithm)?)
    }

    fn signature_sign(
        &mut self,
        signature: SignatureHandle,
        digest: DigestAlgorithm,
        hash: &[u8],
        out: &mut [u8],
    ) -> ApiResult<usize> {
        Ok(self.vault.signature_sign(LOCAL_OWNER, signature, digest, hash, out)?)
    }

    fn signature_verify(
        &mut self,
        signature: SignatureHandle,
        digest: DigestAlgorithm,
        hash: &[u8],
        sig: &[u8],
    ) -> ApiResult<()> {
        Ok(self.vault.signature_verify(LOCAL_OWNER, signature, digest, hash, sig)?)
    }

    fn signature_close(&mut self, signature: SignatureHandle) -> ApiResult<()> {
        Ok(self.vault.signature_close(LOCAL_OWNER, signature)?)
    }

    fn agreement_init(&mut self, private: KeyHandle, algorithm: AgreementAlgorithm) -> ApiResult<AgreementHandle> {
        Ok(self.vault.agreement_init(LOCAL_OWNER, private, algorithm)?)
    }

    fn agreement_compute_shared(
        &mut self,
        agreement: AgreementHandle,
        peer: KeyHandle,
        out: &mut [u8],
    ) -> ApiResult<usize> {
        Ok(self.vault.agreement_compute_shared(LOCAL_OWNER, agreement, peer, out)?)
    }

    fn agreement_close(&mut self, agreement: AgreementHandle) -> ApiResult<()> {
        Ok(self.vault.agreement_close(LOCAL_OWNER, agreement)?)
    }

    fn key_init(&mut self, key_type: KeyType, flags: KeyFlags, len_bits: u32) -> ApiResult<KeyHandle> {
        Ok(self.vault.key_init(LOCAL_OWNER, key_type, flags, len_bits)?)
    }

    fn key_import(&mut self, key: KeyHandle, wrap: Option<KeyHandle>, data: &[u8]) -> ApiResult<()> {
        Ok(self.vault.key_import(LOCAL_OWNER, key, wrap, data)?)
    }

    fn key_export(&mut self, key: KeyHandle, wrap: Option<KeyHandle>, out: &mut [u8]) -> ApiResult<usize> {
        Ok(self.vault.key_export(LOCAL_OWNER, key, wrap, out)?)
    }

    fn key_generate(&mut self, key: KeyHandle) -> ApiResult<()> {
        Ok(self.vault.key_generate(LOCAL_OWNER, key)?)
    }

    fn key_generate_pair(&mut self, private: KeyHandle, public: KeyHandle) -> ApiResult<()> {
        Ok(self.vault.key_generate_pair(LOCAL_OWNER, private, public)?)
    }

    fn key_close(&mut self, key: KeyHandle) -> ApiResult<()> {
        Ok(self.vault.key_close(LOCAL_OWNER, key)?)
    }
}

impl KeyStoreApi for LocalContext {
    fn import_key(
        &mut self,
        name: &str,
        bytes: &[u8],
        key_type: KeyType,
        flags: KeyFlags,
        len_bits: u32,
    ) -> ApiResult<KeyHandle> {
        Ok(self.vault.key_store_import(LOCAL_OWNER, name, bytes, key_type, flags, len_bits)?)
    }

    fn get_key(&mut self, name: &str) -> ApiResult<KeyHandle> {
        Ok(self.vault.key_store_get(LOCAL_OWNER, name)?)
    }

    fn get_key_size_bytes(&mut self, name: &str) -> ApiResult<usize> {
        Ok(self.vault.key_store_size(name)?)
    }

    fn delete_key(&mut self, name: &str, key: Option<KeyHandle>) -> ApiResult<()> {
        Ok(self.vault.key_store_delete(LOCAL_OWNER, name, key)?)
    }

    fn generate_key(&mut self, name: &str, key_type: KeyType, flags: KeyFlags, len_bits: u32) -> ApiResult<KeyHandle> {
        Ok(self.vault.key_store_generate(LOCAL_OWNER, name, key_type, flags, len_bits)?)
    }

    fn key_exists(&mut self, name: &str) -> ApiResult<bool> {
        Ok(self.vault.key_store_exists(name)?)
    }
}

#[cfg(test)]
mod tests {
    use cryptex_crypto::Crypto;
    use cryptex_proto::ErrorCode;

    use super::*;
    use crate::VaultConfig;

    #[test]
    fn ecb_round_trip_through_the_facade() {
        let mut ctx = LocalContext::new(Vault::new(VaultConfig::default(), Crypto::with_seed(9)));
        let key = ctx.key_init(KeyType::Aes, KeyFlags::IS_ALGO_CIPHER, 128).expect("init");
        ctx.key_import(key, None, b"0123456789ABCDEF").expect("import");

        let mut ciphertext = [0u8; 16];
        let enc = ctx.cipher_init(key, CipherAlgorithm::AesEcb, CipherMode::Encrypt, &[]).expect("init");
        assert_eq!(ctx.cipher_update(enc, b"0123456789ABCDEF", &mut ciphertext), Ok(16));
        ctx.cipher_close(enc).expect("close");

        let mut plaintext = [0u8; 16];
        let dec = ctx.cipher_init(key, CipherAlgorithm::AesEcb, CipherMode::Decrypt, &[]).expect("init");
        assert_eq!(ctx.cipher_update(dec, &ciphertext, &mut plaintext), Ok(16));
        assert_eq!(&plaintext, b"0123456789ABCDEF");
        ctx.cipher_close(dec).expect("close");

        ctx.key_close(key).expect("close");
        assert_eq!(
            ctx.cipher_init(key, CipherAlgorithm::AesEcb, CipherMode::Encrypt, &[]),
            Err(ErrorCode::InvalidHandle)
        );
        assert_eq!(ctx.vault().handle_count(), 0);
    }

    #[test]
    fn key_store_calls_without_store() {
        let mut ctx = LocalContext::new(Vault::new(VaultConfig::default(), Crypto::with_seed(9)));
        assert_eq!(ctx.key_exists("k"), Err(ErrorCode::NotSupported));
    }
}
