//! The Vault: Crypto Core objects behind a generational handle table.
//!
//! Every operation names its caller's [`OwnerId`]; handles minted for one
//! owner never resolve for another. Init-class operations check table
//! capacity before building anything, so a full table fails without
//! consuming randomness or touching the key store.
//!
//! The Vault is single-threaded. The server wraps it in one exclusive lock;
//! [`crate::LocalContext`] owns one outright.

use cryptex_crypto::{AgreementSession, CipherSession, Crypto, DigestSession, Key, SignatureSession};
use cryptex_keystore::KeyStore;
use cryptex_proto::{
    AgreementAlgorithm, AgreementHandle, CipherAlgorithm, CipherHandle, CipherMode, DigestAlgorithm,
    DigestHandle, Handle, KeyFlags, KeyHandle, KeyType, SignatureAlgorithm, SignatureHandle,
};
use tracing::{debug, info};

use crate::{
    Result, VaultConfig, VaultError,
    handle_table::{HandleTable, OwnerId},
    object::{Object, ObjectKind},
    validate::{check_payload, require_input, require_name, require_output},
};

/// Handle table plus Crypto Core plus an optional Key Store.
pub struct Vault {
    config: VaultConfig,
    crypto: Crypto,
    objects: HandleTable<Object>,
    key_store: Option<KeyStore>,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("config", &self.config)
            .field("handles", &self.objects.len())
            .field("key_store", &self.key_store)
            .finish_non_exhaustive()
    }
}

fn lookup<T: ObjectKind>(objects: &HandleTable<Object>, owner: OwnerId, handle: Handle) -> Result<&T> {
    let object = objects.get(owner, handle)?;
    T::from_object(object).ok_or(VaultError::WrongKind {
        handle,
        expected: T::KIND,
        actual: object.kind(),
    })
}

fn lookup_mut<T: ObjectKind>(
    objects: &mut HandleTable<Object>,
    owner: OwnerId,
    handle: Handle,
) -> Result<&mut T> {
    let object = objects.get_mut(owner, handle)?;
    let actual = object.kind();
    T::from_object_mut(object).ok_or(VaultError::WrongKind { handle, expected: T::KIND, actual })
}

fn key_mut(object: &mut Object, handle: Handle) -> Result<&mut Key> {
    let actual = object.kind();
    Key::from_object_mut(object).ok_or(VaultError::WrongKind { handle, expected: Key::KIND, actual })
}

impl Vault {
    /// Create a Vault without a key store.
    pub fn new(config: VaultConfig, crypto: Crypto) -> Self {
        let objects = HandleTable::new(config.max_handles);
        Self { config, crypto, objects, key_store: None }
    }

    /// Attach a key store.
    #[must_use]
    pub fn with_key_store(mut self, key_store: KeyStore) -> Self {
        self.key_store = Some(key_store);
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Whether key-store operations are available.
    pub fn has_key_store(&self) -> bool {
        self.key_store.is_some()
    }

    /// Live handles across all owners.
    pub fn handle_count(&self) -> usize {
        self.objects.len()
    }

    /// Live handles held by `owner`.
    pub fn owner_handle_count(&self, owner: OwnerId) -> usize {
        self.objects.owner_len(owner)
    }

    /// Close every handle `owner` holds.
    pub fn release_owner(&mut self, owner: OwnerId) -> usize {
        let released = self.objects.release_owner(owner);
        if released > 0 {
            info!(owner, released, "released owner handles");
        }
        released
    }

    fn issue<T: ObjectKind>(&mut self, owner: OwnerId, value: T) -> Result<Handle> {
        let handle = self.objects.insert(owner, value.into_object())?;
        debug!(owner, handle = handle.to_raw(), kind = T::KIND, "handle issued");
        Ok(handle)
    }

    fn close<T: ObjectKind>(&mut self, owner: OwnerId, handle: Handle) -> Result<()> {
        lookup::<T>(&self.objects, owner, handle)?;
        self.objects.remove(owner, handle)?;
        debug!(owner, handle = handle.to_raw(), kind = T::KIND, "handle closed");
        Ok(())
    }

    fn key_store(&mut self) -> Result<&mut KeyStore> {
        self.key_store.as_mut().ok_or(VaultError::NoKeyStore)
    }

    // Random

    /// Fill `out` from the DRBG, reseeding with `salt` first when non-empty.
    pub fn random(&mut self, salt: &[u8], out: &mut [u8]) -> Result<()> {
        check_payload(salt.len(), self.config.max_payload)?;
        require_output(out, "empty random output")?;
        check_payload(out.len(), self.config.max_payload)?;
        self.crypto.random(salt, out)?;
        Ok(())
    }

    // Digest

    /// Start a digest session.
    pub fn digest_init(&mut self, owner: OwnerId, algorithm: DigestAlgorithm) -> Result<DigestHandle> {
        self.objects.ensure_space(1)?;
        let session = DigestSession::init(algorithm)?;
        self.issue(owner, session).map(DigestHandle::from_handle)
    }

    /// Absorb `data`.
    pub fn digest_update(&mut self, owner: OwnerId, digest: DigestHandle, data: &[u8]) -> Result<()> {
        require_input(data, "empty digest input")?;
        check_payload(data.len(), self.config.max_payload)?;
        lookup_mut::<DigestSession>(&mut self.objects, owner, digest.handle())?.update(data)?;
        Ok(())
    }

    /// Absorb the optional final chunk and write the digest into `out`.
    pub fn digest_finalize(
        &mut self,
        owner: OwnerId,
        digest: DigestHandle,
        data: &[u8],
        out: &mut [u8],
    ) -> Result<usize> {
        check_payload(data.len(), self.config.max_payload)?;
        let session = lookup_mut::<DigestSession>(&mut self.objects, owner, digest.handle())?;
        Ok(session.finalize(data, out)?)
    }

    /// Release a digest session.
    pub fn digest_close(&mut self, owner: OwnerId, digest: DigestHandle) -> Result<()> {
        self.close::<DigestSession>(owner, digest.handle())
    }

    // Cipher

    /// Start a cipher session keyed from `key`.
    pub fn cipher_init(
        &mut self,
        owner: OwnerId,
        key: KeyHandle,
        algorithm: CipherAlgorithm,
        mode: CipherMode,
        iv: &[u8],
    ) -> Result<CipherHandle> {
        check_payload(iv.len(), self.config.max_payload)?;
        self.objects.ensure_space(1)?;
        let key = lookup::<Key>(&self.objects, owner, key.handle())?;
        let session = CipherSession::init(algorithm, mode, key, iv)?;
        self.issue(owner, session).map(CipherHandle::from_handle)
    }

    /// Absorb GCM associated data.
    pub fn cipher_update_ad(&mut self, owner: OwnerId, cipher: CipherHandle, ad: &[u8]) -> Result<()> {
        require_input(ad, "empty associated data")?;
        check_payload(ad.len(), self.config.max_payload)?;
        lookup_mut::<CipherSession>(&mut self.objects, owner, cipher.handle())?.update_ad(ad)?;
        Ok(())
    }

    /// Transform `input` into `out`.
    pub fn cipher_update(
        &mut self,
        owner: OwnerId,
        cipher: CipherHandle,
        input: &[u8],
        out: &mut [u8],
    ) -> Result<usize> {
        require_input(input, "empty cipher input")?;
        check_payload(input.len(), self.config.max_payload)?;
        let session = lookup_mut::<CipherSession>(&mut self.objects, owner, cipher.handle())?;
        Ok(session.update(input, out)?)
    }

    /// Finish the stream; GCM encryption writes the tag into `out`.
    pub fn cipher_finalize(&mut self, owner: OwnerId, cipher: CipherHandle, out: &mut [u8]) -> Result<usize> {
        let session = lookup_mut::<CipherSession>(&mut self.objects, owner, cipher.handle())?;
        Ok(session.finalize(out)?)
    }

    /// Check a GCM tag on a decrypt session.
    pub fn cipher_verify_tag(&mut self, owner: OwnerId, cipher: CipherHandle, tag: &[u8]) -> Result<()> {
        require_input(tag, "empty tag")?;
        check_payload(tag.len(), self.config.max_payload)?;
        lookup_mut::<CipherSession>(&mut self.objects, owner, cipher.handle())?.verify_tag(tag)?;
        Ok(())
    }

    /// Release a cipher session.
    pub fn cipher_close(&mut self, owner: OwnerId, cipher: CipherHandle) -> Result<()> {
        self.close::<CipherSession>(owner, cipher.handle())
    }

    // Signature

    /// Start a signature session over a private key, a public key, or both.
    pub fn signature_init(
        &mut self,
        owner: OwnerId,
        private: Option<KeyHandle>,
        public: Option<KeyHandle>,
        algorithm: SignatureAlgorithm,
    ) -> Result<SignatureHandle> {
        self.objects.ensure_space(1)?;
        let private =
            private.map(|key| lookup::<Key>(&self.objects, owner, key.handle())).transpose()?;
        let public = public.map(|key| lookup::<Key>(&self.objects, owner, key.handle())).transpose()?;
        let session = SignatureSession::init(algorithm, private, public)?;
        self.issue(owner, session).map(SignatureHandle::from_handle)
    }

    /// Sign `hash` into `out`.
    pub fn signature_sign(
        &mut self,
        owner: OwnerId,
        signature: SignatureHandle,
        digest: DigestAlgorithm,
        hash: &[u8],
        out: &mut [u8],
    ) -> Result<usize> {
        require_input(hash, "empty hash")?;
        check_payload(hash.len(), self.config.max_payload)?;
        let session = lookup_mut::<SignatureSession>(&mut self.objects, owner, signature.handle())?;
        Ok(session.sign(digest, hash, out, self.crypto.rng())?)
    }

    /// Verify `sig` over `hash`.
    pub fn signature_verify(
        &mut self,
        owner: OwnerId,
        signature: SignatureHandle,
        digest: DigestAlgorithm,
        hash: &[u8],
        sig: &[u8],
    ) -> Result<()> {
        require_input(hash, "empty hash")?;
        require_input(sig, "empty signature")?;
        check_payload(hash.len() + sig.len(), self.config.max_payload)?;
        let session = lookup_mut::<SignatureSession>(&mut self.objects, owner, signature.handle())?;
        session.verify(digest, hash, sig)?;
        Ok(())
    }

    /// Release a signature session.
    pub fn signature_close(&mut self, owner: OwnerId, signature: SignatureHandle) -> Result<()> {
        self.close::<SignatureSession>(owner, signature.handle())
    }

    // Agreement

    /// Start an agreement session over the local private key.
    pub fn agreement_init(
        &mut self,
        owner: OwnerId,
        private: KeyHandle,
        algorithm: AgreementAlgorithm,
    ) -> Result<AgreementHandle> {
        self.objects.ensure_space(1)?;
        let key = lookup::<Key>(&self.objects, owner, private.handle())?;
        let session = AgreementSession::init(algorithm, key)?;
        self.issue(owner, session).map(AgreementHandle::from_handle)
    }

    /// Derive the shared secret with `peer` into `out`.
    pub fn agreement_compute_shared(
        &mut self,
        owner: OwnerId,
        agreement: AgreementHandle,
        peer: KeyHandle,
        out: &mut [u8],
    ) -> Result<usize> {
        let session = lookup::<AgreementSession>(&self.objects, owner, agreement.handle())?;
        let peer = lookup::<Key>(&self.objects, owner, peer.handle())?;
        Ok(session.compute_shared(peer, out)?)
    }

    /// Release an agreement session.
    pub fn agreement_close(&mut self, owner: OwnerId, agreement: AgreementHandle) -> Result<()> {
        self.close::<AgreementSession>(owner, agreement.handle())
    }

    // Key

    /// Allocate an empty key slot.
    pub fn key_init(
        &mut self,
        owner: OwnerId,
        key_type: KeyType,
        flags: KeyFlags,
        len_bits: u32,
    ) -> Result<KeyHandle> {
        self.objects.ensure_space(1)?;
        let key = Key::init(key_type, flags, len_bits)?;
        self.issue(owner, key).map(KeyHandle::from_handle)
    }

    /// Attach encoded material to `key`. Wrapped import is not provided.
    pub fn key_import(
        &mut self,
        owner: OwnerId,
        key: KeyHandle,
        wrap: Option<KeyHandle>,
        data: &[u8],
    ) -> Result<()> {
        require_input(data, "empty key data")?;
        check_payload(data.len(), self.config.max_payload)?;
        let slot = lookup_mut::<Key>(&mut self.objects, owner, key.handle())?;
        if wrap.is_some() {
            return Err(VaultError::NotSupported { what: "wrapped key import" });
        }
        slot.import(data)?;
        debug!(owner, key = key.to_raw(), "key material imported");
        Ok(())
    }

    /// Write the encoded material of `key` into `out`. Wrapped export is not
    /// provided.
    pub fn key_export(
        &mut self,
        owner: OwnerId,
        key: KeyHandle,
        wrap: Option<KeyHandle>,
        out: &mut [u8],
    ) -> Result<usize> {
        let slot = lookup::<Key>(&self.objects, owner, key.handle())?;
        if wrap.is_some() {
            return Err(VaultError::NotSupported { what: "wrapped key export" });
        }
        Ok(slot.export(out)?)
    }

    /// Attach fresh symmetric material to `key`.
    pub fn key_generate(&mut self, owner: OwnerId, key: KeyHandle) -> Result<()> {
        let slot = lookup_mut::<Key>(&mut self.objects, owner, key.handle())?;
        slot.generate(self.crypto.rng())?;
        debug!(owner, key = key.to_raw(), "key material generated");
        Ok(())
    }

    /// Attach a fresh key pair to two empty slots.
    pub fn key_generate_pair(&mut self, owner: OwnerId, private: KeyHandle, public: KeyHandle) -> Result<()> {
        let (prv, publ) = self.objects.get_pair_mut(owner, private.handle(), public.handle())?;
        let prv = key_mut(prv, private.handle())?;
        let publ = key_mut(publ, public.handle())?;
        Key::generate_pair(prv, publ, self.crypto.rng())?;
        debug!(owner, private = private.to_raw(), public = public.to_raw(), "key pair generated");
        Ok(())
    }

    /// Release a key slot.
    pub fn key_close(&mut self, owner: OwnerId, key: KeyHandle) -> Result<()> {
        self.close::<Key>(owner, key.handle())
    }

    // Key store

    /// Persist raw key bytes under `name` and hand back a handle to the key.
    pub fn key_store_import(
        &mut self,
        owner: OwnerId,
        name: &str,
        bytes: &[u8],
        key_type: KeyType,
        flags: KeyFlags,
        len_bits: u32,
    ) -> Result<KeyHandle> {
        require_name(name)?;
        require_input(bytes, "empty key bytes")?;
        check_payload(bytes.len(), self.config.max_payload)?;
        self.objects.ensure_space(1)?;
        let key = self.key_store()?.import_key(name, bytes, key_type, flags, len_bits)?;
        self.issue(owner, key).map(KeyHandle::from_handle)
    }

    /// Generate and persist a key under `name` and hand back a handle to it.
    pub fn key_store_generate(
        &mut self,
        owner: OwnerId,
        name: &str,
        key_type: KeyType,
        flags: KeyFlags,
        len_bits: u32,
    ) -> Result<KeyHandle> {
        require_name(name)?;
        self.objects.ensure_space(1)?;
        let key = self.key_store()?.generate_key(name, key_type, flags, len_bits)?;
        self.issue(owner, key).map(KeyHandle::from_handle)
    }

    /// Load `name` into a fresh handle, independent of any other handle to
    /// the same entry.
    pub fn key_store_get(&mut self, owner: OwnerId, name: &str) -> Result<KeyHandle> {
        require_name(name)?;
        self.objects.ensure_space(1)?;
        let key = self.key_store()?.get_key(name)?;
        self.issue(owner, key).map(KeyHandle::from_handle)
    }

    /// Raw size in bytes of the entry `name`.
    pub fn key_store_size(&mut self, name: &str) -> Result<usize> {
        require_name(name)?;
        Ok(self.key_store()?.key_size_bytes(name)?)
    }

    /// Delete the entry `name`, closing `key` as well when given.
    ///
    /// The handle is validated before the entry is touched, and it stays
    /// open if the delete fails.
    pub fn key_store_delete(&mut self, owner: OwnerId, name: &str, key: Option<KeyHandle>) -> Result<()> {
        require_name(name)?;
        if let Some(key) = key {
            lookup::<Key>(&self.objects, owner, key.handle())?;
        }
        self.key_store()?.delete_key(name)?;
        if let Some(key) = key {
            self.close::<Key>(owner, key.handle())?;
        }
        Ok(())
    }

    /// Whether an entry named `name` exists.
    pub fn key_store_exists(&mut self, name: &str) -> Result<bool> {
        require_name(name)?;
        Ok(self.key_store()?.key_exists(name)?)
    }
}

#[cfg(test)]
mod tests {
    use cryptex_keystore::{KeyStoreConfig, MemoryFileStore};
    use cryptex_proto::ErrorCode;

    use super::*;

    const ME: OwnerId = 1;
    const OTHER: OwnerId = 2;
    const CIPHER_KEY: KeyFlags = KeyFlags::IS_ALGO_CIPHER;

    fn vault() -> Vault {
        Vault::new(VaultConfig::default(), Crypto::with_seed(1))
    }

    fn vault_with_store(files: MemoryFileStore) -> Vault {
        let store = KeyStore::new(Box::new(files), &[3; 32], KeyStoreConfig::default(), Crypto::with_seed(2))
            .expect("key store");
        vault().with_key_store(store)
    }

    fn aes_key(vault: &mut Vault, bytes: &[u8; 16], flags: KeyFlags) -> KeyHandle {
        let key = vault.key_init(ME, KeyType::Aes, flags, 128).expect("init");
        vault.key_import(ME, key, None, bytes).expect("import");
        key
    }

    #[test]
    fn digest_through_handles() {
        let mut vault = vault();
        let digest = vault.digest_init(ME, DigestAlgorithm::Sha256).expect("init");
        vault.digest_update(ME, digest, b"01234").expect("update");
        let mut out = [0u8; 32];
        assert_eq!(vault.digest_finalize(ME, digest, b"56789", &mut out), Ok(32));
        assert_eq!(
            hex::encode(out),
            "84d89877f0d4041efb6bf91a16f0248f2fd573e6af05c19f96bedb9f882f7882"
        );
        vault.digest_close(ME, digest).expect("close");
        assert_eq!(
            vault.digest_update(ME, digest, b"x").map_err(ErrorCode::from),
            Err(ErrorCode::InvalidHandle)
        );
    }

    #[test]
    fn handle_kinds_are_checked() {
        let mut vault = vault();
        let digest = vault.digest_init(ME, DigestAlgorithm::Md5).expect("init");
        let as_key = KeyHandle::from_handle(digest.handle());
        assert!(matches!(vault.key_generate(ME, as_key), Err(VaultError::WrongKind { .. })));
        assert_eq!(
            vault.key_close(ME, as_key).map_err(ErrorCode::from),
            Err(ErrorCode::InvalidHandle)
        );
        // wrong-kind close leaves the object alone
        assert_eq!(vault.handle_count(), 1);
        vault.digest_close(ME, digest).expect("close");
    }

    #[test]
    fn handles_are_scoped_to_their_owner() {
        let mut vault = vault();
        let key = aes_key(&mut vault, b"0123456789ABCDEF", CIPHER_KEY);
        assert_eq!(
            vault
                .cipher_init(OTHER, key, CipherAlgorithm::AesEcb, CipherMode::Encrypt, &[])
                .map_err(ErrorCode::from),
            Err(ErrorCode::InvalidHandle)
        );
        assert_eq!(vault.release_owner(OTHER), 0);
        assert_eq!(vault.release_owner(ME), 1);
        assert_eq!(vault.handle_count(), 0);
    }

    #[test]
    fn full_table_fails_before_building() {
        let mut vault = Vault::new(VaultConfig { max_handles: 1, ..VaultConfig::default() }, Crypto::with_seed(1));
        vault.key_init(ME, KeyType::Aes, KeyFlags::NONE, 128).expect("init");
        assert_eq!(
            vault.key_init(ME, KeyType::Aes, KeyFlags::NONE, 666).map_err(ErrorCode::from),
            Err(ErrorCode::InsufficientSpace)
        );
        assert_eq!(
            vault.digest_init(ME, DigestAlgorithm::Sha256).map_err(ErrorCode::from),
            Err(ErrorCode::InsufficientSpace)
        );
    }

    #[test]
    fn full_table_leaves_key_store_untouched() {
        let files = MemoryFileStore::new();
        let mut vault = Vault::new(VaultConfig { max_handles: 1, ..VaultConfig::default() }, Crypto::with_seed(1))
            .with_key_store(
                KeyStore::new(Box::new(files.clone()), &[3; 32], KeyStoreConfig::default(), Crypto::with_seed(2))
                    .expect("key store"),
            );
        vault.key_init(ME, KeyType::Aes, KeyFlags::NONE, 128).expect("init");
        assert_eq!(
            vault
                .key_store_generate(ME, "k", KeyType::Aes, KeyFlags::NONE, 128)
                .map_err(ErrorCode::from),
            Err(ErrorCode::InsufficientSpace)
        );
        assert!(files.file_names().is_empty());
    }

    #[test]
    fn wrapped_import_and_export_are_not_supported() {
        let mut vault = vault();
        let wrap = aes_key(&mut vault, &[1; 16], CIPHER_KEY);
        let key = vault.key_init(ME, KeyType::Aes, KeyFlags::EXPORTABLE_RAW, 128).expect("init");
        assert_eq!(
            vault.key_import(ME, key, Some(wrap), &[2; 16]).map_err(ErrorCode::from),
            Err(ErrorCode::NotSupported)
        );
        vault.key_import(ME, key, None, &[2; 16]).expect("import");
        let mut out = [0u8; 16];
        assert_eq!(
            vault.key_export(ME, key, Some(wrap), &mut out).map_err(ErrorCode::from),
            Err(ErrorCode::NotSupported)
        );
        assert_eq!(vault.key_export(ME, key, None, &mut out), Ok(16));
        assert_eq!(out, [2; 16]);
    }

    #[test]
    fn generate_pair_rejects_one_handle_twice() {
        let mut vault = vault();
        let prv = vault.key_init(ME, KeyType::Secp256r1Prv, KeyFlags::NONE, 256).expect("init");
        assert_eq!(
            vault.key_generate_pair(ME, prv, prv).map_err(ErrorCode::from),
            Err(ErrorCode::InvalidParameter)
        );
        let publ = vault.key_init(ME, KeyType::Secp256r1Pub, KeyFlags::NONE, 256).expect("init");
        assert_eq!(
            vault.key_generate_pair(ME, publ, prv).map_err(ErrorCode::from),
            Err(ErrorCode::NotSupported)
        );
        vault.key_generate_pair(ME, prv, publ).expect("keygen");

        let agreement = vault.agreement_init(ME, prv, AgreementAlgorithm::Ecdh).expect("init");
        let mut shared = [0u8; 32];
        assert_eq!(vault.agreement_compute_shared(ME, agreement, publ, &mut shared), Ok(32));
    }

    #[test]
    fn signature_needs_a_key() {
        let mut vault = vault();
        assert_eq!(
            vault.signature_init(ME, None, None, SignatureAlgorithm::RsaPkcs1).map_err(ErrorCode::from),
            Err(ErrorCode::InvalidParameter)
        );
        assert_eq!(vault.handle_count(), 0);
    }

    #[test]
    fn oversized_inputs_are_rejected() {
        let mut vault = Vault::new(VaultConfig { max_payload: 8, ..VaultConfig::default() }, Crypto::with_seed(1));
        let digest = vault.digest_init(ME, DigestAlgorithm::Md5).expect("init");
        assert_eq!(
            vault.digest_update(ME, digest, &[0; 9]),
            Err(VaultError::PayloadTooLarge { len: 9, max: 8 })
        );
        assert!(vault.digest_update(ME, digest, &[0; 8]).is_ok());
        assert!(vault.random(&[], &mut [0; 9]).is_err());
        assert!(vault.random(&[], &mut []).is_err());
    }

    #[test]
    fn key_store_without_store_is_not_supported() {
        let mut vault = vault();
        assert_eq!(vault.key_store_exists("k"), Err(VaultError::NoKeyStore));
        assert_eq!(vault.key_store_get(ME, "k").map_err(ErrorCode::from), Err(ErrorCode::NotSupported));
    }

    #[test]
    fn key_store_copies_are_independent() {
        let mut vault = vault_with_store(MemoryFileStore::new());
        let flags = CIPHER_KEY | KeyFlags::EXPORTABLE_RAW;
        let imported = vault
            .key_store_import(ME, "MasterKey", &[7; 16], KeyType::Aes, flags, 128)
            .expect("import");
        let fetched = vault.key_store_get(ME, "MasterKey").expect("get");
        assert_ne!(imported, fetched);

        vault.key_close(ME, imported).expect("close");
        let mut out = [0u8; 16];
        assert_eq!(vault.key_export(ME, fetched, None, &mut out), Ok(16));
        assert_eq!(out, [7; 16]);
        assert_eq!(vault.key_store_size("MasterKey"), Ok(16));
    }

    #[test]
    fn key_store_delete_checks_handle_first() {
        let files = MemoryFileStore::new();
        let mut vault = vault_with_store(files.clone());
        let key = vault
            .key_store_generate(ME, "k", KeyType::Aes, CIPHER_KEY, 256)
            .expect("generate");

        let stale = vault.key_init(ME, KeyType::Aes, KeyFlags::NONE, 128).expect("init");
        vault.key_close(ME, stale).expect("close");
        assert_eq!(
            vault.key_store_delete(ME, "k", Some(stale)).map_err(ErrorCode::from),
            Err(ErrorCode::InvalidHandle)
        );
        assert_eq!(files.file_names(), vec!["k".to_string()]);

        assert_eq!(
            vault.key_store_delete(ME, "missing", Some(key)).map_err(ErrorCode::from),
            Err(ErrorCode::NotFound)
        );
        assert_eq!(vault.owner_handle_count(ME), 1);

        vault.key_store_delete(ME, "k", Some(key)).expect("delete");
        assert_eq!(vault.key_store_exists("k"), Ok(false));
        assert_eq!(vault.handle_count(), 0);
        assert_eq!(vault.key_store_get(ME, "k").map_err(ErrorCode::from), Err(ErrorCode::NotFound));
    }
}
