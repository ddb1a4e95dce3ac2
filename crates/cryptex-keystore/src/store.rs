//! The key store.
//!
//! One file per entry, named after the entry. File contents are
//!
//! ```text
//! nonce (12) | AES-256-GCM(record) | tag (16)
//! ```
//!
//! under the store's storage key, with `instance || 0x00 || name` as
//! associated data. A blob copied to another name or another instance fails
//! authentication and reads back as corrupt.

use cryptex_crypto::{CipherSession, Crypto, Key, NONCE_LEN, TAG_LEN};
use cryptex_proto::{CipherAlgorithm, CipherMode, KeyFlags, KeyType};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::{
    KeyStoreConfig, KeyStoreError, Result,
    file_store::{FileId, FileStore, FileStoreError, OpenMode},
    record::{Record, RecordError},
};

/// Storage key size in bytes (AES-256)
pub const STORAGE_KEY_LEN: usize = 32;

/// Named, persistent, encrypted key store.
pub struct KeyStore {
    files: Box<dyn FileStore>,
    crypto: Crypto,
    storage_key: Key,
    config: KeyStoreConfig,
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore").field("config", &self.config).finish_non_exhaustive()
    }
}

impl KeyStore {
    /// Open a store over `files`, encrypting entries under `storage_key`.
    ///
    /// # Errors
    ///
    /// `KeyStoreError::Crypto` if `storage_key` is not a 32-byte AES key.
    pub fn new(
        files: Box<dyn FileStore>,
        storage_key: &[u8],
        config: KeyStoreConfig,
        crypto: Crypto,
    ) -> Result<Self> {
        let mut key = Key::init(KeyType::Aes, KeyFlags::IS_ALGO_CIPHER, (STORAGE_KEY_LEN * 8) as u32)?;
        key.import(storage_key)?;
        info!(instance = %config.instance, "key store opened");
        Ok(Self { files, crypto, storage_key: key, config })
    }

    /// Active configuration.
    pub fn config(&self) -> &KeyStoreConfig {
        &self.config
    }

    /// Check `name` against the naming rules.
    ///
    /// # Errors
    ///
    /// `KeyStoreError::InvalidName` when the name is empty, too long, contains
    /// bytes outside printable ASCII or path separators, or is `.`/`..`.
    pub fn validate_name(&self, name: &str) -> Result<()> {
        let invalid = |reason| Err(KeyStoreError::InvalidName { reason });
        if name.is_empty() {
            return invalid("empty");
        }
        if name.len() >= self.config.max_name_len {
            return invalid("too long");
        }
        if !name.bytes().all(|b| b.is_ascii_graphic() && b != b'/' && b != b'\\') {
            return invalid("only printable ASCII without path separators");
        }
        if name == "." || name == ".." {
            return invalid("reserved");
        }
        Ok(())
    }

    /// Store raw key bytes under `name` and return the key object.
    ///
    /// # Errors
    ///
    /// - `KeyStoreError::InvalidName` for a bad name
    /// - `KeyStoreError::UnsupportedKeyType` for anything but AES
    /// - `KeyStoreError::KeyTooLong` past the configured maximum
    /// - `KeyStoreError::Crypto` if the bytes do not fit the size or flags
    /// - `KeyStoreError::Duplicate` if `name` is taken
    /// - `KeyStoreError::File` if the write fails; the partial file is removed
    /// - `KeyStoreError::PartialEntry` if the write fails and so does removal
    pub fn import_key(
        &mut self,
        name: &str,
        bytes: &[u8],
        key_type: KeyType,
        flags: KeyFlags,
        len_bits: u32,
    ) -> Result<Key> {
        self.validate_name(name)?;
        Self::check_type(key_type)?;
        if bytes.len() > self.config.max_key_len {
            return Err(KeyStoreError::KeyTooLong { len: bytes.len(), max: self.config.max_key_len });
        }

        let mut key = Key::init(key_type, flags, len_bits)?;
        key.import(bytes)?;
        self.persist(name, &key)?;
        info!(instance = %self.config.instance, name, len_bits, "key imported");
        Ok(key)
    }

    /// Generate a fresh key, store it under `name`, and return it.
    ///
    /// # Errors
    ///
    /// As [`KeyStore::import_key`].
    pub fn generate_key(
        &mut self,
        name: &str,
        key_type: KeyType,
        flags: KeyFlags,
        len_bits: u32,
    ) -> Result<Key> {
        self.validate_name(name)?;
        Self::check_type(key_type)?;

        let mut key = Key::init(key_type, flags, len_bits)?;
        key.generate(self.crypto.rng())?;
        self.persist(name, &key)?;
        info!(instance = %self.config.instance, name, len_bits, "key generated");
        Ok(key)
    }

    /// Load the key stored under `name`.
    ///
    /// # Errors
    ///
    /// - `KeyStoreError::NotFound` if there is no such entry
    /// - `KeyStoreError::Corrupt` if the entry fails authentication or decoding
    pub fn get_key(&mut self, name: &str) -> Result<Key> {
        let record = self.load(name)?;
        let corrupt = |reason| KeyStoreError::Corrupt { name: name.to_string(), reason };

        let key_type = KeyType::from_id(record.algorithm).map_err(|_| corrupt("unknown key type"))?;
        let flags = KeyFlags::from_bits(record.flags).map_err(|_| corrupt("unknown flag bits"))?;
        let mut key = Key::init(key_type, flags, record.len_bits).map_err(|_| corrupt("bad key size"))?;
        key.import(&record.bytes).map_err(|_| corrupt("bad key material"))?;
        debug!(instance = %self.config.instance, name, "key loaded");
        Ok(key)
    }

    /// Raw size in bytes of the key stored under `name`.
    ///
    /// # Errors
    ///
    /// As [`KeyStore::get_key`].
    pub fn key_size_bytes(&mut self, name: &str) -> Result<usize> {
        Ok(self.load(name)?.bytes.len())
    }

    /// Remove the entry `name`.
    ///
    /// # Errors
    ///
    /// `KeyStoreError::NotFound` if there is no such entry.
    pub fn delete_key(&mut self, name: &str) -> Result<()> {
        self.validate_name(name)?;
        match self.files.delete(name) {
            Ok(()) => {
                info!(instance = %self.config.instance, name, "key deleted");
                Ok(())
            },
            Err(FileStoreError::NotFound { .. }) => {
                Err(KeyStoreError::NotFound { name: name.to_string() })
            },
            Err(err) => Err(err.into()),
        }
    }

    /// Whether an entry named `name` exists.
    ///
    /// # Errors
    ///
    /// `KeyStoreError::InvalidName` for a bad name; file store failures.
    pub fn key_exists(&self, name: &str) -> Result<bool> {
        self.validate_name(name)?;
        Ok(self.files.exists(name)?)
    }

    fn check_type(key_type: KeyType) -> Result<()> {
        if key_type == KeyType::Aes {
            Ok(())
        } else {
            Err(KeyStoreError::UnsupportedKeyType { key_type: key_type.id() })
        }
    }

    fn associated_data(&self, name: &str) -> Vec<u8> {
        let mut ad = Vec::with_capacity(self.config.instance.len() + 1 + name.len());
        ad.extend_from_slice(self.config.instance.as_bytes());
        ad.push(0);
        ad.extend_from_slice(name.as_bytes());
        ad
    }

    fn max_blob_len(&self) -> usize {
        NONCE_LEN + Record::encoded_len(self.config.max_key_len) + TAG_LEN
    }

    fn persist(&mut self, name: &str, key: &Key) -> Result<()> {
        let bytes = key.symmetric_bytes()?;
        let record = Record {
            len_bits: key.len_bits(),
            bytes: Zeroizing::new(bytes.to_vec()),
            algorithm: key.key_type().id(),
            flags: key.flags().bits(),
        };
        let plaintext = record.encode(self.config.delimiter);
        let (nonce, body) = self.seal(name, &plaintext)?;

        let fd = match self.files.open(name, OpenMode::CreateNew) {
            Ok(fd) => fd,
            Err(FileStoreError::AlreadyExists { .. }) => {
                return Err(KeyStoreError::Duplicate { name: name.to_string() });
            },
            Err(err) => return Err(err.into()),
        };

        let written = self.write_all(fd, &nonce).and_then(|()| self.write_all(fd, &body));
        let closed = self.files.close(fd);
        if let Err(err) = written.and(closed) {
            warn!(instance = %self.config.instance, name, error = %err, "entry write failed, removing partial file");
            if let Err(cleanup) = self.files.delete(name) {
                warn!(instance = %self.config.instance, name, error = %cleanup, "partial entry could not be removed");
                return Err(KeyStoreError::PartialEntry { name: name.to_string(), write: err, cleanup });
            }
            return Err(err.into());
        }
        Ok(())
    }

    fn load(&mut self, name: &str) -> Result<Record> {
        self.validate_name(name)?;
        let blob = self.read_entry(name)?;
        let plaintext = self.unseal(name, &blob)?;
        Record::decode(&plaintext, self.config.delimiter, self.config.max_key_len).map_err(|err| {
            KeyStoreError::Corrupt {
                name: name.to_string(),
                reason: match err {
                    RecordError::Length => "record length",
                    RecordError::Delimiter => "record delimiter",
                    RecordError::KeyTooLong => "record key length",
                },
            }
        })
    }

    fn seal(&mut self, name: &str, plaintext: &[u8]) -> Result<([u8; NONCE_LEN], Vec<u8>)> {
        let mut nonce = [0u8; NONCE_LEN];
        self.crypto.random(&[], &mut nonce)?;

        let mut session =
            CipherSession::init(CipherAlgorithm::AesGcm, CipherMode::Encrypt, &self.storage_key, &nonce)?;
        session.update_ad(&self.associated_data(name))?;
        let mut body = vec![0u8; plaintext.len() + TAG_LEN];
        let (ciphertext, tag) = body.split_at_mut(plaintext.len());
        session.update(plaintext, ciphertext)?;
        session.finalize(tag)?;
        Ok((nonce, body))
    }

    fn unseal(&self, name: &str, blob: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let corrupt = |reason| KeyStoreError::Corrupt { name: name.to_string(), reason };
        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(corrupt("truncated"));
        }
        let (nonce, rest) = blob.split_at(NONCE_LEN);
        let (ciphertext, tag) = rest.split_at(rest.len() - TAG_LEN);

        let mut session =
            CipherSession::init(CipherAlgorithm::AesGcm, CipherMode::Decrypt, &self.storage_key, nonce)?;
        session.update_ad(&self.associated_data(name))?;
        let mut plaintext = Zeroizing::new(vec![0u8; ciphertext.len()]);
        session.update(ciphertext, &mut plaintext)?;
        session.verify_tag(tag).map_err(|_| corrupt("authentication failed"))?;
        Ok(plaintext)
    }

    fn write_all(&self, fd: FileId, mut data: &[u8]) -> std::result::Result<(), FileStoreError> {
        while !data.is_empty() {
            let n = self.files.write(fd, data)?;
            if n == 0 {
                return Err(FileStoreError::NoSpace { needed: data.len(), available: 0 });
            }
            data = &data[n..];
        }
        Ok(())
    }

    fn read_entry(&self, name: &str) -> Result<Vec<u8>> {
        let fd = match self.files.open(name, OpenMode::Read) {
            Ok(fd) => fd,
            Err(FileStoreError::NotFound { .. }) => {
                return Err(KeyStoreError::NotFound { name: name.to_string() });
            },
            Err(err) => return Err(err.into()),
        };

        let read = self.read_open(name, fd);
        let closed = self.files.close(fd);
        let blob = read?;
        closed?;
        Ok(blob)
    }

    /// Read the whole of `fd`, sized up front from the bytes the stream has
    /// left.
    fn read_open(&self, name: &str, fd: FileId) -> Result<Vec<u8>> {
        let corrupt = |reason| KeyStoreError::Corrupt { name: name.to_string(), reason };
        let size = usize::try_from(self.files.available(fd)?).map_err(|_| corrupt("entry too large"))?;
        if size > self.max_blob_len() {
            return Err(corrupt("entry too large"));
        }

        let mut blob = vec![0u8; size];
        let mut filled = 0;
        while filled < size {
            match self.files.read(fd, &mut blob[filled..])? {
                0 => return Err(corrupt("truncated")),
                n => filled += n,
            }
        }
        Ok(blob)
    }
}
