//! Key Store: named, persistent, encrypted storage for symmetric keys.
//!
//! Entries go through a [`FileStore`] collaborator, one file per entry. The
//! store owns its own [`cryptex_crypto::Crypto`] instance for nonces and key
//! generation, and an AES-256 storage key that seals every entry with
//! AES-GCM.
//!
//! The store is not handle-aware: it hands back owned
//! [`cryptex_crypto::Key`] objects, and the caller decides where they live.

pub mod config;
pub mod error;
pub mod file_store;
pub mod record;
pub mod store;

pub use config::KeyStoreConfig;
pub use error::{KeyStoreError, Result};
pub use file_store::{
    ChaoticFileStore, DirFileStore, FileId, FileStore, FileStoreError, MemoryFileStore, OpenMode,
    SeekFrom,
};
pub use store::{KeyStore, STORAGE_KEY_LEN};
