//! Server-side engine for the cryptex service.
//!
//! The [`Vault`] owns Crypto Core objects behind a generational
//! [`HandleTable`], scoped per owner, and optionally a key store. Callers
//! program against the [`CryptoApi`] and [`KeyStoreApi`] facade traits;
//! [`LocalContext`] implements them in-process and the client crate
//! implements them over an RPC channel.

pub mod api;
pub mod config;
pub mod error;
pub mod handle_table;
pub mod local;
pub mod object;
pub mod validate;
pub mod vault;

pub use api::{ApiResult, CryptoApi, KeyStoreApi};
pub use config::VaultConfig;
pub use error::{Result, VaultError};
pub use handle_table::{HandleTable, OwnerId, TableError};
pub use local::{LOCAL_OWNER, LocalContext};
pub use object::{Object, ObjectKind};
pub use vault::Vault;
