//! The serving side of the RPC boundary.
//!
//! One [`CryptoServer`] owns the single [`Vault`]. Each client gets a
//! [`LocalChannel`] with its own owner id and dataport; calls from all
//! channels are serialized on the vault lock. Dropping a channel releases
//! every handle its owner still holds.

#![allow(clippy::disallowed_types, reason = "Vault behind a synchronous lock")]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use cryptex_core::{OwnerId, Vault};
use cryptex_crypto::Crypto;
use cryptex_keystore::KeyStore;
use cryptex_proto::{CallHeader, Channel, Dataport, ErrorCode, ReplyHeader};
use tracing::{debug, info, warn};

use crate::{ServerConfig, ServerError, dispatch::dispatch};

/// Crypto server: a Vault shared by any number of channels.
pub struct CryptoServer {
    vault: Mutex<Vault>,
    config: ServerConfig,
    next_owner: AtomicU64,
}

impl std::fmt::Debug for CryptoServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoServer")
            .field("config", &self.config)
            .field("next_owner", &self.next_owner.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl CryptoServer {
    /// Build a server around `crypto`, with the key store calls served only
    /// when `key_store` is given.
    pub fn new(config: ServerConfig, crypto: Crypto, key_store: Option<KeyStore>) -> Self {
        let mut vault = Vault::new(config.vault.clone(), crypto);
        if let Some(key_store) = key_store {
            vault = vault.with_key_store(key_store);
        }

        info!(
            max_handles = config.vault.max_handles,
            dataport_pages = config.dataport_pages,
            key_store = vault.has_key_store(),
            "crypto server ready"
        );

        // Owner 0 belongs to in-process contexts.
        Self { vault: Mutex::new(vault), config, next_owner: AtomicU64::new(1) }
    }

    /// Server settings.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Open a new channel with a fresh owner id.
    pub fn open_channel(self: &Arc<Self>) -> LocalChannel {
        let owner = self.next_owner.fetch_add(1, Ordering::Relaxed);
        debug!(owner, "channel opened");
        LocalChannel {
            server: Arc::clone(self),
            owner,
            dataport: Dataport::new(self.config.dataport_pages),
        }
    }

    /// Serve one serialized request from `owner`.
    ///
    /// Always produces a reply; failures are carried as the reply code and
    /// the dataport is left untouched.
    pub fn handle_bytes(&self, owner: OwnerId, dataport: &Dataport, request: &[u8]) -> [u8; ReplyHeader::SIZE] {
        match self.serve(owner, dataport, request) {
            Ok(reply) => reply.to_bytes(),
            Err(err) => {
                warn!(owner, error = %err, "call failed");
                ReplyHeader::new(err.code()).to_bytes()
            },
        }
    }

    fn serve(&self, owner: OwnerId, dataport: &Dataport, request: &[u8]) -> Result<ReplyHeader, ServerError> {
        let request = CallHeader::from_bytes(request)?;
        let opcode = request.opcode().ok_or(ServerError::UnknownOpcode { opcode: request.opcode_raw() })?;
        debug!(owner, ?opcode, "call");

        let mut vault = self.vault.lock().map_err(|_| ServerError::Poisoned)?;
        dispatch(&mut vault, owner, dataport, opcode, request)
    }

    /// Close every handle `owner` holds. Returns how many were closed.
    pub fn release(&self, owner: OwnerId) -> usize {
        match self.vault.lock() {
            Ok(mut vault) => vault.release_owner(owner),
            Err(_) => {
                warn!(owner, "vault lock poisoned, handles not released");
                0
            },
        }
    }

    /// Live handles across all owners.
    pub fn handle_count(&self) -> usize {
        self.vault.lock().map(|vault| vault.handle_count()).unwrap_or(0)
    }

    /// Live handles held by `owner`.
    pub fn owner_handle_count(&self, owner: OwnerId) -> usize {
        self.vault.lock().map(|vault| vault.owner_handle_count(owner)).unwrap_or(0)
    }
}

/// In-process channel to a [`CryptoServer`].
///
/// Requests and replies cross as raw header bytes, the same shape a real
/// transport would carry.
#[derive(Debug)]
pub struct LocalChannel {
    server: Arc<CryptoServer>,
    owner: OwnerId,
    dataport: Dataport,
}

impl LocalChannel {
    /// Owner id this channel calls as.
    pub fn owner(&self) -> OwnerId {
        self.owner
    }
}

impl Channel for LocalChannel {
    fn dataport(&self) -> &Dataport {
        &self.dataport
    }

    fn call(&mut self, request: &CallHeader) -> Result<ReplyHeader, ErrorCode> {
        let reply = self.server.handle_bytes(self.owner, &self.dataport, &request.to_bytes());
        ReplyHeader::from_bytes(&reply).copied().map_err(|err| err.code())
    }
}

impl Drop for LocalChannel {
    fn drop(&mut self) {
        let released = self.server.release(self.owner);
        debug!(owner = self.owner, released, "channel closed");
    }
}

#[cfg(test)]
mod tests {
    use cryptex_proto::{DigestAlgorithm, KeyFlags, KeyType, Opcode};

    use super::*;

    fn server() -> Arc<CryptoServer> {
        Arc::new(CryptoServer::new(ServerConfig::default(), Crypto::with_seed(7), None))
    }

    #[test]
    fn channels_get_distinct_owners() {
        let server = server();
        let a = server.open_channel();
        let b = server.open_channel();
        assert_ne!(a.owner(), b.owner());
        assert_ne!(a.owner(), 0);
    }

    #[test]
    fn garbage_request_gets_error_reply() {
        let server = server();
        let dataport = Dataport::default();
        let reply = server.handle_bytes(1, &dataport, &[0u8; 10]);
        let reply = ReplyHeader::from_bytes(&reply).expect("reply parses");
        assert_eq!(reply.code(), ErrorCode::InvalidParameter);
    }

    #[test]
    fn unknown_opcode_is_not_supported() {
        let server = server();
        let dataport = Dataport::default();
        let mut raw = CallHeader::new(Opcode::DigestInit).to_bytes();
        // opcode sits after magic, version and reserved
        raw[6..8].copy_from_slice(&0x7f7fu16.to_be_bytes());
        let reply = server.handle_bytes(1, &dataport, &raw);
        let reply = ReplyHeader::from_bytes(&reply).expect("reply parses");
        assert_eq!(reply.code(), ErrorCode::NotSupported);
    }

    #[test]
    fn dropping_channel_releases_handles() {
        let server = server();
        let mut channel = server.open_channel();
        let request = CallHeader::new(Opcode::DigestInit).with_arg(0, DigestAlgorithm::Sha256.id());
        let reply = channel.call(&request).expect("delivered");
        assert_eq!(reply.code(), ErrorCode::Success);
        assert!(!reply.handle().is_null());

        let request = CallHeader::new(Opcode::KeyInit)
            .with_arg(0, KeyType::Aes.id())
            .with_arg(1, KeyFlags::EXPORTABLE_RAW.bits())
            .with_arg(2, 128);
        assert_eq!(channel.call(&request).expect("delivered").code(), ErrorCode::Success);
        assert_eq!(server.handle_count(), 2);

        drop(channel);
        assert_eq!(server.handle_count(), 0);
    }

    #[test]
    fn handles_do_not_cross_channels() {
        let server = server();
        let mut a = server.open_channel();
        let mut b = server.open_channel();
        let request = CallHeader::new(Opcode::DigestInit).with_arg(0, DigestAlgorithm::Sha256.id());
        let digest = a.call(&request).expect("delivered").handle();

        let close = CallHeader::new(Opcode::DigestClose).with_handle(0, digest);
        assert_eq!(b.call(&close).expect("delivered").code(), ErrorCode::InvalidHandle);
        assert_eq!(a.call(&close).expect("delivered").code(), ErrorCode::Success);
        assert_eq!(a.call(&close).expect("delivered").code(), ErrorCode::InvalidHandle);
        assert_eq!(server.owner_handle_count(a.owner()), 0);
    }
}
