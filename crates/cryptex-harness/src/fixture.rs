//! Targets the conformance suite runs against.
//!
//! A [`Target`] is one way of reaching a Vault: [`LocalTarget`] calls it
//! in-process, [`RemoteTarget`] goes through an [`RpcClient`] and the server's
//! dispatcher. Both are built from the same [`FixtureConfig`], so a seed
//! produces the same storage key and DRBG streams on either side.

use std::sync::Arc;

use cryptex_client::RpcClient;
use cryptex_core::{CryptoApi, KeyStoreApi, LocalContext, Vault, VaultConfig};
use cryptex_crypto::Crypto;
use cryptex_keystore::{
    ChaoticFileStore, FileStore, KeyStore, KeyStoreConfig, KeyStoreError, MemoryFileStore, STORAGE_KEY_LEN,
};
use cryptex_server::{CryptoServer, LocalChannel, ServerConfig};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Fixture settings.
#[derive(Debug, Clone)]
pub struct FixtureConfig {
    /// Seed for the storage key and both DRBGs
    pub seed: u64,
    /// Handle table and payload limits
    pub vault: VaultConfig,
    /// Key store instance name
    pub instance: String,
    /// Inject file store failures at this rate (0.0 to 1.0)
    pub failure_rate: Option<f64>,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self { seed: 0, vault: VaultConfig::default(), instance: "KeyStore".to_string(), failure_rate: None }
    }
}

impl FixtureConfig {
    /// Default settings with `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self { seed, ..Self::default() }
    }

    fn storage_key(&self) -> [u8; STORAGE_KEY_LEN] {
        let mut key = [0u8; STORAGE_KEY_LEN];
        ChaCha8Rng::seed_from_u64(self.seed).fill_bytes(&mut key);
        key
    }

    fn open_store(&self, files: &MemoryFileStore) -> Result<KeyStore, KeyStoreError> {
        let backend: Box<dyn FileStore> = match self.failure_rate {
            Some(rate) => Box::new(ChaoticFileStore::with_seed(files.clone(), rate, self.seed)),
            None => Box::new(files.clone()),
        };
        KeyStore::new(
            backend,
            &self.storage_key(),
            KeyStoreConfig::named(self.instance.clone()),
            Crypto::with_seed(self.seed ^ 0x5eed),
        )
    }
}

/// A Vault reachable through the facade traits.
pub trait Target {
    /// Facade implementation for this target.
    type Api: CryptoApi + KeyStoreApi;

    /// Short name for reports.
    fn name(&self) -> &'static str;

    /// The facade.
    fn api(&mut self) -> &mut Self::Api;

    /// Live handles held through this target.
    fn live_handles(&self) -> usize;

    /// Backing files of the key store.
    fn files(&self) -> &MemoryFileStore;
}

/// In-process target.
#[derive(Debug)]
pub struct LocalTarget {
    context: LocalContext,
    files: MemoryFileStore,
}

impl LocalTarget {
    /// Build from `config`.
    pub fn new(config: &FixtureConfig) -> Result<Self, KeyStoreError> {
        let files = MemoryFileStore::new();
        let store = config.open_store(&files)?;
        let vault = Vault::new(config.vault.clone(), Crypto::with_seed(config.seed)).with_key_store(store);
        Ok(Self { context: LocalContext::new(vault), files })
    }
}

impl Target for LocalTarget {
    type Api = LocalContext;

    fn name(&self) -> &'static str {
        "local"
    }

    fn api(&mut self) -> &mut LocalContext {
        &mut self.context
    }

    fn live_handles(&self) -> usize {
        self.context.vault().handle_count()
    }

    fn files(&self) -> &MemoryFileStore {
        &self.files
    }
}

/// Target behind the RPC boundary.
#[derive(Debug)]
pub struct RemoteTarget {
    server: Arc<CryptoServer>,
    client: RpcClient<LocalChannel>,
    files: MemoryFileStore,
}

impl RemoteTarget {
    /// Build from `config`, with a single-page dataport.
    pub fn new(config: &FixtureConfig) -> Result<Self, KeyStoreError> {
        let files = MemoryFileStore::new();
        let store = config.open_store(&files)?;
        let server_config = ServerConfig { vault: config.vault.clone(), ..ServerConfig::default() };
        let server = Arc::new(CryptoServer::new(server_config, Crypto::with_seed(config.seed), Some(store)));
        let client = RpcClient::new(server.open_channel());
        Ok(Self { server, client, files })
    }

    /// The server behind the channel.
    pub fn server(&self) -> &Arc<CryptoServer> {
        &self.server
    }

    /// Drop the current channel and open a new one.
    pub fn reconnect(&mut self) {
        self.client = RpcClient::new(self.server.open_channel());
    }
}

impl Target for RemoteTarget {
    type Api = RpcClient<LocalChannel>;

    fn name(&self) -> &'static str {
        "remote"
    }

    fn api(&mut self) -> &mut RpcClient<LocalChannel> {
        &mut self.client
    }

    fn live_handles(&self) -> usize {
        self.server.handle_count()
    }

    fn files(&self) -> &MemoryFileStore {
        &self.files
    }
}
