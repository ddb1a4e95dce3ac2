//! Cryptex server binary.
//!
//! # Usage
//!
//! ```bash
//! # Volatile key store, random storage key (development)
//! cryptex-server
//!
//! # Persistent key store
//! cryptex-server --store-dir /var/lib/cryptex --storage-key <64 hex chars>
//! ```

use std::sync::Arc;

use clap::Parser;
use cryptex_client::RpcClient;
use cryptex_core::VaultConfig;
use cryptex_crypto::{Crypto, OsEntropy};
use cryptex_keystore::{DirFileStore, FileStore, KeyStore, KeyStoreConfig, MemoryFileStore, STORAGE_KEY_LEN};
use cryptex_server::{CryptoServer, ServerConfig, ServerError, selftest};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use zeroize::Zeroizing;

/// Cryptex crypto server
#[derive(Parser, Debug)]
#[command(name = "cryptex-server")]
#[command(about = "Partitioned crypto service with a handle-based RPC interface")]
#[command(version)]
struct Args {
    /// Directory for key store entries (in-memory store if absent)
    #[arg(long)]
    store_dir: Option<String>,

    /// Key store encryption key as hex (random if absent)
    #[arg(long)]
    storage_key: Option<String>,

    /// Key store instance name
    #[arg(long, default_value = "KeyStore")]
    instance: String,

    /// Maximum live handles across all clients
    #[arg(long, default_value = "256")]
    max_handles: usize,

    /// Pages per channel dataport
    #[arg(long, default_value = "1")]
    dataport_pages: usize,

    /// Seed the DRBG deterministically (testing only)
    #[arg(long)]
    seed: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn crypto(seed: Option<u64>) -> Result<Crypto, ServerError> {
    match seed {
        Some(seed) => {
            tracing::warn!(seed, "deterministic DRBG seed - NOT suitable for production use");
            Ok(Crypto::with_seed(seed))
        },
        None => Ok(Crypto::new(&OsEntropy)?),
    }
}

fn storage_key(arg: Option<&str>, crypto: &mut Crypto) -> Result<Zeroizing<Vec<u8>>, ServerError> {
    let Some(arg) = arg else {
        tracing::warn!("No storage key provided - entries will not survive a restart");
        let mut key = Zeroizing::new(vec![0u8; STORAGE_KEY_LEN]);
        crypto.random(b"storage key", &mut key)?;
        return Ok(key);
    };

    let key = Zeroizing::new(
        hex::decode(arg).map_err(|err| ServerError::Config { reason: format!("storage key: {err}") })?,
    );
    if key.len() != STORAGE_KEY_LEN {
        return Err(ServerError::Config {
            reason: format!("storage key must be {STORAGE_KEY_LEN} bytes, got {}", key.len()),
        });
    }
    Ok(key)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Cryptex server starting");

    if args.dataport_pages == 0 || args.max_handles == 0 {
        return Err(ServerError::Config { reason: "limits must be non-zero".to_string() }.into());
    }

    let mut store_crypto = crypto(args.seed)?;
    let key = storage_key(args.storage_key.as_deref(), &mut store_crypto)?;

    let files: Box<dyn FileStore> = match &args.store_dir {
        Some(dir) => {
            tracing::info!(dir = %dir, "Persistent key store");
            Box::new(DirFileStore::new(dir)?)
        },
        None => Box::new(MemoryFileStore::new()),
    };
    let key_store = KeyStore::new(files, &key, KeyStoreConfig::named(args.instance), store_crypto)?;

    let config = ServerConfig {
        vault: VaultConfig { max_handles: args.max_handles, ..VaultConfig::default() },
        dataport_pages: args.dataport_pages,
    };
    let vault_crypto = crypto(args.seed.map(|seed| seed.wrapping_add(1)))?;
    let server = Arc::new(CryptoServer::new(config, vault_crypto, Some(key_store)));

    let mut client = RpcClient::new(server.open_channel());
    selftest::run(&mut client, true)?;
    drop(client);

    tracing::info!(live_handles = server.handle_count(), "Cryptex server self-test complete");

    Ok(())
}
