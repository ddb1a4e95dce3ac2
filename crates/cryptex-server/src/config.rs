//! Server configuration.

use cryptex_core::VaultConfig;

/// Server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Handle table and payload limits
    pub vault: VaultConfig,
    /// Pages per channel dataport
    pub dataport_pages: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { vault: VaultConfig::default(), dataport_pages: 1 }
    }
}
