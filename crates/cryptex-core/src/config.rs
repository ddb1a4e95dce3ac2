//! Vault configuration.

/// Vault settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    /// Live handles across all owners
    pub max_handles: usize,
    /// Largest single input accepted by any operation
    pub max_payload: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self { max_handles: 256, max_payload: 4096 }
    }
}
