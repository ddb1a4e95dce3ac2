//! Key store configuration.

/// Key store settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStoreConfig {
    /// Instance name, bound into every entry's associated data so blobs
    /// cannot be moved between instances
    pub instance: String,
    /// Field separator in the record plaintext
    pub delimiter: u8,
    /// Largest raw key in bytes
    pub max_key_len: usize,
    /// Name buffer size including the terminator; usable names are one
    /// byte shorter
    pub max_name_len: usize,
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self { instance: "KeyStore".to_string(), delimiter: b',', max_key_len: 256, max_name_len: 16 }
    }
}

impl KeyStoreConfig {
    /// Default settings under another instance name.
    pub fn named(instance: impl Into<String>) -> Self {
        Self { instance: instance.into(), ..Self::default() }
    }
}
