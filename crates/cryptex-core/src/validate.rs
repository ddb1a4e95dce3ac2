//! Argument checks shared by the Vault and the RPC client.
//!
//! The client runs the same checks before anything crosses the boundary, so a
//! call that the server would reject for its shape never leaves the caller.

use crate::{Result, VaultError};

/// Reject an empty mandatory input.
pub fn require_input(data: &[u8], reason: &'static str) -> Result<()> {
    if data.is_empty() {
        return Err(VaultError::InvalidParameter { reason });
    }
    Ok(())
}

/// Reject an input longer than `max`.
pub fn check_payload(len: usize, max: usize) -> Result<()> {
    if len > max {
        return Err(VaultError::PayloadTooLarge { len, max });
    }
    Ok(())
}

/// Reject an empty output buffer where output is mandatory.
pub fn require_output(out: &[u8], reason: &'static str) -> Result<()> {
    if out.is_empty() {
        return Err(VaultError::InvalidParameter { reason });
    }
    Ok(())
}

/// Reject an empty key-store name before any lookup.
pub fn require_name(name: &str) -> Result<()> {
    require_input(name.as_bytes(), "empty key name")
}
