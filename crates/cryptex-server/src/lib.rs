//! Serving side of the cryptex RPC boundary.
//!
//! # Components
//!
//! - [`CryptoServer`]: owns the single Vault and decodes each call header
//!   into a Vault operation for the calling owner
//! - [`LocalChannel`]: in-process [`cryptex_proto::Channel`] with its own
//!   dataport; dropping it releases every handle it opened
//! - [`selftest`]: startup checks run through the facade traits
//!
//! Failed calls never leave partial output behind: the dispatcher stages
//! results in a private buffer and copies them into the dataport only once
//! the operation has succeeded.

mod config;
mod dispatch;
mod error;
pub mod selftest;
mod server;

pub use config::ServerConfig;
pub use error::ServerError;
pub use server::{CryptoServer, LocalChannel};
