//! Client side of the cryptex RPC protocol.
//!
//! [`RpcClient`] implements the same facade traits as the in-process
//! [`cryptex_core::LocalContext`], so calling code is written once and bound to
//! either. The client never holds a pointer into server memory: it names
//! objects by handle and moves payloads through the channel's dataport.

pub mod client;

pub use client::RpcClient;
