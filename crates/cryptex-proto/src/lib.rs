//! Wire vocabulary shared by every cryptex component.
//!
//! This crate is deliberately small: it defines the symbolic error codes that
//! cross the trust boundary, the numeric identifiers for algorithms and key
//! types, the opaque [`Handle`] token clients use to name server-owned objects,
//! and the fixed-size call/reply headers carried by a [`Channel`]. Variable
//! length payloads never travel in headers; they are staged in a
//! [`Dataport`].
//!
//! # Layering
//!
//! ```text
//! cryptex-proto   (this crate: ids, handles, headers, dataport)
//!      ^
//! cryptex-crypto  (Crypto Core)
//!      ^
//! cryptex-keystore
//!      ^
//! cryptex-core    (handle table, Vault engine, facade traits)
//!      ^          ^
//! cryptex-server  cryptex-client
//! ```

pub mod channel;
pub mod dataport;
pub mod error;
pub mod handle;
pub mod header;
pub mod ids;
pub mod opcode;

pub use channel::Channel;
pub use dataport::{Dataport, PAGE_SIZE};
pub use error::{ErrorCode, ProtocolError, Result};
pub use handle::{AgreementHandle, CipherHandle, DigestHandle, Handle, KeyHandle, SignatureHandle};
pub use header::{CallHeader, ReplyHeader};
pub use ids::{
    AgreementAlgorithm, CipherAlgorithm, CipherMode, DigestAlgorithm, KeyFamily, KeyFlags, KeyType,
    SignatureAlgorithm,
};
pub use opcode::Opcode;
