//! Test harness for cryptex.
//!
//! Drives the same checks through every way of reaching a Vault: in-process
//! through [`LocalTarget`] and across the RPC boundary through
//! [`RemoteTarget`]. Both must report identical outcomes for identical calls.
//!
//! - [`conformance`]: known-answer and lifecycle checks over the facade traits
//! - [`model`]: handle-table reference model for randomized operation sequences
//! - [`vectors`]: test vectors in import encoding
//!
//! A failed check surfaces as a [`Violation`] naming the check and what went
//! wrong; [`Suite::assert_all`] turns those into a panic for use in tests.

pub mod conformance;
mod fixture;
pub mod model;
pub mod vectors;

pub use conformance::{CheckResult, Suite, Violation};
pub use fixture::{FixtureConfig, LocalTarget, RemoteTarget, Target};
pub use model::{Driver, ModelVault, Operation};
