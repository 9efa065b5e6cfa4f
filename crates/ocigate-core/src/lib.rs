//! ocigate core: registry data contracts and the shared error surface.
//!
//! This crate defines image references, digests, manifest decoding and the
//! registry event schema used by the policy bridge. It carries no runtime
//! dependencies so it can be reused by tooling that never evaluates policy.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `OcigateError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod digest;
pub mod error;
pub mod event;
pub mod manifest;
pub mod reference;

/// Shared result type.
pub use error::{ErrorKind, OcigateError, RegistryError, Result};
