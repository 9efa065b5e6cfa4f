//! Top-level facade crate for ocigate.
//!
//! Re-exports core types and the policy bridge so users can depend on a single crate.

pub mod core {
    pub use ocigate_core::*;
}

pub mod bridge {
    pub use ocigate_bridge::*;
}
