//! ocigate policy bridge.
//!
//! This crate connects an external rule evaluator to a registry: per-request
//! context propagation, the `oci.blob_digest` and `request.body` functions,
//! replayable request bodies backed by pooled buffers, and the
//! record-then-cancel error contract between functions and the evaluator.

pub mod body;
pub mod bridge;
pub mod builtins;
pub mod config;
pub mod context;
pub mod input;
pub mod policy;
pub mod pool;
pub mod registry;

pub use bridge::{Evaluation, PolicyBridge};
pub use context::EvaluationContext;
