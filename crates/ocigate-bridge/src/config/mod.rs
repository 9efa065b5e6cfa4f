//! Bridge config loader (strict parsing).

pub mod schema;

use std::fs;
use std::path::Path;

use ocigate_core::error::{OcigateError, Result};

pub use schema::{BridgeConfig, EvaluationSection, PoolSection};

/// Read, parse and validate the YAML file at `path`.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<BridgeConfig> {
    let path = path.as_ref();
    let s = fs::read_to_string(path).map_err(|e| {
        OcigateError::Config(format!("read config failed ({}): {e}", path.display()))
    })?;
    load_from_str(&s).map_err(|e| match e {
        OcigateError::Config(msg) => OcigateError::Config(format!("{}: {msg}", path.display())),
        other => other,
    })
}

pub fn load_from_str(s: &str) -> Result<BridgeConfig> {
    let cfg: BridgeConfig = serde_yaml::from_str(s)
        .map_err(|e| OcigateError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
