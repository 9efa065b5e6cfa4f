use serde::Deserialize;
use ocigate_core::error::{OcigateError, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    pub version: u32,

    #[serde(default)]
    pub pool: PoolSection,

    #[serde(default)]
    pub evaluation: EvaluationSection,
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(OcigateError::UnsupportedVersion);
        }

        self.pool.validate()?;
        self.evaluation.validate()?;

        Ok(())
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            version: 1,
            pool: PoolSection::default(),
            evaluation: EvaluationSection::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolSection {
    /// Free buffers kept for reuse; more are deallocated on release.
    #[serde(default = "default_max_idle")]
    pub max_idle: usize,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            max_idle: default_max_idle(),
        }
    }
}

impl PoolSection {
    pub fn validate(&self) -> Result<()> {
        if self.max_idle > 4096 {
            return Err(OcigateError::Config(
                "pool.max_idle must be at most 4096".into(),
            ));
        }
        Ok(())
    }
}

fn default_max_idle() -> usize {
    64
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvaluationSection {
    /// Query handed to the evaluator for every request.
    #[serde(default = "default_query")]
    pub query: String,

    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
}

impl Default for EvaluationSection {
    fn default() -> Self {
        Self {
            query: default_query(),
            deadline_ms: default_deadline_ms(),
        }
    }
}

impl EvaluationSection {
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(OcigateError::Config(
                "evaluation.query must not be empty".into(),
            ));
        }
        if !(1..=600000).contains(&self.deadline_ms) {
            return Err(OcigateError::Config(
                "evaluation.deadline_ms must be between 1 and 600000".into(),
            ));
        }
        Ok(())
    }
}

fn default_query() -> String {
    "data.router.decision".into()
}
fn default_deadline_ms() -> u64 {
    5000
}
