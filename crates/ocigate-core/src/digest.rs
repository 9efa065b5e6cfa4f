//! Content digests (`algorithm:hex`).

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{OcigateError, Result};

#[allow(clippy::expect_used)]
static ALGORITHM_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:[.+_-][a-z0-9]+)*$").expect("invalid digest algorithm regex")
});

/// Content-addressed digest. Serialized as `algorithm:hex`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest {
    algorithm: String,
    hex: String,
}

impl Digest {
    pub fn parse(s: &str) -> Result<Self> {
        let (algorithm, encoded) = s
            .split_once(':')
            .ok_or_else(|| OcigateError::InvalidDigest(format!("missing algorithm in {s:?}")))?;

        if !ALGORITHM_REGEX.is_match(algorithm) {
            return Err(OcigateError::InvalidDigest(format!(
                "bad algorithm {algorithm:?}"
            )));
        }

        let expected_len = match algorithm {
            "sha256" => Some(64),
            "sha512" => Some(128),
            _ => None,
        };
        if let Some(n) = expected_len {
            if encoded.len() != n {
                return Err(OcigateError::InvalidDigest(format!(
                    "{algorithm} wants {n} hex chars, got {}",
                    encoded.len()
                )));
            }
        }
        if encoded.is_empty() || encoded.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(OcigateError::InvalidDigest(format!(
                "bad encoded part {encoded:?}"
            )));
        }
        hex::decode(encoded)
            .map_err(|e| OcigateError::InvalidDigest(format!("{encoded:?}: {e}")))?;

        Ok(Self {
            algorithm: algorithm.to_string(),
            hex: encoded.to_string(),
        })
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Encoded hash without the algorithm prefix.
    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl FromStr for Digest {
    type Err = OcigateError;

    fn from_str(s: &str) -> Result<Self> {
        Digest::parse(s)
    }
}

impl TryFrom<String> for Digest {
    type Error = OcigateError;

    fn try_from(s: String) -> Result<Self> {
        Digest::parse(&s)
    }
}

impl From<Digest> for String {
    fn from(d: Digest) -> Self {
        d.to_string()
    }
}
