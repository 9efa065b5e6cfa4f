//! Image references (`name:tag`) and repository name grammar.
//!
//! Parsing rules:
//! - The **last** `:` separates the tag, so a registry port inside the name
//!   (`localhost:5000/app:v1`) never confuses the split.
//! - Repository names follow the distribution grammar: optional domain
//!   (with port) followed by lowercase path components.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{OcigateError, Result};

/// Maximum length of a full repository name.
pub const NAME_TOTAL_LENGTH_MAX: usize = 255;

#[allow(clippy::expect_used)]
static NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    let domain_component = r"(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])";
    let domain = format!(r"{domain_component}(?:\.{domain_component})*(?::[0-9]+)?");
    let path_component = r"[a-z0-9]+(?:(?:[._]|__|[-]*)[a-z0-9]+)*";
    let pattern = format!(r"^(?:{domain}/)?{path_component}(?:/{path_component})*$");
    Regex::new(&pattern).expect("invalid repository name regex")
});

/// Validated repository name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryName(String);

impl RepositoryName {
    pub fn parse(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(OcigateError::BadReferenceName(
                "repository name must have at least one component".into(),
            ));
        }
        if name.len() > NAME_TOTAL_LENGTH_MAX {
            return Err(OcigateError::BadReferenceName(format!(
                "repository name must not be more than {NAME_TOTAL_LENGTH_MAX} characters"
            )));
        }
        if !NAME_REGEX.is_match(name) {
            return Err(OcigateError::BadReferenceName(format!(
                "invalid reference format: {name}"
            )));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepositoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unvalidated `name:tag` split. Only the separator and a non-empty tag are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggedRef<'a> {
    pub name: &'a str,
    pub tag: &'a str,
}

/// Split a reference at its last `:`.
pub fn split_tag(reference: &str) -> Result<TaggedRef<'_>> {
    let (name, tag) = reference
        .rsplit_once(':')
        .ok_or(OcigateError::ReferenceWithoutTag)?;
    if tag.is_empty() {
        return Err(OcigateError::ReferenceWithoutTag);
    }
    Ok(TaggedRef { name, tag })
}

/// Parsed image reference with a validated repository name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub name: RepositoryName,
    pub tag: String,
}

impl ImageReference {
    pub fn parse(reference: &str) -> Result<Self> {
        let split = split_tag(reference)?;
        let name = RepositoryName::parse(split.name)?;
        Ok(Self {
            name,
            tag: split.tag.to_string(),
        })
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}
