//! Registry collaborator seam.
//!
//! The bridge only reads: open a repository by name, resolve a tag, fetch a
//! manifest by digest. Storage backends implement these traits.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use ocigate_core::digest::Digest;
use ocigate_core::error::RegistryError;
use ocigate_core::reference::RepositoryName;

/// What a tag points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDescriptor {
    pub media_type: String,
    pub size: i64,
    pub digest: Digest,
}

#[async_trait]
pub trait Namespace: Send + Sync {
    async fn repository(&self, name: &RepositoryName) -> Result<Arc<dyn Repository>, RegistryError>;
}

#[async_trait]
pub trait Repository: Send + Sync {
    fn name(&self) -> &RepositoryName;
    fn tags(&self) -> Arc<dyn TagService>;
    async fn manifests(&self) -> Result<Arc<dyn ManifestService>, RegistryError>;
}

#[async_trait]
pub trait TagService: Send + Sync {
    /// `RegistryError::TagUnknown` when the tag does not exist.
    async fn get(&self, tag: &str) -> Result<TagDescriptor, RegistryError>;
}

#[async_trait]
pub trait ManifestService: Send + Sync {
    async fn get(&self, digest: &Digest) -> Result<Arc<dyn Manifest>, RegistryError>;
}

pub trait Manifest: Send + Sync {
    /// Media type and raw payload.
    fn payload(&self) -> Result<(String, Bytes), RegistryError>;
}

/// Manifest already held in memory.
#[derive(Debug, Clone)]
pub struct StoredManifest {
    pub media_type: String,
    pub payload: Bytes,
}

impl StoredManifest {
    pub fn new(media_type: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            media_type: media_type.into(),
            payload: payload.into(),
        }
    }
}

impl Manifest for StoredManifest {
    fn payload(&self) -> Result<(String, Bytes), RegistryError> {
        Ok((self.media_type.clone(), self.payload.clone()))
    }
}
