//! `oci.blob_digest(reference, media_type)`: hex digest of the first layer
//! with `media_type` in the manifest `reference` points at.
//!
//! Absence is a result, not an error: an unknown tag or a manifest without
//! a matching layer both yield `""`.

use async_trait::async_trait;
use serde_json::Value;

use ocigate_core::error::{OcigateError, RegistryError, Result};
use ocigate_core::manifest::ImageManifest;
use ocigate_core::reference::{split_tag, RepositoryName};

use super::{cancellable, string_arg, BridgeFunction};
use crate::context::EvaluationContext;
use crate::policy::{BuiltinContext, FunctionDecl, ValueType};

pub const NAME: &str = "oci.blob_digest";

pub struct BlobDigest {
    decl: FunctionDecl,
}

impl BlobDigest {
    pub fn new() -> Self {
        Self {
            decl: FunctionDecl::new(
                NAME,
                vec![ValueType::String, ValueType::String],
                ValueType::String,
            )
            .nondeterministic(),
        }
    }
}

impl Default for BlobDigest {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BridgeFunction for BlobDigest {
    fn decl(&self) -> &FunctionDecl {
        &self.decl
    }

    async fn eval(
        &self,
        fctx: &EvaluationContext,
        bctx: &BuiltinContext,
        args: Vec<Value>,
    ) -> Result<Value> {
        let reference = string_arg(&args, 0, "oci reference")?;
        let media_type = string_arg(&args, 1, "oci layer mediatype")?;

        let split = split_tag(reference)?;
        let name = RepositoryName::parse(split.name)?;
        let cancel = &bctx.cancel;

        let repository = cancellable(cancel, fctx.namespace().repository(&name))
            .await?
            .map_err(|e| OcigateError::registry(format!("while getting repository {name}"), e))?;

        let tags = repository.tags();
        let tag = match cancellable(cancel, tags.get(split.tag)).await? {
            Ok(desc) => desc,
            Err(RegistryError::TagUnknown { .. }) => {
                tracing::debug!(repository = %name, tag = split.tag, "tag unknown");
                return Ok(Value::String(String::new()));
            }
            Err(e) => {
                return Err(OcigateError::registry(
                    format!("while getting tag {}", split.tag),
                    e,
                ))
            }
        };

        let manifests = cancellable(cancel, repository.manifests())
            .await?
            .map_err(|e| {
                OcigateError::registry(format!("while getting manifest service for {name}"), e)
            })?;
        let manifest = cancellable(cancel, manifests.get(&tag.digest))
            .await?
            .map_err(|e| OcigateError::registry(format!("while getting manifest for {name}"), e))?;

        let (_, payload) = manifest.payload().map_err(|e| {
            OcigateError::registry(format!("while reading manifest payload for {name}"), e)
        })?;
        let image = ImageManifest::decode(&payload)?;

        let digest = image
            .first_layer(media_type)
            .map(|layer| layer.digest.hex().to_string())
            .unwrap_or_default();
        if digest.is_empty() {
            tracing::debug!(repository = %name, tag = split.tag, media_type, "no matching layer");
        }
        Ok(Value::String(digest))
    }
}
