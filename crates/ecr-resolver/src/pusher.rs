//! Content upload for a reference.

use std::sync::Arc;

use async_trait::async_trait;
use ecr_resolver_core::{Descriptor, EcrSpec, ImageIdentifier, ManifestError};

use crate::api::{BatchGetImageRequest, EcrApi, LayerPart, PutImageRequest};
use crate::error::{ResolverError, Result};
use crate::fetcher::verify_content;
use crate::remotes::{PushOutcome, Pusher};

/// Uploads manifests and blobs to one ECR repository.
pub struct EcrPusher {
    spec: EcrSpec,
    client: Arc<dyn EcrApi>,
    part_size: Option<u64>,
}

impl EcrPusher {
    pub(crate) fn new(spec: EcrSpec, client: Arc<dyn EcrApi>, part_size: Option<u64>) -> Self {
        Self {
            spec,
            client,
            part_size,
        }
    }

    /// Returns the reference this pusher is bound to.
    #[must_use]
    pub const fn spec(&self) -> &EcrSpec {
        &self.spec
    }

    /// Tag to apply when pushing `descriptor`.
    ///
    /// With a tag-plus-digest reference only the manifest with that digest
    /// receives the tag.
    fn tag_for(&self, descriptor: &Descriptor) -> Option<String> {
        let tag = self.spec.tag()?;
        match self.spec.digest() {
            Some(digest) if digest != descriptor.digest => None,
            _ => Some(tag.to_string()),
        }
    }

    /// Returns true if `descriptor` is already stored under `tag`, or under
    /// its digest when the push is untagged.
    async fn manifest_current(&self, descriptor: &Descriptor, tag: Option<&str>) -> Result<bool> {
        let image_id = match tag {
            Some(tag) => ImageIdentifier::tag(tag),
            None => ImageIdentifier::digest(&descriptor.digest),
        };
        let request = BatchGetImageRequest {
            registry_id: self.spec.registry_id().to_string(),
            repository: self.spec.repository().to_string(),
            image_ids: vec![image_id],
            accepted_media_types: vec![descriptor.media_type.to_string()],
        };
        let images = self
            .client
            .batch_get_image(request)
            .await
            .map_err(ResolverError::Remote)?;
        Ok(images.iter().any(|image| image.digest == descriptor.digest))
    }

    async fn push_manifest(&self, descriptor: &Descriptor, content: &[u8]) -> Result<PushOutcome> {
        let manifest = std::str::from_utf8(content).map_err(|_| ManifestError::NotUtf8)?;
        let tag = self.tag_for(descriptor);

        tracing::debug!(
            repository = self.spec.repository(),
            digest = %descriptor.digest,
            tag = tag.as_deref(),
            "Pushing manifest"
        );

        if self.manifest_current(descriptor, tag.as_deref()).await? {
            tracing::debug!(
                digest = %descriptor.digest,
                tag = tag.as_deref(),
                "Manifest already exists"
            );
            return Ok(PushOutcome::AlreadyExists);
        }

        let request = PutImageRequest {
            registry_id: self.spec.registry_id().to_string(),
            repository: self.spec.repository().to_string(),
            tag,
            digest: Some(descriptor.digest.clone()),
            manifest: manifest.to_string(),
            manifest_media_type: descriptor.media_type.to_string(),
        };
        let image = self
            .client
            .put_image(request)
            .await
            .map_err(ResolverError::Remote)?;

        tracing::info!(
            repository = self.spec.repository(),
            digest = %image.digest,
            "Pushed manifest"
        );
        Ok(PushOutcome::Pushed)
    }

    async fn push_blob(&self, descriptor: &Descriptor, content: &[u8]) -> Result<PushOutcome> {
        let registry_id = self.spec.registry_id();
        let repository = self.spec.repository();

        tracing::debug!(repository, digest = %descriptor.digest, "Pushing blob");

        if self
            .client
            .layer_available(registry_id, repository, &descriptor.digest)
            .await
            .map_err(ResolverError::Remote)?
        {
            tracing::debug!(digest = %descriptor.digest, "Blob already exists");
            return Ok(PushOutcome::AlreadyExists);
        }

        let upload = self
            .client
            .initiate_layer_upload(registry_id, repository)
            .await
            .map_err(ResolverError::Remote)?;

        let part_size = self.part_size.unwrap_or(upload.part_size);
        let chunk_len = usize::try_from(part_size)
            .ok()
            .filter(|len| *len > 0)
            .ok_or_else(|| ResolverError::Config {
                message: format!("unusable upload part size {part_size}"),
            })?;

        let mut first_byte = 0u64;
        for chunk in content.chunks(chunk_len) {
            let last_byte = first_byte + chunk.len() as u64 - 1;
            self.client
                .upload_layer_part(LayerPart {
                    registry_id: registry_id.to_string(),
                    repository: repository.to_string(),
                    upload_id: upload.upload_id.clone(),
                    first_byte,
                    last_byte,
                    data: chunk.to_vec(),
                })
                .await
                .map_err(ResolverError::Remote)?;
            first_byte = last_byte + 1;
        }

        let digest = self
            .client
            .complete_layer_upload(registry_id, repository, &upload.upload_id, &descriptor.digest)
            .await
            .map_err(ResolverError::Remote)?;

        if digest != descriptor.digest {
            return Err(ResolverError::ContentMismatch {
                digest: descriptor.digest.clone(),
                expected: descriptor.digest.clone(),
                actual: digest,
            });
        }

        tracing::info!(repository, digest = %descriptor.digest, size = descriptor.size, "Pushed blob");
        Ok(PushOutcome::Pushed)
    }
}

#[async_trait]
impl Pusher for EcrPusher {
    async fn push(&self, descriptor: &Descriptor, content: &[u8]) -> Result<PushOutcome> {
        verify_content(descriptor, content)?;
        if descriptor.is_manifest() {
            self.push_manifest(descriptor, content).await
        } else {
            self.push_blob(descriptor, content).await
        }
    }
}

impl std::fmt::Debug for EcrPusher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcrPusher")
            .field("spec", &self.spec)
            .field("part_size", &self.part_size)
            .finish_non_exhaustive()
    }
}
