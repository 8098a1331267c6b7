//! Content download for a resolved reference.

use std::sync::Arc;

use async_trait::async_trait;
use ecr_resolver_core::digest::compute_digest;
use ecr_resolver_core::{Descriptor, EcrSpec, ImageIdentifier};

use crate::api::{BatchGetImageRequest, EcrApi};
use crate::error::{ResolverError, Result};
use crate::remotes::Fetcher;

/// Downloads manifests and blobs from one ECR repository.
///
/// Manifests come back through `BatchGetImage`; layers and configs are
/// downloaded from the pre-signed URL ECR hands out for them.
pub struct EcrFetcher {
    spec: EcrSpec,
    client: Arc<dyn EcrApi>,
    http: reqwest::Client,
}

impl EcrFetcher {
    pub(crate) fn new(spec: EcrSpec, client: Arc<dyn EcrApi>, http: reqwest::Client) -> Self {
        Self { spec, client, http }
    }

    /// Returns the reference this fetcher is bound to.
    #[must_use]
    pub const fn spec(&self) -> &EcrSpec {
        &self.spec
    }

    /// Looks a manifest up by the descriptor's digest.
    async fn lookup_manifest(&self, descriptor: &Descriptor) -> Result<Option<Vec<u8>>> {
        let request = BatchGetImageRequest {
            registry_id: self.spec.registry_id().to_string(),
            repository: self.spec.repository().to_string(),
            image_ids: vec![ImageIdentifier::digest(&descriptor.digest)],
            accepted_media_types: vec![descriptor.media_type.to_string()],
        };
        let images = self
            .client
            .batch_get_image(request)
            .await
            .map_err(ResolverError::Remote)?;
        Ok(images.into_iter().next().map(|image| image.manifest.into_bytes()))
    }

    async fn fetch_manifest(&self, descriptor: &Descriptor) -> Result<Vec<u8>> {
        tracing::debug!(
            repository = self.spec.repository(),
            digest = %descriptor.digest,
            media_type = %descriptor.media_type,
            "Fetching manifest"
        );

        self.lookup_manifest(descriptor).await?.ok_or_else(|| {
            let reference = format!("{}@{}", self.spec.locator(), descriptor.digest);
            tracing::warn!(reference, "Manifest not found");
            ResolverError::not_found(reference)
        })
    }

    /// Downloads a layer or config blob.
    ///
    /// Media types outside [`ManifestKind`](ecr_resolver_core::ManifestKind)
    /// are routed here even when they name a manifest, so a failed layer
    /// lookup falls back to a manifest lookup by digest. If that finds
    /// nothing the layer lookup error is returned.
    async fn fetch_blob(&self, descriptor: &Descriptor) -> Result<Vec<u8>> {
        tracing::debug!(
            repository = self.spec.repository(),
            digest = %descriptor.digest,
            "Fetching blob"
        );

        let url = match self
            .client
            .get_download_url_for_layer(
                self.spec.registry_id(),
                self.spec.repository(),
                &descriptor.digest,
            )
            .await
        {
            Ok(url) => url,
            Err(err) => {
                tracing::debug!(
                    digest = %descriptor.digest,
                    error = %err,
                    "No layer download URL, trying manifest lookup"
                );
                return match self.lookup_manifest(descriptor).await {
                    Ok(Some(manifest)) => Ok(manifest),
                    _ => Err(ResolverError::Remote(err)),
                };
            }
        };

        let response = self.http.get(&url).send().await?.error_for_status()?;
        if let Some(length) = response.content_length() {
            if length > descriptor.size {
                return Err(ResolverError::ContentMismatch {
                    digest: descriptor.digest.clone(),
                    expected: format!("{} bytes", descriptor.size),
                    actual: format!("{length} bytes"),
                });
            }
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl Fetcher for EcrFetcher {
    async fn fetch(&self, descriptor: &Descriptor) -> Result<Vec<u8>> {
        let data = if descriptor.is_manifest() {
            self.fetch_manifest(descriptor).await?
        } else {
            self.fetch_blob(descriptor).await?
        };
        verify_content(descriptor, &data)?;
        Ok(data)
    }
}

impl std::fmt::Debug for EcrFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcrFetcher")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// Checks `data` against the size and digest in `descriptor`.
///
/// Digests with an algorithm we cannot compute are only checked by size.
pub(crate) fn verify_content(descriptor: &Descriptor, data: &[u8]) -> Result<()> {
    if data.len() as u64 != descriptor.size {
        return Err(ResolverError::ContentMismatch {
            digest: descriptor.digest.clone(),
            expected: format!("{} bytes", descriptor.size),
            actual: format!("{} bytes", data.len()),
        });
    }

    if let Some(actual) = compute_digest(descriptor.digest_algorithm(), data) {
        if actual != descriptor.digest {
            return Err(ResolverError::ContentMismatch {
                digest: descriptor.digest.clone(),
                expected: descriptor.digest.clone(),
                actual,
            });
        }
    }

    Ok(())
}
