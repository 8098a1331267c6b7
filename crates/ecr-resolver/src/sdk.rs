//! [`EcrApi`] backed by the AWS SDK.

use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_ecr::primitives::Blob;
use aws_sdk_ecr::types::{Image, ImageIdentifier as SdkImageIdentifier, LayerAvailability};
use aws_types::region::Region;
use aws_types::SdkConfig;
use thiserror::Error;

use crate::api::{
    ApiResult, BatchGetImageRequest, EcrApi, ImageRecord, LayerPart, LayerUpload, PutImageRequest,
};
use crate::clients::ClientFactory;

/// An SDK response lacked a field the resolver needs.
#[derive(Debug, Error)]
#[error("{operation} response is missing {field}")]
pub struct MissingField {
    /// API operation name.
    pub operation: &'static str,
    /// Missing field name.
    pub field: &'static str,
}

const fn missing(operation: &'static str, field: &'static str) -> MissingField {
    MissingField { operation, field }
}

fn image_record(operation: &'static str, image: &Image) -> ApiResult<ImageRecord> {
    let digest = image
        .image_id()
        .and_then(SdkImageIdentifier::image_digest)
        .ok_or_else(|| missing(operation, "imageId.imageDigest"))?;
    let manifest = image
        .image_manifest()
        .ok_or_else(|| missing(operation, "imageManifest"))?;

    Ok(ImageRecord {
        repository: image.repository_name().unwrap_or_default().to_string(),
        digest: digest.to_string(),
        manifest: manifest.to_string(),
        manifest_media_type: image.image_manifest_media_type().map(ToString::to_string),
    })
}

#[async_trait]
impl EcrApi for aws_sdk_ecr::Client {
    async fn batch_get_image(&self, request: BatchGetImageRequest) -> ApiResult<Vec<ImageRecord>> {
        let image_ids = request
            .image_ids
            .into_iter()
            .map(|id| {
                SdkImageIdentifier::builder()
                    .set_image_tag(id.tag)
                    .set_image_digest(id.digest)
                    .build()
            })
            .collect();

        let output = self
            .batch_get_image()
            .registry_id(request.registry_id)
            .repository_name(request.repository)
            .set_image_ids(Some(image_ids))
            .set_accepted_media_types(Some(request.accepted_media_types))
            .send()
            .await?;

        output
            .images()
            .iter()
            .map(|image| image_record("BatchGetImage", image))
            .collect()
    }

    async fn put_image(&self, request: PutImageRequest) -> ApiResult<ImageRecord> {
        let output = self
            .put_image()
            .registry_id(request.registry_id)
            .repository_name(request.repository)
            .set_image_tag(request.tag)
            .set_image_digest(request.digest)
            .image_manifest(request.manifest)
            .image_manifest_media_type(request.manifest_media_type)
            .send()
            .await?;

        let image = output.image().ok_or_else(|| missing("PutImage", "image"))?;
        image_record("PutImage", image)
    }

    async fn get_download_url_for_layer(
        &self,
        registry_id: &str,
        repository: &str,
        digest: &str,
    ) -> ApiResult<String> {
        let output = self
            .get_download_url_for_layer()
            .registry_id(registry_id)
            .repository_name(repository)
            .layer_digest(digest)
            .send()
            .await?;

        output
            .download_url()
            .map(ToString::to_string)
            .ok_or_else(|| missing("GetDownloadUrlForLayer", "downloadUrl").into())
    }

    async fn layer_available(
        &self,
        registry_id: &str,
        repository: &str,
        digest: &str,
    ) -> ApiResult<bool> {
        let output = self
            .batch_check_layer_availability()
            .registry_id(registry_id)
            .repository_name(repository)
            .layer_digests(digest)
            .send()
            .await?;

        Ok(output.layers().iter().any(|layer| {
            layer.layer_digest() == Some(digest)
                && layer.layer_availability() == Some(&LayerAvailability::Available)
        }))
    }

    async fn initiate_layer_upload(
        &self,
        registry_id: &str,
        repository: &str,
    ) -> ApiResult<LayerUpload> {
        let output = self
            .initiate_layer_upload()
            .registry_id(registry_id)
            .repository_name(repository)
            .send()
            .await?;

        let upload_id = output
            .upload_id()
            .ok_or_else(|| missing("InitiateLayerUpload", "uploadId"))?;
        let part_size = output
            .part_size()
            .ok_or_else(|| missing("InitiateLayerUpload", "partSize"))?;

        Ok(LayerUpload {
            upload_id: upload_id.to_string(),
            part_size: u64::try_from(part_size)?,
        })
    }

    async fn upload_layer_part(&self, part: LayerPart) -> ApiResult<()> {
        self.upload_layer_part()
            .registry_id(part.registry_id)
            .repository_name(part.repository)
            .upload_id(part.upload_id)
            .part_first_byte(i64::try_from(part.first_byte)?)
            .part_last_byte(i64::try_from(part.last_byte)?)
            .layer_part_blob(Blob::new(part.data))
            .send()
            .await?;
        Ok(())
    }

    async fn complete_layer_upload(
        &self,
        registry_id: &str,
        repository: &str,
        upload_id: &str,
        digest: &str,
    ) -> ApiResult<String> {
        let output = self
            .complete_layer_upload()
            .registry_id(registry_id)
            .repository_name(repository)
            .upload_id(upload_id)
            .layer_digests(digest)
            .send()
            .await?;

        output
            .layer_digest()
            .map(ToString::to_string)
            .ok_or_else(|| missing("CompleteLayerUpload", "layerDigest").into())
    }
}

/// Builds region-bound SDK clients from one shared AWS configuration.
#[derive(Debug, Clone)]
pub struct SdkClientFactory {
    config: SdkConfig,
    endpoint_url: Option<String>,
}

impl SdkClientFactory {
    /// Creates a factory from a loaded AWS configuration.
    #[must_use]
    pub const fn new(config: SdkConfig) -> Self {
        Self {
            config,
            endpoint_url: None,
        }
    }

    /// Sends every API call to `url` instead of the regional endpoint.
    #[must_use]
    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }
}

#[async_trait]
impl ClientFactory for SdkClientFactory {
    async fn client_for(&self, region: &str) -> ApiResult<Arc<dyn EcrApi>> {
        let mut builder =
            aws_sdk_ecr::config::Builder::from(&self.config).region(Region::new(region.to_string()));
        if let Some(url) = &self.endpoint_url {
            builder = builder.endpoint_url(url);
        }
        Ok(Arc::new(aws_sdk_ecr::Client::from_conf(builder.build())))
    }
}
