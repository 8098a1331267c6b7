//! The ECR API operations the resolver depends on.
//!
//! [`EcrApi`] is the seam between resolution logic and the AWS SDK. The SDK
//! client implements it in [`crate::sdk`]; tests substitute a fake.

use async_trait::async_trait;
use ecr_resolver_core::ImageIdentifier;

use crate::error::BoxError;

/// Result of a registry API call. Errors are passed through unmodified.
pub type ApiResult<T> = std::result::Result<T, BoxError>;

/// Arguments to `BatchGetImage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchGetImageRequest {
    /// Registry (account) id.
    pub registry_id: String,
    /// Repository name.
    pub repository: String,
    /// Images to look up.
    pub image_ids: Vec<ImageIdentifier>,
    /// Manifest media types the caller can handle.
    pub accepted_media_types: Vec<String>,
}

/// An image as returned by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    /// Repository name.
    pub repository: String,
    /// Manifest digest.
    pub digest: String,
    /// Raw manifest text.
    pub manifest: String,
    /// Manifest media type, when the registry reports one.
    pub manifest_media_type: Option<String>,
}

/// Arguments to `PutImage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutImageRequest {
    /// Registry (account) id.
    pub registry_id: String,
    /// Repository name.
    pub repository: String,
    /// Tag to apply, if any.
    pub tag: Option<String>,
    /// Digest of the manifest, if pushing by digest.
    pub digest: Option<String>,
    /// Raw manifest text.
    pub manifest: String,
    /// Manifest media type.
    pub manifest_media_type: String,
}

/// An open layer upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerUpload {
    /// Upload session id.
    pub upload_id: String,
    /// Part size the registry expects, in bytes.
    pub part_size: u64,
}

/// One part of a layer upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerPart {
    /// Registry (account) id.
    pub registry_id: String,
    /// Repository name.
    pub repository: String,
    /// Upload session id.
    pub upload_id: String,
    /// Offset of the first byte in the part.
    pub first_byte: u64,
    /// Offset of the last byte in the part (inclusive).
    pub last_byte: u64,
    /// Part contents.
    pub data: Vec<u8>,
}

/// ECR registry API client.
#[async_trait]
pub trait EcrApi: Send + Sync {
    /// Looks up images by tag or digest.
    async fn batch_get_image(&self, request: BatchGetImageRequest) -> ApiResult<Vec<ImageRecord>>;

    /// Stores a manifest.
    async fn put_image(&self, request: PutImageRequest) -> ApiResult<ImageRecord>;

    /// Returns a pre-signed URL to download a layer blob.
    async fn get_download_url_for_layer(
        &self,
        registry_id: &str,
        repository: &str,
        digest: &str,
    ) -> ApiResult<String>;

    /// Returns true if the layer blob is already stored.
    async fn layer_available(
        &self,
        registry_id: &str,
        repository: &str,
        digest: &str,
    ) -> ApiResult<bool>;

    /// Starts a layer upload.
    async fn initiate_layer_upload(
        &self,
        registry_id: &str,
        repository: &str,
    ) -> ApiResult<LayerUpload>;

    /// Sends one part of a layer upload.
    async fn upload_layer_part(&self, part: LayerPart) -> ApiResult<()>;

    /// Finishes a layer upload and returns the digest the registry computed.
    async fn complete_layer_upload(
        &self,
        registry_id: &str,
        repository: &str,
        upload_id: &str,
        digest: &str,
    ) -> ApiResult<String>;
}
