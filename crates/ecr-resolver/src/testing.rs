//! Test doubles for the registry API and client factory.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ecr_resolver_core::digest::sha256_digest;
use parking_lot::Mutex;
use thiserror::Error;

use crate::api::{
    ApiResult, BatchGetImageRequest, EcrApi, ImageRecord, LayerPart, LayerUpload, PutImageRequest,
};
use crate::clients::ClientFactory;
use crate::error::BoxError;

/// Error returned by fakes when asked to fail.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct FakeError(pub &'static str);

type BatchGetImageFn = Box<dyn Fn(&BatchGetImageRequest) -> ApiResult<Vec<ImageRecord>> + Send + Sync>;

/// In-memory stand-in for the ECR API.
///
/// `batch_get_image` answers from `batch_get_image_fn` when set, otherwise
/// from the stored images. Layers live in a digest-keyed map; uploads are
/// assembled from their parts.
#[derive(Default)]
pub struct FakeEcrClient {
    pub batch_get_image_fn: Option<BatchGetImageFn>,
    pub images: Mutex<Vec<ImageRecord>>,
    pub tags: Mutex<HashMap<String, String>>,
    pub layers: Mutex<HashMap<String, Vec<u8>>>,
    pub download_urls: Mutex<HashMap<String, String>>,
    pub part_size: u64,
    pub fail_with: Option<&'static str>,
    pub batch_get_requests: Mutex<Vec<BatchGetImageRequest>>,
    pub put_requests: Mutex<Vec<PutImageRequest>>,
    pub parts: Mutex<Vec<LayerPart>>,
    uploads: Mutex<HashMap<String, Vec<u8>>>,
    upload_count: AtomicUsize,
}

impl FakeEcrClient {
    pub fn with_batch_get_image(
        f: impl Fn(&BatchGetImageRequest) -> ApiResult<Vec<ImageRecord>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            batch_get_image_fn: Some(Box::new(f)),
            ..Self::default()
        }
    }

    pub fn failing(message: &'static str) -> Self {
        Self {
            fail_with: Some(message),
            ..Self::default()
        }
    }

    pub fn with_part_size(mut self, part_size: u64) -> Self {
        self.part_size = part_size;
        self
    }

    pub fn add_image(&self, image: ImageRecord) {
        self.images.lock().push(image);
    }

    pub fn tag_image(&self, tag: &str, digest: &str) {
        self.tags.lock().insert(tag.to_string(), digest.to_string());
    }

    pub fn add_layer(&self, digest: &str, data: &[u8]) {
        self.layers.lock().insert(digest.to_string(), data.to_vec());
    }

    fn check_failure(&self) -> ApiResult<()> {
        match self.fail_with {
            Some(message) => Err(Box::new(FakeError(message))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl EcrApi for FakeEcrClient {
    async fn batch_get_image(&self, request: BatchGetImageRequest) -> ApiResult<Vec<ImageRecord>> {
        self.batch_get_requests.lock().push(request.clone());
        self.check_failure()?;
        if let Some(f) = &self.batch_get_image_fn {
            return f(&request);
        }

        let tags = self.tags.lock();
        let images = self.images.lock();
        Ok(images
            .iter()
            .filter(|image| image.repository == request.repository)
            .filter(|image| {
                request.image_ids.iter().any(|id| match (&id.tag, &id.digest) {
                    (Some(tag), _) => tags.get(tag) == Some(&image.digest),
                    (None, Some(digest)) => *digest == image.digest,
                    (None, None) => false,
                })
            })
            .cloned()
            .collect())
    }

    async fn put_image(&self, request: PutImageRequest) -> ApiResult<ImageRecord> {
        self.put_requests.lock().push(request.clone());
        self.check_failure()?;
        let tag = request.tag.clone();
        let record = ImageRecord {
            repository: request.repository,
            digest: request
                .digest
                .unwrap_or_else(|| sha256_digest(request.manifest.as_bytes())),
            manifest: request.manifest,
            manifest_media_type: Some(request.manifest_media_type),
        };
        if let Some(tag) = &tag {
            self.tag_image(tag, &record.digest);
        }
        self.images.lock().push(record.clone());
        Ok(record)
    }

    async fn get_download_url_for_layer(
        &self,
        _registry_id: &str,
        _repository: &str,
        digest: &str,
    ) -> ApiResult<String> {
        self.check_failure()?;
        self.download_urls
            .lock()
            .get(digest)
            .cloned()
            .ok_or_else(|| Box::new(FakeError("layer not found")) as BoxError)
    }

    async fn layer_available(
        &self,
        _registry_id: &str,
        _repository: &str,
        digest: &str,
    ) -> ApiResult<bool> {
        self.check_failure()?;
        Ok(self.layers.lock().contains_key(digest))
    }

    async fn initiate_layer_upload(
        &self,
        _registry_id: &str,
        _repository: &str,
    ) -> ApiResult<LayerUpload> {
        self.check_failure()?;
        let upload_id = format!("upload-{}", self.upload_count.fetch_add(1, Ordering::SeqCst));
        self.uploads.lock().insert(upload_id.clone(), Vec::new());
        Ok(LayerUpload {
            upload_id,
            part_size: if self.part_size == 0 { 1024 } else { self.part_size },
        })
    }

    async fn upload_layer_part(&self, part: LayerPart) -> ApiResult<()> {
        self.check_failure()?;
        let mut uploads = self.uploads.lock();
        let buffer = uploads
            .get_mut(&part.upload_id)
            .ok_or_else(|| Box::new(FakeError("unknown upload")) as BoxError)?;
        if part.first_byte != buffer.len() as u64 {
            return Err(Box::new(FakeError("part out of order")));
        }
        buffer.extend_from_slice(&part.data);
        drop(uploads);
        self.parts.lock().push(part);
        Ok(())
    }

    async fn complete_layer_upload(
        &self,
        _registry_id: &str,
        _repository: &str,
        upload_id: &str,
        _digest: &str,
    ) -> ApiResult<String> {
        self.check_failure()?;
        let data = self
            .uploads
            .lock()
            .remove(upload_id)
            .ok_or_else(|| Box::new(FakeError("unknown upload")) as BoxError)?;
        let digest = sha256_digest(&data);
        self.layers.lock().insert(digest.clone(), data);
        Ok(digest)
    }
}

/// Factory that counts how many clients it builds.
#[derive(Default)]
pub struct CountingFactory {
    built: AtomicUsize,
    regions: Mutex<Vec<String>>,
    delay: Option<Duration>,
    fail_next: AtomicBool,
}

impl CountingFactory {
    /// Sleeps during construction so concurrent callers overlap.
    pub fn slow() -> Self {
        Self {
            delay: Some(Duration::from_millis(50)),
            ..Self::default()
        }
    }

    /// Fails the first construction attempt.
    pub fn failing_once() -> Self {
        Self {
            fail_next: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }

    pub fn regions(&self) -> Vec<String> {
        self.regions.lock().clone()
    }
}

#[async_trait]
impl ClientFactory for CountingFactory {
    async fn client_for(&self, region: &str) -> ApiResult<Arc<dyn EcrApi>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(Box::new(FakeError("no credentials")));
        }
        self.built.fetch_add(1, Ordering::SeqCst);
        self.regions.lock().push(region.to_string());
        Ok(Arc::new(FakeEcrClient::default()))
    }
}
