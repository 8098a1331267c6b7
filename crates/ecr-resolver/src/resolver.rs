//! Reference resolution against Amazon ECR.

use std::sync::Arc;

use async_trait::async_trait;
use ecr_resolver_core::media_type::{detect, supported_manifest_media_types};
use ecr_resolver_core::{Descriptor, EcrSpec, MediaType};

use crate::api::{BatchGetImageRequest, ImageRecord};
use crate::clients::{ClientFactory, ClientRegistry};
use crate::config::ResolverConfig;
use crate::error::{InvalidReason, ResolverError, Result};
use crate::fetcher::EcrFetcher;
use crate::pusher::EcrPusher;
use crate::remotes::Resolver;
use crate::sdk::SdkClientFactory;

/// Resolves `ecr.aws/` references and hands out fetchers and pushers.
///
/// Every call to [`resolve`](Resolver::resolve) queries the registry; only
/// the per-region API clients are kept between calls.
#[derive(Debug)]
pub struct EcrResolver {
    clients: ClientRegistry,
    http: reqwest::Client,
    config: ResolverConfig,
}

impl EcrResolver {
    /// Creates a resolver backed by the AWS SDK.
    ///
    /// The shared AWS configuration is loaded once here; regional clients
    /// are derived from it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::Config`] if the configuration is invalid.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ecr_resolver::{EcrResolver, Resolver, ResolverConfig};
    ///
    /// # async fn example() -> ecr_resolver::Result<()> {
    /// let resolver = EcrResolver::new(ResolverConfig::new()).await?;
    /// let (name, desc) = resolver
    ///     .resolve("ecr.aws/arn:aws:ecr:us-west-2:123456789012:repository/app:latest")
    ///     .await?;
    /// println!("{name} -> {}", desc.digest);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(config: ResolverConfig) -> Result<Self> {
        config.validate()?;
        let sdk_config = config.load_sdk_config().await;

        let mut factory = SdkClientFactory::new(sdk_config);
        if let Some(url) = &config.endpoint_url {
            factory = factory.with_endpoint_url(url);
        }

        Self::with_factory(config, Arc::new(factory))
    }

    /// Creates a resolver whose regional clients come from `factory`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::Config`] if the configuration is invalid or
    /// the HTTP client cannot be built.
    pub fn with_factory(config: ResolverConfig, factory: Arc<dyn ClientFactory>) -> Result<Self> {
        config.validate()?;
        let http = Self::build_http_client(&config)?;

        Ok(Self {
            clients: ClientRegistry::new(factory),
            http,
            config,
        })
    }

    /// Returns the per-region client registry.
    #[must_use]
    pub const fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    /// Returns the resolver configuration.
    #[must_use]
    pub const fn config(&self) -> &ResolverConfig {
        &self.config
    }

    fn build_http_client(config: &ResolverConfig) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ResolverError::Config {
                message: format!("failed to build HTTP client: {e}"),
            })
    }

    /// Picks the manifest media type for an image record.
    fn media_type_of(image: &ImageRecord) -> Result<MediaType> {
        match image.manifest_media_type.as_deref() {
            Some(media_type) if !media_type.is_empty() => Ok(MediaType::new(media_type)),
            _ => Ok(detect(image.manifest.as_bytes())?),
        }
    }
}

#[async_trait]
impl Resolver for EcrResolver {
    type Fetcher = EcrFetcher;
    type Pusher = EcrPusher;

    async fn resolve(&self, reference: &str) -> Result<(String, Descriptor)> {
        let spec = EcrSpec::parse(reference)?;
        let client = self.clients.client_for(spec.region()).await?;

        tracing::debug!(
            region = spec.region(),
            repository = spec.repository(),
            reference,
            "Resolving reference"
        );

        let request = BatchGetImageRequest {
            registry_id: spec.registry_id().to_string(),
            repository: spec.repository().to_string(),
            image_ids: vec![spec.image_id()],
            accepted_media_types: supported_manifest_media_types(),
        };
        let images = client
            .batch_get_image(request)
            .await
            .map_err(ResolverError::Remote)?;

        let Some(image) = images.into_iter().next() else {
            tracing::warn!(reference, "Image not found");
            return Err(ResolverError::not_found(reference));
        };

        if let Some(expected) = spec.digest() {
            if image.digest != expected {
                tracing::warn!(
                    reference,
                    expected,
                    actual = %image.digest,
                    "Resolved digest does not match reference"
                );
                return Err(ResolverError::ReferenceInvalid {
                    reference: reference.to_string(),
                    reason: InvalidReason::DigestMismatch {
                        expected: expected.to_string(),
                        actual: image.digest,
                    },
                });
            }
        }

        let media_type = Self::media_type_of(&image)?;
        let descriptor = Descriptor::new(media_type, image.digest, image.manifest.len() as u64);

        tracing::info!(
            reference,
            digest = %descriptor.digest,
            media_type = %descriptor.media_type,
            "Resolved reference"
        );

        Ok((reference.to_string(), descriptor))
    }

    async fn fetcher(&self, reference: &str) -> Result<EcrFetcher> {
        let spec = EcrSpec::parse(reference)?;
        let client = self.clients.client_for(spec.region()).await?;
        Ok(EcrFetcher::new(spec, client, self.http.clone()))
    }

    async fn pusher(&self, reference: &str) -> Result<EcrPusher> {
        let spec = EcrSpec::parse(reference)?;
        let client = self.clients.client_for(spec.region()).await?;
        Ok(EcrPusher::new(spec, client, self.config.upload_part_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::EcrApi;
    use crate::error::ErrorKind;
    use crate::remotes::{Fetcher, PushOutcome, Pusher};
    use crate::testing::{CountingFactory, FakeEcrClient, FakeError};
    use ecr_resolver_core::digest::sha256_digest;
    use ecr_resolver_core::{ImageIdentifier, ParseErrorKind};

    const REF: &str = "ecr.aws/arn:aws:ecr:fake:123456789012:repository/foo/bar:latest";
    const DIGEST: &str = "sha256:0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";
    const OCI_MANIFEST: &str =
        r#"{"schemaVersion": 2, "mediaType": "application/vnd.oci.image.manifest.v1+json"}"#;

    fn resolver_with(client: Arc<FakeEcrClient>) -> EcrResolver {
        let resolver =
            EcrResolver::with_factory(ResolverConfig::new(), Arc::new(CountingFactory::default()))
                .unwrap();
        let client: Arc<dyn EcrApi> = client;
        assert!(resolver.clients().insert("fake", client));
        resolver
    }

    fn record(manifest: &str, media_type: Option<&str>) -> ImageRecord {
        ImageRecord {
            repository: "foo/bar".to_string(),
            digest: DIGEST.to_string(),
            manifest: manifest.to_string(),
            manifest_media_type: media_type.map(ToString::to_string),
        }
    }

    #[tokio::test]
    async fn test_resolve() {
        let client = Arc::new(FakeEcrClient::with_batch_get_image(|_| {
            Ok(vec![record(OCI_MANIFEST, None)])
        }));
        let resolver = resolver_with(client.clone());

        let (name, desc) = resolver.resolve(REF).await.unwrap();

        assert_eq!(name, REF);
        assert_eq!(desc.media_type.as_str(), MediaType::OCI_MANIFEST);
        assert_eq!(desc.digest, DIGEST);
        assert_eq!(desc.size, OCI_MANIFEST.len() as u64);

        let requests = client.batch_get_requests.lock();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].registry_id, "123456789012");
        assert_eq!(requests[0].repository, "foo/bar");
        assert_eq!(requests[0].image_ids, vec![ImageIdentifier::tag("latest")]);
        assert_eq!(requests[0].accepted_media_types, supported_manifest_media_types());
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let client = Arc::new(FakeEcrClient::with_batch_get_image(|_| {
            Ok(vec![record(OCI_MANIFEST, None)])
        }));
        let resolver = resolver_with(client.clone());

        let first = resolver.resolve(REF).await.unwrap();
        let second = resolver.resolve(REF).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(client.batch_get_requests.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_remote_error_is_unmodified() {
        let client = Arc::new(FakeEcrClient::with_batch_get_image(|_| {
            Err(Box::new(FakeError("expected")))
        }));
        let resolver = resolver_with(client);

        let err = resolver.resolve(REF).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Remote);
        assert_eq!(err.to_string(), "expected");
        assert_eq!(
            err.as_remote().and_then(|e| e.downcast_ref::<FakeError>()),
            Some(&FakeError("expected"))
        );
    }

    #[tokio::test]
    async fn test_resolve_no_images_is_reference_invalid() {
        let client = Arc::new(FakeEcrClient::with_batch_get_image(|_| Ok(Vec::new())));
        let resolver = resolver_with(client);

        let err = resolver.resolve(REF).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ReferenceInvalid);
        assert!(matches!(
            err,
            ResolverError::ReferenceInvalid { reason: InvalidReason::NotFound, .. }
        ));
    }

    #[tokio::test]
    async fn test_resolve_tag_and_digest_queries_by_tag() {
        let client = Arc::new(FakeEcrClient::with_batch_get_image(|_| {
            Ok(vec![record(OCI_MANIFEST, None)])
        }));
        let resolver = resolver_with(client.clone());
        let reference = format!(
            "ecr.aws/arn:aws:ecr:fake:123456789012:repository/foo/bar:latest@{DIGEST}"
        );

        let (name, desc) = resolver.resolve(&reference).await.unwrap();

        assert_eq!(name, reference);
        assert_eq!(desc.digest, DIGEST);
        assert_eq!(
            client.batch_get_requests.lock()[0].image_ids,
            vec![ImageIdentifier::tag("latest")]
        );
    }

    #[tokio::test]
    async fn test_resolve_digest_mismatch() {
        let client = Arc::new(FakeEcrClient::with_batch_get_image(|_| {
            Ok(vec![record(OCI_MANIFEST, None)])
        }));
        let resolver = resolver_with(client);
        let other = sha256_digest(b"something else");
        let reference = format!(
            "ecr.aws/arn:aws:ecr:fake:123456789012:repository/foo/bar:latest@{other}"
        );

        let err = resolver.resolve(&reference).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ReferenceInvalid);
        match err {
            ResolverError::ReferenceInvalid {
                reason: InvalidReason::DigestMismatch { expected, actual },
                ..
            } => {
                assert_eq!(expected, other);
                assert_eq!(actual, DIGEST);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resolve_by_digest() {
        let client = Arc::new(FakeEcrClient::default());
        client.add_image(record(OCI_MANIFEST, None));
        let resolver = resolver_with(client.clone());

        let reference = format!("ecr.aws/arn:aws:ecr:fake:123456789012:repository/foo/bar@{DIGEST}");
        let (_, desc) = resolver.resolve(&reference).await.unwrap();

        assert_eq!(desc.digest, DIGEST);
        assert_eq!(
            client.batch_get_requests.lock()[0].image_ids,
            vec![ImageIdentifier::digest(DIGEST)]
        );
    }

    #[tokio::test]
    async fn test_resolve_prefers_registry_media_type() {
        let manifest = r#"{"schemaVersion":2,"config":{},"layers":[]}"#;
        let client = Arc::new(FakeEcrClient::with_batch_get_image(move |_| {
            Ok(vec![record(manifest, Some(MediaType::OCI_MANIFEST))])
        }));
        let resolver = resolver_with(client);

        let (_, desc) = resolver.resolve(REF).await.unwrap();
        assert_eq!(desc.media_type.as_str(), MediaType::OCI_MANIFEST);
    }

    #[tokio::test]
    async fn test_resolve_detects_missing_media_type() {
        let manifest = r#"{"schemaVersion":2,"config":{"digest":"sha256:c"},"layers":[]}"#;
        let client = Arc::new(FakeEcrClient::with_batch_get_image(move |_| {
            Ok(vec![record(manifest, None)])
        }));
        let resolver = resolver_with(client);

        let (_, desc) = resolver.resolve(REF).await.unwrap();
        assert_eq!(desc.media_type.as_str(), MediaType::DOCKER_SCHEMA2);
        assert_eq!(desc.size, manifest.len() as u64);
    }

    #[tokio::test]
    async fn test_resolve_invalid_manifest() {
        let client = Arc::new(FakeEcrClient::with_batch_get_image(|_| {
            Ok(vec![record("", None)])
        }));
        let resolver = resolver_with(client);

        let err = resolver.resolve(REF).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidManifest);
    }

    #[tokio::test]
    async fn test_malformed_references_fail_to_parse() {
        let client = Arc::new(FakeEcrClient::default());
        let resolver = resolver_with(client.clone());

        for (reference, kind) in [
            ("docker.io/library/alpine:latest", ParseErrorKind::MissingPrefix),
            ("ecr.aws/arn:aws:ecr::123456789012:repository/foo:latest", ParseErrorKind::MissingRegion),
            ("ecr.aws/arn:aws:ecr:fake:123456789012:repository/:latest", ParseErrorKind::InvalidRepository),
        ] {
            let parse_kind = |err: ResolverError| match err {
                ResolverError::Parse(e) => e.kind(),
                other => panic!("unexpected error for {reference}: {other:?}"),
            };
            assert_eq!(parse_kind(resolver.resolve(reference).await.unwrap_err()), kind);
            assert_eq!(parse_kind(resolver.fetcher(reference).await.unwrap_err()), kind);
            assert_eq!(parse_kind(resolver.pusher(reference).await.unwrap_err()), kind);
        }

        assert!(client.batch_get_requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_pusher_accepts_digest_references() {
        let client = Arc::new(FakeEcrClient::default());
        let resolver = resolver_with(client.clone());

        for reference in [
            format!("ecr.aws/arn:aws:ecr:fake:123456789012:repository/foo/bar@{DIGEST}"),
            format!("ecr.aws/arn:aws:ecr:fake:123456789012:repository/foo/bar:with-tag-and-digest@{DIGEST}"),
        ] {
            let pusher = resolver.pusher(&reference).await.unwrap();
            assert_eq!(pusher.spec().to_string(), reference);
        }

        assert!(client.batch_get_requests.lock().is_empty());
        assert!(client.put_requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_handles_share_regional_client() {
        let factory = Arc::new(CountingFactory::default());
        let resolver = EcrResolver::with_factory(ResolverConfig::new(), factory.clone()).unwrap();
        let reference = "ecr.aws/arn:aws:ecr:us-west-2:123456789012:repository/foo:latest";

        resolver.fetcher(reference).await.unwrap();
        resolver.pusher(reference).await.unwrap();

        assert_eq!(factory.built(), 1);
        assert_eq!(factory.regions(), vec!["us-west-2"]);
    }

    #[tokio::test]
    async fn test_push_then_fetch_manifest() {
        let client = Arc::new(FakeEcrClient::default());
        let resolver = resolver_with(client);
        let manifest = r#"{"schemaVersion":2,"mediaType":"application/vnd.oci.image.index.v1+json","manifests":[]}"#;
        let desc = Descriptor::new(
            MediaType::new(MediaType::OCI_INDEX),
            sha256_digest(manifest.as_bytes()),
            manifest.len() as u64,
        );
        let reference = "ecr.aws/arn:aws:ecr:fake:123456789012:repository/foo/bar:multi";

        let pusher = resolver.pusher(reference).await.unwrap();
        assert_eq!(
            pusher.push(&desc, manifest.as_bytes()).await.unwrap(),
            PushOutcome::Pushed
        );

        let (_, resolved) = resolver.resolve(reference).await.unwrap();
        assert_eq!(resolved, desc);

        let fetcher = resolver.fetcher(reference).await.unwrap();
        assert_eq!(fetcher.fetch(&resolved).await.unwrap(), manifest.as_bytes());
    }

    #[test]
    fn test_with_factory_rejects_invalid_config() {
        let err = EcrResolver::with_factory(
            ResolverConfig::new().with_endpoint_url("::"),
            Arc::new(CountingFactory::default()),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
