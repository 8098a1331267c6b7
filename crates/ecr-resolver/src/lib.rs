//! # ECR Resolver
//!
//! Resolves, fetches and pushes OCI images stored in Amazon ECR behind a
//! generic image-distribution contract.
//!
//! References use the `ecr.aws/` scheme followed by the repository ARN and a
//! tag, a digest or both:
//!
//! ```text
//! ecr.aws/arn:aws:ecr:us-west-2:123456789012:repository/team/app:v1.2.0
//! ecr.aws/arn:aws:ecr:us-west-2:123456789012:repository/team/app@sha256:...
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ecr_resolver::{EcrResolver, Fetcher, Resolver, ResolverConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resolver = EcrResolver::new(ResolverConfig::new()).await?;
//!     let reference = "ecr.aws/arn:aws:ecr:us-west-2:123456789012:repository/app:latest";
//!
//!     let (_, descriptor) = resolver.resolve(reference).await?;
//!     let manifest = resolver.fetcher(reference).await?.fetch(&descriptor).await?;
//!     println!("{} ({} bytes)", descriptor.media_type, manifest.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                      EcrResolver                      │
//! │  ┌──────────────┐  ┌────────────────┐  ┌───────────┐  │
//! │  │ EcrSpec      │  │ ClientRegistry │  │ detect()  │  │
//! │  │ (parse)      │  │ (per region)   │  │ (shape)   │  │
//! │  └──────────────┘  └────────────────┘  └───────────┘  │
//! │         EcrFetcher               EcrPusher            │
//! └───────────────────────────────────────────────────────┘
//!                           │ EcrApi
//!                           ▼
//! ┌───────────────────────────────────────────────────────┐
//! │              Amazon ECR (aws-sdk-ecr)                 │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! Errors from the ECR API are returned untouched as
//! [`ResolverError::Remote`]; retries and timeouts for API calls are those
//! of the AWS SDK.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod api;
mod clients;
mod config;
mod error;
mod fetcher;
mod pusher;
mod remotes;
mod resolver;
mod sdk;

#[cfg(test)]
mod testing;

pub use api::{
    ApiResult, BatchGetImageRequest, EcrApi, ImageRecord, LayerPart, LayerUpload, PutImageRequest,
};
pub use clients::{ClientFactory, ClientRegistry};
pub use config::ResolverConfig;
pub use error::{BoxError, ErrorKind, InvalidReason, ResolverError, Result};
pub use fetcher::EcrFetcher;
pub use pusher::EcrPusher;
pub use remotes::{Fetcher, PushOutcome, Pusher, Resolver};
pub use resolver::EcrResolver;
pub use sdk::{MissingField, SdkClientFactory};

pub use ecr_resolver_core::{
    Descriptor, EcrSpec, ImageIdentifier, ManifestError, ManifestKind, MediaType, ParseError,
    ParseErrorKind,
};
