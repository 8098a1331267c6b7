//! The generic image-distribution contract.
//!
//! An image client drives pulls and pushes through these traits without
//! knowing which registry sits behind them.

use async_trait::async_trait;
use ecr_resolver_core::Descriptor;

use crate::error::Result;

/// Result of a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The content was uploaded.
    Pushed,
    /// The registry already had the content; nothing was uploaded.
    AlreadyExists,
}

/// Turns references into descriptors and content handles.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Handle returned by [`Resolver::fetcher`].
    type Fetcher: Fetcher;
    /// Handle returned by [`Resolver::pusher`].
    type Pusher: Pusher;

    /// Resolves `reference` to its canonical name and root descriptor.
    async fn resolve(&self, reference: &str) -> Result<(String, Descriptor)>;

    /// Returns a handle that downloads content under `reference`.
    async fn fetcher(&self, reference: &str) -> Result<Self::Fetcher>;

    /// Returns a handle that uploads content under `reference`.
    async fn pusher(&self, reference: &str) -> Result<Self::Pusher>;
}

/// Downloads content by descriptor.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Returns the content `descriptor` points at, verified against it.
    async fn fetch(&self, descriptor: &Descriptor) -> Result<Vec<u8>>;
}

/// Uploads content by descriptor.
#[async_trait]
pub trait Pusher: Send + Sync {
    /// Uploads `content`, which must match `descriptor`.
    async fn push(&self, descriptor: &Descriptor, content: &[u8]) -> Result<PushOutcome>;
}
