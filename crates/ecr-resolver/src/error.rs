//! Error types for resolver operations.

use ecr_resolver_core::{ManifestError, ParseError};
use thiserror::Error;

/// Boxed error returned by the registry API collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for resolver operations.
pub type Result<T> = std::result::Result<T, ResolverError>;

/// Why a well-formed reference could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    /// The registry returned no image for the reference.
    NotFound,
    /// The image found by tag has a different digest than the reference names.
    DigestMismatch {
        /// Digest named by the reference.
        expected: String,
        /// Digest the registry returned.
        actual: String,
    },
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => f.write_str("not found"),
            Self::DigestMismatch { expected, actual } => {
                write!(f, "digest mismatch: expected {expected}, got {actual}")
            }
        }
    }
}

/// Classification of a [`ResolverError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed reference.
    Parse,
    /// Manifest content of no recognizable shape.
    InvalidManifest,
    /// Nothing usable at the reference (not found, digest mismatch).
    ReferenceInvalid,
    /// Error from the registry API or the network, passed through untouched.
    Remote,
    /// Content bytes disagree with their descriptor.
    ContentMismatch,
    /// Invalid resolver configuration.
    Config,
}

/// Errors that can occur while resolving, fetching or pushing.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// The reference string is malformed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The manifest's media type could not be determined.
    #[error(transparent)]
    InvalidManifest(#[from] ManifestError),

    /// The reference is well-formed but names nothing usable.
    #[error("reference invalid: {reference}: {reason}")]
    ReferenceInvalid {
        /// The reference that was looked up.
        reference: String,
        /// Why it is unusable.
        reason: InvalidReason,
    },

    /// Error from the registry API, returned exactly as received.
    #[error(transparent)]
    Remote(BoxError),

    /// Content digest or size does not match the descriptor.
    #[error("content mismatch for {digest}: expected {expected}, got {actual}")]
    ContentMismatch {
        /// Descriptor digest.
        digest: String,
        /// Expected value (digest or size).
        expected: String,
        /// Actual value.
        actual: String,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    Config {
        /// Error message.
        message: String,
    },
}

impl ResolverError {
    /// Wraps an error from the registry API.
    #[must_use]
    pub fn remote(err: impl Into<BoxError>) -> Self {
        Self::Remote(err.into())
    }

    /// Creates a not-found error for a reference.
    #[must_use]
    pub fn not_found(reference: impl Into<String>) -> Self {
        Self::ReferenceInvalid {
            reference: reference.into(),
            reason: InvalidReason::NotFound,
        }
    }

    /// Returns the classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse(_) => ErrorKind::Parse,
            Self::InvalidManifest(_) => ErrorKind::InvalidManifest,
            Self::ReferenceInvalid { .. } => ErrorKind::ReferenceInvalid,
            Self::Remote(_) => ErrorKind::Remote,
            Self::ContentMismatch { .. } => ErrorKind::ContentMismatch,
            Self::Config { .. } => ErrorKind::Config,
        }
    }

    /// Returns the untouched registry API error, if this is one.
    #[must_use]
    pub fn as_remote(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Remote(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ResolverError {
    fn from(err: reqwest::Error) -> Self {
        Self::Remote(Box::new(err))
    }
}
