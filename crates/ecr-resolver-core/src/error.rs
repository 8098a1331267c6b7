//! Error types for reference parsing and manifest inspection.

use thiserror::Error;

/// Reason a reference string was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    /// The reference does not start with the `ecr.aws/` scheme prefix.
    MissingPrefix,
    /// An image URI host is not `<account>.dkr.ecr.<region>.amazonaws.com`.
    InvalidHost,
    /// The ARN portion does not have the `arn:<partition>:<service>:<region>:<account>:<resource>` shape.
    InvalidArn,
    /// The ARN names a service other than `ecr`.
    UnsupportedService,
    /// The region component is empty or malformed.
    MissingRegion,
    /// The account (registry) id is empty or not numeric.
    InvalidAccount,
    /// The resource is not `repository/<name>` or the name is malformed.
    InvalidRepository,
    /// Neither a tag nor a digest was given.
    MissingObject,
    /// The tag does not follow the tag grammar.
    InvalidTag,
    /// The digest is not `<algorithm>:<encoded>` or the encoding is wrong.
    InvalidDigest,
}

impl ParseErrorKind {
    /// Returns a short description of the failure.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingPrefix => "missing ecr.aws/ prefix",
            Self::InvalidHost => "not an ECR registry host",
            Self::InvalidArn => "malformed ARN",
            Self::UnsupportedService => "ARN service is not ecr",
            Self::MissingRegion => "missing or malformed region",
            Self::InvalidAccount => "missing or malformed account id",
            Self::InvalidRepository => "missing or malformed repository",
            Self::MissingObject => "tag or digest required",
            Self::InvalidTag => "malformed tag",
            Self::InvalidDigest => "malformed digest",
        }
    }
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reference string could not be decomposed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid reference '{reference}': {kind}")]
pub struct ParseError {
    /// The rejected input.
    pub reference: String,
    /// Why it was rejected.
    pub kind: ParseErrorKind,
}

impl ParseError {
    /// Creates a parse error for the given input.
    #[must_use]
    pub fn new(reference: impl Into<String>, kind: ParseErrorKind) -> Self {
        Self {
            reference: reference.into(),
            kind,
        }
    }

    /// Returns the failure classification.
    #[must_use]
    pub const fn kind(&self) -> ParseErrorKind {
        self.kind
    }
}

/// Manifest bytes could not be classified.
///
/// Every variant means the same thing to a caller: the content is not a
/// manifest this crate recognizes.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// No bytes at all.
    #[error("invalid manifest: empty content")]
    Empty,

    /// Not a JSON object.
    #[error("invalid manifest: {source}")]
    Malformed {
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Manifest text that is not UTF-8.
    #[error("invalid manifest: content is not UTF-8")]
    NotUtf8,

    /// Valid JSON that matches no known manifest shape.
    #[error("invalid manifest: unrecognized manifest structure")]
    UnrecognizedShape,
}

impl From<serde_json::Error> for ManifestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed { source: err }
    }
}
