//! ECR image references.
//!
//! A reference names one image in one repository of one regional registry:
//!
//! ```text
//! ecr.aws/arn:aws:ecr:us-west-2:123456789012:repository/foo/bar:latest@sha256:<hex>
//! ```
//!
//! At least one of the tag or the digest must be present. The registry host
//! form (`123456789012.dkr.ecr.us-west-2.amazonaws.com/foo/bar:latest`) is
//! accepted through [`EcrSpec::from_image_uri`].

use std::str::FromStr;

use crate::digest::is_valid_digest;
use crate::error::{ParseError, ParseErrorKind};

/// Scheme prefix every reference starts with.
pub const REFERENCE_PREFIX: &str = "ecr.aws/";

const ARN_PREFIX: &str = "arn";
const ECR_SERVICE: &str = "ecr";
const REPOSITORY_RESOURCE_PREFIX: &str = "repository/";
const MAX_REPOSITORY_LEN: usize = 256;
const MAX_TAG_LEN: usize = 128;

/// Identifies an image within a repository by tag, digest, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ImageIdentifier {
    /// Image tag.
    pub tag: Option<String>,
    /// Image manifest digest.
    pub digest: Option<String>,
}

impl ImageIdentifier {
    /// Identifies an image by tag.
    #[must_use]
    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            digest: None,
        }
    }

    /// Identifies an image by digest.
    #[must_use]
    pub fn digest(digest: impl Into<String>) -> Self {
        Self {
            tag: None,
            digest: Some(digest.into()),
        }
    }
}

/// A parsed ECR image reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EcrSpec {
    partition: String,
    region: String,
    registry_id: String,
    repository: String,
    tag: Option<String>,
    digest: Option<String>,
}

/// Parses an `ecr.aws/` reference.
///
/// # Errors
///
/// Returns [`ParseError`] if the reference does not follow the grammar.
pub fn parse(reference: &str) -> Result<EcrSpec, ParseError> {
    EcrSpec::parse(reference)
}

impl EcrSpec {
    /// Parses an `ecr.aws/arn:...` reference.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] naming the first component that does not fit
    /// the grammar.
    ///
    /// # Examples
    ///
    /// ```
    /// use ecr_resolver_core::EcrSpec;
    ///
    /// let spec = EcrSpec::parse(
    ///     "ecr.aws/arn:aws:ecr:us-west-2:123456789012:repository/foo/bar:latest",
    /// )?;
    /// assert_eq!(spec.region(), "us-west-2");
    /// assert_eq!(spec.registry_id(), "123456789012");
    /// assert_eq!(spec.repository(), "foo/bar");
    /// assert_eq!(spec.tag(), Some("latest"));
    /// assert_eq!(spec.digest(), None);
    /// # Ok::<(), ecr_resolver_core::ParseError>(())
    /// ```
    pub fn parse(reference: &str) -> Result<Self, ParseError> {
        let fail = |kind| ParseError::new(reference, kind);

        let arn = reference
            .strip_prefix(REFERENCE_PREFIX)
            .ok_or_else(|| fail(ParseErrorKind::MissingPrefix))?;

        let parts: Vec<&str> = arn.splitn(6, ':').collect();
        let [prefix, partition, service, region, account, resource] = parts[..] else {
            return Err(fail(ParseErrorKind::InvalidArn));
        };
        if prefix != ARN_PREFIX || partition.is_empty() {
            return Err(fail(ParseErrorKind::InvalidArn));
        }
        if service != ECR_SERVICE {
            return Err(fail(ParseErrorKind::UnsupportedService));
        }

        let name = resource
            .strip_prefix(REPOSITORY_RESOURCE_PREFIX)
            .ok_or_else(|| fail(ParseErrorKind::InvalidRepository))?;

        Self::assemble(reference, partition, region, account, name)
    }

    /// Parses the registry host form of an image URI.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the host is not an ECR registry host or the
    /// repository, tag or digest are malformed.
    ///
    /// # Examples
    ///
    /// ```
    /// use ecr_resolver_core::EcrSpec;
    ///
    /// let spec = EcrSpec::from_image_uri(
    ///     "123456789012.dkr.ecr.cn-north-1.amazonaws.com.cn/foo:v1",
    /// )?;
    /// assert_eq!(spec.partition(), "aws-cn");
    /// assert_eq!(
    ///     spec.to_string(),
    ///     "ecr.aws/arn:aws-cn:ecr:cn-north-1:123456789012:repository/foo:v1",
    /// );
    /// # Ok::<(), ecr_resolver_core::ParseError>(())
    /// ```
    pub fn from_image_uri(uri: &str) -> Result<Self, ParseError> {
        let fail = |kind| ParseError::new(uri, kind);

        let (host, name) = uri
            .split_once('/')
            .ok_or_else(|| fail(ParseErrorKind::InvalidRepository))?;

        let (host, partition) = if let Some(host) = host.strip_suffix(".amazonaws.com.cn") {
            (host, "aws-cn")
        } else if let Some(host) = host.strip_suffix(".amazonaws.com") {
            (host, "aws")
        } else {
            return Err(fail(ParseErrorKind::InvalidHost));
        };

        let labels: Vec<&str> = host.split('.').collect();
        let [account, "dkr", "ecr" | "ecr-fips", region] = labels[..] else {
            return Err(fail(ParseErrorKind::InvalidHost));
        };

        Self::assemble(uri, partition, region, account, name)
    }

    /// Validates the components shared by both reference forms.
    ///
    /// `name` is the repository name followed by `:tag`, `@digest` or both.
    fn assemble(
        input: &str,
        partition: &str,
        region: &str,
        account: &str,
        name: &str,
    ) -> Result<Self, ParseError> {
        let fail = |kind| ParseError::new(input, kind);

        if !is_valid_region(region) {
            return Err(fail(ParseErrorKind::MissingRegion));
        }
        if account.is_empty() || !account.bytes().all(|b| b.is_ascii_digit()) {
            return Err(fail(ParseErrorKind::InvalidAccount));
        }

        let split = name.find([':', '@']);
        let (repository, object) = split.map_or((name, ""), |idx| name.split_at(idx));
        if !is_valid_repository(repository) {
            return Err(fail(ParseErrorKind::InvalidRepository));
        }

        let (tag, digest) = if let Some(digest) = object.strip_prefix('@') {
            (None, Some(digest))
        } else if let Some(rest) = object.strip_prefix(':') {
            match rest.split_once('@') {
                Some((tag, digest)) => (Some(tag), Some(digest)),
                None => (Some(rest), None),
            }
        } else {
            return Err(fail(ParseErrorKind::MissingObject));
        };

        if tag.is_some_and(|t| !is_valid_tag(t)) {
            return Err(fail(ParseErrorKind::InvalidTag));
        }
        if digest.is_some_and(|d| !is_valid_digest(d)) {
            return Err(fail(ParseErrorKind::InvalidDigest));
        }

        Ok(Self {
            partition: partition.to_string(),
            region: region.to_string(),
            registry_id: account.to_string(),
            repository: repository.to_string(),
            tag: tag.map(ToString::to_string),
            digest: digest.map(ToString::to_string),
        })
    }

    /// Returns the AWS partition (e.g., "aws", "aws-cn").
    #[must_use]
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Returns the region hosting the registry.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Returns the registry (account) id.
    #[must_use]
    pub fn registry_id(&self) -> &str {
        &self.registry_id
    }

    /// Returns the repository name.
    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Returns the tag, if present.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Returns the digest, if present.
    #[must_use]
    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// Returns the identifier used to look the image up.
    ///
    /// The tag is preferred when both are present since ECR indexes images
    /// by tag; callers compare the returned digest themselves.
    #[must_use]
    pub fn image_id(&self) -> ImageIdentifier {
        match (&self.tag, &self.digest) {
            (Some(tag), _) => ImageIdentifier::tag(tag),
            (None, Some(digest)) => ImageIdentifier::digest(digest),
            (None, None) => ImageIdentifier::default(),
        }
    }

    /// Returns the repository ARN.
    #[must_use]
    pub fn arn(&self) -> String {
        format!(
            "arn:{}:{ECR_SERVICE}:{}:{}:{REPOSITORY_RESOURCE_PREFIX}{}",
            self.partition, self.region, self.registry_id, self.repository
        )
    }

    /// Returns the reference without its tag or digest.
    #[must_use]
    pub fn locator(&self) -> String {
        format!("{REFERENCE_PREFIX}{}", self.arn())
    }

    /// Returns the full `ecr.aws/` reference.
    #[must_use]
    pub fn canonical(&self) -> String {
        self.to_string()
    }

    /// Returns the registry host form of the reference.
    #[must_use]
    pub fn image_uri(&self) -> String {
        let suffix = if self.partition == "aws-cn" { ".cn" } else { "" };
        format!(
            "{}.dkr.ecr.{}.amazonaws.com{suffix}/{}{}",
            self.registry_id,
            self.region,
            self.repository,
            self.object()
        )
    }

    /// The `:tag@digest` suffix, with absent parts omitted.
    fn object(&self) -> String {
        let mut object = String::new();
        if let Some(tag) = &self.tag {
            object.push(':');
            object.push_str(tag);
        }
        if let Some(digest) = &self.digest {
            object.push('@');
            object.push_str(digest);
        }
        object
    }
}

impl std::fmt::Display for EcrSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.locator(), self.object())
    }
}

impl FromStr for EcrSpec {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_valid_region(region: &str) -> bool {
    !region.is_empty()
        && !region.starts_with('-')
        && !region.ends_with('-')
        && region
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

/// Slash-separated components of lower-case alphanumeric runs joined by a
/// single `.`, `_` or `-`.
fn is_valid_repository(repository: &str) -> bool {
    !repository.is_empty()
        && repository.len() <= MAX_REPOSITORY_LEN
        && repository.split('/').all(|component| {
            !component.is_empty()
                && component.split(['.', '_', '-']).all(|run| {
                    !run.is_empty()
                        && run
                            .bytes()
                            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
                })
        })
}

fn is_valid_tag(tag: &str) -> bool {
    let mut bytes = tag.bytes();
    let Some(first) = bytes.next() else {
        return false;
    };
    tag.len() <= MAX_TAG_LEN
        && (first.is_ascii_alphanumeric() || first == b'_')
        && bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
}
