//! Manifest media types and structural media-type detection.
//!
//! Older manifests stored in ECR carry no `mediaType` field. [`detect`]
//! classifies such content by its shape so a descriptor can still name the
//! right type.

use serde::{Deserialize, Serialize};

use crate::error::ManifestError;

/// Content media type.
///
/// Manifest types come from the closed [`ManifestKind`] set; layer and
/// config blobs carry whatever type their descriptor declares.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType(String);

impl MediaType {
    /// Docker image manifest, schema 1, signed.
    pub const DOCKER_SCHEMA1_SIGNED: &'static str =
        "application/vnd.docker.distribution.manifest.v1+prettyjws";

    /// Docker image manifest, schema 1, unsigned.
    pub const DOCKER_SCHEMA1: &'static str = "application/vnd.docker.distribution.manifest.v1+json";

    /// Docker image manifest, schema 2.
    pub const DOCKER_SCHEMA2: &'static str = "application/vnd.docker.distribution.manifest.v2+json";

    /// Docker manifest list, schema 2.
    pub const DOCKER_MANIFEST_LIST: &'static str =
        "application/vnd.docker.distribution.manifest.list.v2+json";

    /// OCI image manifest media type.
    pub const OCI_MANIFEST: &'static str = "application/vnd.oci.image.manifest.v1+json";

    /// OCI image index media type.
    pub const OCI_INDEX: &'static str = "application/vnd.oci.image.index.v1+json";

    /// Creates a new media type.
    #[must_use]
    pub fn new(media_type: impl Into<String>) -> Self {
        Self(media_type.into())
    }

    /// Returns the media type string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the manifest kind this media type names, if any.
    #[must_use]
    pub fn manifest_kind(&self) -> Option<ManifestKind> {
        ManifestKind::from_media_type(&self.0)
    }

    /// Returns true for manifest, manifest-list and index types.
    #[must_use]
    pub fn is_manifest(&self) -> bool {
        self.manifest_kind().is_some()
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MediaType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<ManifestKind> for MediaType {
    fn from(kind: ManifestKind) -> Self {
        Self::new(kind.media_type())
    }
}

impl Serialize for MediaType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MediaType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self(s))
    }
}

/// The closed set of manifest formats ECR stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestKind {
    /// Docker schema 1 with a JWS signature block.
    DockerSchema1Signed,
    /// Docker schema 1 without signatures.
    DockerSchema1,
    /// Docker schema 2 image manifest.
    DockerSchema2,
    /// Docker schema 2 manifest list.
    DockerManifestList,
    /// OCI image manifest.
    OciManifest,
    /// OCI image index.
    OciIndex,
}

impl ManifestKind {
    /// Every manifest kind, in the order they are offered to the registry.
    pub const ALL: [Self; 6] = [
        Self::OciIndex,
        Self::OciManifest,
        Self::DockerManifestList,
        Self::DockerSchema2,
        Self::DockerSchema1Signed,
        Self::DockerSchema1,
    ];

    /// Returns the media type string for this kind.
    #[must_use]
    pub const fn media_type(self) -> &'static str {
        match self {
            Self::DockerSchema1Signed => MediaType::DOCKER_SCHEMA1_SIGNED,
            Self::DockerSchema1 => MediaType::DOCKER_SCHEMA1,
            Self::DockerSchema2 => MediaType::DOCKER_SCHEMA2,
            Self::DockerManifestList => MediaType::DOCKER_MANIFEST_LIST,
            Self::OciManifest => MediaType::OCI_MANIFEST,
            Self::OciIndex => MediaType::OCI_INDEX,
        }
    }

    /// Looks up the kind named by a media type string.
    #[must_use]
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.media_type() == media_type)
    }

    /// Returns true for manifest lists and indexes.
    #[must_use]
    pub const fn is_index(self) -> bool {
        matches!(self, Self::DockerManifestList | Self::OciIndex)
    }
}

impl std::fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.media_type())
    }
}

/// Media types accepted from the registry when requesting manifests.
#[must_use]
pub fn supported_manifest_media_types() -> Vec<String> {
    ManifestKind::ALL
        .iter()
        .map(|kind| kind.media_type().to_string())
        .collect()
}

/// The fields that decide a manifest's shape. Everything else is ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestShape {
    #[serde(default)]
    schema_version: Option<u32>,
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default)]
    config: Option<serde_json::Value>,
    #[serde(default)]
    manifests: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    fs_layers: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    signatures: Option<Vec<serde_json::Value>>,
}

impl ManifestShape {
    /// Shape predicates in precedence order; the first match wins.
    fn kind(&self) -> Option<ManifestKind> {
        if self.manifests.is_some() && self.config.is_none() && self.schema_version != Some(1) {
            return Some(ManifestKind::DockerManifestList);
        }
        if self.config.is_some() && self.schema_version == Some(2) {
            return Some(ManifestKind::DockerSchema2);
        }
        if self.fs_layers.is_some() && matches!(self.schema_version, None | Some(1)) {
            let signed = self.signatures.as_ref().is_some_and(|s| !s.is_empty());
            return Some(if signed {
                ManifestKind::DockerSchema1Signed
            } else {
                ManifestKind::DockerSchema1
            });
        }
        None
    }
}

/// Determines the media type of raw manifest bytes.
///
/// An explicit, non-empty `mediaType` field is returned unchanged.
/// Otherwise the shape decides: a `manifests` list without `config` is a
/// manifest list; `config` with schema version 2 is a schema 2 manifest;
/// `fsLayers` with schema version 1 (or none) is schema 1, signed when a
/// signature block is present. Shapeless content is rejected.
///
/// # Errors
///
/// Returns [`ManifestError`] for empty input, content that is not a JSON
/// object, or a JSON object matching none of the shapes.
///
/// # Examples
///
/// ```
/// use ecr_resolver_core::media_type::{detect, MediaType};
///
/// let manifest = br#"{"schemaVersion": 2, "config": {"digest": "sha256:aa"}, "layers": []}"#;
/// assert_eq!(detect(manifest).unwrap().as_str(), MediaType::DOCKER_SCHEMA2);
/// ```
pub fn detect(manifest: &[u8]) -> Result<MediaType, ManifestError> {
    if manifest.is_empty() {
        return Err(ManifestError::Empty);
    }

    let shape: ManifestShape = serde_json::from_slice(manifest)?;
    if let Some(media_type) = shape.media_type.as_deref().filter(|m| !m.is_empty()) {
        return Ok(MediaType::new(media_type));
    }

    shape
        .kind()
        .map(MediaType::from)
        .ok_or(ManifestError::UnrecognizedShape)
}
