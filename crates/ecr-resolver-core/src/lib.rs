//! # ECR Resolver Core
//!
//! Pure building blocks for resolving images stored in Amazon ECR. Nothing
//! in this crate performs I/O.
//!
//! - [`EcrSpec`] - Parsed `ecr.aws/arn:...` image reference
//! - [`media_type::detect`] - Media type of a manifest that may lack a `mediaType` field
//! - [`Descriptor`] - OCI content descriptor (media type, digest, size)
//! - [`digest`] - Content digest computation and validation
//!
//! ## Example
//!
//! ```rust
//! use ecr_resolver_core::{media_type, EcrSpec, MediaType};
//!
//! let spec = EcrSpec::parse("ecr.aws/arn:aws:ecr:us-west-2:123456789012:repository/app:v1")?;
//! assert_eq!(spec.region(), "us-west-2");
//!
//! let manifest = br#"{"schemaVersion": 2, "manifests": []}"#;
//! let media_type = media_type::detect(manifest)?;
//! assert_eq!(media_type.as_str(), MediaType::DOCKER_MANIFEST_LIST);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod descriptor;
pub mod digest;
pub mod error;
pub mod media_type;
pub mod reference;


pub use descriptor::Descriptor;
pub use error::{ManifestError, ParseError, ParseErrorKind};
pub use media_type::{ManifestKind, MediaType};
pub use reference::{EcrSpec, ImageIdentifier, REFERENCE_PREFIX};
