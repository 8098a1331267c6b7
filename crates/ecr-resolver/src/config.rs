//! Configuration types for the resolver.

use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_types::SdkConfig;

use crate::error::{ResolverError, Result};

/// Configuration for [`EcrResolver`](crate::EcrResolver).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Timeout for layer downloads.
    pub timeout: Duration,

    /// User agent sent with layer downloads.
    pub user_agent: String,

    /// Named AWS profile to load credentials from.
    pub profile: Option<String>,

    /// Overrides the regional ECR API endpoint (e.g. a local emulator).
    pub endpoint_url: Option<String>,

    /// Part size for chunked layer uploads. Defaults to the size the
    /// registry asks for.
    pub upload_part_size: Option<u64>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolverConfig {
    /// Creates a configuration with default settings.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use ecr_resolver::ResolverConfig;
    ///
    /// let config = ResolverConfig::new();
    /// assert_eq!(config.timeout, Duration::from_secs(30));
    /// assert!(config.profile.is_none());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("ecr-resolver/{}", env!("CARGO_PKG_VERSION")),
            profile: None,
            endpoint_url: None,
            upload_part_size: None,
        }
    }

    /// Sets the download timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the AWS profile name.
    ///
    /// # Examples
    ///
    /// ```
    /// use ecr_resolver::ResolverConfig;
    ///
    /// let config = ResolverConfig::new().with_profile("ci");
    /// assert_eq!(config.profile.as_deref(), Some("ci"));
    /// ```
    #[must_use]
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Sets the ECR API endpoint override.
    #[must_use]
    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    /// Sets the layer upload part size.
    #[must_use]
    pub const fn with_upload_part_size(mut self, part_size: u64) -> Self {
        self.upload_part_size = Some(part_size);
        self
    }

    /// Checks the configuration for values the resolver cannot use.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::Config`] if the endpoint override is not an
    /// absolute `http`/`https` URL or the upload part size is zero.
    pub fn validate(&self) -> Result<()> {
        if let Some(endpoint) = &self.endpoint_url {
            let url = url::Url::parse(endpoint).map_err(|e| ResolverError::Config {
                message: format!("invalid endpoint URL '{endpoint}': {e}"),
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ResolverError::Config {
                    message: format!("endpoint URL '{endpoint}' must use http or https"),
                });
            }
        }

        if self.upload_part_size == Some(0) {
            return Err(ResolverError::Config {
                message: "upload part size must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Loads the shared AWS configuration every regional client derives from.
    pub async fn load_sdk_config(&self) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(profile) = &self.profile {
            tracing::debug!(profile, "Loading AWS profile");
            loader = loader.profile_name(profile);
        }
        loader.load().await
    }
}
