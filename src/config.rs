//! Client configuration: target environment and encoder defaults.
//!
//! All submission behaviour that is not per-document is controlled through
//! [`ClientConfig`], built via its [`ClientConfigBuilder`]. The remote host is
//! never user-supplied: it is derived from the [`Environment`] toggle, which
//! maps to one of two fixed base URLs.

use crate::error::EkycError;
use crate::pipeline::encode::{EncodeOptions, TargetFormat};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Base URL of the demo portal.
pub const DEMO_BASE_URL: &str = "https://ekycportaldemo.innov8tif.com";

/// Base URL of the production portal.
pub const PRODUCTION_BASE_URL: &str = "https://ekycportal.innov8tif.com";

/// Which portal a session talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Environment {
    /// Demo portal (default).
    #[default]
    Demo,
    /// Production portal.
    Production,
}

impl Environment {
    pub fn base_url(self) -> &'static str {
        match self {
            Environment::Demo => DEMO_BASE_URL,
            Environment::Production => PRODUCTION_BASE_URL,
        }
    }

    /// Join an endpoint path onto this environment's base URL.
    pub fn url(self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Demo => f.write_str("demo"),
            Environment::Production => f.write_str("production"),
        }
    }
}

/// Configuration for an ekyc client.
///
/// Built via [`ClientConfig::builder()`] or using
/// [`ClientConfig::default()`].
///
/// # Example
/// ```rust
/// use ekyc_pipeline::{ClientConfig, Environment};
///
/// let config = ClientConfig::builder()
///     .environment(Environment::Production)
///     .jpeg_quality(90)
///     .build()
///     .unwrap();
/// assert_eq!(config.environment.base_url(), "https://ekycportal.innov8tif.com");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Portal to submit to. Default: [`Environment::Demo`].
    pub environment: Environment,

    /// JPEG quality used for every JPEG payload. Range: 1–100. Default: 85.
    pub jpeg_quality: u8,

    /// Use maximum PNG compression for PNG payloads. Default: false.
    pub optimize_png: bool,

    /// Re-attach an uploaded image's ICC profile when encoding. Default: true.
    ///
    /// Best-effort: an encoder that cannot embed the profile drops it and the
    /// encode still succeeds.
    pub preserve_icc_profile: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            jpeg_quality: 85,
            optimize_png: false,
            preserve_icc_profile: true,
        }
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// Encoder options for a payload in `format`.
    pub fn encode_options(&self, format: TargetFormat) -> EncodeOptions {
        EncodeOptions {
            format,
            jpeg_quality: self.jpeg_quality,
            optimize: self.optimize_png,
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn environment(mut self, env: Environment) -> Self {
        self.config.environment = env;
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality;
        self
    }

    pub fn optimize_png(mut self, v: bool) -> Self {
        self.config.optimize_png = v;
        self
    }

    pub fn preserve_icc_profile(mut self, v: bool) -> Self {
        self.config.preserve_icc_profile = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, EkycError> {
        let q = self.config.jpeg_quality;
        if !(1..=100).contains(&q) {
            return Err(EkycError::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {q}"
            )));
        }
        Ok(self.config)
    }
}
