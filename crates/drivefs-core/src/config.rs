use std::time::Duration;

use crate::error::Result;
use crate::guard;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/drive/v3";
pub const DEFAULT_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// What path resolution does with a transport or decoding failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ResolutionErrorPolicy {
    /// Report the path as absent. **Default.**
    NotFound,
    /// Return the error to the caller.
    Propagate,
}

impl Default for ResolutionErrorPolicy {
    fn default() -> Self {
        Self::NotFound
    }
}

impl std::fmt::Display for ResolutionErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not-found"),
            Self::Propagate => write!(f, "propagate"),
        }
    }
}

impl std::str::FromStr for ResolutionErrorPolicy {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "not-found" | "notfound" => Ok(Self::NotFound),
            "propagate" => Ok(Self::Propagate),
            other => Err(format!("unknown resolution error policy: {other}")),
        }
    }
}

/// Configuration for a drive-backed filesystem.
#[derive(Debug, Clone)]
pub struct DriveConfig {
    /// API key sent with every request.
    pub api_key: String,
    /// Application name, sent as the user agent.
    pub application_name: String,
    /// Metadata endpoint root.
    pub api_base: String,
    /// Media upload endpoint root.
    pub upload_base: String,
    /// Entries requested per listing page. Default 100.
    pub page_size: u32,
    /// Per-request timeout. `None` leaves it to the HTTP client.
    pub request_timeout: Option<Duration>,
    pub resolution_errors: ResolutionErrorPolicy,
}

impl DriveConfig {
    /// Create a config builder. Both values must be non-blank.
    pub fn builder(
        api_key: impl Into<String>,
        application_name: impl Into<String>,
    ) -> Result<DriveConfigBuilder> {
        let api_key = api_key.into();
        let application_name = application_name.into();
        guard::not_blank(&api_key, "api_key")?;
        guard::not_blank(&application_name, "application_name")?;

        Ok(DriveConfigBuilder {
            api_key,
            application_name,
            api_base: DEFAULT_API_BASE.to_string(),
            upload_base: DEFAULT_UPLOAD_BASE.to_string(),
            page_size: 100,
            request_timeout: Some(Duration::from_secs(60)),
            resolution_errors: ResolutionErrorPolicy::default(),
        })
    }
}

/// Builder for [`DriveConfig`].
#[derive(Debug, Clone)]
pub struct DriveConfigBuilder {
    api_key: String,
    application_name: String,
    api_base: String,
    upload_base: String,
    page_size: u32,
    request_timeout: Option<Duration>,
    resolution_errors: ResolutionErrorPolicy,
}

impl DriveConfigBuilder {
    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn upload_base(mut self, url: impl Into<String>) -> Self {
        self.upload_base = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Drive accepts 1..=1000.
    pub fn page_size(mut self, n: u32) -> Self {
        self.page_size = n.clamp(1, 1000);
        self
    }

    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn resolution_errors(mut self, policy: ResolutionErrorPolicy) -> Self {
        self.resolution_errors = policy;
        self
    }

    pub fn build(self) -> DriveConfig {
        DriveConfig {
            api_key: self.api_key,
            application_name: self.application_name,
            api_base: self.api_base,
            upload_base: self.upload_base,
            page_size: self.page_size,
            request_timeout: self.request_timeout,
            resolution_errors: self.resolution_errors,
        }
    }
}
