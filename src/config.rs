use std::env;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("METORIK_PUBLIC_BASE_URL must be an absolute http(s) URL, got '{0}'")]
    InvalidBaseUrl(String),
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Path prefix the API routes are mounted at.
pub const API_MOUNT_PATH: &str = "/wp-json/wc/v1";

/// Whether the customers listing is served by this service.
///
/// The listing replaces the store's own customers endpoint while an import
/// is running; otherwise the store keeps serving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomersEndpoint {
    Core,
    ImportOverride,
}

impl CustomersEndpoint {
    pub fn as_str(self) -> &'static str {
        match self {
            CustomersEndpoint::Core => "core",
            CustomersEndpoint::ImportOverride => "import_override",
        }
    }
}

/// Runtime configuration read from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Externally visible origin used to build pagination links.
    pub public_base_url: String,
    pub customers_endpoint: CustomersEndpoint,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let importing = env_bool("METORIK_IMPORTING_CURRENTLY", false);
        let base_url = env_string("METORIK_PUBLIC_BASE_URL", "http://localhost:8000");

        Ok(Self {
            public_base_url: normalize_base_url(&base_url)?,
            customers_endpoint: if importing {
                CustomersEndpoint::ImportOverride
            } else {
                CustomersEndpoint::Core
            },
        })
    }

    /// Absolute URL of a route under the API namespace.
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}{}/{}",
            self.public_base_url,
            API_MOUNT_PATH,
            path.trim_start_matches('/')
        )
    }
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let host = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"));
    match host {
        Some(host) if !host.is_empty() => Ok(trimmed.to_string()),
        _ => Err(ConfigError::InvalidBaseUrl(raw.to_string())),
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:8000".to_string(),
            customers_endpoint: CustomersEndpoint::Core,
        }
    }
}
