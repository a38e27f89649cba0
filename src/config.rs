//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default REST prefix of the studio backend.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";

/// Onboarding tracker configuration.
#[derive(Debug, Clone)]
pub struct OnboardingConfig {
    /// Base URL every onboarding endpoint is resolved against.
    pub api_url: reqwest::Url,
    /// Bearer token for the backend, if the user is signed in.
    pub auth_token: Option<SecretString>,
    /// Local database file holding the persisted snapshot.
    pub db_path: PathBuf,
    /// Owner of the persisted snapshot in the settings table.
    pub user_id: String,
    /// How long a reward notice stays visible.
    pub notice_duration: Duration,
    /// Per-request timeout for backend calls.
    pub http_timeout: Duration,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            auth_token: None,
            db_path: PathBuf::from("./data/onboarding.db"),
            user_id: "default".to_string(),
            notice_duration: Duration::from_millis(3000),
            http_timeout: Duration::from_secs(10),
        }
    }
}

impl OnboardingConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_url = match std::env::var("STUDIO_API_URL") {
            Ok(raw) => parse_api_url(&raw)?,
            Err(_) => defaults.api_url,
        };

        let auth_token = std::env::var("STUDIO_AUTH_TOKEN")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(SecretString::from);

        let db_path = std::env::var("STUDIO_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let user_id = std::env::var("STUDIO_USER").unwrap_or(defaults.user_id);

        let notice_ms: u64 = std::env::var("STUDIO_NOTICE_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let timeout_secs: u64 = std::env::var("STUDIO_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        Ok(Self {
            api_url,
            auth_token,
            db_path,
            user_id,
            notice_duration: Duration::from_millis(notice_ms),
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Parse a base URL, making sure it ends with `/` so relative endpoint paths
/// join under it instead of replacing its last segment.
pub fn parse_api_url(raw: &str) -> Result<reqwest::Url, ConfigError> {
    let mut normalized = raw.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    reqwest::Url::parse(&normalized).map_err(|e| ConfigError::InvalidValue {
        key: "STUDIO_API_URL".to_string(),
        message: e.to_string(),
    })
}

fn default_api_url() -> reqwest::Url {
    parse_api_url(DEFAULT_API_URL).expect("DEFAULT_API_URL is a valid absolute URL")
}
