use serde::Deserialize;

use crate::error::{Error, Result};
use crate::utils::constants::{
    DEFAULT_HOST, DEFAULT_HTTP_TIMEOUT_MS, DEFAULT_IGDB_BASE_URL, DEFAULT_METRICS_PATH,
    DEFAULT_PORT, DEFAULT_SAFETY_MARGIN_SECS, DEFAULT_TOKEN_URL,
};

/// ================================
/// Global service-wide settings
/// ================================
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Settings {
    pub safety_margin_seconds: u64,
    /// applied to both the token endpoint and the metadata api
    pub timeout_ms: u64,
    pub credentials: Credentials,
    pub oauth: OAuthConfig,
    pub igdb: IgdbConfig,
    pub metrics: MetricsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            safety_margin_seconds: DEFAULT_SAFETY_MARGIN_SECS,
            timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
            credentials: Credentials::default(),
            oauth: OAuthConfig::default(),
            igdb: IgdbConfig::default(),
            metrics: MetricsConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Twitch application credentials. Both values are optional at load time:
/// a missing one turns every token refresh into a configuration error.
#[derive(Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Credentials {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl Credentials {
    pub fn new(client_id: Option<String>, client_secret: Option<String>) -> Self {
        Self { client_id, client_secret }
    }

    /// Both values, trimmed and non-empty.
    pub fn require(&self) -> Result<(&str, &str)> {
        let id = non_blank(self.client_id.as_deref())
            .ok_or_else(|| Error::Configuration("client id is not set".to_owned()))?;
        let secret = non_blank(self.client_secret.as_deref())
            .ok_or_else(|| Error::Configuration("client secret is not set".to_owned()))?;
        Ok((id, secret))
    }

    pub fn client_id(&self) -> &str {
        non_blank(self.client_id.as_deref()).unwrap_or_default()
    }
}

// keep the secret out of logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .finish()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OAuthConfig {
    pub token_url: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self { token_url: DEFAULT_TOKEN_URL.to_owned() }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IgdbConfig {
    pub base_url: String,
}

impl Default for IgdbConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_IGDB_BASE_URL.to_owned() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_path")]
    pub path: String,
    #[serde(default)]
    pub is_enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { path: default_metrics_path(), is_enabled: false }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: DEFAULT_HOST.to_owned(), port: DEFAULT_PORT }
    }
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String, // allowed: trace, debug, info, warn, error
    #[serde(default)]
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new(level: String, format: LogFormat) -> Self {
        Self { level, format }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new(default_log_level(), LogFormat::default())
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Compact,
}

fn default_metrics_path() -> String {
    DEFAULT_METRICS_PATH.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
