use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::ConfigError;

pub const CURRENT_CONFIG_VERSION: &str = "v1";

pub const BACKEND_URL_ENV: &str = "TASKDESK_BACKEND_URL";
pub const ANON_KEY_ENV: &str = "TASKDESK_ANON_KEY";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DUE_SOON_DAYS: i64 = 3;
pub const MAX_DUE_SOON_DAYS: i64 = 365;
pub const DEFAULT_REFRESH_LEEWAY_SECS: i64 = 60;
pub const MAX_REFRESH_LEEWAY_SECS: i64 = 3600;

fn default_config_version() -> String {
    CURRENT_CONFIG_VERSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    #[serde(alias = "anonKey")]
    pub anon_key: String,
    #[serde(alias = "requestTimeoutSecs")]
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Where password reset links send the user back to.
    #[serde(alias = "redirectTo")]
    pub redirect_to: Option<String>,
    /// Refresh the access token this many seconds before it expires.
    #[serde(alias = "refreshLeewaySecs")]
    pub refresh_leeway_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            redirect_to: None,
            refresh_leeway_secs: DEFAULT_REFRESH_LEEWAY_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(alias = "configVersion")]
    pub config_version: String,
    pub backend: BackendConfig,
    pub auth: AuthConfig,
    #[serde(alias = "dueSoonDays")]
    pub due_soon_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            backend: BackendConfig::default(),
            auth: AuthConfig::default(),
            due_soon_days: DEFAULT_DUE_SOON_DAYS,
        }
    }
}

impl Config {
    /// Parse a config file body, falling back to defaults when it is unreadable.
    pub fn from_raw(raw: &str) -> Self {
        match serde_json::from_str::<Config>(raw) {
            Ok(config) => config.normalized(),
            Err(err) => {
                tracing::warn!(error = %err, "Invalid config file, using defaults");
                Config::default()
            }
        }
    }

    pub fn normalized(mut self) -> Self {
        self.config_version = default_config_version();
        self.backend.url = self.backend.url.trim().trim_end_matches('/').to_string();
        self.backend.anon_key = self.backend.anon_key.trim().to_string();
        if self.backend.request_timeout_secs == 0 {
            self.backend.request_timeout_secs = DEFAULT_TIMEOUT_SECS;
        }
        if self.due_soon_days < 0 {
            self.due_soon_days = DEFAULT_DUE_SOON_DAYS;
        }
        self.due_soon_days = self.due_soon_days.min(MAX_DUE_SOON_DAYS);
        if self.auth.refresh_leeway_secs < 0 {
            self.auth.refresh_leeway_secs = DEFAULT_REFRESH_LEEWAY_SECS;
        }
        self.auth.refresh_leeway_secs = self.auth.refresh_leeway_secs.min(MAX_REFRESH_LEEWAY_SECS);
        self.auth.redirect_to = self
            .auth
            .redirect_to
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        self
    }

    /// Environment variables win over the file.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(url) = non_empty_env(BACKEND_URL_ENV) {
            self.backend.url = url;
        }
        if let Some(key) = non_empty_env(ANON_KEY_ENV) {
            self.backend.anon_key = key;
        }
        self.normalized()
    }

    /// A config can talk to a backend once it has a parseable url and a key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.url.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "backend url is not set (config file or {BACKEND_URL_ENV})"
            )));
        }
        Url::parse(&self.backend.url).map_err(|err| {
            ConfigError::ValidationError(format!("backend url is invalid: {err}"))
        })?;
        if self.backend.anon_key.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "anon key is not set (config file or {ANON_KEY_ENV})"
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.request_timeout_secs)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
