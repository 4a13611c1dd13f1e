use std::path::Path;

use thiserror::Error;

mod assets;
mod schema;

pub use assets::{ASSET_DIR_ENV, asset_dir, config_path, session_path};
pub use schema::{
    ANON_KEY_ENV, AuthConfig, BACKEND_URL_ENV, BackendConfig, CURRENT_CONFIG_VERSION, Config,
    DEFAULT_DUE_SOON_DAYS, DEFAULT_REFRESH_LEEWAY_SECS, MAX_DUE_SOON_DAYS,
    MAX_REFRESH_LEEWAY_SECS,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Will always return config, falling back to defaults on missing/invalid files.
pub async fn load_config_from_file(config_path: &Path) -> Config {
    match tokio::fs::read_to_string(config_path).await {
        Ok(raw_config) => Config::from_raw(&raw_config),
        Err(err) => {
            if err.kind() == std::io::ErrorKind::NotFound {
                tracing::info!("No config file found, using defaults");
            } else {
                tracing::warn!(error = %err, "Failed to read config file");
            }
            Config::default()
        }
    }
}

/// Saves the config to the given path
pub async fn save_config_to_file(config: &Config, config_path: &Path) -> Result<(), ConfigError> {
    let normalized = config.clone().normalized();
    let raw_config = serde_json::to_string_pretty(&normalized)?;
    if let Some(parent) = config_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(config_path, raw_config).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use test_support::TestEnvGuard;

    use super::*;

    #[tokio::test]
    async fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from_file(&dir.path().join("config.json")).await;
        assert_eq!(config, Config::default());
        assert_eq!(config.due_soon_days, 3);
    }

    #[tokio::test]
    async fn invalid_json_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_config_from_file(&path).await, Config::default());
    }

    #[tokio::test]
    async fn save_then_load_normalizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = Config::default();
        config.backend.url = " https://project.example.test/ ".to_string();
        config.backend.anon_key = "anon".to_string();
        config.backend.request_timeout_secs = 0;

        save_config_to_file(&config, &path).await.unwrap();
        let loaded = load_config_from_file(&path).await;
        assert_eq!(loaded.backend.url, "https://project.example.test");
        assert_eq!(loaded.backend.request_timeout_secs, 30);
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn camel_case_aliases_are_accepted() {
        let config = Config::from_raw(
            r#"{"backend":{"url":"https://x.test","anonKey":"k"},"dueSoonDays":5,"auth":{"redirectTo":"https://app.test/reset-password"}}"#,
        );
        assert_eq!(config.backend.anon_key, "k");
        assert_eq!(config.due_soon_days, 5);
        assert_eq!(
            config.auth.redirect_to.as_deref(),
            Some("https://app.test/reset-password")
        );
    }

    #[test]
    fn oversized_windows_are_clamped() {
        let config = Config::from_raw(
            r#"{"dueSoonDays":1000000000000,"auth":{"refreshLeewaySecs":9223372036854775807}}"#,
        );
        assert_eq!(config.due_soon_days, MAX_DUE_SOON_DAYS);
        assert_eq!(config.auth.refresh_leeway_secs, MAX_REFRESH_LEEWAY_SECS);

        let config = Config::from_raw(r#"{"dueSoonDays":-4,"auth":{"refreshLeewaySecs":-1}}"#);
        assert_eq!(config.due_soon_days, DEFAULT_DUE_SOON_DAYS);
        assert_eq!(config.auth.refresh_leeway_secs, DEFAULT_REFRESH_LEEWAY_SECS);
    }

    #[test]
    fn validate_requires_url_and_key() {
        let mut config = Config::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
        config.backend.url = "not a url".to_string();
        config.backend.anon_key = "k".to_string();
        assert!(config.validate().is_err());
        config.backend.url = "https://x.test".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_win() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = TestEnvGuard::new(dir.path())
            .with_var(BACKEND_URL_ENV, "https://env.example.test/")
            .with_var(ANON_KEY_ENV, "env-key");

        let config = Config::from_raw(r#"{"backend":{"url":"https://file.test","anon_key":"file"}}"#)
            .with_env_overrides();
        assert_eq!(config.backend.url, "https://env.example.test");
        assert_eq!(config.backend.anon_key, "env-key");
    }

    #[test]
    fn asset_dir_honours_override() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("assets");
        let _guard = TestEnvGuard::new(&root);

        assert_eq!(asset_dir().unwrap(), root);
        assert!(root.exists());
        assert_eq!(session_path().unwrap(), root.join("session.json"));
        assert_eq!(config_path().unwrap(), root.join("config.json"));
    }
}
