use chrono::Duration;
use config::{Config, MAX_DUE_SOON_DAYS, MAX_REFRESH_LEEWAY_SECS};
use db::RestBackend;

use crate::{
    auth::AuthService,
    error::Result,
    identity::HttpIdentityClient,
    session::{Session, SessionContext, SessionStore},
};

/// Everything a front end needs to talk to one backend project.
pub struct TaskDeskClient {
    backend: RestBackend,
    auth: AuthService<HttpIdentityClient>,
    due_soon_window: Duration,
}

impl TaskDeskClient {
    pub fn from_config(config: &Config, session: Option<Session>) -> Result<Self> {
        config.validate()?;
        let timeout = config.request_timeout();
        let backend = RestBackend::new(&config.backend.url, &config.backend.anon_key, timeout)?;
        let identity =
            HttpIdentityClient::new(&config.backend.url, &config.backend.anon_key, timeout)?;
        let auth = AuthService::new(identity, SessionStore::new(session))
            .with_redirect_to(config.auth.redirect_to.clone())
            .with_refresh_leeway(Duration::seconds(
                config.auth.refresh_leeway_secs.clamp(0, MAX_REFRESH_LEEWAY_SECS),
            ));

        Ok(Self {
            backend,
            auth,
            due_soon_window: Duration::days(config.due_soon_days.clamp(0, MAX_DUE_SOON_DAYS)),
        })
    }

    pub fn auth(&self) -> &AuthService<HttpIdentityClient> {
        &self.auth
    }

    pub fn due_soon_window(&self) -> Duration {
        self.due_soon_window
    }

    /// The signed-in session (refreshed if needed) and a backend acting as its user.
    pub async fn signed_in(&self) -> Result<(SessionContext, RestBackend)> {
        let session = self.auth.current_session().await?;
        let backend = self.backend.with_access_token(session.access_token.clone());
        Ok((session, backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        let mut config = Config::default();
        config.backend.url = "http://127.0.0.1:9".to_string();
        config.backend.anon_key = "anon".to_string();
        config
    }

    #[test]
    fn oversized_windows_do_not_panic() {
        let client = TaskDeskClient::from_config(
            &Config::from_raw(
                r#"{"backend":{"url":"http://127.0.0.1:9","anonKey":"anon"},"dueSoonDays":1000000000000}"#,
            ),
            None,
        )
        .unwrap();
        assert_eq!(client.due_soon_window(), Duration::days(MAX_DUE_SOON_DAYS));

        let mut raw = config();
        raw.due_soon_days = i64::MAX;
        raw.auth.refresh_leeway_secs = i64::MAX;
        let client = TaskDeskClient::from_config(&raw, None).unwrap();
        assert_eq!(client.due_soon_window(), Duration::days(MAX_DUE_SOON_DAYS));
    }

    #[test]
    fn missing_backend_is_a_config_error() {
        let err = TaskDeskClient::from_config(&Config::default(), None)
            .err()
            .unwrap();
        assert!(matches!(err, crate::ServiceError::Config(_)));
    }
}
