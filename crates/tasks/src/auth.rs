use std::collections::HashMap;

use chrono::{Duration, Utc};
use url::Url;

use crate::{
    error::{Result, ServiceError},
    identity::{IdentityClient, TokenResponse},
    notification::{Notification, RESET_LINK_FAILED},
    session::{Session, SessionContext, SessionKind, SessionStore},
    validation::{validate_email, validate_new_password},
};

pub const DASHBOARD_ROUTE: &str = "/dashboard";
pub const LOGIN_ROUTE: &str = "/login";

/// Where the callback sends the user, and why.
#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    pub route: &'static str,
    pub session: Option<SessionContext>,
    pub error: Option<String>,
}

/// Sign-in, sign-out, password recovery and callback handling over an
/// [`IdentityClient`], publishing every session change through one store.
pub struct AuthService<I> {
    identity: I,
    store: SessionStore,
    redirect_to: Option<String>,
    refresh_leeway: Duration,
}

impl<I: IdentityClient> AuthService<I> {
    pub fn new(identity: I, store: SessionStore) -> Self {
        Self {
            identity,
            store,
            redirect_to: None,
            refresh_leeway: Duration::seconds(60),
        }
    }

    pub fn with_redirect_to(mut self, redirect_to: Option<String>) -> Self {
        self.redirect_to = redirect_to;
        self
    }

    pub fn with_refresh_leeway(mut self, leeway: Duration) -> Self {
        self.refresh_leeway = leeway;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionContext> {
        let email = validate_email(email)?;
        if password.is_empty() {
            return Err(ServiceError::validation("Password is required"));
        }

        let response = self.identity.sign_in_with_password(email, password).await?;
        let session = Session::from_token_response(response, SessionKind::SignedIn, Utc::now())?;
        tracing::info!(user_id = %session.user_id(), "Signed in");
        Ok(self.store.publish(session))
    }

    /// Revoke the session remotely and clear it locally. The local session is
    /// cleared even when the revoke call fails.
    pub async fn sign_out(&self) -> Notification {
        if let Some(session) = self.store.current()
            && let Err(err) = self.identity.sign_out(&session.access_token).await
        {
            tracing::warn!(error = %err, "Failed to revoke session; clearing it locally");
        }
        self.store.clear();
        Notification::signed_out()
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let email = validate_email(email)?;
        self.identity
            .request_password_reset(email, self.redirect_to.as_deref())
            .await
            .map_err(|err| {
                tracing::error!(error = %err, "Failed to request password reset");
                match err.status() {
                    Some(_) => ServiceError::Identity(err),
                    None => ServiceError::validation(RESET_LINK_FAILED),
                }
            })
    }

    /// Set a new password from a recovery session. On success the recovery
    /// session is dropped so the user signs in with the new password.
    pub async fn reset_password(&self, password: &str, confirm: &str) -> Result<Notification> {
        validate_new_password(password, confirm)?;
        let session = match self.store.current() {
            Some(session) if session.is_recovery() => session,
            _ => return Err(ServiceError::validation("Password reset token is missing")),
        };

        self.identity
            .update_password(&session.access_token, password)
            .await?;
        tracing::info!(user_id = %session.user_id(), "Password updated");
        self.store.clear();
        Ok(Notification::password_updated())
    }

    /// Finish an identity redirect. Tokens in the url fragment are verified
    /// with the identity service before being published.
    pub async fn complete_callback(&self, callback_url: &str) -> CallbackOutcome {
        match self.consume_callback(callback_url).await {
            Ok(()) => {
                let session = self.store.current();
                CallbackOutcome {
                    route: if session.is_some() {
                        DASHBOARD_ROUTE
                    } else {
                        LOGIN_ROUTE
                    },
                    session,
                    error: None,
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "Error during auth callback");
                CallbackOutcome {
                    route: LOGIN_ROUTE,
                    session: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    async fn consume_callback(&self, callback_url: &str) -> Result<()> {
        let url = Url::parse(callback_url).map_err(|err| {
            ServiceError::validation(format!("Invalid callback url: {err}"))
        })?;
        let Some(fragment) = url.fragment().filter(|fragment| !fragment.is_empty()) else {
            return Ok(());
        };
        let params: HashMap<String, String> = url::form_urlencoded::parse(fragment.as_bytes())
            .into_owned()
            .collect();

        if let Some(description) = params
            .get("error_description")
            .or_else(|| params.get("error"))
        {
            return Err(ServiceError::validation(description.clone()));
        }
        let Some(access_token) = params.get("access_token") else {
            return Ok(());
        };

        let user = self.identity.get_user(access_token).await?;
        let kind = match params.get("type").map(String::as_str) {
            Some("recovery") => SessionKind::Recovery,
            _ => SessionKind::SignedIn,
        };
        let response = TokenResponse {
            access_token: access_token.clone(),
            token_type: params.get("token_type").cloned(),
            expires_in: params.get("expires_in").and_then(|v| v.parse().ok()),
            expires_at: params.get("expires_at").and_then(|v| v.parse().ok()),
            refresh_token: params.get("refresh_token").cloned().unwrap_or_default(),
            user,
        };
        let session = Session::from_token_response(response, kind, Utc::now())?;
        self.store.publish(session);
        Ok(())
    }

    /// The current session, refreshed first when its access token is about to expire.
    pub async fn current_session(&self) -> Result<SessionContext> {
        let session = self.store.require()?;
        if !session.is_expired_at(Utc::now(), self.refresh_leeway) {
            return Ok(session);
        }

        tracing::debug!(user_id = %session.user_id(), "Refreshing expired access token");
        match self.identity.refresh_session(&session.refresh_token).await {
            Ok(response) => {
                let refreshed =
                    Session::from_token_response(response, session.kind, Utc::now())?;
                Ok(self.store.publish(refreshed))
            }
            Err(err) => {
                tracing::warn!(error = %err, "Session refresh failed; signing out locally");
                self.store.clear();
                Err(ServiceError::NotAuthenticated)
            }
        }
    }
}
