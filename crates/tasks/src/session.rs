//! The signed-in session and its single publication point.
//!
//! Pages receive a [`SessionContext`] explicitly; nothing reads ambient state.
//! Sign-in, refresh and sign-out publish through [`SessionStore`], and any
//! number of subscribers observe the change through a `watch` channel.

use std::{path::Path, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::{
    error::{Result, ServiceError},
    identity::{AuthUser, TokenResponse},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    #[default]
    SignedIn,
    /// Opened from a password recovery link; only good for setting a new password.
    Recovery,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: AuthUser,
    #[serde(default)]
    pub kind: SessionKind,
}

pub type SessionContext = Arc<Session>;

impl Session {
    pub fn from_token_response(
        response: TokenResponse,
        kind: SessionKind,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        // Out-of-range values count as absent and fall through to the token's `exp`.
        let expires_at = match (response.expires_at, response.expires_in) {
            (Some(at), _) => DateTime::<Utc>::from_timestamp(at, 0),
            (None, Some(secs)) => {
                Duration::try_seconds(secs).and_then(|ttl| now.checked_add_signed(ttl))
            }
            (None, None) => None,
        };
        let expires_at = match expires_at {
            Some(expires_at) => expires_at,
            None => utils_jwt::decode_claims(&response.access_token)?.expires_at()?,
        };

        Ok(Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at,
            user: response.user,
            kind,
        })
    }

    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn email(&self) -> &str {
        self.user.email.as_deref().unwrap_or_default()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>, leeway: Duration) -> bool {
        now.checked_add_signed(leeway)
            .is_none_or(|deadline| self.expires_at <= deadline)
    }

    pub fn is_recovery(&self) -> bool {
        self.kind == SessionKind::Recovery
    }
}

#[derive(Debug)]
pub struct SessionStore {
    tx: watch::Sender<Option<SessionContext>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SessionStore {
    pub fn new(initial: Option<Session>) -> Self {
        let (tx, _rx) = watch::channel(initial.map(Arc::new));
        Self { tx }
    }

    pub fn current(&self) -> Option<SessionContext> {
        self.tx.borrow().clone()
    }

    pub fn require(&self) -> Result<SessionContext> {
        self.current().ok_or(ServiceError::NotAuthenticated)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<SessionContext>> {
        self.tx.subscribe()
    }

    pub fn publish(&self, session: Session) -> SessionContext {
        let context = Arc::new(session);
        self.tx.send_replace(Some(context.clone()));
        context
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }
}

/// Read a persisted session. Missing or unreadable files mean "signed out".
pub async fn load_session(path: &Path) -> Option<Session> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(err) => {
                tracing::warn!(error = %err, "Ignoring unreadable session file");
                None
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => {
            tracing::warn!(error = %err, "Failed to read session file");
            None
        }
    }
}

pub async fn save_session(path: &Path, session: &Session) -> Result<()> {
    let raw = serde_json::to_string_pretty(session)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, raw).await?;
    Ok(())
}

pub async fn remove_session(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(kind: SessionKind) -> Session {
        Session {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
            user: AuthUser {
                id: Uuid::new_v4(),
                email: Some("ada@example.com".to_string()),
            },
            kind,
        }
    }

    #[test]
    fn subscribers_see_publish_and_clear() {
        let store = SessionStore::default();
        let mut rx = store.subscribe();
        assert!(store.current().is_none());
        assert!(matches!(store.require(), Err(ServiceError::NotAuthenticated)));

        let published = store.publish(session(SessionKind::SignedIn));
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            rx.borrow_and_update().as_ref().map(|s| s.user_id()),
            Some(published.user_id())
        );

        store.clear();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_none());
    }

    #[test]
    fn expiry_uses_explicit_timestamp_first() {
        let now = Utc::now();
        let response = TokenResponse {
            access_token: "not-a-jwt".to_string(),
            token_type: Some("bearer".to_string()),
            expires_in: Some(3600),
            expires_at: None,
            refresh_token: "r".to_string(),
            user: AuthUser {
                id: Uuid::nil(),
                email: None,
            },
        };
        let session = Session::from_token_response(response, SessionKind::SignedIn, now).unwrap();
        assert_eq!(session.expires_at, now + Duration::seconds(3600));
        assert!(!session.is_expired_at(now, Duration::seconds(60)));
        assert!(session.is_expired_at(now + Duration::seconds(3590), Duration::seconds(60)));
    }

    #[test]
    fn out_of_range_lifetime_falls_back_to_token_expiry() {
        let now = Utc::now();
        let response = |access_token: String| TokenResponse {
            access_token,
            token_type: None,
            expires_in: Some(9_000_000_000_000_000),
            expires_at: None,
            refresh_token: "r".to_string(),
            user: AuthUser {
                id: Uuid::nil(),
                email: None,
            },
        };

        let err = Session::from_token_response(
            response("not-a-jwt".to_string()),
            SessionKind::SignedIn,
            now,
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::Token(_)));

        let exp = now.timestamp() + 600;
        let claims = serde_json::json!({ "sub": Uuid::nil(), "exp": exp });
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        let session =
            Session::from_token_response(response(token), SessionKind::SignedIn, now).unwrap();
        assert_eq!(session.expires_at.timestamp(), exp);
    }

    #[test]
    fn unbounded_leeway_means_expired() {
        let session = session(SessionKind::SignedIn);
        assert!(session.is_expired_at(Utc::now(), Duration::MAX));
    }

    #[tokio::test]
    async fn persisted_session_round_trips_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        assert!(load_session(&path).await.is_none());

        let original = session(SessionKind::Recovery);
        save_session(&path, &original).await.unwrap();
        assert_eq!(load_session(&path).await, Some(original));

        remove_session(&path).await.unwrap();
        remove_session(&path).await.unwrap();
        assert!(load_session(&path).await.is_none());
    }

    #[tokio::test]
    async fn corrupt_session_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        tokio::fs::write(&path, "{").await.unwrap();
        assert!(load_session(&path).await.is_none());
    }
}
