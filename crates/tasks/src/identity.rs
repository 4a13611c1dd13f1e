use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

const AUTH_PATH: &str = "auth/v1/";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("Failed to decode identity response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid identity url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl IdentityError {
    pub fn status(&self) -> Option<u16> {
        match self {
            IdentityError::Api { status, .. } => Some(*status),
            IdentityError::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub refresh_token: String,
    pub user: AuthUser,
}

/// The identity service's two error dialects.
#[derive(Debug, Default, Deserialize)]
struct IdentityErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn identity_error(status: StatusCode, body: &str) -> IdentityError {
    let parsed: IdentityErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .error_description
        .or(parsed.msg)
        .or(parsed.message)
        .or(parsed.error)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        });
    IdentityError::Api {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
pub trait IdentityClient: Send + Sync {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<TokenResponse, IdentityError>;

    async fn refresh_session(&self, refresh_token: &str) -> Result<TokenResponse, IdentityError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError>;

    async fn request_password_reset(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), IdentityError>;

    async fn update_password(
        &self,
        access_token: &str,
        password: &str,
    ) -> Result<AuthUser, IdentityError>;

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, IdentityError>;
}

/// [`IdentityClient`] over the hosted identity service (`/auth/v1`).
#[derive(Debug, Clone)]
pub struct HttpIdentityClient {
    client: Client,
    auth_url: Url,
    anon_key: String,
}

impl HttpIdentityClient {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self, IdentityError> {
        let client = Client::builder().timeout(timeout).build()?;
        let auth_url = db::normalize_base_url(base_url)?.join(AUTH_PATH)?;
        Ok(Self {
            client,
            auth_url,
            anon_key: anon_key.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, IdentityError> {
        Ok(self.auth_url.join(path)?)
    }

    fn authorize(&self, rb: RequestBuilder, access_token: Option<&str>) -> RequestBuilder {
        rb.header("apikey", &self.anon_key)
            .bearer_auth(access_token.unwrap_or(&self.anon_key))
    }

    async fn send(
        &self,
        rb: RequestBuilder,
        access_token: Option<&str>,
    ) -> Result<String, IdentityError> {
        let resp = self.authorize(rb, access_token).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(identity_error(status, &body));
        }
        Ok(body)
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        rb: RequestBuilder,
        access_token: Option<&str>,
    ) -> Result<T, IdentityError> {
        let body = self.send(rb, access_token).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl IdentityClient for HttpIdentityClient {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<TokenResponse, IdentityError> {
        let rb = self
            .client
            .post(self.endpoint("token")?)
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        self.fetch_json(rb, None).await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<TokenResponse, IdentityError> {
        let rb = self
            .client
            .post(self.endpoint("token")?)
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }));
        self.fetch_json(rb, None).await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let rb = self.client.post(self.endpoint("logout")?);
        self.send(rb, Some(access_token)).await?;
        Ok(())
    }

    async fn request_password_reset(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), IdentityError> {
        let mut rb = self
            .client
            .post(self.endpoint("recover")?)
            .json(&json!({ "email": email }));
        if let Some(redirect_to) = redirect_to {
            rb = rb.query(&[("redirect_to", redirect_to)]);
        }
        self.send(rb, None).await?;
        Ok(())
    }

    async fn update_password(
        &self,
        access_token: &str,
        password: &str,
    ) -> Result<AuthUser, IdentityError> {
        let rb = self
            .client
            .put(self.endpoint("user")?)
            .json(&json!({ "password": password }));
        self.fetch_json(rb, Some(access_token)).await
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, IdentityError> {
        let rb = self.client.get(self.endpoint("user")?);
        self.fetch_json(rb, Some(access_token)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_errors_prefer_description() {
        let err = identity_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert_eq!(err.to_string(), "Invalid login credentials");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn newer_error_shape_uses_msg() {
        let err = identity_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"code":422,"error_code":"weak_password","msg":"Password should be at least 6 characters."}"#,
        );
        assert_eq!(err.to_string(), "Password should be at least 6 characters.");
    }

    #[test]
    fn empty_body_falls_back_to_reason() {
        let err = identity_error(StatusCode::SERVICE_UNAVAILABLE, "");
        assert_eq!(err.to_string(), "Service Unavailable");
    }

    #[test]
    fn endpoints_sit_under_auth_prefix() {
        let client =
            HttpIdentityClient::new("https://x.test/base", "anon", Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.endpoint("token").unwrap().as_str(),
            "https://x.test/base/auth/v1/token"
        );
    }
}
