//! Read-only access to identity-service access tokens.
//!
//! Signatures are verified by the backend on every request; the client only
//! needs the subject, the email and the expiry to drive its session.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Malformed access token: {0}")]
    Malformed(#[from] jsonwebtoken::errors::Error),
    #[error("Access token has no expiry")]
    MissingExpiry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl Claims {
    pub fn expires_at(&self) -> Result<DateTime<Utc>, JwtError> {
        self.exp
            .and_then(|exp| DateTime::<Utc>::from_timestamp(exp, 0))
            .ok_or(JwtError::MissingExpiry)
    }

    /// True when the token is expired, or will be within `leeway`.
    pub fn is_expired_at(&self, now: DateTime<Utc>, leeway: Duration) -> bool {
        match self.expires_at() {
            Ok(expires_at) => now
                .checked_add_signed(leeway)
                .is_none_or(|deadline| expires_at <= deadline),
            Err(_) => false,
        }
    }
}

/// Decode the payload of an access token without checking its signature.
pub fn decode_claims(token: &str) -> Result<Claims, JwtError> {
    let header = decode_header(token)?;
    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims)
}
