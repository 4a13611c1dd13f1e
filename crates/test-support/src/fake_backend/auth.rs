use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{Caller, FailPoint, Shared, auth_user_json, lock};

pub(super) fn router() -> Router<Shared> {
    Router::new()
        .route("/token", post(token))
        .route("/logout", post(logout))
        .route("/recover", post(recover))
        .route("/user", get(get_user).put(update_user))
}

fn grant_error(description: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": "invalid_grant",
            "error_description": description,
        })),
    )
        .into_response()
}

fn auth_error(status: StatusCode, error_code: &str, msg: &str) -> Response {
    (
        status,
        Json(json!({
            "code": status.as_u16(),
            "error_code": error_code,
            "msg": msg,
        })),
    )
        .into_response()
}

fn injected_failure() -> Response {
    auth_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "unexpected_failure",
        "injected failure",
    )
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

async fn token(
    State(shared): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<TokenBody>,
) -> Response {
    let mut state = lock(&shared);
    if state.is_failing(FailPoint::SignIn) {
        return injected_failure();
    }

    let user_id = match params.get("grant_type").map(String::as_str) {
        Some("password") => {
            let email = body.email.unwrap_or_default();
            let password = body.password.unwrap_or_default();
            match state
                .users
                .iter()
                .find(|entry| entry.user.email == email && entry.password == password)
            {
                Some(entry) => entry.user.id,
                None => return grant_error("Invalid login credentials"),
            }
        }
        Some("refresh_token") => {
            let presented = body.refresh_token.unwrap_or_default();
            match state.refresh_tokens.remove(&presented) {
                Some(user_id) => user_id,
                None => return grant_error("Invalid Refresh Token: Refresh Token Not Found"),
            }
        }
        _ => {
            return auth_error(
                StatusCode::BAD_REQUEST,
                "unsupported_grant_type",
                "unsupported grant type",
            );
        }
    };

    match state.issue_session(user_id) {
        Some(session) => Json(session).into_response(),
        None => grant_error("User not found"),
    }
}

async fn logout(State(shared): State<Shared>, headers: HeaderMap) -> Response {
    let mut state = lock(&shared);
    if state.is_failing(FailPoint::SignOut) {
        return injected_failure();
    }
    match state.authenticate(&headers) {
        Ok(Caller::User(user_id)) => {
            state.refresh_tokens.retain(|_, owner| *owner != user_id);
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(Caller::Anon) | Err(_) => auth_error(
            StatusCode::UNAUTHORIZED,
            "no_authorization",
            "This endpoint requires a valid Bearer token",
        ),
    }
}

#[derive(Debug, Deserialize)]
struct RecoverBody {
    #[serde(default)]
    email: Option<String>,
}

async fn recover(State(shared): State<Shared>, Json(body): Json<RecoverBody>) -> Response {
    let state = lock(&shared);
    if state.is_failing(FailPoint::Recover) {
        return injected_failure();
    }
    if body.email.as_deref().is_none_or(str::is_empty) {
        return auth_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "validation_failed",
            "An email address is required",
        );
    }
    // Unknown addresses get the same answer as known ones.
    Json(json!({})).into_response()
}

async fn get_user(State(shared): State<Shared>, headers: HeaderMap) -> Response {
    let state = lock(&shared);
    if state.is_failing(FailPoint::GetAuthUser) {
        return injected_failure();
    }
    match state.authenticate(&headers) {
        Ok(Caller::User(user_id)) => match state.user(user_id) {
            Some(entry) => Json(auth_user_json(&entry.user)).into_response(),
            None => auth_error(StatusCode::NOT_FOUND, "user_not_found", "User not found"),
        },
        Ok(Caller::Anon) | Err(_) => auth_error(
            StatusCode::UNAUTHORIZED,
            "bad_jwt",
            "invalid JWT: unable to parse or verify signature",
        ),
    }
}

async fn update_user(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&shared);
    if state.is_failing(FailPoint::UpdateAuthUser) {
        return injected_failure();
    }
    let user_id = match state.authenticate(&headers) {
        Ok(Caller::User(user_id)) => user_id,
        Ok(Caller::Anon) | Err(_) => {
            return auth_error(
                StatusCode::UNAUTHORIZED,
                "bad_jwt",
                "invalid JWT: unable to parse or verify signature",
            );
        }
    };

    if let Some(password) = body.get("password").and_then(Value::as_str) {
        if password.chars().count() < 6 {
            return auth_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                "weak_password",
                "Password should be at least 6 characters.",
            );
        }
        if let Some(entry) = state.users.iter_mut().find(|entry| entry.user.id == user_id) {
            entry.password = password.to_string();
        }
    }

    match state.user(user_id) {
        Some(entry) => Json(auth_user_json(&entry.user)).into_response(),
        None => auth_error(StatusCode::NOT_FOUND, "user_not_found", "User not found"),
    }
}
