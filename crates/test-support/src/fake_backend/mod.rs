//! An in-process stand-in for the hosted backend.
//!
//! Serves the REST table/RPC surface under `/rest/v1` and the identity surface
//! under `/auth/v1` from in-memory state. Row-level authorization is emulated:
//! admins see every task, users see tasks assigned to them, anonymous callers
//! see nothing. Every request is recorded so tests can count calls and inspect
//! bodies.

use std::{
    collections::{HashMap, HashSet},
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard},
};

use axum::{
    Json, Router,
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::{Next, from_fn_with_state},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, Utc};
use db::{
    models::{task::TaskRow, user::User},
    types::{Role, TaskPriority, TaskStatus},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

mod auth;
mod rest;

pub const ANON_KEY: &str = "fake-anon-key";
pub const DEFAULT_PASSWORD: &str = "correct-horse";
const JWT_SECRET: &[u8] = b"fake-backend-secret";
const ACCESS_TOKEN_TTL_SECS: i64 = 3600;

/// Endpoints that can be made to fail with a 500.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    SelectTasks,
    InsertTask,
    UpdateTask,
    SelectUsers,
    SelectUsersByIds,
    SelectUser,
    UpdateUser,
    RoleRpc,
    SignIn,
    SignOut,
    Recover,
    GetAuthUser,
    UpdateAuthUser,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub body: Option<Value>,
    pub authorization: Option<String>,
}

impl RecordedRequest {
    pub fn query_param(&self, key: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.into_owned())
    }
}

/// Builder for a seeded task row.
#[derive(Debug, Clone)]
pub struct TaskSeed {
    title: String,
    description: Option<String>,
    priority: TaskPriority,
    status: TaskStatus,
    due_date: Option<DateTime<Utc>>,
    assigned_to: Option<Uuid>,
    assigned_by: Option<Uuid>,
}

impl TaskSeed {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            description: None,
            priority: TaskPriority::Medium,
            status: TaskStatus::Pending,
            due_date: None,
            assigned_to: None,
            assigned_by: None,
        }
    }

    pub fn assigned_to(mut self, user_id: Uuid) -> Self {
        self.assigned_to = Some(user_id);
        self
    }

    pub fn assigned_by(mut self, user_id: Uuid) -> Self {
        self.assigned_by = Some(user_id);
        self
    }

    pub fn priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn due(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

pub(crate) struct FakeUser {
    pub user: User,
    pub password: String,
}

#[derive(Default)]
pub(crate) struct FakeState {
    pub users: Vec<FakeUser>,
    pub tasks: Vec<TaskRow>,
    pub hidden_users: HashSet<Uuid>,
    pub failing: HashSet<FailPoint>,
    pub requests: Vec<RecordedRequest>,
    pub refresh_tokens: HashMap<String, Uuid>,
}

pub(crate) type Shared = Arc<Mutex<FakeState>>;

pub(crate) fn lock(shared: &Shared) -> MutexGuard<'_, FakeState> {
    shared.lock().unwrap_or_else(|err| err.into_inner())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Caller {
    Anon,
    User(Uuid),
}

impl FakeState {
    pub fn user(&self, id: Uuid) -> Option<&FakeUser> {
        self.users.iter().find(|entry| entry.user.id == id)
    }

    pub fn is_admin(&self, caller: Caller) -> bool {
        match caller {
            Caller::User(id) => self.user(id).is_some_and(|entry| entry.user.role.is_admin()),
            Caller::Anon => false,
        }
    }

    pub fn is_failing(&self, point: FailPoint) -> bool {
        self.failing.contains(&point)
    }

    /// Resolve the caller from the `apikey` and bearer headers.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Caller, Response> {
        let api_key = headers.get("apikey").and_then(|value| value.to_str().ok());
        if api_key != Some(ANON_KEY) {
            return Err(rest_error(
                StatusCode::UNAUTHORIZED,
                "PGRST301",
                "Invalid API key",
            ));
        }

        let Some(token) = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_authorization_bearer)
        else {
            return Ok(Caller::Anon);
        };
        if token == ANON_KEY {
            return Ok(Caller::Anon);
        }

        let claims = utils_jwt::decode_claims(token).map_err(|_| {
            rest_error(StatusCode::UNAUTHORIZED, "PGRST301", "Invalid JWT")
        })?;
        if claims.is_expired_at(Utc::now(), Duration::zero()) {
            return Err(rest_error(
                StatusCode::UNAUTHORIZED,
                "PGRST301",
                "JWT expired",
            ));
        }
        if self.user(claims.sub).is_none() {
            return Err(rest_error(
                StatusCode::UNAUTHORIZED,
                "PGRST301",
                "User from sub claim in JWT does not exist",
            ));
        }
        Ok(Caller::User(claims.sub))
    }

    pub fn issue_session(&mut self, user_id: Uuid) -> Option<Value> {
        let user = self.user(user_id)?.user.clone();
        let expires_at = Utc::now() + Duration::seconds(ACCESS_TOKEN_TTL_SECS);
        let access_token = mint_token(&user, expires_at);
        let refresh_token = format!("rt-{}", Uuid::new_v4().simple());
        self.refresh_tokens.insert(refresh_token.clone(), user_id);

        Some(json!({
            "access_token": access_token,
            "token_type": "bearer",
            "expires_in": ACCESS_TOKEN_TTL_SECS,
            "expires_at": expires_at.timestamp(),
            "refresh_token": refresh_token,
            "user": auth_user_json(&user),
        }))
    }
}

fn parse_authorization_bearer(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    let (prefix, rest) = trimmed.split_once(' ')?;
    if !prefix.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

#[derive(Serialize)]
struct TokenClaims<'a> {
    sub: Uuid,
    email: &'a str,
    exp: i64,
    aud: &'static str,
    role: &'static str,
}

fn mint_token(user: &User, expires_at: DateTime<Utc>) -> String {
    let claims = TokenClaims {
        sub: user.id,
        email: &user.email,
        exp: expires_at.timestamp(),
        aud: "authenticated",
        role: "authenticated",
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET),
    )
    .expect("fake backend token should encode")
}

pub(crate) fn auth_user_json(user: &User) -> Value {
    json!({
        "id": user.id,
        "aud": "authenticated",
        "role": "authenticated",
        "email": user.email,
    })
}

pub(crate) fn rest_error(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({
            "code": code,
            "message": message,
            "details": null,
            "hint": null,
        })),
    )
        .into_response()
}

pub(crate) fn injected_failure() -> Response {
    rest_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "XX000",
        "injected failure",
    )
}

async fn record_request(State(shared): State<Shared>, req: Request, next: Next) -> Response {
    let (parts, body) = req.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };

    let recorded = RecordedRequest {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        body: serde_json::from_slice(&bytes).ok(),
        authorization: parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    };
    lock(&shared).requests.push(recorded);

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

fn router(shared: Shared) -> Router {
    Router::new()
        .nest("/rest/v1", rest::router())
        .nest("/auth/v1", auth::router())
        .layer(from_fn_with_state(shared.clone(), record_request))
        .with_state(shared)
}

/// Handle to a running fake backend. The server stops when this is dropped.
pub struct FakeBackend {
    shared: Shared,
    addr: SocketAddr,
    handle: tokio::task::JoinHandle<()>,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let shared: Shared = Arc::new(Mutex::new(FakeState::default()));
        let app = router(shared.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            shared,
            addr,
            handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn anon_key(&self) -> &'static str {
        ANON_KEY
    }

    /// Add a user with email `<username>@example.com` and [`DEFAULT_PASSWORD`].
    pub fn add_user(&self, username: &str, role: Role) -> User {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            role,
        };
        lock(&self.shared).users.push(FakeUser {
            user: user.clone(),
            password: DEFAULT_PASSWORD.to_string(),
        });
        user
    }

    /// Seed a task. Each seed is one second newer than the previous one.
    pub fn seed_task(&self, seed: TaskSeed) -> TaskRow {
        let mut state = lock(&self.shared);
        let created_at = Utc::now() - Duration::hours(1)
            + Duration::seconds(state.tasks.len() as i64);
        let row = TaskRow {
            id: Uuid::new_v4(),
            title: seed.title,
            description: seed.description,
            priority: seed.priority,
            status: seed.status,
            due_date: seed.due_date,
            assigned_to: seed.assigned_to,
            assigned_by: seed.assigned_by,
            created_at,
            updated_at: created_at,
        };
        state.tasks.push(row.clone());
        row
    }

    /// Hide a user from every lookup but their own.
    pub fn hide_user(&self, user_id: Uuid) {
        lock(&self.shared).hidden_users.insert(user_id);
    }

    pub fn fail(&self, point: FailPoint) {
        lock(&self.shared).failing.insert(point);
    }

    pub fn heal(&self, point: FailPoint) {
        lock(&self.shared).failing.remove(&point);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.shared).requests.clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        lock(&self.shared)
            .requests
            .iter()
            .filter(|req| req.method == method && req.path == path)
            .count()
    }

    pub fn clear_requests(&self) {
        lock(&self.shared).requests.clear();
    }

    pub fn tasks(&self) -> Vec<TaskRow> {
        lock(&self.shared).tasks.clone()
    }

    pub fn task(&self, id: Uuid) -> Option<TaskRow> {
        lock(&self.shared)
            .tasks
            .iter()
            .find(|task| task.id == id)
            .cloned()
    }

    pub fn user(&self, id: Uuid) -> Option<User> {
        lock(&self.shared).user(id).map(|entry| entry.user.clone())
    }

    pub fn password_of(&self, id: Uuid) -> Option<String> {
        lock(&self.shared)
            .user(id)
            .map(|entry| entry.password.clone())
    }

    pub fn access_token_for(&self, user_id: Uuid) -> String {
        let user = self.user(user_id).expect("unknown fake user");
        mint_token(&user, Utc::now() + Duration::seconds(ACCESS_TOKEN_TTL_SECS))
    }

    pub fn expired_access_token_for(&self, user_id: Uuid) -> String {
        let user = self.user(user_id).expect("unknown fake user");
        mint_token(&user, Utc::now() - Duration::seconds(ACCESS_TOKEN_TTL_SECS))
    }

    /// Register a refresh token for the user, as a sign-in would.
    pub fn refresh_token_for(&self, user_id: Uuid) -> String {
        let token = format!("rt-{}", Uuid::new_v4().simple());
        lock(&self.shared)
            .refresh_tokens
            .insert(token.clone(), user_id);
        token
    }

    pub fn live_refresh_tokens(&self, user_id: Uuid) -> usize {
        lock(&self.shared)
            .refresh_tokens
            .values()
            .filter(|owner| **owner == user_id)
            .count()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
