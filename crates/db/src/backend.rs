use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{
        task::{CreateTask, TaskRow, TaskStatusUpdate},
        user::{ProfileUpdate, User, UserSummary},
    },
    types::Role,
};

/// Error body returned by the REST layer on non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Backend returned {status}: {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("Failed to decode backend response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Record not found: {0}")]
    RecordNotFound(String),
    #[error("Invalid backend url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl BackendError {
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Api { status, .. } => Some(*status),
            BackendError::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskOrder {
    #[default]
    CreatedAtDesc,
    DueDateAsc,
}

impl TaskOrder {
    pub fn as_param(self) -> &'static str {
        match self {
            TaskOrder::CreatedAtDesc => "created_at.desc",
            TaskOrder::DueDateAsc => "due_date.asc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskQuery {
    pub assigned_to: Option<Uuid>,
    pub order: TaskOrder,
}

impl TaskQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn assigned_to(user_id: Uuid) -> Self {
        Self {
            assigned_to: Some(user_id),
            order: TaskOrder::CreatedAtDesc,
        }
    }

    pub fn ordered_by(mut self, order: TaskOrder) -> Self {
        self.order = order;
        self
    }
}

/// Remote procedures answering "what is the caller's role".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleRpc {
    GetUserRole,
    GetCurrentUserRole,
}

impl RoleRpc {
    pub fn name(self) -> &'static str {
        match self {
            RoleRpc::GetUserRole => "get_user_role",
            RoleRpc::GetCurrentUserRole => "get_current_user_role",
        }
    }
}

/// The hosted backend's table and RPC surface.
///
/// Every call is a single request/response. Row-level authorization is applied
/// on the other side of this boundary; a denied call comes back as
/// [`BackendError::Api`] like any other failure.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn select_tasks(&self, query: &TaskQuery) -> Result<Vec<TaskRow>, BackendError>;

    async fn insert_task(&self, task: &CreateTask) -> Result<TaskRow, BackendError>;

    async fn update_task_status(
        &self,
        task_id: Uuid,
        update: &TaskStatusUpdate,
    ) -> Result<(), BackendError>;

    /// All users ordered by username.
    async fn select_users(&self) -> Result<Vec<User>, BackendError>;

    async fn select_users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>, BackendError>;

    async fn select_user(&self, user_id: Uuid) -> Result<User, BackendError>;

    async fn update_profile(
        &self,
        user_id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<(), BackendError>;

    async fn call_role_rpc(&self, rpc: RoleRpc) -> Result<Role, BackendError>;
}
