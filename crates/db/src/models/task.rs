use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use crate::types::{TaskPriority, TaskStatus};
use crate::{
    backend::{Backend, BackendError, TaskQuery},
    models::user::UserSummary,
};

/// A `tasks` row exactly as stored: user references are bare ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub status: TaskStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_to: Option<Uuid>,
    pub assigned_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user reference on a task after the join: the user summary when it could
/// be fetched, otherwise the raw id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Assignee {
    User(UserSummary),
    Id(Uuid),
}

impl Assignee {
    pub fn id(&self) -> Uuid {
        match self {
            Assignee::User(user) => user.id,
            Assignee::Id(id) => *id,
        }
    }

    pub fn user(&self) -> Option<&UserSummary> {
        match self {
            Assignee::User(user) => Some(user),
            Assignee::Id(_) => None,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            Assignee::User(user) => user.username.clone(),
            Assignee::Id(id) => id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_to: Option<Assignee>,
    pub assigned_by: Option<Assignee>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub assigned_to: Option<Uuid>,
    pub assigned_by: Uuid,
    pub due_date: Option<DateTime<Utc>>,
}

impl CreateTask {
    pub fn new(title: String, assigned_by: Uuid) -> Self {
        Self {
            title,
            description: None,
            priority: TaskPriority::default(),
            status: TaskStatus::Pending,
            assigned_to: None,
            assigned_by,
            due_date: None,
        }
    }
}

/// The only fields a status change writes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusUpdate {
    pub status: TaskStatus,
    pub updated_at: DateTime<Utc>,
}

impl TaskStatusUpdate {
    pub fn now(status: TaskStatus) -> Self {
        Self {
            status,
            updated_at: Utc::now(),
        }
    }
}

impl TaskRow {
    pub async fn find<B: Backend + ?Sized>(
        db: &B,
        query: &TaskQuery,
    ) -> Result<Vec<Self>, BackendError> {
        db.select_tasks(query).await
    }

    pub async fn create<B: Backend + ?Sized>(
        db: &B,
        data: &CreateTask,
    ) -> Result<Self, BackendError> {
        db.insert_task(data).await
    }

    fn referenced_user_ids(rows: &[TaskRow]) -> Vec<Uuid> {
        rows.iter()
            .flat_map(|row| [row.assigned_to, row.assigned_by])
            .flatten()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl Task {
    fn from_row(row: TaskRow, users: &HashMap<Uuid, UserSummary>) -> Self {
        let resolve = |id: Option<Uuid>| {
            id.map(|id| match users.get(&id) {
                Some(user) => Assignee::User(user.clone()),
                None => Assignee::Id(id),
            })
        };

        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            priority: row.priority,
            status: row.status,
            due_date: row.due_date,
            assigned_to: resolve(row.assigned_to),
            assigned_by: resolve(row.assigned_by),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    pub fn assignee_id(&self) -> Option<Uuid> {
        self.assigned_to.as_ref().map(Assignee::id)
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Fetch tasks and stitch user summaries onto `assigned_to`/`assigned_by`.
    ///
    /// Two sequential calls: the task rows, then one batched lookup of every
    /// distinct referenced user. A failed task fetch is an error; a failed user
    /// lookup is logged and the rows come back with bare ids.
    pub async fn find_with_users<B: Backend + ?Sized>(
        db: &B,
        query: &TaskQuery,
    ) -> Result<Vec<Self>, BackendError> {
        let rows = TaskRow::find(db, query).await?;
        let user_ids = TaskRow::referenced_user_ids(&rows);

        let users: HashMap<Uuid, UserSummary> = if user_ids.is_empty() {
            HashMap::new()
        } else {
            match UserSummary::find_by_ids(db, &user_ids).await {
                Ok(users) => users.into_iter().map(|user| (user.id, user)).collect(),
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        user_count = user_ids.len(),
                        "Failed to resolve task users; returning raw ids"
                    );
                    HashMap::new()
                }
            }
        };

        Ok(rows
            .into_iter()
            .map(|row| Task::from_row(row, &users))
            .collect())
    }

    /// Write a new status. Only `status` and `updated_at` are sent.
    pub async fn update_status<B: Backend + ?Sized>(
        db: &B,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<TaskStatusUpdate, BackendError> {
        let update = TaskStatusUpdate::now(status);
        db.update_task_status(id, &update).await?;
        Ok(update)
    }

    pub fn apply_status_update(&mut self, update: &TaskStatusUpdate) {
        self.status = update.status;
        self.updated_at = update.updated_at;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        backend::RoleRpc,
        models::user::{ProfileUpdate, User},
        types::Role,
    };

    struct StubBackend {
        rows: Vec<TaskRow>,
        users: Vec<UserSummary>,
        fail_user_lookup: bool,
        user_lookups: AtomicUsize,
        requested_ids: Mutex<Vec<Vec<Uuid>>>,
    }

    impl StubBackend {
        fn new(rows: Vec<TaskRow>, users: Vec<UserSummary>) -> Self {
            Self {
                rows,
                users,
                fail_user_lookup: false,
                user_lookups: AtomicUsize::new(0),
                requested_ids: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Backend for StubBackend {
        async fn select_tasks(&self, _query: &TaskQuery) -> Result<Vec<TaskRow>, BackendError> {
            Ok(self.rows.clone())
        }

        async fn insert_task(&self, _task: &CreateTask) -> Result<TaskRow, BackendError> {
            unimplemented!()
        }

        async fn update_task_status(
            &self,
            _task_id: Uuid,
            _update: &TaskStatusUpdate,
        ) -> Result<(), BackendError> {
            Ok(())
        }

        async fn select_users(&self) -> Result<Vec<User>, BackendError> {
            unimplemented!()
        }

        async fn select_users_by_ids(
            &self,
            ids: &[Uuid],
        ) -> Result<Vec<UserSummary>, BackendError> {
            self.user_lookups.fetch_add(1, Ordering::SeqCst);
            self.requested_ids.lock().unwrap().push(ids.to_vec());
            if self.fail_user_lookup {
                return Err(BackendError::Api {
                    status: 403,
                    code: Some("42501".to_string()),
                    message: "permission denied for table users".to_string(),
                });
            }
            Ok(self
                .users
                .iter()
                .filter(|user| ids.contains(&user.id))
                .cloned()
                .collect())
        }

        async fn select_user(&self, _user_id: Uuid) -> Result<User, BackendError> {
            unimplemented!()
        }

        async fn update_profile(
            &self,
            _user_id: Uuid,
            _update: &ProfileUpdate,
        ) -> Result<(), BackendError> {
            unimplemented!()
        }

        async fn call_role_rpc(&self, _rpc: RoleRpc) -> Result<Role, BackendError> {
            Ok(Role::Admin)
        }
    }

    fn summary(name: &str) -> UserSummary {
        UserSummary {
            id: Uuid::new_v4(),
            username: name.to_string(),
            email: format!("{name}@example.com"),
        }
    }

    fn row(assigned_to: Option<Uuid>, assigned_by: Option<Uuid>) -> TaskRow {
        let now = Utc::now();
        TaskRow {
            id: Uuid::new_v4(),
            title: "Write report".to_string(),
            description: None,
            priority: TaskPriority::Medium,
            status: TaskStatus::Pending,
            due_date: None,
            assigned_to,
            assigned_by,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn distinct_users_are_fetched_in_one_batch() {
        let admin = summary("admin");
        let alice = summary("alice");
        let bob = summary("bob");
        let rows = vec![
            row(Some(alice.id), Some(admin.id)),
            row(Some(bob.id), Some(admin.id)),
            row(Some(alice.id), Some(admin.id)),
            row(None, Some(admin.id)),
        ];
        let db = StubBackend::new(rows, vec![admin.clone(), alice.clone(), bob.clone()]);

        let tasks = Task::find_with_users(&db, &TaskQuery::all()).await.unwrap();

        assert_eq!(db.user_lookups.load(Ordering::SeqCst), 1);
        let requested = db.requested_ids.lock().unwrap();
        assert_eq!(requested[0].len(), 3);
        assert_eq!(tasks.len(), 4);
        assert_eq!(tasks[0].assigned_to, Some(Assignee::User(alice)));
        assert_eq!(tasks[1].assigned_by, Some(Assignee::User(admin)));
        assert_eq!(tasks[3].assigned_to, None);
    }

    #[tokio::test]
    async fn failed_user_lookup_keeps_raw_ids() {
        let admin = summary("admin");
        let alice = summary("alice");
        let mut db = StubBackend::new(
            vec![row(Some(alice.id), Some(admin.id)), row(None, None)],
            vec![admin.clone(), alice.clone()],
        );
        db.fail_user_lookup = true;

        let tasks = Task::find_with_users(&db, &TaskQuery::all()).await.unwrap();

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].assigned_to, Some(Assignee::Id(alice.id)));
        assert_eq!(tasks[0].assigned_by, Some(Assignee::Id(admin.id)));
        assert_eq!(tasks[1].assigned_to, None);
        assert_eq!(tasks[1].assigned_by, None);
    }

    #[tokio::test]
    async fn no_lookup_when_nothing_is_referenced() {
        let db = StubBackend::new(vec![row(None, None)], Vec::new());

        let tasks = Task::find_with_users(&db, &TaskQuery::all()).await.unwrap();

        assert_eq!(tasks.len(), 1);
        assert_eq!(db.user_lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn user_hidden_from_lookup_stays_a_bare_id() {
        let visible = summary("visible");
        let hidden = Uuid::new_v4();
        let db = StubBackend::new(vec![row(Some(hidden), Some(visible.id))], vec![visible.clone()]);

        let tasks = Task::find_with_users(&db, &TaskQuery::all()).await.unwrap();

        assert_eq!(tasks[0].assigned_to, Some(Assignee::Id(hidden)));
        assert_eq!(tasks[0].assigned_by, Some(Assignee::User(visible)));
    }

    #[test]
    fn assignee_deserializes_from_object_or_id() {
        let id = Uuid::new_v4();
        let bare: Assignee = serde_json::from_value(serde_json::json!(id)).unwrap();
        assert_eq!(bare, Assignee::Id(id));

        let object: Assignee = serde_json::from_value(serde_json::json!({
            "id": id,
            "username": "carol",
            "email": "carol@example.com"
        }))
        .unwrap();
        assert_eq!(object.id(), id);
        assert_eq!(object.display_name(), "carol");
    }
}
