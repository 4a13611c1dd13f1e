use db::{
    Backend,
    models::task::{Task, TaskStatusUpdate},
    types::{Role, TaskStatus},
};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::notification::{Notification, UPDATE_STATUS_FAILED};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskView {
    #[default]
    All,
    Mine,
    Unassigned,
}

impl TaskView {
    /// Views offered to a role. `unassigned` is an admin affordance only;
    /// the filter itself works for anyone.
    pub fn offered_to(role: Option<Role>) -> Vec<TaskView> {
        let admin = role.is_some_and(Role::is_admin);
        TaskView::iter()
            .filter(|view| admin || *view != TaskView::Unassigned)
            .collect()
    }

    pub fn matches(self, task: &Task, current_user: Uuid) -> bool {
        match self {
            TaskView::All => true,
            TaskView::Mine => task.assignee_id() == Some(current_user),
            TaskView::Unassigned => task.assigned_to.is_none(),
        }
    }
}

/// The task list a page holds in memory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskBoard {
    tasks: Vec<Task>,
}

impl TaskBoard {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn replace(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    pub fn get(&self, task_id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    pub fn view(&self, view: TaskView, current_user: Uuid) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| view.matches(task, current_user))
            .collect()
    }

    /// Patch one task by id. Returns false when the id is not on the board.
    pub fn apply_status_update(&mut self, task_id: Uuid, update: &TaskStatusUpdate) -> bool {
        match self.tasks.iter_mut().find(|task| task.id == task_id) {
            Some(task) => {
                task.apply_status_update(update);
                true
            }
            None => false,
        }
    }

    /// Write the status, then patch the in-memory list without refetching.
    /// A failed write leaves the board untouched.
    pub async fn change_status<B: Backend + ?Sized>(
        &mut self,
        db: &B,
        task_id: Uuid,
        status: TaskStatus,
    ) -> Notification {
        match Task::update_status(db, task_id, status).await {
            Ok(update) => {
                self.apply_status_update(task_id, &update);
                tracing::info!(%task_id, %status, "Task status updated");
                Notification::status_changed(status)
            }
            Err(err) => {
                tracing::error!(error = %err, %task_id, "Error updating task status");
                Notification::error(UPDATE_STATUS_FAILED)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_tasks {
    use chrono::{DateTime, Utc};
    use db::{
        models::{
            task::{Assignee, Task},
            user::UserSummary,
        },
        types::{TaskPriority, TaskStatus},
    };
    use uuid::Uuid;

    pub fn task(status: TaskStatus, priority: TaskPriority) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            title: "task".to_string(),
            description: None,
            priority,
            status,
            due_date: None,
            assigned_to: None,
            assigned_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn due(mut task: Task, due: DateTime<Utc>) -> Task {
        task.due_date = Some(due);
        task
    }

    pub fn assigned(mut task: Task, id: Uuid, username: &str) -> Task {
        task.assigned_to = Some(Assignee::User(UserSummary {
            id,
            username: username.to_string(),
            email: format!("{username}@example.com"),
        }));
        task
    }
}
