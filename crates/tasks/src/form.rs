use chrono::{DateTime, Utc};
use db::{
    Backend,
    models::task::{CreateTask, TaskRow},
    types::{TaskPriority, TaskStatus},
};
use uuid::Uuid;

use crate::{error::Result, validation::validate_title};

/// The admin "new task" form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    pub assigned_to: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskForm {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// The insert payload. New tasks always start `pending` and record their creator.
    pub fn to_insert(&self, assigned_by: Uuid) -> Result<CreateTask> {
        validate_title(&self.title)?;
        Ok(CreateTask {
            title: self.title.clone(),
            description: Some(self.description.clone()),
            priority: self.priority,
            status: TaskStatus::Pending,
            assigned_to: self.assigned_to,
            assigned_by,
            due_date: self.due_date,
        })
    }

    /// Validate, then insert. Validation failures never reach the backend.
    pub async fn submit<B: Backend + ?Sized>(&self, db: &B, assigned_by: Uuid) -> Result<TaskRow> {
        let insert = self.to_insert(assigned_by)?;
        let row = TaskRow::create(db, &insert).await?;
        tracing::info!(task_id = %row.id, "Task created");
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;

    #[test]
    fn insert_defaults() {
        let creator = Uuid::new_v4();
        let insert = TaskForm::new("Write report").to_insert(creator).unwrap();
        assert_eq!(insert.priority, TaskPriority::Medium);
        assert_eq!(insert.status, TaskStatus::Pending);
        assert_eq!(insert.assigned_by, creator);
        assert_eq!(insert.assigned_to, None);
        assert_eq!(insert.description.as_deref(), Some(""));
        assert_eq!(insert.due_date, None);
    }

    #[test]
    fn whitespace_title_is_a_validation_error() {
        let err = TaskForm::new("  \t").to_insert(Uuid::nil()).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref msg) if msg == "Task title is required."));
    }

    #[test]
    fn insert_payload_wire_shape() {
        let assignee = Uuid::new_v4();
        let form = TaskForm {
            assigned_to: Some(assignee),
            priority: TaskPriority::High,
            ..TaskForm::new("Deploy")
        };
        let value = serde_json::to_value(form.to_insert(Uuid::nil()).unwrap()).unwrap();
        assert_eq!(value["status"], "pending");
        assert_eq!(value["priority"], "high");
        assert_eq!(value["assigned_to"], assignee.to_string());
        assert!(value["due_date"].is_null());
    }
}
