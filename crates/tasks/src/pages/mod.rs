//! One view-model per page. Each `load` fetches its role and data
//! concurrently and never fails as a whole: every backend failure is logged
//! and queued as an error notification.

use db::{
    Backend, BackendError, TaskQuery,
    models::task::{Task, TaskRow},
};
use uuid::Uuid;

use crate::{
    board::TaskBoard,
    error::ServiceError,
    form::TaskForm,
    notification::{CREATE_TASK_FAILED, FETCH_TASKS_FAILED, Notification, Notifications},
};

pub mod analytics;
pub mod dashboard;
pub mod profile;
pub mod tasks;
pub mod team;

pub use analytics::AnalyticsPage;
pub use dashboard::DashboardPage;
pub use profile::ProfilePage;
pub use tasks::TasksPage;
pub use team::{TeamPage, member_count_label};

/// Keep the value, or log the failure and queue `message`.
pub(crate) fn settle<T>(
    result: Result<T, BackendError>,
    context: &'static str,
    message: &'static str,
    notifications: &mut Notifications,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::error!(error = %err, context, "Backend call failed");
            notifications.push(Notification::error(message));
            None
        }
    }
}

pub(crate) async fn reload_board<B: Backend + ?Sized>(
    db: &B,
    board: &mut TaskBoard,
    query: &TaskQuery,
    notifications: &mut Notifications,
) {
    let result = Task::find_with_users(db, query).await;
    if let Some(tasks) = settle(result, "fetch tasks", FETCH_TASKS_FAILED, notifications) {
        board.replace(tasks);
    }
}

/// Submit the form; on success reload the board and announce the new task.
pub(crate) async fn create_and_reload<B: Backend + ?Sized>(
    db: &B,
    board: &mut TaskBoard,
    query: &TaskQuery,
    form: &TaskForm,
    assigned_by: Uuid,
    notifications: &mut Notifications,
) -> Option<TaskRow> {
    match form.submit(db, assigned_by).await {
        Ok(row) => {
            reload_board(db, board, query, notifications).await;
            notifications.push(Notification::task_created());
            Some(row)
        }
        Err(ServiceError::Validation(message)) => {
            notifications.push(Notification::error(message));
            None
        }
        Err(err) => {
            tracing::error!(error = %err, "Error creating task");
            notifications.push(Notification::error(CREATE_TASK_FAILED));
            None
        }
    }
}
