use chrono::{DateTime, Duration, Utc};
use db::{
    models::task::{Assignee, Task},
    types::{TaskPriority, TaskStatus},
};
use serde::Serialize;
use uuid::Uuid;

/// Due within `[now, now + window]` and not completed. A window reaching past
/// the end of time has no upper bound.
pub fn is_due_soon(task: &Task, now: DateTime<Utc>, window: Duration) -> bool {
    let end = now.checked_add_signed(window);
    !task.is_completed()
        && task
            .due_date
            .is_some_and(|due| due >= now && end.is_none_or(|end| due <= end))
}

pub fn due_soon(tasks: &[Task], now: DateTime<Utc>, window: Duration) -> Vec<&Task> {
    tasks
        .iter()
        .filter(|task| is_due_soon(task, now, window))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub pending: usize,
    pub due_soon: usize,
    /// Whole percent, 0 when there are no tasks.
    pub completion_rate: u32,
}

impl TaskStats {
    pub fn from_tasks(tasks: &[Task], now: DateTime<Utc>, window: Duration) -> Self {
        let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();
        let total = tasks.len();
        let completed = count(TaskStatus::Completed);

        Self {
            total,
            completed,
            in_progress: count(TaskStatus::InProgress),
            pending: count(TaskStatus::Pending),
            due_soon: due_soon(tasks, now, window).len(),
            completion_rate: completion_rate(completed, total),
        }
    }
}

pub fn completion_rate(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u32
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slice {
    pub name: &'static str,
    pub value: usize,
}

pub fn status_distribution(tasks: &[Task]) -> Vec<Slice> {
    [
        TaskStatus::Completed,
        TaskStatus::InProgress,
        TaskStatus::Pending,
    ]
    .into_iter()
    .map(|status| Slice {
        name: status.label(),
        value: tasks.iter().filter(|t| t.status == status).count(),
    })
    .collect()
}

pub fn priority_distribution(tasks: &[Task]) -> Vec<Slice> {
    [TaskPriority::High, TaskPriority::Medium, TaskPriority::Low]
        .into_iter()
        .map(|priority| Slice {
            name: priority.label(),
            value: tasks.iter().filter(|t| t.priority == priority).count(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserWorkload {
    pub user_id: Uuid,
    pub name: String,
    pub assigned: usize,
    pub completed: usize,
}

/// Assigned and completed counts per assignee, in order of first appearance.
/// Only assignees that resolved to a user are counted.
pub fn workload(tasks: &[Task]) -> Vec<UserWorkload> {
    let mut rows: Vec<UserWorkload> = Vec::new();
    for task in tasks {
        let Some(Assignee::User(user)) = &task.assigned_to else {
            continue;
        };
        let index = match rows.iter().position(|row| row.user_id == user.id) {
            Some(index) => index,
            None => {
                rows.push(UserWorkload {
                    user_id: user.id,
                    name: user.username.clone(),
                    assigned: 0,
                    completed: 0,
                });
                rows.len() - 1
            }
        };
        rows[index].assigned += 1;
        if task.is_completed() {
            rows[index].completed += 1;
        }
    }
    rows
}
