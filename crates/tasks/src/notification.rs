use std::fmt;

use serde::Serialize;

pub const FETCH_TASKS_FAILED: &str = "Failed to fetch tasks. Please try again later.";
pub const FETCH_USERS_FAILED: &str = "Failed to fetch users. Please try again later.";
pub const FETCH_ROLE_FAILED: &str = "Failed to fetch user role. Please refresh the page.";
pub const FETCH_DASHBOARD_ROLE_FAILED: &str = "Could not fetch user role. Please try again later.";
pub const FETCH_TEAM_FAILED: &str = "Failed to fetch team members. Please try again later.";
pub const FETCH_ANALYTICS_FAILED: &str =
    "Failed to fetch tasks for analytics. Please try again later.";
pub const FETCH_PROFILE_FAILED: &str = "Could not fetch user data. Please try again later.";
pub const UPDATE_PROFILE_FAILED: &str = "Could not update profile. Please try again later.";
pub const UPDATE_STATUS_FAILED: &str = "Failed to update task status.";
pub const CREATE_TASK_FAILED: &str = "Failed to create task. Please try again.";
pub const RESET_LINK_FAILED: &str = "Failed to send reset link. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationVariant {
    #[default]
    Default,
    Destructive,
}

/// A transient message raised by a page action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: NotificationVariant,
}

impl Notification {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: NotificationVariant::Default,
        }
    }

    pub fn error(description: impl Into<String>) -> Self {
        Self {
            title: "Error".to_string(),
            description: description.into(),
            variant: NotificationVariant::Destructive,
        }
    }

    pub fn is_error(&self) -> bool {
        self.variant == NotificationVariant::Destructive
    }

    pub fn task_created() -> Self {
        Self::info("Task Created", "The task has been successfully created.")
    }

    pub fn status_changed(status: db::types::TaskStatus) -> Self {
        Self::info("Task Updated", format!("Task status changed to {status}."))
    }

    pub fn profile_updated() -> Self {
        Self::info("Success", "Your profile has been updated.")
    }

    pub fn signed_out() -> Self {
        Self::info("Signed out", "You have been successfully signed out.")
    }

    pub fn password_updated() -> Self {
        Self::info(
            "Password updated successfully",
            "You can now sign in with your new password.",
        )
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.description)
    }
}

/// Notifications raised by a page since they were last drained.
#[derive(Debug, Clone, Default)]
pub struct Notifications(Vec<Notification>);

impl Notifications {
    pub fn push(&mut self, notification: Notification) {
        self.0.push(notification);
    }

    pub fn drain(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(Notification::is_error)
    }
}

#[cfg(test)]
mod tests {
    use db::types::TaskStatus;

    use super::*;

    #[test]
    fn status_message_uses_wire_literal() {
        let n = Notification::status_changed(TaskStatus::InProgress);
        assert_eq!(n.description, "Task status changed to in-progress.");
        assert!(!n.is_error());
    }

    #[test]
    fn drain_empties_the_queue() {
        let mut queue = Notifications::default();
        queue.push(Notification::error(FETCH_TASKS_FAILED));
        assert!(queue.has_errors());
        assert_eq!(queue.drain().len(), 1);
        assert!(queue.is_empty());
    }
}
