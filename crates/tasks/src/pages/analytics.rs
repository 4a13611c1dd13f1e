use db::{Backend, RoleRpc, TaskQuery, models::task::Task, models::user::User, types::Role};
use serde::Serialize;

use super::settle;
use crate::{
    notification::{FETCH_ANALYTICS_FAILED, FETCH_ROLE_FAILED, Notification, Notifications},
    stats::{self, Slice, UserWorkload},
};

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalyticsPage {
    pub role: Option<Role>,
    pub tasks: Vec<Task>,
    #[serde(skip)]
    notifications: Notifications,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub status: Vec<Slice>,
    pub priority: Vec<Slice>,
    pub workload: Vec<UserWorkload>,
}

impl AnalyticsPage {
    pub async fn load<B: Backend + ?Sized>(db: &B) -> Self {
        let mut notifications = Notifications::default();
        let query = TaskQuery::all();
        let (role, tasks) = tokio::join!(
            User::caller_role(db, RoleRpc::GetUserRole),
            Task::find_with_users(db, &query),
        );

        let role = settle(role, "fetch user role", FETCH_ROLE_FAILED, &mut notifications);
        let tasks = settle(
            tasks,
            "fetch analytics tasks",
            FETCH_ANALYTICS_FAILED,
            &mut notifications,
        )
        .unwrap_or_default();

        Self {
            role,
            tasks,
            notifications,
        }
    }

    pub fn report(&self) -> AnalyticsReport {
        AnalyticsReport {
            status: stats::status_distribution(&self.tasks),
            priority: stats::priority_distribution(&self.tasks),
            workload: stats::workload(&self.tasks),
        }
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain()
    }
}
