use chrono::{DateTime, Duration, Utc};
use db::{
    Backend, TaskOrder, TaskQuery,
    models::{
        task::{Task, TaskRow},
        user::User,
    },
    types::{Role, TaskStatus},
};
use serde::Serialize;
use uuid::Uuid;

use super::{create_and_reload, reload_board, settle};
use crate::{
    board::{TaskBoard, TaskView},
    form::TaskForm,
    notification::{
        FETCH_DASHBOARD_ROLE_FAILED, FETCH_TASKS_FAILED, FETCH_USERS_FAILED, Notification,
        Notifications,
    },
    session::Session,
    stats::{self, TaskStats},
};

/// The landing page. Admins get every task and the team; everyone else gets
/// their own tasks ordered by due date. The role comes from the caller's
/// `users` row; a failed lookup falls back to the user variant.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardPage {
    pub user_id: Uuid,
    pub role: Option<Role>,
    pub board: TaskBoard,
    pub users: Vec<User>,
    #[serde(skip)]
    due_soon_window: Duration,
    #[serde(skip)]
    notifications: Notifications,
}

impl DashboardPage {
    fn query_for(role: Option<Role>, user_id: Uuid) -> TaskQuery {
        if role.is_some_and(Role::is_admin) {
            TaskQuery::all()
        } else {
            TaskQuery::assigned_to(user_id).ordered_by(TaskOrder::DueDateAsc)
        }
    }

    pub async fn load<B: Backend + ?Sized>(
        db: &B,
        session: &Session,
        due_soon_window: Duration,
    ) -> Self {
        let user_id = session.user_id();
        let mut notifications = Notifications::default();

        let role = settle(
            User::find_by_id(db, user_id).await.map(|user| user.role),
            "fetch user role",
            FETCH_DASHBOARD_ROLE_FAILED,
            &mut notifications,
        );
        let query = Self::query_for(role, user_id);

        let (tasks, users) = if role.is_some_and(Role::is_admin) {
            let (tasks, users) =
                tokio::join!(Task::find_with_users(db, &query), User::find_all(db));
            let users = settle(users, "fetch users", FETCH_USERS_FAILED, &mut notifications);
            (tasks, users.unwrap_or_default())
        } else {
            (Task::find_with_users(db, &query).await, Vec::new())
        };
        let tasks = settle(tasks, "fetch tasks", FETCH_TASKS_FAILED, &mut notifications)
            .unwrap_or_default();

        Self {
            user_id,
            role,
            board: TaskBoard::new(tasks),
            users,
            due_soon_window,
            notifications,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_some_and(Role::is_admin)
    }

    pub fn stats(&self, now: DateTime<Utc>) -> TaskStats {
        TaskStats::from_tasks(self.board.tasks(), now, self.due_soon_window)
    }

    pub fn due_soon(&self, now: DateTime<Utc>) -> Vec<&Task> {
        stats::due_soon(self.board.tasks(), now, self.due_soon_window)
    }

    pub fn view(&self, view: TaskView) -> Vec<&Task> {
        self.board.view(view, self.user_id)
    }

    pub async fn refresh<B: Backend + ?Sized>(&mut self, db: &B) {
        let query = Self::query_for(self.role, self.user_id);
        reload_board(db, &mut self.board, &query, &mut self.notifications).await;
    }

    pub async fn change_status<B: Backend + ?Sized>(
        &mut self,
        db: &B,
        task_id: Uuid,
        status: TaskStatus,
    ) {
        let notification = self.board.change_status(db, task_id, status).await;
        self.notifications.push(notification);
    }

    pub async fn create_task<B: Backend + ?Sized>(
        &mut self,
        db: &B,
        form: &TaskForm,
    ) -> Option<TaskRow> {
        let query = Self::query_for(self.role, self.user_id);
        create_and_reload(
            db,
            &mut self.board,
            &query,
            form,
            self.user_id,
            &mut self.notifications,
        )
        .await
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain()
    }
}
