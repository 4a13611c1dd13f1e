use db::{
    Backend, RoleRpc, TaskQuery,
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
    notification::{FETCH_ROLE_FAILED, FETCH_TASKS_FAILED, FETCH_USERS_FAILED, Notification, Notifications},
    session::Session,
};

/// The task list page: every visible task, newest first, plus the users an
/// admin can assign to.
#[derive(Debug, Clone, Serialize)]
pub struct TasksPage {
    pub user_id: Uuid,
    pub role: Option<Role>,
    pub board: TaskBoard,
    pub users: Vec<User>,
    #[serde(skip)]
    notifications: Notifications,
}

impl TasksPage {
    fn query() -> TaskQuery {
        TaskQuery::all()
    }

    pub async fn load<B: Backend + ?Sized>(db: &B, session: &Session) -> Self {
        let mut notifications = Notifications::default();
        let query = Self::query();
        let (role, tasks, users) = tokio::join!(
            User::caller_role(db, RoleRpc::GetUserRole),
            Task::find_with_users(db, &query),
            User::find_all(db),
        );

        let role = settle(role, "fetch user role", FETCH_ROLE_FAILED, &mut notifications);
        let tasks = settle(tasks, "fetch tasks", FETCH_TASKS_FAILED, &mut notifications)
            .unwrap_or_default();
        let users = settle(users, "fetch users", FETCH_USERS_FAILED, &mut notifications)
            .unwrap_or_default();

        Self {
            user_id: session.user_id(),
            role,
            board: TaskBoard::new(tasks),
            users,
            notifications,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_some_and(Role::is_admin)
    }

    pub fn offered_views(&self) -> Vec<TaskView> {
        TaskView::offered_to(self.role)
    }

    pub fn view(&self, view: TaskView) -> Vec<&Task> {
        self.board.view(view, self.user_id)
    }

    pub async fn refresh<B: Backend + ?Sized>(&mut self, db: &B) {
        reload_board(db, &mut self.board, &Self::query(), &mut self.notifications).await;
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
        create_and_reload(
            db,
            &mut self.board,
            &Self::query(),
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
