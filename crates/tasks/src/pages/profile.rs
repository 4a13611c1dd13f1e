use db::{Backend, RoleRpc, models::user::User, types::Role};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    notification::{FETCH_PROFILE_FAILED, Notification, Notifications, UPDATE_PROFILE_FAILED},
    session::Session,
    validation::validate_username,
};

/// The caller's own profile. Email is shown but never written.
#[derive(Debug, Clone, Serialize)]
pub struct ProfilePage {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Option<Role>,
    #[serde(skip)]
    notifications: Notifications,
}

impl ProfilePage {
    pub async fn load<B: Backend + ?Sized>(db: &B, session: &Session) -> Self {
        let mut page = Self {
            user_id: session.user_id(),
            username: String::new(),
            email: String::new(),
            role: None,
            notifications: Notifications::default(),
        };

        let rpc_role = match User::caller_role(db, RoleRpc::GetCurrentUserRole).await {
            Ok(role) => role,
            Err(err) => {
                tracing::error!(error = %err, "Error fetching user data");
                page.notifications
                    .push(Notification::error(FETCH_PROFILE_FAILED));
                return page;
            }
        };

        match User::find_by_id(db, page.user_id).await {
            Ok(user) => {
                page.username = user.username;
                page.email = user.email;
                page.role = Some(user.role);
            }
            Err(err) => {
                tracing::error!(error = %err, "Error fetching user profile");
                page.role = Some(rpc_role);
            }
        }
        page
    }

    /// Write a new username. Blank names are rejected before any call.
    pub async fn update_username<B: Backend + ?Sized>(&mut self, db: &B, username: &str) -> bool {
        let username = match validate_username(username) {
            Ok(username) => username,
            Err(err) => {
                self.notifications.push(Notification::error(err.to_string()));
                return false;
            }
        };

        match User::update_username(db, self.user_id, username).await {
            Ok(()) => {
                tracing::info!(user_id = %self.user_id, "Profile updated");
                self.username = username.to_string();
                self.notifications.push(Notification::profile_updated());
                true
            }
            Err(err) => {
                tracing::error!(error = %err, "Error updating profile");
                self.notifications
                    .push(Notification::error(UPDATE_PROFILE_FAILED));
                false
            }
        }
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain()
    }
}
