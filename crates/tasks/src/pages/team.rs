use db::{Backend, RoleRpc, models::user::User, types::Role};
use serde::Serialize;

use super::settle;
use crate::notification::{
    FETCH_ROLE_FAILED, FETCH_TEAM_FAILED, Notification, Notifications,
};

pub fn member_count_label(count: usize) -> String {
    if count == 1 {
        "1 member".to_string()
    } else {
        format!("{count} members")
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TeamPage {
    pub role: Option<Role>,
    pub members: Vec<User>,
    #[serde(skip)]
    notifications: Notifications,
}

impl TeamPage {
    pub async fn load<B: Backend + ?Sized>(db: &B) -> Self {
        let mut notifications = Notifications::default();
        let (role, members) = tokio::join!(
            User::caller_role(db, RoleRpc::GetUserRole),
            User::find_all(db),
        );

        let role = settle(role, "fetch user role", FETCH_ROLE_FAILED, &mut notifications);
        let members = settle(members, "fetch team", FETCH_TEAM_FAILED, &mut notifications)
            .unwrap_or_default();

        Self {
            role,
            members,
            notifications,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_some_and(Role::is_admin)
    }

    pub fn member_count_label(&self) -> String {
        member_count_label(self.members.len())
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_count_is_pluralised() {
        assert_eq!(member_count_label(0), "0 members");
        assert_eq!(member_count_label(1), "1 member");
        assert_eq!(member_count_label(7), "7 members");
    }
}
