use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    backend::{Backend, BackendError, RoleRpc},
    types::Role,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

/// The user fields stitched onto tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

/// Profile edits write the username only; email is immutable from the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub username: String,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn initials(&self) -> String {
        let initials: String = self.username.chars().take(2).collect::<String>().to_uppercase();
        if initials.is_empty() {
            "U".to_string()
        } else {
            initials
        }
    }

    pub async fn find_all<B: Backend + ?Sized>(db: &B) -> Result<Vec<Self>, BackendError> {
        db.select_users().await
    }

    pub async fn find_by_id<B: Backend + ?Sized>(db: &B, id: Uuid) -> Result<Self, BackendError> {
        db.select_user(id).await
    }

    pub async fn update_username<B: Backend + ?Sized>(
        db: &B,
        id: Uuid,
        username: &str,
    ) -> Result<(), BackendError> {
        let update = ProfileUpdate {
            username: username.to_string(),
            updated_at: Utc::now(),
        };
        db.update_profile(id, &update).await
    }

    pub async fn caller_role<B: Backend + ?Sized>(
        db: &B,
        rpc: RoleRpc,
    ) -> Result<Role, BackendError> {
        db.call_role_rpc(rpc).await
    }
}

impl UserSummary {
    pub async fn find_by_ids<B: Backend + ?Sized>(
        db: &B,
        ids: &[Uuid],
    ) -> Result<Vec<Self>, BackendError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        db.select_users_by_ids(ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: name.to_string(),
            email: format!("{name}@example.com"),
            role: Role::User,
        }
    }

    #[test]
    fn initials_take_two_uppercase_chars() {
        assert_eq!(user("alice").initials(), "AL");
        assert_eq!(user("z").initials(), "Z");
        assert_eq!(user("").initials(), "U");
    }

    #[test]
    fn missing_role_defaults_to_user() {
        let raw = serde_json::json!({
            "id": Uuid::nil(),
            "username": "bob",
            "email": "bob@example.com"
        });
        let parsed: User = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.role, Role::User);
    }
}
