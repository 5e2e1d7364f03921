//! User domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user, as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    /// Argon2id PHC string
    pub hashed_password: String,
    pub full_name: String,
    pub email: String,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub username: String,
    pub hashed_password: String,
    pub full_name: String,
    pub email: String,
}

/// User as shown to callers (never carries the password hash)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            password_changed_at: user.password_changed_at,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_drops_password_hash() {
        let user = User {
            username: "alice".to_string(),
            hashed_password: "$argon2id$v=19$secret".to_string(),
            full_name: "Alice Doe".to_string(),
            email: "alice@example.com".to_string(),
            password_changed_at: None,
            created_at: Utc::now(),
        };
        let view = UserView::from(&user);
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("argon2"));
        assert_eq!(view.username, "alice");
    }
}
