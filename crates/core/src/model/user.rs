use serde::{Deserialize, Serialize};

use crate::model::ids::UserId;

/// Coarse role assigned by the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Learner,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Learner => "learner",
            Role::Admin => "admin",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "learner" | "user" => Some(Role::Learner),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// A resolved caller. Credentials and sessions live outside the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub role: Role,
}

impl User {
    #[must_use]
    pub fn new(id: UserId, email: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            email: normalize_email(&email.into()),
            role,
        }
    }

    #[must_use]
    pub fn is_learner(&self) -> bool {
        self.role == Role::Learner
    }
}

/// Trimmed, lowercased email used for identity comparisons.
#[must_use]
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_normalized() {
        let user = User::new(UserId::new(1), "  Ada@Example.COM ", Role::Learner);
        assert_eq!(user.email, "ada@example.com");
    }

    #[test]
    fn role_parse_accepts_legacy_user_label() {
        assert_eq!(Role::parse("USER"), Some(Role::Learner));
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("owner"), None);
    }
}
