use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

lazy_static! {
    // local@domain.tld. The local part excludes quoting and the markup
    // characters `<>"'&`, since addresses are rendered into email bodies.
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9.!#$%*+/=?^_`{|}~-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)+$"
    )
    .expect("email regex is valid");
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserError {
    #[error("invalid email")]
    InvalidEmail,
}

/// A registered identity. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Validate and normalize `email`, assigning a fresh id.
    pub fn new(email: &str) -> Result<Self, UserError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(UserError::InvalidEmail);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            email,
            created_at: Utc::now(),
        })
    }
}

/// Canonical form used as the registry key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_normalizes_email() {
        let user = User::new("  Alice@Example.COM ").unwrap();
        assert_eq!(user.email, "alice@example.com");
    }

    #[test]
    fn test_new_user_rejects_invalid_email() {
        for email in ["", "alice", "alice@", "@example.com", "alice@example", "a b@example.com", "a@b@example.com"] {
            assert_eq!(User::new(email), Err(UserError::InvalidEmail), "{email:?}");
        }
    }

    #[test]
    fn test_rejects_markup_in_email() {
        for email in [
            "<script>@example.com",
            "\"alice\"@example.com",
            "a'b@example.com",
            "a&b@example.com",
            "alice@exa<mple.com",
        ] {
            assert_eq!(User::new(email), Err(UserError::InvalidEmail), "{email:?}");
        }
        assert!(User::new("first.last+tag@mail.example.co").is_ok());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = User::new("alice@example.com").unwrap();
        let b = User::new("alice@example.com").unwrap();
        assert_ne!(a.id, b.id);
    }
}
