//! User model

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Chat-platform user identifier, the sole key of the credential store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored user with their school API session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Display only, never used for lookups
    #[serde(rename = "username", default, deserialize_with = "null_as_empty")]
    pub display_name: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl UserRecord {
    pub fn new(display_name: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            token: Some(token.into()),
        }
    }

    /// Token if present and non-empty
    pub fn active_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }
}

// Chat users without a public username were stored as `null`
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Placeholder name for a user without a stored record
pub fn placeholder_name(user_id: UserId) -> String {
    format!("User_{}", user_id)
}

/// Transient login progress for one user (never persisted)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginSession {
    pub pending_login: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_token_is_not_active() {
        let record = UserRecord::new("alice", "");
        assert_eq!(record.active_token(), None);

        let record = UserRecord::new("alice", "jwt");
        assert_eq!(record.active_token(), Some("jwt"));
    }

    #[test]
    fn test_record_layout() {
        let record = UserRecord::new("Алиса", "jwt");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["username"], "Алиса");
        assert_eq!(json["token"], "jwt");
    }

    #[test]
    fn test_null_username_accepted() {
        let record: UserRecord =
            serde_json::from_str(r#"{"username": null, "token": "jwt"}"#).unwrap();
        assert_eq!(record.display_name, "");
        assert_eq!(record.active_token(), Some("jwt"));
    }

    #[test]
    fn test_placeholder_name() {
        assert_eq!(placeholder_name(UserId(42)), "User_42");
    }
}
