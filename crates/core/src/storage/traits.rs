//! Storage repository traits
//!
//! The credential store is the only owner of user records. Callers go through
//! this trait, allowing for different implementations (JSON file, in-memory).

use crate::error::Result;
use crate::models::UserId;

/// Credential store operations
///
/// Reads never fail: an unreadable backing store behaves as an empty one.
pub trait CredentialStore: Send + Sync {
    /// Stored token, `None` if the record is absent or the token is empty
    fn get_token(&self, user_id: UserId) -> Option<String>;

    /// Insert or overwrite a user's record and persist it immediately
    fn save_token(&self, user_id: UserId, display_name: &str, token: &str) -> Result<()>;

    /// Blank the token but keep the record and its display name
    fn clear_token(&self, user_id: UserId) -> Result<()>;

    /// Stored display name, or `User_<id>` when there is no record
    fn get_display_name(&self, user_id: UserId) -> String;
}
