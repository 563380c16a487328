//! Credential storage layer for Timetable

mod json_file;
mod memory;
mod traits;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use traits::CredentialStore;

/// File name of the credential store inside the data directory
pub const USERS_FILE: &str = "users.json";
