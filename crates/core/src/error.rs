//! Error types for Timetable Core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Authentication failed")]
    AuthFailed,

    #[error("No session token stored for this user")]
    AuthRequired,

    #[error("Session expired, re-authentication required")]
    SessionExpired,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed date: {0}")]
    MalformedDate(String),

    #[error("Credential store is corrupt: {0}")]
    CorruptStore(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
