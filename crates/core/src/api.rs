//! Remote school API seams
//!
//! The core never performs HTTP itself. `timetable-net` implements these
//! traits over reqwest; tests plug in fakes.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::ScheduleEntry;

/// Exchanges credentials for a session token
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// `None` on any failure: bad credentials, bad status, malformed body or
    /// network error. Implementations must not panic or propagate errors.
    async fn authenticate(&self, login: &str, password: &str, app_key: &str) -> Option<String>;
}

/// Failure of the raw schedule call
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Session token rejected")]
    Unauthorized,

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Raw schedule request for one date
#[async_trait]
pub trait ScheduleApi: Send + Sync {
    async fn get_schedule(
        &self,
        date: NaiveDate,
        token: &str,
    ) -> Result<Vec<ScheduleEntry>, ApiError>;
}
