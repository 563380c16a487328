//! Timetable Core Library
//!
//! Conversation state machine, credential storage, schedule fetching and
//! formatting for the Timetable chat bot. Transport- and HTTP-free: the
//! remote school API is reached through the traits in [`api`].

pub mod api;
pub mod calendar;
pub mod conversation;
pub mod error;
pub mod fetcher;
pub mod format;
pub mod models;
pub mod storage;

pub use api::{ApiError, Authenticator, ScheduleApi};
pub use calendar::{Clock, FixedClock, ZonedClock};
pub use conversation::{ConversationController, ConversationState, IncomingMessage, Menu, Reply};
pub use error::{Error, Result};
pub use fetcher::ScheduleFetcher;
pub use models::*;
pub use storage::{CredentialStore, JsonFileStore, MemoryStore};
