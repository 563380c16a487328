//! Timetable Network Library
//!
//! HTTP plumbing for the Timetable bot.
//!
//! # Architecture
//!
//! - **School**: token login and per-date schedule lookup against the school API
//! - **Telegram**: long-polling Bot API transport
//!
//! # Usage
//!
//! ```ignore
//! let school = Arc::new(SchoolClient::new(SchoolEndpoints::default()));
//! let telegram = TelegramTransport::new(bot_token);
//!
//! let mut offset = 0;
//! loop {
//!     let updates = telegram.get_updates(offset).await?;
//!     offset = next_offset(offset, &updates);
//!     for inbound in updates.into_iter().filter_map(Update::into_inbound) {
//!         /* hand to the conversation controller */
//!     }
//! }
//! ```

pub mod error;
pub mod school;
pub mod telegram;

pub use error::{Error, Result};
pub use school::{SchoolClient, SchoolEndpoints};
pub use telegram::{next_offset, InboundMessage, TelegramTransport, Update};
