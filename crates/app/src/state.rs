//! Application state management

use std::sync::Arc;

use timetable_core::storage::USERS_FILE;
use timetable_core::{ConversationController, JsonFileStore, Result, ZonedClock};
use timetable_net::{SchoolClient, TelegramTransport};

use crate::config::Config;

/// Long-lived services shared by the runtime
pub struct AppState {
    pub store: Arc<JsonFileStore>,
    pub controller: Arc<ConversationController>,
    pub telegram: Arc<TelegramTransport>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let store = Arc::new(JsonFileStore::open(config.data_dir.join(USERS_FILE)));
        let school = Arc::new(SchoolClient::new(config.school.clone()));
        let clock = Arc::new(ZonedClock::new(config.timezone));

        let controller = Arc::new(ConversationController::new(
            store.clone(),
            school.clone(),
            school,
            clock,
            config.application_key.clone(),
        ));

        let telegram = Arc::new(
            TelegramTransport::new(config.bot_token.clone())
                .with_api_base(config.telegram.api_base.clone())
                .with_poll_timeout(config.telegram.poll_timeout_secs),
        );

        Ok(Self {
            store,
            controller,
            telegram,
        })
    }
}
