//! Schedule fetcher
//!
//! Looks up the caller's token, issues the raw request and turns a rejected
//! token into `SessionExpired` after clearing it from the store. It never
//! talks to the chat transport; the controller owns every reply.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{error, info, instrument, warn};

use crate::api::{ApiError, ScheduleApi};
use crate::calendar::work_week;
use crate::error::{Error, Result};
use crate::models::{ScheduleDay, ScheduleEntry, UserId};
use crate::storage::CredentialStore;

pub struct ScheduleFetcher {
    api: Arc<dyn ScheduleApi>,
    store: Arc<dyn CredentialStore>,
}

impl ScheduleFetcher {
    pub fn new(api: Arc<dyn ScheduleApi>, store: Arc<dyn CredentialStore>) -> Self {
        Self { api, store }
    }

    /// Raw entries for `date`, exactly as the API returned them
    #[instrument(skip_all, fields(user_id = %user_id, date = %date))]
    pub async fn fetch(&self, date: NaiveDate, user_id: UserId) -> Result<Vec<ScheduleEntry>> {
        let username = self.store.get_display_name(user_id);
        let Some(token) = self.store.get_token(user_id) else {
            error!(username = %username, "No token stored");
            return Err(Error::AuthRequired);
        };

        match self.api.get_schedule(date, &token).await {
            Ok(entries) => {
                info!(username = %username, count = entries.len(), "Schedule fetched");
                Ok(entries)
            }
            Err(ApiError::Unauthorized) => {
                warn!(username = %username, "Token rejected, clearing it");
                if let Err(e) = self.store.clear_token(user_id) {
                    error!(error = %e, "Failed to clear rejected token");
                }
                Err(Error::SessionExpired)
            }
            Err(ApiError::Transport(reason)) => {
                error!(username = %username, reason = %reason, "Schedule request failed");
                Err(Error::Transport(reason))
            }
        }
    }

    pub async fn fetch_day(&self, date: NaiveDate, user_id: UserId) -> Result<ScheduleDay> {
        let entries = self.fetch(date, user_id).await?;
        Ok(ScheduleDay { date, entries })
    }

    /// Monday..Friday from `monday`; the first failing day aborts the week
    pub async fn fetch_week(&self, monday: NaiveDate, user_id: UserId) -> Result<Vec<ScheduleDay>> {
        let mut days = Vec::with_capacity(5);
        for date in work_week(monday) {
            days.push(self.fetch_day(date, user_id).await?);
        }
        Ok(days)
    }
}
