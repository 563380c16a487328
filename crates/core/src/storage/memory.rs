//! In-memory credential store (tests, ephemeral runs)

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::traits::CredentialStore;
use crate::error::Result;
use crate::models::{placeholder_name, UserId, UserRecord};

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<UserId, UserRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<UserId, UserRecord>> {
        match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn get_token(&self, user_id: UserId) -> Option<String> {
        self.records()
            .get(&user_id)
            .and_then(|r| r.active_token().map(str::to_string))
    }

    fn save_token(&self, user_id: UserId, display_name: &str, token: &str) -> Result<()> {
        self.records()
            .insert(user_id, UserRecord::new(display_name, token));
        Ok(())
    }

    fn clear_token(&self, user_id: UserId) -> Result<()> {
        if let Some(record) = self.records().get_mut(&user_id) {
            record.token = Some(String::new());
        }
        Ok(())
    }

    fn get_display_name(&self, user_id: UserId) -> String {
        self.records()
            .get(&user_id)
            .map(|r| r.display_name.clone())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| placeholder_name(user_id))
    }
}
