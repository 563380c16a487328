//! JSON file credential store
//!
//! Layout: one pretty-printed object keyed by stringified user id,
//! `{"123": {"username": "...", "token": "..."}}`. Every mutation is a
//! read-merge-write of the whole file performed under a single mutex, and the
//! new content is written to a sibling temp file that is renamed into place.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, error, info, instrument, warn};

use super::traits::CredentialStore;
use crate::error::{Error, Result};
use crate::models::{placeholder_name, UserId, UserRecord};

type UserMap = BTreeMap<String, UserRecord>;

/// File-backed credential store
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open a store at `path`. The file is created on the first write.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        info!(path = %path.display(), "Opened credential store");
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        match self.write_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("Credential store mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Read the whole mapping; missing or corrupt files read as empty
    fn load(&self) -> UserMap {
        match self.try_load() {
            Ok(map) => map,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Treating credential store as empty");
                UserMap::new()
            }
        }
    }

    fn try_load(&self) -> Result<UserMap> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Credential store not found, starting empty");
                return Ok(UserMap::new());
            }
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(UserMap::new());
        }

        serde_json::from_str(&content).map_err(|e| Error::CorruptStore(e.to_string()))
    }

    fn persist(&self, map: &UserMap) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(map)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn record(&self, user_id: UserId) -> Option<UserRecord> {
        let _guard = self.lock();
        self.load().remove(&user_id.to_string())
    }
}

impl CredentialStore for JsonFileStore {
    fn get_token(&self, user_id: UserId) -> Option<String> {
        self.record(user_id)
            .and_then(|r| r.active_token().map(str::to_string))
    }

    #[instrument(skip_all, fields(user_id = %user_id))]
    fn save_token(&self, user_id: UserId, display_name: &str, token: &str) -> Result<()> {
        let _guard = self.lock();
        let mut map = self.load();
        map.insert(user_id.to_string(), UserRecord::new(display_name, token));
        self.persist(&map)?;
        info!(username = %display_name, "Token saved");
        Ok(())
    }

    #[instrument(skip_all, fields(user_id = %user_id))]
    fn clear_token(&self, user_id: UserId) -> Result<()> {
        let _guard = self.lock();
        let mut map = self.load();
        let Some(record) = map.get_mut(&user_id.to_string()) else {
            warn!("No record to clear");
            return Ok(());
        };
        record.token = Some(String::new());
        let username = record.display_name.clone();
        self.persist(&map)?;
        info!(username = %username, "Token cleared");
        Ok(())
    }

    fn get_display_name(&self, user_id: UserId) -> String {
        self.record(user_id)
            .map(|r| r.display_name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| placeholder_name(user_id))
    }
}
