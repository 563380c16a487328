//! Bot configuration
//!
//! Read from a TOML file, with the two secrets overridable from the
//! environment. Every field except the secrets has a default.

use std::path::PathBuf;

use chrono_tz::Tz;
use directories::ProjectDirs;
use serde::Deserialize;
use timetable_core::calendar::DEFAULT_TIMEZONE;
use timetable_net::school::{
    DEFAULT_AUTH_URL, DEFAULT_ORIGIN, DEFAULT_REFERER, DEFAULT_SCHEDULE_URL, DEFAULT_USER_AGENT,
};
use timetable_net::telegram::{DEFAULT_API_BASE, DEFAULT_POLL_TIMEOUT_SECS};
use timetable_net::SchoolEndpoints;

pub const CONFIG_PATH_ENV: &str = "TIMETABLE_CONFIG";
pub const BOT_TOKEN_ENV: &str = "TIMETABLE_BOT_TOKEN";
pub const APPLICATION_KEY_ENV: &str = "TIMETABLE_APPLICATION_KEY";
pub const CONFIG_FILE: &str = "timetable.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),

    #[error("Could not determine data directory")]
    NoDataDir,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    bot_token: Option<String>,
    application_key: Option<String>,
    timezone: Option<String>,
    data_dir: Option<PathBuf>,
    school: RawSchool,
    telegram: RawTelegram,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSchool {
    auth_url: Option<String>,
    schedule_url: Option<String>,
    user_agent: Option<String>,
    origin: Option<String>,
    referer: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTelegram {
    api_base: Option<String>,
    poll_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramSettings {
    pub api_base: String,
    pub poll_timeout_secs: u64,
}

/// Values taken from the environment, applied over the file
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    pub bot_token: Option<String>,
    pub application_key: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            bot_token: non_empty_var(BOT_TOKEN_ENV),
            application_key: non_empty_var(APPLICATION_KEY_ENV),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub application_key: String,
    pub timezone: Tz,
    pub data_dir: PathBuf,
    pub school: SchoolEndpoints,
    pub telegram: TelegramSettings,
}

impl Config {
    /// Load from `TIMETABLE_CONFIG` or the per-user config file, then apply
    /// environment overrides. A missing file means all defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let dirs = ProjectDirs::from("dev", "onyx", "timetable");
        let path = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(p) => Some(PathBuf::from(p)),
            None => dirs.as_ref().map(|d| d.config_dir().join(CONFIG_FILE)),
        };

        let text = match path.as_deref() {
            Some(p) if p.exists() => std::fs::read_to_string(p)?,
            _ => String::new(),
        };

        let default_data_dir = dirs.map(|d| d.data_dir().to_path_buf());
        Self::parse(&text, EnvOverrides::from_env(), default_data_dir)
    }

    pub fn parse(
        text: &str,
        env: EnvOverrides,
        default_data_dir: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text)?;

        let bot_token = env
            .bot_token
            .or(raw.bot_token)
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::Missing("bot_token"))?;
        let application_key = env
            .application_key
            .or(raw.application_key)
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::Missing("application_key"))?;

        let timezone = match raw.timezone {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| ConfigError::InvalidTimezone(name))?,
            None => DEFAULT_TIMEZONE,
        };

        let data_dir = raw
            .data_dir
            .or(default_data_dir)
            .ok_or(ConfigError::NoDataDir)?;

        let school = SchoolEndpoints {
            auth_url: raw.school.auth_url.unwrap_or_else(|| DEFAULT_AUTH_URL.into()),
            schedule_url: raw
                .school
                .schedule_url
                .unwrap_or_else(|| DEFAULT_SCHEDULE_URL.into()),
            user_agent: raw
                .school
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.into()),
            origin: raw.school.origin.unwrap_or_else(|| DEFAULT_ORIGIN.into()),
            referer: raw.school.referer.unwrap_or_else(|| DEFAULT_REFERER.into()),
        };

        let telegram = TelegramSettings {
            api_base: raw
                .telegram
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.into()),
            poll_timeout_secs: raw
                .telegram
                .poll_timeout_secs
                .unwrap_or(DEFAULT_POLL_TIMEOUT_SECS),
        };

        Ok(Self {
            bot_token,
            application_key,
            timezone,
            data_dir,
            school,
            telegram,
        })
    }
}
