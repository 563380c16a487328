//! School API client
//!
//! Token login (`POST` JSON credentials) and per-date schedule lookup
//! (`GET` with a bearer token). Both calls carry the browser-like headers the
//! API expects.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{ACCEPT, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT};
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use timetable_core::calendar::format_date;
use timetable_core::{ApiError, Authenticator, ScheduleApi, ScheduleEntry};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

/// Placeholder replaced by the ISO date in the schedule URL template
pub const DATE_PLACEHOLDER: &str = "{date}";

pub const DEFAULT_AUTH_URL: &str = "https://msapi.top-academy.ru/api/v2/auth/login";
pub const DEFAULT_SCHEDULE_URL: &str =
    "https://msapi.top-academy.ru/api/v2/schedule/operations/get-by-date?date_filter={date}";
pub const DEFAULT_ORIGIN: &str = "https://journal.top-academy.ru";
pub const DEFAULT_REFERER: &str = "https://journal.top-academy.ru/";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Endpoint URLs and request headers of the school API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchoolEndpoints {
    pub auth_url: String,
    /// Must contain `{date}`
    pub schedule_url: String,
    pub user_agent: String,
    pub origin: String,
    pub referer: String,
}

impl Default for SchoolEndpoints {
    fn default() -> Self {
        Self {
            auth_url: DEFAULT_AUTH_URL.to_string(),
            schedule_url: DEFAULT_SCHEDULE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            origin: DEFAULT_ORIGIN.to_string(),
            referer: DEFAULT_REFERER.to_string(),
        }
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    application_key: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// HTTP client for the school API
pub struct SchoolClient {
    http: reqwest::Client,
    endpoints: SchoolEndpoints,
}

impl SchoolClient {
    pub fn new(endpoints: SchoolEndpoints) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoints,
        }
    }

    fn schedule_url(&self, date: NaiveDate) -> String {
        self.endpoints
            .schedule_url
            .replace(DATE_PLACEHOLDER, &format_date(date))
    }

    fn with_headers(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(USER_AGENT, &self.endpoints.user_agent)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .header(ORIGIN, &self.endpoints.origin)
            .header(REFERER, &self.endpoints.referer)
    }

    /// `Ok(None)` when the login succeeded but carried no token
    pub async fn request_token(
        &self,
        login: &str,
        password: &str,
        app_key: &str,
    ) -> Result<Option<String>> {
        debug!(login = %login, "Requesting session token");
        let body = LoginRequest {
            username: login,
            password,
            application_key: app_key,
        };
        let response = self
            .with_headers(self.http.post(&self.endpoints.auth_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if status != StatusCode::OK {
            error!(status = %status, body = %text, "Login rejected by server");
            return Err(Error::Status(status.as_u16()));
        }

        let parsed: LoginResponse = serde_json::from_str(&text)?;
        Ok(parsed.access_token.filter(|t| !t.is_empty()))
    }

    /// Raw entries for one date
    pub async fn request_schedule(
        &self,
        date: NaiveDate,
        token: &str,
    ) -> Result<Vec<ScheduleEntry>> {
        let response = self
            .with_headers(self.http.get(self.schedule_url(date)))
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status(status.as_u16()));
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl Authenticator for SchoolClient {
    async fn authenticate(&self, login: &str, password: &str, app_key: &str) -> Option<String> {
        match self.request_token(login, password, app_key).await {
            Ok(Some(token)) => {
                info!("Authentication succeeded");
                Some(token)
            }
            Ok(None) => {
                warn!("Login response carried no access_token");
                None
            }
            Err(e) => {
                error!(error = %e, "Authentication failed");
                None
            }
        }
    }
}

#[async_trait]
impl ScheduleApi for SchoolClient {
    async fn get_schedule(
        &self,
        date: NaiveDate,
        token: &str,
    ) -> std::result::Result<Vec<ScheduleEntry>, ApiError> {
        self.request_schedule(date, token)
            .await
            .map_err(ApiError::from)
    }
}
