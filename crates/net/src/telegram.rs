//! Telegram Bot API transport
//!
//! Long-polls `getUpdates` and posts `sendMessage`. Updates are decoded into
//! typed structs and handed to the caller as transport-neutral
//! [`IncomingMessage`]s tagged with the chat to answer in.

use serde::Deserialize;
use serde_json::json;
use timetable_core::{IncomingMessage, Menu, Reply, UserId};
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

/// Bot API limit on a single message body, in UTF-16 code units
pub const MAX_MESSAGE_LEN: usize = 4096;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, method: &str) -> Result<Option<T>> {
        if self.ok {
            Ok(self.result)
        } else {
            Err(Error::Telegram(format!(
                "{method}: {}",
                self.description.unwrap_or_else(|| "no description".into())
            )))
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TgMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgMessage {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<TgUser>,
    pub chat: TgChat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

/// A text message ready for the conversation controller
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub message: IncomingMessage,
}

impl Update {
    /// `None` for anything that is not a text message from a user
    pub fn into_inbound(self) -> Option<InboundMessage> {
        let message = self.message?;
        let text = message.text?;
        let from = message.from?;
        Some(InboundMessage {
            chat_id: message.chat.id,
            message: IncomingMessage {
                chat_is_private: message.chat.kind == "private",
                user_id: UserId(from.id),
                username: from.username,
                text,
            },
        })
    }
}

/// Decode one update. An update that does not fit the typed model keeps its
/// `update_id` with no message, so the offset still moves past it.
fn decode_update(value: serde_json::Value) -> Option<Update> {
    let update_id = value.get("update_id").and_then(serde_json::Value::as_i64);
    match serde_json::from_value::<Update>(value) {
        Ok(update) => Some(update),
        Err(e) => match update_id {
            Some(update_id) => {
                warn!(update_id, error = %e, "Skipping undecodable update");
                Some(Update {
                    update_id,
                    message: None,
                })
            }
            None => {
                warn!(error = %e, "Dropping update without update_id");
                None
            }
        },
    }
}

/// Offset acknowledging every update in `updates`
pub fn next_offset(current: i64, updates: &[Update]) -> i64 {
    updates
        .iter()
        .map(|u| u.update_id + 1)
        .fold(current, i64::max)
}

fn reply_markup(menu: Menu) -> serde_json::Value {
    let keyboard: Vec<Vec<serde_json::Value>> = menu
        .rows()
        .into_iter()
        .map(|row| row.into_iter().map(|label| json!({ "text": label })).collect())
        .collect();
    json!({ "keyboard": keyboard, "resize_keyboard": true })
}

fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

/// Split on blank lines so no chunk exceeds `limit` UTF-16 code units, the
/// unit Telegram measures message length in. A single paragraph longer than
/// `limit` is cut between characters, never inside a surrogate pair.
pub fn split_text(text: &str, limit: usize) -> Vec<String> {
    if utf16_len(text) <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for paragraph in text.split("\n\n") {
        let paragraph_len = utf16_len(paragraph);
        let needed = if current.is_empty() {
            paragraph_len
        } else {
            current_len + 2 + paragraph_len
        };
        if needed <= limit {
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(paragraph);
            current_len = needed;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        for ch in paragraph.chars() {
            let width = ch.len_utf16();
            if current_len + width > limit && !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            current.push(ch);
            current_len += width;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Bot API client
pub struct TelegramTransport {
    bot_token: String,
    api_base: String,
    poll_timeout_secs: u64,
    client: reqwest::Client,
}

impl TelegramTransport {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_timeout(mut self, secs: u64) -> Self {
        self.poll_timeout_secs = secs;
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.bot_token)
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<Option<T>> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await?;
        let text = response.text().await?;
        let parsed: ApiResponse<T> = serde_json::from_str(&text)?;
        parsed.into_result(method)
    }

    /// Long-poll for message updates starting at `offset`
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let body = json!({
            "offset": offset,
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message"]
        });
        let raw: Vec<serde_json::Value> =
            self.call("getUpdates", &body).await?.unwrap_or_default();
        let updates: Vec<Update> = raw.into_iter().filter_map(decode_update).collect();
        if !updates.is_empty() {
            debug!(count = updates.len(), offset, "Received updates");
        }
        Ok(updates)
    }

    /// Send one reply, attaching its keyboard to the last chunk
    pub async fn send_reply(&self, chat_id: i64, reply: &Reply) -> Result<()> {
        let chunks = split_text(&reply.text, MAX_MESSAGE_LEN);
        if chunks.len() > 1 {
            warn!(chat_id, parts = chunks.len(), "Reply too long, splitting");
        }
        let last = chunks.len().saturating_sub(1);
        for (i, chunk) in chunks.iter().enumerate() {
            let mut body = json!({ "chat_id": chat_id, "text": chunk });
            if i == last {
                if let Some(menu) = reply.menu {
                    body["reply_markup"] = reply_markup(menu);
                }
            }
            self.call::<serde_json::Value>("sendMessage", &body).await?;
        }
        Ok(())
    }

    /// Bot username reported by `getMe`
    pub async fn get_me(&self) -> Result<Option<String>> {
        #[derive(Deserialize)]
        struct Me {
            #[serde(default)]
            username: Option<String>,
        }
        let me: Option<Me> = self.call("getMe", &json!({})).await?;
        Ok(me.and_then(|m| m.username))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport_for(server: &MockServer) -> TelegramTransport {
        TelegramTransport::new("123:ABC")
            .with_api_base(server.uri())
            .with_poll_timeout(0)
    }

    fn update(json: serde_json::Value) -> Update {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_api_url() {
        let t = TelegramTransport::new("123:ABC");
        assert_eq!(
            t.api_url("getUpdates"),
            "https://api.telegram.org/bot123:ABC/getUpdates"
        );
        let t = t.with_api_base("http://localhost:8081/");
        assert_eq!(t.api_url("sendMessage"), "http://localhost:8081/bot123:ABC/sendMessage");
    }

    #[test]
    fn test_private_text_message_converts() {
        let inbound = update(json!({
            "update_id": 10,
            "message": {
                "message_id": 1,
                "from": { "id": 42, "is_bot": false, "first_name": "A", "username": "alice" },
                "chat": { "id": 42, "type": "private" },
                "text": "Сегодня"
            }
        }))
        .into_inbound()
        .unwrap();

        assert_eq!(inbound.chat_id, 42);
        assert!(inbound.message.chat_is_private);
        assert_eq!(inbound.message.user_id, UserId(42));
        assert_eq!(inbound.message.username.as_deref(), Some("alice"));
        assert_eq!(inbound.message.text, "Сегодня");
    }

    #[test]
    fn test_group_message_is_not_private() {
        let inbound = update(json!({
            "update_id": 11,
            "message": {
                "message_id": 2,
                "from": { "id": 42, "first_name": "A" },
                "chat": { "id": -100, "type": "supergroup", "title": "Group" },
                "text": "/start"
            }
        }))
        .into_inbound()
        .unwrap();

        assert!(!inbound.message.chat_is_private);
        assert_eq!(inbound.message.username, None);
    }

    #[test]
    fn test_non_text_updates_are_skipped() {
        let sticker = update(json!({
            "update_id": 12,
            "message": {
                "message_id": 3,
                "from": { "id": 42, "first_name": "A" },
                "chat": { "id": 42, "type": "private" },
                "sticker": { "file_id": "x" }
            }
        }));
        assert!(sticker.into_inbound().is_none());

        let edited = update(json!({ "update_id": 13, "edited_message": {} }));
        assert!(edited.into_inbound().is_none());
    }

    #[test]
    fn test_next_offset() {
        let updates = vec![
            update(json!({ "update_id": 7 })),
            update(json!({ "update_id": 9 })),
        ];
        assert_eq!(next_offset(0, &updates), 10);
        assert_eq!(next_offset(5, &[]), 5);
    }

    #[test]
    fn test_reply_markup_layout() {
        let markup = reply_markup(Menu::LoginOnly);
        assert_eq!(markup["keyboard"][0][0]["text"], "Войти");
        assert_eq!(markup["resize_keyboard"], true);

        let markup = reply_markup(Menu::AuthenticatedMenu);
        assert_eq!(markup["keyboard"].as_array().unwrap().len(), 4);
        assert_eq!(markup["keyboard"][0].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_split_text() {
        assert_eq!(split_text("short", 10), vec!["short".to_string()]);

        let text = "aaaa\n\nbbbb\n\ncccc";
        assert_eq!(split_text(text, 10), vec!["aaaa\n\nbbbb", "cccc"]);

        let long = "x".repeat(25);
        let parts = split_text(&long, 10);
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.chars().count() <= 10));
        assert_eq!(parts.concat(), long);
    }

    #[test]
    fn test_split_text_counts_utf16_units() {
        // Each emoji is a surrogate pair: two UTF-16 units, one char
        let emoji = "😀".repeat(15);
        let parts = split_text(&emoji, 10);
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| utf16_len(p) <= 10));
        assert!(parts.iter().all(|p| p.chars().count() == 5));
        assert_eq!(parts.concat(), emoji);

        let odd = split_text(&"😀".repeat(3), 3);
        assert_eq!(odd, vec!["😀".to_string(), "😀".to_string(), "😀".to_string()]);
    }

    #[test]
    fn test_split_emoji_heavy_week_reply() {
        use timetable_core::calendar::work_week;
        use timetable_core::format::format_week;
        use timetable_core::{ScheduleDay, ScheduleEntry};

        let monday = chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let days: Vec<ScheduleDay> = work_week(monday)
            .into_iter()
            .map(|date| ScheduleDay {
                date,
                entries: (0..8)
                    .map(|_| {
                        ScheduleEntry::new(
                            "08:30",
                            "10:00",
                            "Разработка веб-приложений на Rust",
                            "Аудитория 301",
                            "Иванов Иван Иванович",
                        )
                    })
                    .collect(),
            })
            .collect();
        let reply = format_week(&days);
        assert!(reply.chars().count() <= MAX_MESSAGE_LEN);
        assert!(utf16_len(&reply) > MAX_MESSAGE_LEN);

        let parts = split_text(&reply, MAX_MESSAGE_LEN);
        assert!(parts.len() > 1);
        assert!(parts.iter().all(|p| utf16_len(p) <= MAX_MESSAGE_LEN));
    }

    #[tokio::test]
    async fn test_get_updates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/getUpdates"))
            .and(body_partial_json(json!({ "offset": 5, "allowed_updates": ["message"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [{
                    "update_id": 5,
                    "message": {
                        "message_id": 1,
                        "from": { "id": 42, "first_name": "A" },
                        "chat": { "id": 42, "type": "private" },
                        "text": "hi"
                    }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let updates = transport_for(&server).get_updates(5).await.unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].update_id, 5);
    }

    #[tokio::test]
    async fn test_undecodable_update_keeps_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [
                    {
                        "update_id": 20,
                        "message": {
                            "message_id": 1,
                            "from": { "id": 42, "first_name": "A" },
                            "chat": { "id": 42, "type": "private" },
                            "text": "hi"
                        }
                    },
                    { "update_id": 21, "message": { "message_id": "not-a-number" } },
                    { "no_update_id": true }
                ]
            })))
            .mount(&server)
            .await;

        let updates = transport_for(&server).get_updates(20).await.unwrap();
        assert_eq!(updates.len(), 2);
        assert!(updates[0].message.is_some());
        assert_eq!(updates[1].update_id, 21);
        assert!(updates[1].message.is_none());
        assert_eq!(next_offset(20, &updates), 22);
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "ok": false,
                "error_code": 401,
                "description": "Unauthorized"
            })))
            .mount(&server)
            .await;

        let result = transport_for(&server).get_updates(0).await;
        assert!(matches!(result, Err(Error::Telegram(d)) if d.contains("Unauthorized")));
    }

    #[tokio::test]
    async fn test_send_reply_with_keyboard() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .and(body_partial_json(json!({
                "chat_id": 42,
                "text": "Выберите действие:",
                "reply_markup": { "resize_keyboard": true }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": { "message_id": 100 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = Reply::with_menu("Выберите действие:", Menu::AuthenticatedMenu);
        transport_for(&server).send_reply(42, &reply).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_me() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/getMe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": { "id": 1, "is_bot": true, "username": "timetable_bot" }
            })))
            .mount(&server)
            .await;

        let name = transport_for(&server).get_me().await.unwrap();
        assert_eq!(name.as_deref(), Some("timetable_bot"));
    }
}
