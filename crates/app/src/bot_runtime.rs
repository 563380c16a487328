//! Bot runtime - polls Telegram and dispatches messages
//!
//! Each poll batch is grouped by user. Users are served concurrently, one
//! task each, while a single user's messages are handled in arrival order.
//! The next poll starts only once the whole batch has been answered, so a
//! slow school API call for one user also delays every other user's next
//! messages. This is intended: there is no per-batch deadline.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use timetable_core::{ConversationController, UserId};
use timetable_net::{next_offset, InboundMessage, TelegramTransport, Update};
use tokio::task::JoinSet;

/// Pause after a failed poll before trying again
pub const POLL_BACKOFF: Duration = Duration::from_secs(5);

pub struct BotRuntime {
    telegram: Arc<TelegramTransport>,
    controller: Arc<ConversationController>,
    offset: i64,
}

impl BotRuntime {
    pub fn new(telegram: Arc<TelegramTransport>, controller: Arc<ConversationController>) -> Self {
        Self {
            telegram,
            controller,
            offset: 0,
        }
    }

    /// Poll forever
    pub async fn run(&mut self) {
        tracing::info!("Listening for Telegram messages");
        loop {
            if let Err(e) = self.poll_once().await {
                tracing::warn!(error = %e, "Telegram poll failed, backing off");
                tokio::time::sleep(POLL_BACKOFF).await;
            }
        }
    }

    /// One `getUpdates` round trip plus dispatch; returns the number of
    /// messages handled
    pub async fn poll_once(&mut self) -> timetable_net::Result<usize> {
        let updates = self.telegram.get_updates(self.offset).await?;
        self.offset = next_offset(self.offset, &updates);
        Ok(self.dispatch(updates).await)
    }

    async fn dispatch(&self, updates: Vec<Update>) -> usize {
        let batches = group_by_user(updates.into_iter().filter_map(Update::into_inbound));
        let handled: usize = batches.iter().map(|(_, msgs)| msgs.len()).sum();

        let mut tasks = JoinSet::new();
        for (user_id, messages) in batches {
            let telegram = self.telegram.clone();
            let controller = self.controller.clone();
            tasks.spawn(async move {
                for inbound in messages {
                    let replies = controller.handle(&inbound.message).await;
                    for reply in &replies {
                        if let Err(e) = telegram.send_reply(inbound.chat_id, reply).await {
                            tracing::error!(
                                user_id = %user_id,
                                chat_id = inbound.chat_id,
                                error = %e,
                                "Failed to send reply"
                            );
                        }
                    }
                }
            });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Message handler task failed");
            }
        }

        handled
    }
}

/// Group messages per user, keeping first-seen user order and per-user
/// message order
fn group_by_user(
    messages: impl IntoIterator<Item = InboundMessage>,
) -> Vec<(UserId, Vec<InboundMessage>)> {
    let mut index: HashMap<UserId, usize> = HashMap::new();
    let mut batches: Vec<(UserId, Vec<InboundMessage>)> = Vec::new();
    for inbound in messages {
        let user_id = inbound.message.user_id;
        match index.get(&user_id) {
            Some(&i) => batches[i].1.push(inbound),
            None => {
                index.insert(user_id, batches.len());
                batches.push((user_id, vec![inbound]));
            }
        }
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::json;
    use timetable_core::conversation::{ENTER_LOGIN, GREETING};
    use timetable_core::{
        ApiError, Authenticator, FixedClock, IncomingMessage, MemoryStore, ScheduleApi,
        ScheduleEntry,
    };
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct NoAuth;

    #[async_trait]
    impl Authenticator for NoAuth {
        async fn authenticate(&self, _: &str, _: &str, _: &str) -> Option<String> {
            None
        }
    }

    struct NoSchedule;

    #[async_trait]
    impl ScheduleApi for NoSchedule {
        async fn get_schedule(
            &self,
            _: NaiveDate,
            _: &str,
        ) -> Result<Vec<ScheduleEntry>, ApiError> {
            Ok(Vec::new())
        }
    }

    fn runtime_for(server: &MockServer) -> BotRuntime {
        let telegram = Arc::new(
            TelegramTransport::new("123:ABC")
                .with_api_base(server.uri())
                .with_poll_timeout(0),
        );
        let controller = Arc::new(ConversationController::new(
            Arc::new(MemoryStore::new()),
            Arc::new(NoAuth),
            Arc::new(NoSchedule),
            Arc::new(FixedClock(NaiveDate::from_ymd_opt(2024, 1, 17).unwrap())),
            "app-key",
        ));
        BotRuntime::new(telegram, controller)
    }

    fn text_update(update_id: i64, user_id: i64, chat_type: &str, text: &str) -> serde_json::Value {
        json!({
            "update_id": update_id,
            "message": {
                "message_id": update_id,
                "from": { "id": user_id, "first_name": "U" },
                "chat": { "id": user_id, "type": chat_type },
                "text": text
            }
        })
    }

    fn inbound(user_id: i64, text: &str) -> InboundMessage {
        InboundMessage {
            chat_id: user_id,
            message: IncomingMessage {
                chat_is_private: true,
                user_id: UserId(user_id),
                username: None,
                text: text.to_string(),
            },
        }
    }

    #[test]
    fn test_group_by_user_keeps_order() {
        let batches = group_by_user(vec![
            inbound(1, "a"),
            inbound(2, "b"),
            inbound(1, "c"),
            inbound(3, "d"),
            inbound(2, "e"),
        ]);

        let users: Vec<i64> = batches.iter().map(|(u, _)| u.0).collect();
        assert_eq!(users, vec![1, 2, 3]);
        let first: Vec<&str> = batches[0].1.iter().map(|m| m.message.text.as_str()).collect();
        assert_eq!(first, vec!["a", "c"]);
        let second: Vec<&str> = batches[1].1.iter().map(|m| m.message.text.as_str()).collect();
        assert_eq!(second, vec!["b", "e"]);
    }

    #[tokio::test]
    async fn test_poll_answers_private_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [
                    text_update(100, 42, "private", "/start"),
                    text_update(101, 42, "private", "Войти"),
                    text_update(102, 7, "group", "/start")
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .and(body_partial_json(json!({ "chat_id": 42, "text": GREETING })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": {} })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .and(body_partial_json(json!({ "chat_id": 42, "text": ENTER_LOGIN })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": {} })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .and(body_partial_json(json!({ "chat_id": 7 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": {} })))
            .expect(0)
            .mount(&server)
            .await;

        let mut runtime = runtime_for(&server);
        let handled = runtime.poll_once().await.unwrap();
        assert_eq!(handled, 3);
        assert_eq!(runtime.offset, 103);
    }

    #[tokio::test]
    async fn test_undecodable_update_is_acknowledged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [
                    text_update(200, 42, "private", "/start"),
                    { "update_id": 201, "message": { "message_id": 5, "text": "no chat" } }
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .and(body_partial_json(json!({ "chat_id": 42, "text": GREETING })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": {} })))
            .expect(1)
            .mount(&server)
            .await;

        let mut runtime = runtime_for(&server);
        let handled = runtime.poll_once().await.unwrap();
        assert_eq!(handled, 1);
        assert_eq!(runtime.offset, 202);
    }

    #[tokio::test]
    async fn test_poll_error_keeps_offset() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/getUpdates"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let mut runtime = runtime_for(&server);
        assert!(runtime.poll_once().await.is_err());
        assert_eq!(runtime.offset, 0);
    }
}
