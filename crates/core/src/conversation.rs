//! Conversation controller
//!
//! Explicit per-user state machine deciding, for every inbound message,
//! which replies to produce. Persistent state (the token) lives in the
//! credential store; the only in-memory state is the login step.
//!
//! States:
//! - `Anonymous`: no usable token, no login in progress
//! - `AwaitingLogin`: "Войти" pressed, next text is the login
//! - `AwaitingPassword`: login stored, next text is the password
//! - `Authenticated`: a non-empty token is stored
//!
//! A login attempt always ends in `Anonymous` or `Authenticated`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use tracing::{debug, error, info, instrument, warn};

use crate::api::{Authenticator, ScheduleApi};
use crate::calendar::{next_week_start, parse_date, tomorrow, week_start, Clock};
use crate::error::Error;
use crate::fetcher::ScheduleFetcher;
use crate::format::{format_day_reply, format_week};
use crate::models::{placeholder_name, LoginSession, UserId};
use crate::storage::CredentialStore;

pub const CMD_START: &str = "/start";
pub const BTN_LOGIN: &str = "Войти";
pub const BTN_TODAY: &str = "Сегодня";
pub const BTN_TOMORROW: &str = "Завтра";
pub const BTN_WEEK: &str = "Расписание на неделю";
pub const BTN_NEXT_WEEK: &str = "Расписание на следующую неделю";
pub const BTN_PICK_DATE: &str = "Выбрать дату";

pub const GREETING: &str =
    "Привет! Я бот расписания для IT TOP Ryazan. Нажмите 'Войти' для авторизации.";
pub const WELCOME_BACK: &str = "Добро пожаловать! Вы уже авторизованы.\n\nВыберите действие:";
pub const ENTER_LOGIN: &str = "Введите ваш логин:";
pub const ENTER_PASSWORD: &str = "Введите ваш пароль:";
pub const LOGIN_SUCCESS: &str = "Авторизация успешна! Теперь вы можете запрашивать расписание.";
pub const CHOOSE_ACTION: &str = "Выберите действие:";
pub const LOGIN_FAILED: &str = "Ошибка авторизации. Попробуйте снова.";
pub const LOGIN_NOT_SAVED: &str = "Не удалось сохранить авторизацию. Попробуйте снова.";
pub const TOKEN_INVALID: &str =
    "Ваш токен недействителен. Пожалуйста, авторизуйтесь заново, используя кнопку 'Войти'.";
pub const ENTER_DATE: &str = "Введите дату в формате YYYY-MM-DD:";
pub const FETCH_FAILED: &str = "Не удалось получить расписание. Повторите попытку позже.";

/// Per-user conversation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Anonymous,
    AwaitingLogin,
    AwaitingPassword,
    Authenticated,
}

/// Quick-reply keyboard attached to a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Menu {
    LoginOnly,
    AuthenticatedMenu,
}

impl Menu {
    /// Button rows, top to bottom
    pub fn rows(self) -> Vec<Vec<&'static str>> {
        match self {
            Menu::LoginOnly => vec![vec![BTN_LOGIN]],
            Menu::AuthenticatedMenu => vec![
                vec![BTN_TODAY, BTN_TOMORROW],
                vec![BTN_WEEK],
                vec![BTN_NEXT_WEEK],
                vec![BTN_PICK_DATE],
            ],
        }
    }
}

/// One outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub menu: Option<Menu>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            menu: None,
        }
    }

    pub fn with_menu(text: impl Into<String>, menu: Menu) -> Self {
        Self {
            text: text.into(),
            menu: Some(menu),
        }
    }
}

/// Transport-neutral inbound message
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat_is_private: bool,
    pub user_id: UserId,
    pub username: Option<String>,
    pub text: String,
}

enum LoginStep {
    LoginEntered,
    PasswordEntered(String),
}

pub struct ConversationController {
    store: Arc<dyn CredentialStore>,
    authenticator: Arc<dyn Authenticator>,
    fetcher: ScheduleFetcher,
    clock: Arc<dyn Clock>,
    app_key: String,
    sessions: Mutex<HashMap<UserId, LoginSession>>,
}

impl ConversationController {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        authenticator: Arc<dyn Authenticator>,
        schedule_api: Arc<dyn ScheduleApi>,
        clock: Arc<dyn Clock>,
        app_key: impl Into<String>,
    ) -> Self {
        Self {
            fetcher: ScheduleFetcher::new(schedule_api, store.clone()),
            store,
            authenticator,
            clock,
            app_key: app_key.into(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<UserId, LoginSession>> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("Login session mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Current state, derived from the login step or the stored token
    pub fn state(&self, user_id: UserId) -> ConversationState {
        if let Some(session) = self.sessions().get(&user_id) {
            return match session.pending_login {
                Some(_) => ConversationState::AwaitingPassword,
                None => ConversationState::AwaitingLogin,
            };
        }
        if self.store.get_token(user_id).is_some() {
            ConversationState::Authenticated
        } else {
            ConversationState::Anonymous
        }
    }

    /// Handle one inbound message. An empty result means "stay silent".
    #[instrument(skip_all, fields(user_id = %msg.user_id))]
    pub async fn handle(&self, msg: &IncomingMessage) -> Vec<Reply> {
        if !msg.chat_is_private {
            debug!("Ignoring message outside a private chat");
            return Vec::new();
        }

        let user_id = msg.user_id;
        if msg.text.trim() == CMD_START {
            self.sessions().remove(&user_id);
            return self.greet(user_id);
        }

        if let Some(step) = self.advance_login(user_id, &msg.text) {
            return match step {
                LoginStep::LoginEntered => {
                    info!(username = ?msg.username, "Login entered");
                    vec![Reply::text(ENTER_PASSWORD)]
                }
                LoginStep::PasswordEntered(login) => {
                    self.finish_login(msg, &login).await
                }
            };
        }

        let text = msg.text.trim();
        if text == BTN_LOGIN {
            debug!("Login started");
            self.sessions().insert(user_id, LoginSession::default());
            return vec![Reply::text(ENTER_LOGIN)];
        }

        if self.store.get_token(user_id).is_none() {
            return vec![Reply::with_menu(TOKEN_INVALID, Menu::LoginOnly)];
        }

        info!(username = ?msg.username, text = %text, "Command received");
        self.handle_command(user_id, text).await
    }

    /// Consume a login-flow message, if the user is mid-login
    fn advance_login(&self, user_id: UserId, text: &str) -> Option<LoginStep> {
        let mut sessions = self.sessions();
        match sessions.remove(&user_id)? {
            LoginSession {
                pending_login: None,
            } => {
                sessions.insert(
                    user_id,
                    LoginSession {
                        pending_login: Some(text.to_string()),
                    },
                );
                Some(LoginStep::LoginEntered)
            }
            LoginSession {
                pending_login: Some(login),
            } => Some(LoginStep::PasswordEntered(login)),
        }
    }

    async fn finish_login(&self, msg: &IncomingMessage, login: &str) -> Vec<Reply> {
        let Some(token) = self
            .authenticator
            .authenticate(login, &msg.text, &self.app_key)
            .await
        else {
            warn!(error = %Error::AuthFailed, "Login rejected");
            return vec![Reply::with_menu(LOGIN_FAILED, Menu::LoginOnly)];
        };

        let display_name = msg
            .username
            .clone()
            .unwrap_or_else(|| placeholder_name(msg.user_id));
        if let Err(e) = self.store.save_token(msg.user_id, &display_name, &token) {
            error!(error = %e, "Failed to persist token");
            return vec![Reply::with_menu(LOGIN_NOT_SAVED, Menu::LoginOnly)];
        }

        info!(username = %display_name, "Login succeeded");
        vec![
            Reply::text(LOGIN_SUCCESS),
            Reply::with_menu(CHOOSE_ACTION, Menu::AuthenticatedMenu),
        ]
    }

    fn greet(&self, user_id: UserId) -> Vec<Reply> {
        if self.store.get_token(user_id).is_some() {
            vec![Reply::with_menu(WELCOME_BACK, Menu::AuthenticatedMenu)]
        } else {
            vec![Reply::with_menu(GREETING, Menu::LoginOnly)]
        }
    }

    async fn handle_command(&self, user_id: UserId, text: &str) -> Vec<Reply> {
        let today = self.clock.today();
        match text {
            BTN_TODAY => self.day_reply(user_id, today).await,
            BTN_TOMORROW => self.day_reply(user_id, tomorrow(today)).await,
            BTN_WEEK => self.week_reply(user_id, week_start(today)).await,
            BTN_NEXT_WEEK => self.week_reply(user_id, next_week_start(today)).await,
            BTN_PICK_DATE => vec![Reply::text(ENTER_DATE)],
            other => match parse_date(other) {
                Ok(date) => self.day_reply(user_id, date).await,
                Err(e) => {
                    debug!(error = %e, "Ignoring unrecognized text");
                    Vec::new()
                }
            },
        }
    }

    async fn day_reply(&self, user_id: UserId, date: NaiveDate) -> Vec<Reply> {
        match self.fetcher.fetch_day(date, user_id).await {
            Ok(day) => vec![Reply::text(format_day_reply(&day))],
            Err(e) => self.fetch_failed(e),
        }
    }

    async fn week_reply(&self, user_id: UserId, monday: NaiveDate) -> Vec<Reply> {
        match self.fetcher.fetch_week(monday, user_id).await {
            Ok(days) => vec![Reply::text(format_week(&days))],
            Err(e) => self.fetch_failed(e),
        }
    }

    fn fetch_failed(&self, error: Error) -> Vec<Reply> {
        match error {
            Error::SessionExpired | Error::AuthRequired => {
                info!(error = %error, "Prompting re-login");
                vec![Reply::with_menu(TOKEN_INVALID, Menu::LoginOnly)]
            }
            other => {
                warn!(error = %other, "Schedule unavailable");
                vec![Reply::text(FETCH_FAILED)]
            }
        }
    }
}
