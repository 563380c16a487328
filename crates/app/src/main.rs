//! Timetable - Telegram schedule bot
//!
//! Logs students in against the school API and answers schedule requests
//! over a long-polling Telegram connection.

use std::time::Instant;

use timetable_core::calendar::DEFAULT_TIMEZONE;

mod bot_runtime;
mod config;
mod logging;
mod state;

#[tokio::main]
async fn main() {
    let started = Instant::now();

    let config = config::Config::load();
    logging::init(
        config
            .as_ref()
            .map(|c| c.timezone)
            .unwrap_or(DEFAULT_TIMEZONE),
    );

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(
        data_dir = %config.data_dir.display(),
        timezone = %config.timezone,
        "Starting timetable bot"
    );

    let app_state = match state::AppState::new(config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    match app_state.telegram.get_me().await {
        Ok(name) => tracing::info!(bot = ?name, "Connected to Telegram"),
        Err(timetable_net::Error::Telegram(reason)) => {
            tracing::error!("Telegram rejected the bot token: {}", reason);
            std::process::exit(1);
        }
        Err(e) => tracing::warn!(error = %e, "Telegram not reachable yet, polling anyway"),
    }

    tracing::info!(
        store = %app_state.store.path().display(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Bot started"
    );

    let mut runtime =
        bot_runtime::BotRuntime::new(app_state.telegram.clone(), app_state.controller.clone());

    tokio::select! {
        _ = runtime.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }
}
