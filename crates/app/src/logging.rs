//! Tracing subscriber setup

use chrono::Utc;
use chrono_tz::Tz;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,reqwest=warn,hyper=warn";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Log timestamps in the bot's timezone
#[derive(Debug, Clone, Copy)]
pub struct ZonedTimer(pub Tz);

impl FormatTime for ZonedTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", format_timestamp(self.0))
    }
}

fn format_timestamp(tz: Tz) -> String {
    Utc::now().with_timezone(&tz).format(TIMESTAMP_FORMAT).to_string()
}

pub fn init(tz: Tz) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_timer(ZonedTimer(tz)))
        .with(filter)
        .init();
}
