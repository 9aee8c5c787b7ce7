//! Tracing subscriber setup
//!
//! `RUST_LOG` wins when set; otherwise `locator=<level>,info`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogArgs, LogFormat};

pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("locator={},info", level)))
}

/// Install the global subscriber; call once, first thing in `main`
pub fn init(args: &LogArgs) {
    let registry = tracing_subscriber::registry().with(env_filter(&args.log_level));
    match args.log_format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init(),
    }
}
