//! NodeSeek & DeepFlood check-in automation
//!
//! Per account: try the cached session cookie, detect invalidation from the
//! site's heterogeneous response signals, re-authenticate via Turnstile
//! solving plus the sign-in API (or a headless browser fallback), federate a
//! DeepFlood session off the NodeSeek one, and persist everything for the
//! next run.

pub mod auth;
pub mod captcha;
pub mod checkin;
pub mod config;
pub mod federation;
pub mod notify;
pub mod orchestrator;
pub mod qinglong;
pub mod runner;
pub mod session;
pub mod site;
pub mod store;

use std::path::PathBuf;

/// Log directory under the platform config dir
pub fn log_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("nodeseek-checkin").join("logs"))
}

/// Initialize logging: console always, plus a daily-rolling file when a log
/// directory is available. The returned guard must be held for the process
/// lifetime so buffered file output gets flushed.
pub fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false);

    if let Some(log_dir) = log_dir() {
        let _ = std::fs::create_dir_all(&log_dir);
        let file_appender = tracing_appender::rolling::daily(&log_dir, "nodeseek-checkin.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(non_blocking);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();

        None
    }
}
