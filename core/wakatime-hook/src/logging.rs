//! Logging setup for the hook binary.
//!
//! Logs go to a daily-rolling file next to wakatime-cli's own log
//! (`$WAKATIME_HOME` or `~/.wakatime`). stdout stays clean for
//! `print-command`; stderr is used only when the file cannot be opened.

use std::env;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

const FILTER_ENV: &str = "WAKATIME_HOOK_LOG";
const LOG_PREFIX: &str = "wakatime-hook";

/// Installs the global subscriber. Keep the guard alive until exit so
/// buffered lines are written.
pub fn init(debug: bool) -> Option<WorkerGuard> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let appender = log_dir().and_then(|dir| {
        fs_err::create_dir_all(&dir).ok()?;
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_PREFIX)
            .filename_suffix("log")
            .build(&dir)
            .ok()
    });

    match appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .try_init()
                .ok()
                .map(|_| guard)
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init();
            None
        }
    }
}

fn log_dir() -> Option<PathBuf> {
    env::var("WAKATIME_HOME")
        .ok()
        .filter(|home| !home.trim().is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".wakatime")))
}
