//! `watch`: long-running tracking session.
//!
//! One JSON event per stdin line. Malformed lines are logged and skipped.
//! EOF stops the timer, flushes what is left and waits (bounded) for
//! wakatime-cli to be started.

use std::io::{self, BufRead};
use std::sync::Arc;
use std::time::Duration;

use wakatime_core::{EngineConfig, HeartbeatEngine, LogNotifier};

use crate::args::PluginArgs;
use crate::error::HookError;
use crate::input::for_each_event;

pub fn run(args: &PluginArgs, interval: Duration) -> Result<(), HookError> {
    let cli = args.locate_cli().ok_or(HookError::CliNotFound)?;
    if !args.identity().is_complete() {
        return Err(HookError::IncompleteIdentity);
    }

    let engine = HeartbeatEngine::new(
        EngineConfig {
            identity: args.identity(),
            flush_interval: interval,
            proxy: args.proxy(),
            send_cursor_telemetry: args.send_cursor_telemetry(),
            ..EngineConfig::default()
        },
        Arc::new(cli),
        Arc::new(args.config_store()),
        Arc::new(LogNotifier),
    )?;
    engine.start()?;
    tracing::info!(interval_secs = interval.as_secs(), "Watching editor events");

    let stdin = io::stdin();
    let result = pump(stdin.lock(), &engine);

    if !engine.shutdown() {
        tracing::warn!("Exiting with wakatime-cli sends still pending");
    }
    let queued = result?;
    tracing::info!(queued, "Editor event stream closed");
    Ok(())
}

/// Feeds every event in `reader` to the engine. Returns how many heartbeats
/// were queued.
fn pump(reader: impl BufRead, engine: &HeartbeatEngine) -> Result<usize, HookError> {
    let mut queued = 0;
    for_each_event(reader, |event| {
        if engine.handle_event(event) {
            queued += 1;
        }
    })?;
    Ok(queued)
}
