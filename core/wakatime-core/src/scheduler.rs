//! Periodic flush of the heartbeat queue.
//!
//! ## State Machine
//!
//! ```text
//! Stopped --start()--> Running   (timer thread ticks every interval)
//! Running --stop()---> Stopped   (timer joined, then one final flush)
//! ```
//!
//! Each tick pops the oldest heartbeat as the primary, drains the rest as
//! extras, settles unknown unsaved flags against the filesystem and hands
//! one command line to the [`Launcher`]. While wakatime-cli is not ready or
//! the plugin identity is unknown, ticks leave the queue untouched so nothing
//! is lost.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::cli::CliLocator;
use crate::command::{build_command, CommandOptions, PluginIdentity};
use crate::config::{self, ConfigStore};
use crate::error::{Result, TrackerError};
use crate::heartbeat::Heartbeat;
use crate::proxy::ProxyConfig;
use crate::queue::HeartbeatQueue;
use crate::runner::Launcher;

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// Result of one pass over the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// CLI missing or identity unknown; queue left as is.
    NotReady,
    Empty,
    Sent { heartbeats: usize },
    /// Heartbeats were popped but no command could be built.
    Dropped { heartbeats: usize },
}

/// Everything one flush needs, shared by the timer and `flush_now`.
pub struct Flusher {
    queue: Arc<HeartbeatQueue>,
    identity: PluginIdentity,
    cli: Arc<dyn CliLocator>,
    config: Arc<dyn ConfigStore>,
    proxy: Option<ProxyConfig>,
    send_cursor_telemetry: bool,
    launcher: Arc<dyn Launcher>,
    // Serializes timer ticks with manual flushes.
    flush_lock: Mutex<()>,
}

impl Flusher {
    pub fn new(
        queue: Arc<HeartbeatQueue>,
        identity: PluginIdentity,
        cli: Arc<dyn CliLocator>,
        config: Arc<dyn ConfigStore>,
        launcher: Arc<dyn Launcher>,
    ) -> Self {
        Self {
            queue,
            identity,
            cli,
            config,
            proxy: None,
            send_cursor_telemetry: true,
            launcher,
            flush_lock: Mutex::new(()),
        }
    }

    pub fn with_proxy(mut self, proxy: Option<ProxyConfig>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_cursor_telemetry(mut self, enabled: bool) -> Self {
        self.send_cursor_telemetry = enabled;
        self
    }

    pub fn is_ready(&self) -> bool {
        self.identity.is_complete() && self.cli.is_ready()
    }

    pub fn process_queue(&self) -> FlushOutcome {
        let _guard = self.flush_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if !self.is_ready() {
            return FlushOutcome::NotReady;
        }

        let mut primary = match self.queue.pop_front() {
            Some(heartbeat) => heartbeat,
            None => return FlushOutcome::Empty,
        };
        let mut extras = self.queue.drain_all();
        let heartbeats = 1 + extras.len();

        primary.resolve_unsaved_entity();
        extras
            .iter_mut()
            .for_each(Heartbeat::resolve_unsaved_entity);

        let options = CommandOptions {
            cli_path: self.cli.executable_path(),
            api_key: config::api_key(self.config.as_ref()),
            proxy: self.proxy.clone(),
            send_cursor_telemetry: self.send_cursor_telemetry,
        };

        match build_command(&primary, &extras, &self.identity, &options) {
            Some(invocation) => {
                tracing::debug!(heartbeats, "Sending heartbeats");
                self.launcher.launch(invocation);
                FlushOutcome::Sent { heartbeats }
            }
            None => {
                tracing::warn!(heartbeats, "Dropping heartbeats; plugin identity unknown");
                FlushOutcome::Dropped { heartbeats }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Stopped,
}

pub struct FlushScheduler {
    flusher: Arc<Flusher>,
    interval: Duration,
    timer: Option<(Sender<()>, JoinHandle<()>)>,
}

impl FlushScheduler {
    pub fn new(flusher: Arc<Flusher>, interval: Duration) -> Self {
        Self {
            flusher,
            interval,
            timer: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.timer.is_some() {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }

    /// Starts the timer thread. No-op when already running.
    pub fn start(&mut self) -> Result<()> {
        if self.timer.is_some() {
            return Ok(());
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let flusher = Arc::clone(&self.flusher);
        let interval = self.interval;
        let handle = thread::Builder::new()
            .name("wakatime-flush".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => tick(&flusher),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(|source| TrackerError::Io {
                context: "spawning flush timer".to_string(),
                source,
            })?;

        tracing::info!(interval_secs = interval.as_secs_f64(), "Heartbeat flush timer started");
        self.timer = Some((stop_tx, handle));
        Ok(())
    }

    /// Cancels the timer and flushes whatever is still queued.
    ///
    /// Safe to call more than once; every call performs the final flush.
    pub fn stop(&mut self) -> FlushOutcome {
        if let Some((stop_tx, handle)) = self.timer.take() {
            let _ = stop_tx.send(());
            if handle.join().is_err() {
                tracing::error!("Heartbeat flush timer panicked");
            }
            tracing::info!("Heartbeat flush timer stopped");
        }
        let outcome = self.flusher.process_queue();
        tracing::debug!(outcome = ?outcome, "Final heartbeat flush");
        outcome
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        if let Some((stop_tx, _handle)) = self.timer.take() {
            let _ = stop_tx.send(());
        }
    }
}

fn tick(flusher: &Flusher) {
    match panic::catch_unwind(AssertUnwindSafe(|| flusher.process_queue())) {
        Ok(FlushOutcome::Empty) => {}
        Ok(outcome) => tracing::debug!(outcome = ?outcome, "Heartbeat flush tick"),
        Err(_) => tracing::error!("Heartbeat flush tick panicked; timer keeps running"),
    }
}
