//! The facade editor adapters talk to.
//!
//! Adapters translate whatever their editor emits into [`EditorEvent`]s (or
//! raw [`ActivityInput`]s) and hand them to [`HeartbeatEngine`]. Every
//! operation here is callable from an editor thread: nothing blocks on the
//! CLI and no error escapes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::cli::CliLocator;
use crate::command::PluginIdentity;
use crate::config::{self, ConfigStore};
use crate::error::Result;
use crate::events::EditorEvent;
use crate::heartbeat::{should_log, Heartbeat, LineStats, Timestamp};
use crate::notify::Notifier;
use crate::proxy::ProxyConfig;
use crate::queue::HeartbeatQueue;
use crate::runner::{Launcher, ProcessRunner, RunnerConfig};
use crate::scheduler::{FlushOutcome, FlushScheduler, Flusher, SchedulerState, DEFAULT_FLUSH_INTERVAL};
use crate::throttle::ThrottlePolicy;

pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

const DEBUG_WARNING_TITLE: &str = "WakaTime Debug Mode Enabled";
const DEBUG_WARNING_MESSAGE: &str =
    "Your IDE may respond slower. Disable debug mode from Tools -> WakaTime Settings.";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub identity: PluginIdentity,
    pub flush_interval: Duration,
    pub proxy: Option<ProxyConfig>,
    pub send_cursor_telemetry: bool,
    /// Threads running wakatime-cli.
    pub workers: usize,
    /// Upper bound on waiting for in-flight sends at shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            identity: PluginIdentity::default(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            proxy: None,
            send_cursor_telemetry: true,
            workers: 1,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

/// One activity observation before throttling.
///
/// `None` fields fall back to engine state: `time` to now, `is_building` to
/// the shared build flag. An unknown `is_unsaved_entity` is settled on the
/// flush thread by checking whether the file exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityInput {
    pub entity: String,
    pub time: Option<Timestamp>,
    pub is_write: bool,
    pub is_building: Option<bool>,
    pub is_unsaved_entity: Option<bool>,
    pub line_stats: Option<LineStats>,
    pub project: Option<String>,
    pub language: Option<String>,
}

impl ActivityInput {
    pub fn new(entity: impl Into<String>, is_write: bool) -> Self {
        Self {
            entity: entity.into(),
            is_write,
            ..Self::default()
        }
    }

    /// Resolves the in-memory fallbacks and builds the heartbeat. No
    /// throttling and no filesystem access; an unknown unsaved flag is
    /// resolved at flush time.
    pub fn into_heartbeat(self, building: bool) -> Heartbeat {
        Heartbeat {
            timestamp: self.time.unwrap_or_else(Timestamp::now),
            is_write: self.is_write,
            is_unsaved_entity: self.is_unsaved_entity,
            project: self.project,
            language: self.language,
            is_building: self.is_building.unwrap_or(building),
            line_stats: self.line_stats,
            entity: self.entity,
        }
    }
}

pub struct HeartbeatEngine {
    throttle: ThrottlePolicy,
    queue: Arc<HeartbeatQueue>,
    flusher: Arc<Flusher>,
    scheduler: Mutex<FlushScheduler>,
    runner: Option<Arc<ProcessRunner>>,
    store: Arc<dyn ConfigStore>,
    notifier: Arc<dyn Notifier>,
    building: AtomicBool,
    // Read once at construction; the runner is built from the same value.
    debug: bool,
    debug_warned: AtomicBool,
    shutdown_timeout: Duration,
}

impl HeartbeatEngine {
    /// Builds an engine that runs wakatime-cli on its own worker threads.
    pub fn new(
        config: EngineConfig,
        cli: Arc<dyn CliLocator>,
        store: Arc<dyn ConfigStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let debug = config::debug_enabled(store.as_ref());
        let runner = Arc::new(ProcessRunner::new(
            RunnerConfig {
                workers: config.workers,
                debug,
                ..RunnerConfig::default()
            },
            Arc::clone(&notifier),
        )?);
        let launcher: Arc<dyn Launcher> = runner.clone();
        let mut engine = Self::assemble(config, cli, store, notifier, launcher, debug);
        engine.runner = Some(runner);
        Ok(engine)
    }

    /// Builds an engine that hands command lines to `launcher`.
    pub fn with_launcher(
        config: EngineConfig,
        cli: Arc<dyn CliLocator>,
        store: Arc<dyn ConfigStore>,
        notifier: Arc<dyn Notifier>,
        launcher: Arc<dyn Launcher>,
    ) -> Self {
        let debug = config::debug_enabled(store.as_ref());
        Self::assemble(config, cli, store, notifier, launcher, debug)
    }

    fn assemble(
        config: EngineConfig,
        cli: Arc<dyn CliLocator>,
        store: Arc<dyn ConfigStore>,
        notifier: Arc<dyn Notifier>,
        launcher: Arc<dyn Launcher>,
        debug: bool,
    ) -> Self {
        let queue = Arc::new(HeartbeatQueue::new());
        let flusher = Arc::new(
            Flusher::new(
                Arc::clone(&queue),
                config.identity,
                cli,
                Arc::clone(&store),
                launcher,
            )
            .with_proxy(config.proxy)
            .with_cursor_telemetry(config.send_cursor_telemetry),
        );
        let scheduler = FlushScheduler::new(Arc::clone(&flusher), config.flush_interval);

        Self {
            throttle: ThrottlePolicy::new(),
            queue,
            flusher,
            scheduler: Mutex::new(scheduler),
            runner: None,
            store,
            notifier,
            building: AtomicBool::new(false),
            debug,
            debug_warned: AtomicBool::new(false),
            shutdown_timeout: config.shutdown_timeout,
        }
    }

    /// Records activity. Returns true when a heartbeat was queued.
    pub fn append_heartbeat(&self, input: ActivityInput) -> bool {
        self.warn_if_debug();

        if !should_log(&input.entity) {
            tracing::trace!(entity = %input.entity, "Ignoring entity");
            return false;
        }

        let time = input.time.unwrap_or_else(Timestamp::now);
        if !self.throttle.should_emit(&input.entity, time, input.is_write) {
            return false;
        }

        let heartbeat = ActivityInput {
            time: Some(time),
            ..input
        }
        .into_heartbeat(self.is_building());
        tracing::trace!(entity = %heartbeat.entity, time = %heartbeat.timestamp, "Queued heartbeat");
        self.queue.push(heartbeat);
        true
    }

    /// Dispatches an editor event. Returns true when a heartbeat was queued.
    pub fn handle_event(&self, event: EditorEvent) -> bool {
        match event {
            EditorEvent::Save(activity) => self.append_heartbeat(activity.into_input(true)),
            EditorEvent::Edit(activity)
            | EditorEvent::MouseClick(activity)
            | EditorEvent::Scroll(activity)
            | EditorEvent::CaretMove(activity) => {
                self.append_heartbeat(activity.into_input(false))
            }
            EditorEvent::BuildStart(activity) => {
                self.set_building(true);
                self.append_heartbeat(activity.into_input(false))
            }
            EditorEvent::BuildEnd => {
                self.set_building(false);
                false
            }
        }
    }

    pub fn start(&self) -> Result<()> {
        self.scheduler().start()
    }

    pub fn state(&self) -> SchedulerState {
        self.scheduler().state()
    }

    pub fn flush_now(&self) -> FlushOutcome {
        self.flusher.process_queue()
    }

    /// Stops the timer, flushes once more and waits (bounded) for sends.
    ///
    /// Returns false when in-flight sends outlived the shutdown timeout.
    pub fn shutdown(&self) -> bool {
        let outcome = self.scheduler().stop();
        if outcome == FlushOutcome::NotReady && !self.queue.is_empty() {
            tracing::warn!(
                queued = self.queue.len(),
                "Discarding heartbeats; wakatime-cli never became ready"
            );
        }
        match &self.runner {
            Some(runner) => {
                let finished = runner.shutdown(self.shutdown_timeout);
                if !finished {
                    tracing::warn!(
                        timeout_secs = self.shutdown_timeout.as_secs_f64(),
                        "Gave up waiting for wakatime-cli at shutdown"
                    );
                }
                finished
            }
            None => true,
        }
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn set_building(&self, building: bool) {
        self.building.store(building, Ordering::SeqCst);
    }

    pub fn is_building(&self) -> bool {
        self.building.load(Ordering::SeqCst)
    }

    fn scheduler(&self) -> std::sync::MutexGuard<'_, FlushScheduler> {
        self.scheduler.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn warn_if_debug(&self) {
        if self.debug && !self.debug_warned.swap(true, Ordering::SeqCst) {
            self.notifier.warn_user(DEBUG_WARNING_TITLE, DEBUG_WARNING_MESSAGE);
        }
    }
}
