//! # wakatime-core
//!
//! Turns editor activity into throttled, batched wakatime-cli invocations.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. The flush timer and CLI senders are
//!   plain named threads.
//! - **Never blocks the editor**: Recording activity is a lock, a compare and
//!   a push. The CLI runs on worker threads.
//! - **Errors stay inside**: Failures are logged and swallowed at the engine
//!   boundary. Heartbeats are dropped only by the throttle or a failed send.
//! - **Host-agnostic**: Settings, CLI location and user warnings come in
//!   through small traits so any editor adapter can plug in.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wakatime_core::*;
//!
//! let engine = HeartbeatEngine::new(
//!     EngineConfig {
//!         identity: PluginIdentity::new("IC", "2023.2", "14.0.0"),
//!         ..EngineConfig::default()
//!     },
//!     Arc::new(InstalledCli::discover().unwrap()),
//!     Arc::new(MemoryConfigStore::with_api_key("waka_...")),
//!     Arc::new(LogNotifier),
//! )?;
//! engine.start()?;
//! engine.handle_event(EditorEvent::Save(EditorActivity::new("/src/main.rs")));
//! engine.shutdown();
//! ```

pub mod cli;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod heartbeat;
pub mod notify;
pub mod proxy;
pub mod queue;
pub mod runner;
pub mod scheduler;
pub mod throttle;
pub mod worker;

pub use cli::{CliLocator, InstalledCli};
pub use command::{build_command, CliInvocation, CommandOptions, PluginIdentity};
pub use config::{ConfigStore, MemoryConfigStore};
pub use engine::{ActivityInput, EngineConfig, HeartbeatEngine};
pub use error::{Result, TrackerError};
pub use events::{EditorActivity, EditorEvent};
pub use heartbeat::{should_log, Heartbeat, LineStats, Timestamp};
pub use notify::{LogNotifier, Notifier};
pub use proxy::ProxyConfig;
pub use queue::HeartbeatQueue;
pub use runner::{ExitReport, Launcher, ProcessRunner, RunnerConfig};
pub use scheduler::{FlushOutcome, FlushScheduler, Flusher, SchedulerState};
pub use throttle::ThrottlePolicy;
