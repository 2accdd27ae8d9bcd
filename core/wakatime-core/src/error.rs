//! Error types for wakatime-core operations.
//!
//! Nothing here crosses into the host editor: the engine logs and swallows
//! these at every boundary. They exist so the internals can use `?`.

use std::path::PathBuf;

/// All errors that can occur inside the heartbeat pipeline.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    // ─────────────────────────────────────────────────────────────────────
    // Input Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("Invalid editor event: {0}")]
    InvalidEvent(#[source] serde_json::Error),

    // ─────────────────────────────────────────────────────────────────────
    // Process Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write heartbeats to stdin: {0}")]
    Stdin(#[source] std::io::Error),

    #[error("Failed waiting for {program}: {source}")]
    Wait {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Command line is empty")]
    EmptyCommand,

    // ─────────────────────────────────────────────────────────────────────
    // Runtime Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker pool is shut down")]
    PoolClosed,
}

impl TrackerError {
    /// Returns the underlying I/O error for process failures, if any.
    pub fn io_source(&self) -> Option<&std::io::Error> {
        match self {
            TrackerError::Spawn { source, .. }
            | TrackerError::Wait { source, .. }
            | TrackerError::Io { source, .. } => Some(source),
            TrackerError::Stdin(source) => Some(source),
            _ => None,
        }
    }
}

/// Convenience type alias for Results using TrackerError.
pub type Result<T> = std::result::Result<T, TrackerError>;
