//! Dedup/throttle policy shared by every event producer.
//!
//! Saves always pass. Anything else passes only when the file changed or
//! when more than [`FREQUENCY_SECS`] elapsed since the last accepted
//! heartbeat. The decision and the state update happen under one lock, so
//! `(last_file, last_time)` always describe the same accepted heartbeat.

use std::sync::{Mutex, PoisonError};

use crate::heartbeat::Timestamp;

/// Longest gap on the same file still treated as continuous coding.
pub const FREQUENCY_SECS: i64 = 120;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThrottleState {
    pub last_file: Option<String>,
    pub last_time: Timestamp,
}

impl ThrottleState {
    fn enough_time_passed(&self, candidate: Timestamp) -> bool {
        match self.last_time.checked_add_secs(FREQUENCY_SECS) {
            Some(window_end) => window_end < candidate,
            None => false,
        }
    }

    fn is_same_file(&self, candidate: &str) -> bool {
        self.last_file.as_deref() == Some(candidate)
    }
}

#[derive(Debug, Default)]
pub struct ThrottlePolicy {
    state: Mutex<ThrottleState>,
}

impl ThrottlePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides whether a candidate becomes a heartbeat, recording it if so.
    pub fn should_emit(&self, file: &str, time: Timestamp, is_write: bool) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let accept =
            is_write || !state.is_same_file(file) || state.enough_time_passed(time);
        if accept {
            state.last_file = Some(file.to_string());
            state.last_time = time;
        }
        accept
    }

    pub fn snapshot(&self) -> ThrottleState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
