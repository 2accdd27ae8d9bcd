//! Unbounded FIFO of heartbeats waiting for the next flush.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::heartbeat::Heartbeat;

#[derive(Debug, Default)]
pub struct HeartbeatQueue {
    inner: Mutex<VecDeque<Heartbeat>>,
}

impl HeartbeatQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, heartbeat: Heartbeat) {
        self.lock().push_back(heartbeat);
    }

    pub fn pop_front(&self) -> Option<Heartbeat> {
        self.lock().pop_front()
    }

    /// Removes everything currently queued, oldest first.
    pub fn drain_all(&self) -> Vec<Heartbeat> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Heartbeat>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
