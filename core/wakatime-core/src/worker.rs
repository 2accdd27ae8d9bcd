//! Small fixed-size thread pool for work that must stay off editor threads.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{Result, TrackerError};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(name: &str, size: usize) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(size.max(1));
        for index in 0..size.max(1) {
            let receiver = Arc::clone(&receiver);
            let handle = thread::Builder::new()
                .name(format!("{}-{}", name, index))
                .spawn(move || worker_loop(receiver))
                .map_err(|source| TrackerError::Io {
                    context: format!("spawning worker {}-{}", name, index),
                    source,
                })?;
            workers.push(handle);
        }

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        })
    }

    /// Queues `job` for a worker. Never blocks.
    pub fn execute<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(sender) => sender
                .send(Box::new(job))
                .map_err(|_| TrackerError::PoolClosed),
            None => Err(TrackerError::PoolClosed),
        }
    }

    /// Stops accepting jobs and waits up to `timeout` for queued ones.
    ///
    /// Returns true when every worker finished in time. Workers still busy
    /// after the deadline are left detached.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        drop(
            self.sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        let workers: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        if workers.is_empty() {
            return true;
        }

        let (done_tx, done_rx) = mpsc::channel();
        let joiner = thread::Builder::new()
            .name("wakatime-pool-join".to_string())
            .spawn(move || {
                for worker in workers {
                    let _ = worker.join();
                }
                let _ = done_tx.send(());
            });
        if let Err(err) = joiner {
            tracing::warn!(error = %err, "Failed to spawn worker pool joiner");
            return false;
        }

        done_rx.recv_timeout(timeout).is_ok()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel lets idle workers exit on their own.
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
    }
}

fn worker_loop(receiver: Arc<Mutex<Receiver<Job>>>) {
    loop {
        let job = {
            let receiver = receiver.lock().unwrap_or_else(PoisonError::into_inner);
            receiver.recv()
        };
        match job {
            Ok(job) => {
                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    tracing::error!("Background job panicked");
                }
            }
            Err(_) => break,
        }
    }
}
