//! Worker pool: elastic, tracked execution of parallel branches.
//!
//! Workers are tokio tasks tracked in a [`JoinSet`]; the pool never rejects
//! work under load. Shutdown is a state transition, not an interrupt: the
//! pool drains gracefully until the deadline and only then aborts whatever
//! is still running.

use std::future::Future;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Result, RuntimeError};

/// Pool lifecycle. Transitions only move right: `Running → Draining → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PoolState {
    Running,
    Draining,
    Stopped,
}

pub(crate) struct WorkerPool {
    state: watch::Sender<PoolState>,
    workers: Mutex<JoinSet<()>>,
}

impl WorkerPool {
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(PoolState::Running);
        Self {
            state,
            workers: Mutex::new(JoinSet::new()),
        }
    }

    pub(crate) fn state(&self) -> PoolState {
        *self.state.borrow()
    }

    /// Schedule `work` on a fresh worker without blocking the caller on its
    /// completion. Fails once shutdown has begun.
    pub(crate) async fn submit<F>(&self, work: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.state() != PoolState::Running {
            return Err(RuntimeError::ShuttingDown);
        }
        let mut workers = self.workers.lock().await;
        // Reap finished workers so the tracked set stays proportional to
        // live work.
        while workers.try_join_next().is_some() {}
        workers.spawn(work);
        Ok(())
    }

    /// Stop accepting work, then wait up to `timeout` for the live workers
    /// to finish. Workers still running at the deadline are aborted; the
    /// call returns regardless.
    pub(crate) async fn shutdown(&self, timeout: Duration) {
        self.state.send_replace(PoolState::Draining);
        let mut workers = self.workers.lock().await;
        let deadline = Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, workers.join_next()).await {
                Ok(Some(joined)) => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            warn!(error = %e, "worker panicked");
                        }
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(remaining = workers.len(), "drain deadline passed, aborting workers");
                    workers.abort_all();
                    while workers.join_next().await.is_some() {}
                    break;
                }
            }
        }
        self.state.send_replace(PoolState::Stopped);
        debug!("worker pool stopped");
    }
}
