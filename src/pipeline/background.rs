//! Tracked fire-and-forget work
//!
//! Cache stores and stale-entry evictions run after the response has been
//! handed off. They are spawned into a shared `JoinSet` so that shutdown and
//! tests can wait for them with [`BackgroundTasks::flush`]. Failures are
//! logged and counted, never propagated.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, warn};

#[derive(Clone, Default)]
pub struct BackgroundTasks {
    set: Arc<Mutex<JoinSet<()>>>,
    failures: Arc<AtomicU64>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task`; an `Err` outcome is logged under `name`
    pub fn spawn<F, E>(&self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let failures = self.failures.clone();
        let mut set = self.set.lock();

        // Reap whatever already finished so the set stays small
        while let Some(result) = set.try_join_next() {
            if let Err(e) = result {
                failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Background task panicked");
            }
        }

        set.spawn(async move {
            match task.await {
                Ok(()) => debug!(task = name, "Background task completed"),
                Err(e) => {
                    failures.fetch_add(1, Ordering::Relaxed);
                    warn!(task = name, error = %e, "Background task failed");
                }
            }
        });
    }

    /// Wait for every pending task, including ones spawned while waiting
    pub async fn flush(&self) {
        loop {
            let mut pending = std::mem::take(&mut *self.set.lock());
            if pending.is_empty() {
                return;
            }
            while let Some(result) = pending.join_next().await {
                if let Err(e) = result {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, "Background task panicked");
                }
            }
        }
    }

    /// Number of tasks not yet reaped
    pub fn pending(&self) -> usize {
        self.set.lock().len()
    }

    /// Tasks that returned an error or panicked
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}
