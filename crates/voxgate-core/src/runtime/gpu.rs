//! Process-wide accelerator exclusivity.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::error::{Error, Result};

/// Serializes every accelerator-bound STT/TTS backend call.
///
/// Acquisition is untimed: a hung backend call stalls every other
/// accelerator-bound request behind it. Chat requests never take this lock.
#[derive(Clone, Default)]
pub struct GpuLock {
    inner: Arc<Mutex<()>>,
}

/// Held for the duration of one protected backend call.
pub struct GpuGuard {
    _guard: OwnedMutexGuard<()>,
    label: &'static str,
    acquired_at: Instant,
}

impl GpuLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, label: &'static str) -> GpuGuard {
        let waiting_since = Instant::now();
        let guard = self.inner.clone().lock_owned().await;
        let waited = waiting_since.elapsed();
        if waited.as_millis() > 0 {
            debug!("GPU lock for {} acquired after {:?}", label, waited);
        }
        GpuGuard {
            _guard: guard,
            label,
            acquired_at: Instant::now(),
        }
    }

    /// Take the lock, then drive `work` to completion on its own task.
    ///
    /// Once the lock is granted the work is detached from the caller: if the
    /// caller stops waiting, the backend still finishes and the lock is only
    /// released after it does. A caller dropped while still queued never
    /// dispatches anything.
    pub async fn run_exclusive<F, T>(&self, label: &'static str, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let guard = self.acquire(label).await;
        tokio::spawn(async move {
            let output = work.await;
            drop(guard);
            output
        })
        .await
        .map_err(|e| Error::InferenceError(format!("{label} task failed: {e}")))?
    }

    /// True while some call holds the lock.
    pub fn is_held(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

impl Drop for GpuGuard {
    fn drop(&mut self) {
        debug!(
            "GPU lock for {} released after {:?}",
            self.label,
            self.acquired_at.elapsed()
        );
    }
}
