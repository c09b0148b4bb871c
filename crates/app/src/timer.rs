//! In-process timer service backed by tokio tasks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::AbortHandle;

use irrigo_domain::time::Timestamp;

use crate::ports::{Clock, TimerHandle, TimerService, TimerTask};

type Pending = Arc<Mutex<HashMap<u64, Option<AbortHandle>>>>;

/// Spawns one tokio task per timer, sleeping until the deadline.
///
/// A timer removes itself from the pending table right before running its
/// task, so a later [`cancel`](TimerService::cancel) never aborts a
/// callback that already started.
pub struct TokioTimerService {
    clock: Arc<dyn Clock>,
    next_id: AtomicU64,
    pending: Pending,
}

impl TokioTimerService {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            next_id: AtomicU64::new(1),
            pending: Arc::default(),
        }
    }

    /// Number of timers that have neither fired nor been cancelled.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl TimerService for TokioTimerService {
    fn schedule_at(&self, at: Timestamp, task: TimerTask) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let delay = (at - self.clock.now()).to_std().unwrap_or_default();

        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, None);

        let pending = Arc::clone(&self.pending);
        let join = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let armed = pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id)
                .is_some();
            if armed {
                task.await;
            }
        });

        if let Some(slot) = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&id)
        {
            *slot = Some(join.abort_handle());
        }

        tracing::trace!(timer = id, delay_ms = delay.as_millis(), "timer scheduled");
        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        let removed = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.0);
        if let Some(abort) = removed.flatten() {
            abort.abort();
        }
    }
}
