//! Timer port: one-shot deferred callbacks with cancellation handles.

use std::future::Future;
use std::pin::Pin;

use irrigo_domain::time::Timestamp;

/// Work run when a timer fires.
pub type TimerTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Cancellation token returned by [`TimerService::schedule_at`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

/// Runs a task at a given instant unless cancelled first.
pub trait TimerService: Send + Sync {
    fn schedule_at(&self, at: Timestamp, task: TimerTask) -> TimerHandle;

    /// Cancel a pending timer. Unknown or already fired handles are ignored.
    fn cancel(&self, handle: TimerHandle);
}
