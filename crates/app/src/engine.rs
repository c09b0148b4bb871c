//! The irrigation engine: the single entry point the outside world drives.
//!
//! Control flow: scheduler fires, fail-safe pipeline gates, shot sequencer
//! executes, daily accounting updates, history is recorded, scheduler
//! re-arms. Manual runs and emergency stops share the sequencer and the
//! conflict manager but bypass the cron path.
//!
//! The engine lives in an [`Arc`]; timer callbacks hold a [`Weak`] to it so
//! a dropped engine simply stops firing.

mod execution;
mod lifecycle;
mod recovery;
mod scheduling;
mod status;
mod stop;

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;

use irrigo_domain::error::IrrigoError;
use irrigo_domain::history::HistoryRecord;
use irrigo_domain::id::RoomId;
use irrigo_domain::room::Room;
use irrigo_domain::settings::Settings;

use crate::conflict::ExecutionRegistry;
use crate::daily_totals::DailyTotals;
use crate::diagnostics::{Diagnostics, RetryPolicy};
use crate::fail_safe::FailSafePipeline;
use crate::ports::{Clock, HardwareControl, NotificationCategory, Notifier, Storage, TimerService};
use crate::scheduler::TimerRegistry;
use crate::sequencer::ShotSequencer;

pub use recovery::RecoveryOperation;

/// Tunables that are not runtime [`Settings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub retry: RetryPolicy,
    /// Wait before re-checking entity availability during recovery.
    pub entity_settle_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            entity_settle_delay: Duration::from_secs(5),
        }
    }
}

/// Scheduling and execution engine for every room.
pub struct IrrigationEngine<S, HW, N> {
    storage: S,
    hardware: Arc<HW>,
    notifier: N,
    clock: Arc<dyn Clock>,
    timers: TimerRegistry,
    diagnostics: Arc<Diagnostics>,
    config: EngineConfig,
    rooms: RwLock<BTreeMap<RoomId, Room>>,
    settings: RwLock<Settings>,
    totals: Arc<DailyTotals>,
    registry: Arc<ExecutionRegistry>,
    pipeline: FailSafePipeline<HW>,
    sequencer: ShotSequencer<HW>,
    this: Weak<Self>,
}

impl<S, HW, N> IrrigationEngine<S, HW, N>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    /// Build an engine. Nothing is loaded or armed until
    /// [`setup`](Self::setup) runs.
    pub fn new(
        storage: S,
        hardware: Arc<HW>,
        notifier: N,
        clock: Arc<dyn Clock>,
        timers: Arc<dyn TimerService>,
        diagnostics: Arc<Diagnostics>,
        config: EngineConfig,
    ) -> Arc<Self> {
        let totals = Arc::new(DailyTotals::default());
        let registry = Arc::new(ExecutionRegistry::default());
        Arc::new_cyclic(|this| Self {
            pipeline: FailSafePipeline::new(
                Arc::clone(&hardware),
                Arc::clone(&totals),
                Arc::clone(&registry),
            ),
            sequencer: ShotSequencer::new(
                Arc::clone(&hardware),
                Arc::clone(&registry),
                Arc::clone(&clock),
            ),
            storage,
            hardware,
            notifier,
            clock,
            timers: TimerRegistry::new(timers),
            diagnostics,
            config,
            rooms: RwLock::default(),
            settings: RwLock::default(),
            totals,
            registry,
            this: this.clone(),
        })
    }

    /// Snapshot of the current runtime settings.
    #[must_use]
    pub fn settings(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn cached_room(&self, room_id: &RoomId) -> Option<Room> {
        self.rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(room_id)
            .cloned()
    }

    fn cached_rooms(&self) -> Vec<Room> {
        self.rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn with_cached_room<T>(&self, room_id: &RoomId, f: impl FnOnce(&mut Room) -> T) -> Option<T> {
        self.rooms
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(room_id)
            .map(f)
    }

    fn record_error(&self, operation: &str, error: &IrrigoError, context: &[(&str, String)]) {
        let context = context
            .iter()
            .map(|(key, value)| ((*key).to_string(), value.clone()))
            .collect();
        self.diagnostics
            .errors
            .record(operation, error, context, self.clock.now());
    }

    /// Append a history record and prune records past the retention window.
    async fn record_history(&self, record: HistoryRecord) {
        if let Err(err) = self.storage.append(&record).await {
            self.record_error(
                "record_history",
                &err,
                &[("room_id", record.room_id.to_string())],
            );
            return;
        }
        let retention = chrono::Duration::days(i64::from(self.settings().max_history_days));
        match self.storage.purge_before(self.clock.now() - retention).await {
            Ok(0) => {}
            Ok(removed) => tracing::debug!(removed, "pruned irrigation history"),
            Err(err) => self.record_error("purge_history", &err, &[]),
        }
    }

    async fn record_cycle(&self, success: bool, duration: u32) {
        if let Err(err) = self.storage.record_cycle(success, duration).await {
            self.record_error("record_cycle", &err, &[]);
        }
    }

    /// Send a notification if the settings allow it. Delivery failures are logged.
    async fn notify(&self, message: &str, title: &str, category: NotificationCategory) {
        let settings = self.settings();
        if !settings.notifications_enabled {
            return;
        }
        if category == NotificationCategory::Error && !settings.error_notifications_enabled {
            return;
        }
        if let Err(err) = self.notifier.notify(message, title, category).await {
            tracing::warn!(error = %err, title, "notification delivery failed");
        }
    }

    async fn notify_error(&self, room: &Room, message: &str) {
        let title = format!("Irrigation Error - {}", room.name);
        self.notify(message, &title, NotificationCategory::Error)
            .await;
    }
}
