//! Timer arming: cron events and the midnight reset.

use std::sync::Arc;

use irrigo_domain::error::IrrigoError;
use irrigo_domain::event::EventType;
use irrigo_domain::id::RoomId;

use super::IrrigationEngine;
use crate::ports::{HardwareControl, Notifier, Storage, TimerTask};
use crate::scheduler::{self, TimerKey};

impl<S, HW, N> IrrigationEngine<S, HW, N>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    /// Cancel every cron timer of a room, then arm one per schedulable event.
    pub(super) fn arm_room(&self, room_id: &RoomId) {
        self.timers.cancel_room_events(room_id);
        let Some(room) = self.cached_room(room_id) else {
            return;
        };
        for event in room.events() {
            self.arm_event(room_id, event.event_type);
        }
    }

    /// Arm (or disarm) the timer of one event from the current room config.
    ///
    /// The next run is computed from the current time, so after an
    /// execution it is the first occurrence after completion.
    pub(super) fn arm_event(&self, room_id: &RoomId, event_type: EventType) {
        let key = TimerKey::event(room_id, event_type);
        let next = self
            .cached_room(room_id)
            .and_then(|room| room.event(event_type).cloned())
            .map(|event| (event.is_schedulable(), scheduler::next_fire(&event, self.clock.as_ref())));

        let at = match next {
            Some((true, Some(at))) => at,
            Some((true, None)) => {
                let err = IrrigoError::Scheduling(format!(
                    "no upcoming occurrence for {room_id}/{event_type}"
                ));
                self.record_error(
                    "arm_event",
                    &err,
                    &[("room_id", room_id.to_string()), ("event_type", event_type.to_string())],
                );
                self.disarm_event(room_id, event_type);
                return;
            }
            _ => {
                self.disarm_event(room_id, event_type);
                return;
            }
        };

        self.with_cached_room(room_id, |room| {
            if let Some(event) = room.event_mut(event_type) {
                event.next_run = Some(at);
            }
        });

        let engine = self.this.clone();
        let (task_room, task_event) = (room_id.clone(), event_type);
        let task: TimerTask = Box::pin(async move {
            if let Some(engine) = engine.upgrade() {
                engine.fire_event(task_room, task_event).await;
            }
        });
        self.timers.install(key, at, task);
        tracing::debug!(room_id = %room_id, event_type = %event_type, next_run = %at, "event armed");
    }

    fn disarm_event(&self, room_id: &RoomId, event_type: EventType) {
        self.timers.cancel(&TimerKey::event(room_id, event_type));
        self.with_cached_room(room_id, |room| {
            if let Some(event) = room.event_mut(event_type) {
                event.next_run = None;
            }
        });
    }

    /// Body of a cron timer: execute, then re-arm whatever the outcome.
    ///
    /// Returns a boxed future so that timer tasks, which call back into
    /// the engine, have a nameable `Send` type.
    fn fire_event(self: Arc<Self>, room_id: RoomId, event_type: EventType) -> TimerTask {
        Box::pin(async move {
            if self.cached_room(&room_id).is_none() {
                tracing::debug!(room_id = %room_id, "timer fired for deleted room");
                return;
            }
            tracing::info!(room_id = %room_id, event_type = %event_type, "scheduled event fired");
            let outcome = self.execute_scheduled_event(&room_id, event_type).await;
            tracing::debug!(room_id = %room_id, event_type = %event_type, ?outcome, "scheduled event finished");
            self.arm_event(&room_id, event_type);
        })
    }

    /// Arm the local-midnight reset of the daily totals.
    pub(super) fn arm_daily_reset(&self) {
        let at = scheduler::next_midnight(self.clock.as_ref());
        let engine = self.this.clone();
        let task: TimerTask = Box::pin(async move {
            if let Some(engine) = engine.upgrade() {
                engine.on_daily_reset();
            }
        });
        self.timers.install(TimerKey::DailyReset, at, task);
        tracing::debug!(next_reset = %at, "daily reset armed");
    }

    fn on_daily_reset(&self) {
        let today = self.clock.local_now().date();
        if self.totals.reset_for(today) {
            tracing::info!(%today, "daily irrigation totals reset");
        }
        self.arm_daily_reset();
    }
}
