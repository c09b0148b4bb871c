//! Cron scheduling: next-fire computation and the registry of armed timers.
//!
//! Arming is always "cancel old, then install new": installing a timer
//! under a key that already holds one cancels the previous handle first.
//! A timer leaves the registry as soon as it fires.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use irrigo_domain::event::{EventType, IrrigationEvent};
use irrigo_domain::id::RoomId;
use irrigo_domain::time::{self, Timestamp};

use crate::ports::{Clock, TimerHandle, TimerService, TimerTask};

/// What an armed timer is for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Next cron occurrence of a room's event.
    Event {
        room_id: RoomId,
        event_type: EventType,
    },
    /// Auto-stop of a room's manual run.
    ManualStop { room_id: RoomId },
    /// Local-midnight reset of the daily totals.
    DailyReset,
}

impl TimerKey {
    #[must_use]
    pub fn event(room_id: &RoomId, event_type: EventType) -> Self {
        Self::Event {
            room_id: room_id.clone(),
            event_type,
        }
    }

    #[must_use]
    pub fn manual_stop(room_id: &RoomId) -> Self {
        Self::ManualStop {
            room_id: room_id.clone(),
        }
    }

    fn room(&self) -> Option<&RoomId> {
        match self {
            Self::Event { room_id, .. } | Self::ManualStop { room_id } => Some(room_id),
            Self::DailyReset => None,
        }
    }
}

/// An installed timer. The generation tells a firing task whether its
/// entry was replaced in the meantime.
#[derive(Debug, Clone, Copy)]
struct Armed {
    generation: u64,
    handle: TimerHandle,
}

type ArmedMap = HashMap<TimerKey, Armed>;

/// Cancellation handles keyed by room and purpose.
pub struct TimerRegistry {
    timers: Arc<dyn TimerService>,
    armed: Arc<Mutex<ArmedMap>>,
    generations: AtomicU64,
}

impl TimerRegistry {
    #[must_use]
    pub fn new(timers: Arc<dyn TimerService>) -> Self {
        Self {
            timers,
            armed: Arc::default(),
            generations: AtomicU64::new(0),
        }
    }

    /// Arm `task` at `at` under `key`, cancelling whatever was armed there.
    pub fn install(&self, key: TimerKey, at: Timestamp, task: TimerTask) {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let registry = Arc::clone(&self.armed);
        let fired = key.clone();
        let task: TimerTask = Box::pin(async move {
            {
                let mut armed = registry.lock().unwrap_or_else(PoisonError::into_inner);
                if armed
                    .get(&fired)
                    .is_some_and(|entry| entry.generation == generation)
                {
                    armed.remove(&fired);
                }
            }
            task.await;
        });

        let mut armed = self.lock();
        if let Some(previous) = armed.remove(&key) {
            self.timers.cancel(previous.handle);
        }
        let handle = self.timers.schedule_at(at, task);
        armed.insert(key, Armed { generation, handle });
    }

    /// Cancel the timer under `key`. Returns whether one was armed.
    pub fn cancel(&self, key: &TimerKey) -> bool {
        let entry = self.lock().remove(key);
        match entry {
            Some(entry) => {
                self.timers.cancel(entry.handle);
                true
            }
            None => false,
        }
    }

    /// Cancel every cron timer of a room. The manual auto-stop is left alone.
    pub fn cancel_room_events(&self, room_id: &RoomId) {
        self.cancel_where(|key| matches!(key, TimerKey::Event { .. }) && key.room() == Some(room_id));
    }

    /// Cancel every timer.
    pub fn cancel_all(&self) {
        self.cancel_where(|_| true);
    }

    /// Number of armed cron timers.
    #[must_use]
    pub fn armed_events(&self) -> usize {
        self.lock()
            .keys()
            .filter(|key| matches!(key, TimerKey::Event { .. }))
            .count()
    }

    #[must_use]
    pub fn is_armed(&self, key: &TimerKey) -> bool {
        self.lock().contains_key(key)
    }

    fn cancel_where(&self, predicate: impl Fn(&TimerKey) -> bool) {
        let mut armed = self.lock();
        armed.retain(|key, entry| {
            if predicate(key) {
                self.timers.cancel(entry.handle);
                false
            } else {
                true
            }
        });
    }

    fn lock(&self) -> MutexGuard<'_, ArmedMap> {
        self.armed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Next occurrence of `event` strictly after the clock's current time.
///
/// `None` for disabled events and events without a schedule.
#[must_use]
pub fn next_fire(event: &IrrigationEvent, clock: &dyn Clock) -> Option<Timestamp> {
    if !event.enabled {
        return None;
    }
    let schedule = event.schedule.as_ref()?;
    let local = schedule.next_after(clock.local_now())?;
    Some(clock.to_instant(local))
}

/// Next local midnight as an instant.
#[must_use]
pub fn next_midnight(clock: &dyn Clock) -> Timestamp {
    clock.to_instant(time::next_local_midnight(clock.local_now()))
}
