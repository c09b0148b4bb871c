//! Test doubles and fixtures shared by the unit tests of this crate.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{FixedOffset, TimeZone, Utc};

use irrigo_domain::entity::{EntityRef, EntityState};
use irrigo_domain::error::{HardwareControlError, IrrigoError, SwitchCommand};
use irrigo_domain::event::{EventType, IrrigationEvent};
use irrigo_domain::history::{CycleMetrics, HistoryRecord};
use irrigo_domain::id::RoomId;
use irrigo_domain::room::Room;
use irrigo_domain::schedule::CronSchedule;
use irrigo_domain::settings::Settings;
use irrigo_domain::shot::Shot;
use irrigo_domain::time::Timestamp;

use crate::diagnostics::Diagnostics;
use crate::engine::{EngineConfig, IrrigationEngine};
use crate::ports::{
    Clock, HardwareControl, HistoryStore, NotificationCategory, Notifier, RoomRepository,
    SettingsRepository, TimerHandle, TimerService, TimerTask,
};
use crate::timer::TokioTimerService;

fn base_time() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 5, 1, 5, 0, 0).unwrap()
}

// -- clocks --

/// UTC clock that follows tokio's (pausable) time, starting at
/// 2024-05-01T05:00Z.
pub(crate) struct TokioClock {
    base: Timestamp,
    started: tokio::time::Instant,
}

impl Default for TokioClock {
    fn default() -> Self {
        Self {
            base: base_time(),
            started: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Timestamp {
        self.base + chrono::Duration::from_std(self.started.elapsed()).unwrap()
    }

    fn utc_offset(&self, _at: Timestamp) -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }
}

/// Clock frozen at a given instant, with a fixed UTC offset.
pub(crate) struct ManualClock {
    now: Timestamp,
    offset: FixedOffset,
}

impl ManualClock {
    pub fn at(now: Timestamp) -> Self {
        Self {
            now,
            offset: FixedOffset::east_opt(0).unwrap(),
        }
    }

    pub fn with_offset_hours(mut self, hours: i32) -> Self {
        self.offset = FixedOffset::east_opt(hours * 3600).unwrap();
        self
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(base_time())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now
    }

    fn utc_offset(&self, _at: Timestamp) -> FixedOffset {
        self.offset
    }
}

// -- timers --

#[derive(Default)]
struct TimerState {
    next_id: u64,
    pending: BTreeMap<u64, (Timestamp, TimerTask)>,
    cancelled: Vec<TimerHandle>,
}

/// Timers that only fire when the test says so.
#[derive(Default)]
pub(crate) struct ManualTimers {
    state: Mutex<TimerState>,
}

impl ManualTimers {
    pub fn pending(&self) -> Vec<(TimerHandle, Timestamp)> {
        self.state
            .lock()
            .unwrap()
            .pending
            .iter()
            .map(|(id, (at, _))| (TimerHandle(*id), *at))
            .collect()
    }

    pub fn cancelled(&self) -> Vec<TimerHandle> {
        self.state.lock().unwrap().cancelled.clone()
    }

    /// Run every timer due at `now`, earliest first, one at a time.
    pub async fn fire_due(&self, now: Timestamp) {
        loop {
            let next = {
                let mut state = self.state.lock().unwrap();
                let due = state
                    .pending
                    .iter()
                    .filter(|(_, (at, _))| *at <= now)
                    .min_by_key(|(id, (at, _))| (*at, **id))
                    .map(|(id, _)| *id);
                due.and_then(|id| state.pending.remove(&id))
            };
            match next {
                Some((_, task)) => task.await,
                None => break,
            }
        }
    }
}

impl TimerService for ManualTimers {
    fn schedule_at(&self, at: Timestamp, task: TimerTask) -> TimerHandle {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.pending.insert(id, (at, task));
        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        let mut state = self.state.lock().unwrap();
        if state.pending.remove(&handle.0).is_some() {
            state.cancelled.push(handle);
        }
    }
}

// -- hardware --

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HardwareCall {
    On(String),
    Off(String),
}

#[derive(Default)]
struct HardwareState {
    states: HashMap<EntityRef, EntityState>,
    failing_activation: HashSet<EntityRef>,
    failing_deactivation: HashSet<EntityRef>,
    failing_lookups: HashSet<EntityRef>,
    calls: Vec<HardwareCall>,
}

/// Switch double recording every attempted call, failed ones included.
/// Unknown entities cannot be switched.
#[derive(Default)]
pub(crate) struct RecordingHardware {
    state: Mutex<HardwareState>,
}

impl RecordingHardware {
    /// Pump and zones off, light on, sensors reporting.
    pub fn register_room(&self, room: &Room) {
        let mut state = self.state.lock().unwrap();
        for (_, entity) in room.actuators() {
            state.states.insert(entity.clone(), EntityState::Off);
        }
        if let Some(light) = &room.light {
            state.states.insert(light.clone(), EntityState::On);
        }
        for sensor in room.sensors.values() {
            state.states.insert(sensor.clone(), EntityState::Unknown);
        }
    }

    pub fn set_state(&self, entity: &EntityRef, value: EntityState) {
        self.state
            .lock()
            .unwrap()
            .states
            .insert(entity.clone(), value);
    }

    pub fn forget(&self, entity: &EntityRef) {
        self.state.lock().unwrap().states.remove(entity);
    }

    pub fn fail_activation(&self, entity: &EntityRef) {
        self.state
            .lock()
            .unwrap()
            .failing_activation
            .insert(entity.clone());
    }

    pub fn fail_deactivation(&self, entity: &EntityRef) {
        self.state
            .lock()
            .unwrap()
            .failing_deactivation
            .insert(entity.clone());
    }

    pub fn fail_lookups(&self, entity: &EntityRef) {
        self.state
            .lock()
            .unwrap()
            .failing_lookups
            .insert(entity.clone());
    }

    pub fn calls(&self) -> Vec<HardwareCall> {
        self.state.lock().unwrap().calls.clone()
    }

    fn switch(&self, entity: &EntityRef, command: SwitchCommand) -> Result<(), IrrigoError> {
        let mut state = self.state.lock().unwrap();
        let (call, failing, target) = match command {
            SwitchCommand::Activate => (
                HardwareCall::On(entity.to_string()),
                state.failing_activation.contains(entity),
                EntityState::On,
            ),
            SwitchCommand::Deactivate => (
                HardwareCall::Off(entity.to_string()),
                state.failing_deactivation.contains(entity),
                EntityState::Off,
            ),
        };
        state.calls.push(call);

        let known = state
            .states
            .get(entity)
            .is_some_and(|current| current.is_available());
        if failing || !known {
            return Err(HardwareControlError {
                entity: entity.to_string(),
                command,
                reason: "switch refused the command".to_string(),
            }
            .into());
        }
        state.states.insert(entity.clone(), target);
        Ok(())
    }
}

impl HardwareControl for RecordingHardware {
    fn activate(&self, entity: &EntityRef) -> impl Future<Output = Result<(), IrrigoError>> + Send {
        let result = self.switch(entity, SwitchCommand::Activate);
        async { result }
    }

    fn deactivate(
        &self,
        entity: &EntityRef,
    ) -> impl Future<Output = Result<(), IrrigoError>> + Send {
        let result = self.switch(entity, SwitchCommand::Deactivate);
        async { result }
    }

    fn state(
        &self,
        entity: &EntityRef,
    ) -> impl Future<Output = Result<Option<EntityState>, IrrigoError>> + Send {
        let state = self.state.lock().unwrap();
        let result = if state.failing_lookups.contains(entity) {
            Err(IrrigoError::Service(format!("lookup of {entity} failed")))
        } else {
            Ok(state.states.get(entity).copied())
        };
        async { result }
    }
}

// -- storage --

#[derive(Default)]
struct StoredData {
    rooms: BTreeMap<RoomId, Room>,
    settings: Settings,
    history: Vec<HistoryRecord>,
    metrics: CycleMetrics,
}

/// Shared in-memory storage; clones see the same data.
#[derive(Clone, Default)]
pub(crate) struct InMemoryStorage {
    data: Arc<Mutex<StoredData>>,
}

impl InMemoryStorage {
    /// Seed rooms without validating them.
    pub fn with_rooms(rooms: Vec<Room>) -> Self {
        let storage = Self::default();
        storage.data.lock().unwrap().rooms = rooms
            .into_iter()
            .map(|room| (room.id.clone(), room))
            .collect();
        storage
    }

    pub fn room_count(&self) -> usize {
        self.data.lock().unwrap().rooms.len()
    }

    pub fn room(&self, id: &RoomId) -> Option<Room> {
        self.data.lock().unwrap().rooms.get(id).cloned()
    }

    pub fn settings(&self) -> Settings {
        self.data.lock().unwrap().settings.clone()
    }

    /// Every record, oldest first.
    pub fn history(&self) -> Vec<HistoryRecord> {
        self.data.lock().unwrap().history.clone()
    }
}

impl RoomRepository for InMemoryStorage {
    fn create(&self, room: Room) -> impl Future<Output = Result<Room, IrrigoError>> + Send {
        let mut data = self.data.lock().unwrap();
        data.rooms.insert(room.id.clone(), room.clone());
        async { Ok(room) }
    }

    fn get_by_id(
        &self,
        id: &RoomId,
    ) -> impl Future<Output = Result<Option<Room>, IrrigoError>> + Send {
        let result = self.data.lock().unwrap().rooms.get(id).cloned();
        async { Ok(result) }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Room>, IrrigoError>> + Send {
        let result = self.data.lock().unwrap().rooms.values().cloned().collect();
        async { Ok(result) }
    }

    fn update(&self, room: Room) -> impl Future<Output = Result<Room, IrrigoError>> + Send {
        let mut data = self.data.lock().unwrap();
        data.rooms.insert(room.id.clone(), room.clone());
        async { Ok(room) }
    }

    fn delete(&self, id: &RoomId) -> impl Future<Output = Result<(), IrrigoError>> + Send {
        self.data.lock().unwrap().rooms.remove(id);
        async { Ok(()) }
    }
}

impl SettingsRepository for InMemoryStorage {
    fn get(&self) -> impl Future<Output = Result<Settings, IrrigoError>> + Send {
        let result = self.settings();
        async { Ok(result) }
    }

    fn save(&self, settings: &Settings) -> impl Future<Output = Result<(), IrrigoError>> + Send {
        self.data.lock().unwrap().settings = settings.clone();
        async { Ok(()) }
    }
}

impl HistoryStore for InMemoryStorage {
    fn append(
        &self,
        record: &HistoryRecord,
    ) -> impl Future<Output = Result<(), IrrigoError>> + Send {
        self.data.lock().unwrap().history.push(record.clone());
        async { Ok(()) }
    }

    fn find_since(
        &self,
        room: Option<&RoomId>,
        since: Timestamp,
    ) -> impl Future<Output = Result<Vec<HistoryRecord>, IrrigoError>> + Send {
        let data = self.data.lock().unwrap();
        let result: Vec<HistoryRecord> = data
            .history
            .iter()
            .rev()
            .filter(|record| record.timestamp >= since)
            .filter(|record| room.is_none_or(|room| &record.room_id == room))
            .cloned()
            .collect();
        async { Ok(result) }
    }

    fn purge_before(
        &self,
        before: Timestamp,
    ) -> impl Future<Output = Result<u64, IrrigoError>> + Send {
        let mut data = self.data.lock().unwrap();
        let len = data.history.len();
        data.history.retain(|record| record.timestamp >= before);
        let removed = (len - data.history.len()) as u64;
        async move { Ok(removed) }
    }

    fn record_cycle(
        &self,
        success: bool,
        duration: u32,
    ) -> impl Future<Output = Result<(), IrrigoError>> + Send {
        self.data.lock().unwrap().metrics.record(success, duration);
        async { Ok(()) }
    }

    fn cycle_metrics(&self) -> impl Future<Output = Result<CycleMetrics, IrrigoError>> + Send {
        let result = self.data.lock().unwrap().metrics;
        async move { Ok(result) }
    }

    fn reset_cycle_metrics(&self) -> impl Future<Output = Result<(), IrrigoError>> + Send {
        self.data.lock().unwrap().metrics = CycleMetrics::default();
        async { Ok(()) }
    }
}

// -- notifications --

#[derive(Default)]
pub(crate) struct SpyNotifier {
    sent: Mutex<Vec<(String, String, NotificationCategory)>>,
}

impl SpyNotifier {
    /// `(title, message, category)` of every delivered notification.
    pub fn sent(&self) -> Vec<(String, String, NotificationCategory)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for SpyNotifier {
    fn notify(
        &self,
        message: &str,
        title: &str,
        category: NotificationCategory,
    ) -> impl Future<Output = Result<(), IrrigoError>> + Send {
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string(), category));
        async { Ok(()) }
    }
}

// -- fixtures --

/// Room with a pump and two zones, no light.
pub(crate) fn sample_room(id: &str) -> Room {
    Room::builder(
        RoomId::new(id).unwrap(),
        EntityRef::parse(format!("switch.{id}_pump")).unwrap(),
    )
    .zone(EntityRef::parse(format!("switch.{id}_zone_1")).unwrap())
    .zone(EntityRef::parse(format!("switch.{id}_zone_2")).unwrap())
    .build()
    .unwrap()
}

pub(crate) fn room_with_light(id: &str) -> Room {
    let mut room = sample_room(id);
    room.light = Some(EntityRef::parse(format!("light.{id}_lamp")).unwrap());
    room
}

/// One 60-second shot on a cron schedule.
pub(crate) fn scheduled_event(event_type: EventType, cron: &str) -> IrrigationEvent {
    event_with_shots(event_type, Some(cron), &[(60, 0)])
}

pub(crate) fn event_with_shots(
    event_type: EventType,
    cron: Option<&str>,
    shots: &[(u32, u32)],
) -> IrrigationEvent {
    let mut builder = IrrigationEvent::builder(event_type).shots(
        shots
            .iter()
            .map(|(duration, interval)| Shot::new(*duration, *interval).unwrap()),
    );
    if let Some(cron) = cron {
        builder = builder.schedule(CronSchedule::parse(cron).unwrap());
    }
    builder.build().unwrap()
}

// -- engine harness --

pub(crate) type TestEngine = IrrigationEngine<InMemoryStorage, RecordingHardware, Arc<SpyNotifier>>;

/// A set-up engine wired to in-memory doubles.
pub(crate) struct Harness {
    pub engine: Arc<TestEngine>,
    pub storage: InMemoryStorage,
    pub hardware: Arc<RecordingHardware>,
    pub notifier: Arc<SpyNotifier>,
    pub timers: Arc<ManualTimers>,
    pub clock: Arc<TokioClock>,
}

impl Harness {
    /// Timers only fire through [`fire_due`](Self::fire_due).
    pub async fn with_rooms(rooms: Vec<Room>) -> Self {
        let timers = Arc::new(ManualTimers::default());
        let clock = Arc::new(TokioClock::default());
        Self::build(rooms, clock, timers.clone(), timers).await
    }

    /// Timers are real tokio tasks; advancing tokio time fires them.
    pub async fn with_tokio_timers(rooms: Vec<Room>) -> Self {
        let clock = Arc::new(TokioClock::default());
        let timers = Arc::new(TokioTimerService::new(clock.clone()));
        Self::build(rooms, clock, timers, Arc::new(ManualTimers::default())).await
    }

    async fn build(
        rooms: Vec<Room>,
        clock: Arc<TokioClock>,
        timer_service: Arc<dyn TimerService>,
        timers: Arc<ManualTimers>,
    ) -> Self {
        let hardware = Arc::new(RecordingHardware::default());
        for room in &rooms {
            hardware.register_room(room);
        }
        let storage = InMemoryStorage::with_rooms(rooms);
        let notifier = Arc::new(SpyNotifier::default());

        let engine = IrrigationEngine::new(
            storage.clone(),
            Arc::clone(&hardware),
            Arc::clone(&notifier),
            clock.clone(),
            timer_service,
            Arc::new(Diagnostics::default()),
            EngineConfig::default(),
        );
        engine.setup().await.unwrap();

        Self {
            engine,
            storage,
            hardware,
            notifier,
            timers,
            clock,
        }
    }

    /// Let tokio time run until the clock reads `at`.
    pub async fn advance_to(&self, at: Timestamp) {
        let delay = (at - self.clock.now()).to_std().unwrap();
        tokio::time::sleep(delay).await;
    }

    pub async fn fire_due(&self) {
        self.timers.fire_due(self.clock.now()).await;
    }
}
