//! Stub ports and a ready-made router for handler tests.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use tower::ServiceExt;

use irrigo_app::diagnostics::Diagnostics;
use irrigo_app::engine::{EngineConfig, IrrigationEngine};
use irrigo_app::ports::{
    Clock, HardwareControl, HistoryStore, NotificationCategory, Notifier, RoomRepository,
    SettingsRepository, SystemClock,
};
use irrigo_app::timer::TokioTimerService;
use irrigo_domain::entity::{EntityRef, EntityState};
use irrigo_domain::error::{
    HardwareControlError, IrrigoError, NotFoundError, SwitchCommand, ValidationError,
};
use irrigo_domain::event::{EventType, IrrigationEvent};
use irrigo_domain::history::{CycleMetrics, HistoryRecord};
use irrigo_domain::id::RoomId;
use irrigo_domain::room::Room;
use irrigo_domain::settings::Settings;
use irrigo_domain::shot::Shot;
use irrigo_domain::time::Timestamp;

use crate::router;
use crate::state::AppState;

#[derive(Default)]
struct StubData {
    rooms: BTreeMap<RoomId, Room>,
    settings: Settings,
    history: Vec<HistoryRecord>,
    metrics: CycleMetrics,
}

pub(crate) struct StubStorage {
    data: Mutex<StubData>,
}

impl StubStorage {
    fn with_rooms(rooms: Vec<Room>) -> Self {
        let data = StubData {
            rooms: rooms.into_iter().map(|room| (room.id.clone(), room)).collect(),
            settings: Settings {
                pump_zone_delay_seconds: 0,
                ..Settings::default()
            },
            ..StubData::default()
        };
        Self {
            data: Mutex::new(data),
        }
    }
}

impl RoomRepository for StubStorage {
    fn create(&self, room: Room) -> impl Future<Output = Result<Room, IrrigoError>> + Send {
        let mut data = self.data.lock().unwrap();
        let result = if data.rooms.contains_key(&room.id) {
            Err(ValidationError::DuplicateRoom(room.id.to_string()).into())
        } else {
            data.rooms.insert(room.id.clone(), room.clone());
            Ok(room)
        };
        async { result }
    }

    fn get_by_id(
        &self,
        id: &RoomId,
    ) -> impl Future<Output = Result<Option<Room>, IrrigoError>> + Send {
        let room = self.data.lock().unwrap().rooms.get(id).cloned();
        async { Ok(room) }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Room>, IrrigoError>> + Send {
        let rooms: Vec<Room> = self.data.lock().unwrap().rooms.values().cloned().collect();
        async { Ok(rooms) }
    }

    fn update(&self, room: Room) -> impl Future<Output = Result<Room, IrrigoError>> + Send {
        let mut data = self.data.lock().unwrap();
        let result = if data.rooms.contains_key(&room.id) {
            data.rooms.insert(room.id.clone(), room.clone());
            Ok(room)
        } else {
            Err(NotFoundError::room(&room.id).into())
        };
        async { result }
    }

    fn delete(&self, id: &RoomId) -> impl Future<Output = Result<(), IrrigoError>> + Send {
        self.data.lock().unwrap().rooms.remove(id);
        async { Ok(()) }
    }
}

impl SettingsRepository for StubStorage {
    fn get(&self) -> impl Future<Output = Result<Settings, IrrigoError>> + Send {
        let settings = self.data.lock().unwrap().settings.clone();
        async { Ok(settings) }
    }

    fn save(&self, settings: &Settings) -> impl Future<Output = Result<(), IrrigoError>> + Send {
        self.data.lock().unwrap().settings = settings.clone();
        async { Ok(()) }
    }
}

impl HistoryStore for StubStorage {
    fn append(
        &self,
        record: &HistoryRecord,
    ) -> impl Future<Output = Result<(), IrrigoError>> + Send {
        self.data.lock().unwrap().history.push(record.clone());
        async { Ok(()) }
    }

    fn find_since(
        &self,
        room_id: Option<&RoomId>,
        since: Timestamp,
    ) -> impl Future<Output = Result<Vec<HistoryRecord>, IrrigoError>> + Send {
        let records: Vec<HistoryRecord> = self
            .data
            .lock()
            .unwrap()
            .history
            .iter()
            .rev()
            .filter(|record| record.timestamp >= since)
            .filter(|record| room_id.is_none_or(|id| &record.room_id == id))
            .cloned()
            .collect();
        async { Ok(records) }
    }

    fn purge_before(
        &self,
        cutoff: Timestamp,
    ) -> impl Future<Output = Result<u64, IrrigoError>> + Send {
        let mut data = self.data.lock().unwrap();
        let before = data.history.len();
        data.history.retain(|record| record.timestamp >= cutoff);
        let removed = u64::try_from(before - data.history.len()).unwrap();
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
        let metrics = self.data.lock().unwrap().metrics;
        async move { Ok(metrics) }
    }

    fn reset_cycle_metrics(&self) -> impl Future<Output = Result<(), IrrigoError>> + Send {
        self.data.lock().unwrap().metrics = CycleMetrics::default();
        async { Ok(()) }
    }
}

/// Every entity exists and is off; entities listed in `broken` refuse commands.
#[derive(Default)]
pub(crate) struct StubHardware {
    broken: Mutex<HashSet<EntityRef>>,
}

impl StubHardware {
    pub(crate) fn break_entity(&self, entity: &str) {
        self.broken
            .lock()
            .unwrap()
            .insert(EntityRef::parse(entity).unwrap());
    }

    fn switch(&self, entity: &EntityRef, command: SwitchCommand) -> Result<(), IrrigoError> {
        if self.broken.lock().unwrap().contains(entity) {
            return Err(HardwareControlError {
                entity: entity.to_string(),
                command,
                reason: "switch refused the command".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl HardwareControl for StubHardware {
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
        _entity: &EntityRef,
    ) -> impl Future<Output = Result<Option<EntityState>, IrrigoError>> + Send {
        async { Ok(Some(EntityState::Off)) }
    }
}

pub(crate) struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(
        &self,
        _message: &str,
        _title: &str,
        _category: NotificationCategory,
    ) -> impl Future<Output = Result<(), IrrigoError>> + Send {
        async { Ok(()) }
    }
}

pub(crate) fn entity(value: &str) -> EntityRef {
    EntityRef::parse(value).unwrap()
}

/// Room `veg` with two zones and an unscheduled P1 event of two shots.
pub(crate) fn veg_room() -> Room {
    let event = IrrigationEvent::builder(EventType::P1)
        .shot(Shot::new(2, 1).unwrap())
        .shot(Shot::new(3, 0).unwrap())
        .build()
        .unwrap();
    Room::builder(RoomId::new("veg").unwrap(), entity("switch.veg_pump"))
        .name("Veg")
        .zone(entity("switch.veg_zone_1"))
        .zone(entity("switch.veg_zone_2"))
        .event(event)
        .build()
        .unwrap()
}

/// A router over a set-up engine holding `rooms`.
pub(crate) async fn app_with(rooms: Vec<Room>) -> (Router, Arc<StubHardware>) {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let hardware = Arc::new(StubHardware::default());
    let engine = IrrigationEngine::new(
        StubStorage::with_rooms(rooms),
        Arc::clone(&hardware),
        SilentNotifier,
        Arc::clone(&clock),
        Arc::new(TokioTimerService::new(clock)),
        Arc::new(Diagnostics::default()),
        EngineConfig::default(),
    );
    engine.setup().await.unwrap();
    (router::build(AppState::new(engine)), hardware)
}

pub(crate) async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<&str>,
) -> Response<Body> {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.clone().oneshot(request.body(body).unwrap()).await.unwrap()
}

pub(crate) async fn json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
