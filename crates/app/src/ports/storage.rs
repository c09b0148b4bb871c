//! Storage port: repository traits for persistence.

use std::future::Future;

use irrigo_domain::error::IrrigoError;
use irrigo_domain::history::{CycleMetrics, HistoryRecord};
use irrigo_domain::id::RoomId;
use irrigo_domain::room::Room;
use irrigo_domain::settings::Settings;
use irrigo_domain::time::Timestamp;

/// Repository for persisting and querying [`Room`]s, events and shots included.
pub trait RoomRepository {
    /// Create a new room in storage.
    fn create(&self, room: Room) -> impl Future<Output = Result<Room, IrrigoError>> + Send;

    /// Get a room by its identifier.
    fn get_by_id(
        &self,
        id: &RoomId,
    ) -> impl Future<Output = Result<Option<Room>, IrrigoError>> + Send;

    /// Get all rooms.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Room>, IrrigoError>> + Send;

    /// Replace an existing room.
    fn update(&self, room: Room) -> impl Future<Output = Result<Room, IrrigoError>> + Send;

    /// Delete a room by its identifier.
    fn delete(&self, id: &RoomId) -> impl Future<Output = Result<(), IrrigoError>> + Send;
}

/// Single-row store for the runtime [`Settings`].
pub trait SettingsRepository {
    /// Load the settings, falling back to defaults when none were saved.
    fn get(&self) -> impl Future<Output = Result<Settings, IrrigoError>> + Send;

    /// Persist new settings.
    fn save(&self, settings: &Settings) -> impl Future<Output = Result<(), IrrigoError>> + Send;
}

/// Append-only irrigation history plus cycle counters.
pub trait HistoryStore {
    /// Append a record.
    fn append(&self, record: &HistoryRecord)
    -> impl Future<Output = Result<(), IrrigoError>> + Send;

    /// Records newer than `since`, optionally filtered by room, newest first.
    fn find_since(
        &self,
        room: Option<&RoomId>,
        since: Timestamp,
    ) -> impl Future<Output = Result<Vec<HistoryRecord>, IrrigoError>> + Send;

    /// Drop records older than `before`. Returns how many were removed.
    fn purge_before(
        &self,
        before: Timestamp,
    ) -> impl Future<Output = Result<u64, IrrigoError>> + Send;

    /// Count one scheduled cycle.
    fn record_cycle(
        &self,
        success: bool,
        duration: u32,
    ) -> impl Future<Output = Result<(), IrrigoError>> + Send;

    fn cycle_metrics(&self) -> impl Future<Output = Result<CycleMetrics, IrrigoError>> + Send;

    fn reset_cycle_metrics(&self) -> impl Future<Output = Result<(), IrrigoError>> + Send;
}

/// Everything the engine persists, behind one type parameter.
pub trait Storage: RoomRepository + SettingsRepository + HistoryStore {}

impl<T: RoomRepository + SettingsRepository + HistoryStore> Storage for T {}
