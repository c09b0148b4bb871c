//! Setup, shutdown, room management and settings.

use std::collections::BTreeMap;
use std::sync::PoisonError;
use std::time::Instant;

use irrigo_domain::error::{IrrigoError, NotFoundError, ValidationError};
use irrigo_domain::event::EventType;
use irrigo_domain::id::RoomId;
use irrigo_domain::room::Room;
use irrigo_domain::settings::Settings;
use irrigo_domain::shot::Shot;

use super::IrrigationEngine;
use crate::ports::{HardwareControl, Notifier, Storage};

impl<S, HW, N> IrrigationEngine<S, HW, N>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    /// Load rooms and settings, reset the daily totals and arm every timer.
    ///
    /// Rooms that fail validation are skipped and recorded as errors.
    ///
    /// # Errors
    ///
    /// Returns a storage error if rooms or settings cannot be loaded.
    #[tracing::instrument(skip(self))]
    pub async fn setup(&self) -> Result<(), IrrigoError> {
        let started = Instant::now();

        let settings = self.storage.get().await?;
        let settings = match settings.validate() {
            Ok(()) => settings,
            Err(err) => {
                self.record_error("setup", &err.into(), &[]);
                Settings::default()
            }
        };
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings;

        let mut rooms = BTreeMap::new();
        for room in self.storage.get_all().await? {
            match room.validate() {
                Ok(()) => {
                    rooms.insert(room.id.clone(), room);
                }
                Err(err) => {
                    self.record_error("setup", &err.into(), &[("room_id", room.id.to_string())]);
                }
            }
        }
        let room_ids: Vec<RoomId> = rooms.keys().cloned().collect();
        *self.rooms.write().unwrap_or_else(PoisonError::into_inner) = rooms;

        self.totals.reset_for(self.clock.local_now().date());
        for room_id in &room_ids {
            self.arm_room(room_id);
        }
        self.arm_daily_reset();

        self.diagnostics
            .performance
            .record("setup", started.elapsed());
        tracing::info!(
            rooms = room_ids.len(),
            scheduled_events = self.timers.armed_events(),
            "irrigation engine ready"
        );
        Ok(())
    }

    /// Cancel every timer and stop every active run.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) {
        self.timers.cancel_all();
        for (room_id, _) in self.registry.active() {
            if self.registry.request_stop(&room_id).is_some()
                && let Some(room) = self.cached_room(&room_id)
            {
                self.sequencer.shut_off(&room).await;
            }
        }
        tracing::info!("irrigation engine stopped");
    }

    /// Look up a room.
    ///
    /// # Errors
    ///
    /// Returns [`IrrigoError::NotFound`] when no room with `room_id` exists.
    pub fn get_room(&self, room_id: &RoomId) -> Result<Room, IrrigoError> {
        self.cached_room(room_id)
            .ok_or_else(|| NotFoundError::room(room_id).into())
    }

    #[must_use]
    pub fn list_rooms(&self) -> Vec<Room> {
        self.cached_rooms()
    }

    /// Validate, persist and arm a new room.
    ///
    /// # Errors
    ///
    /// Returns [`IrrigoError::Validation`] if invariants fail or the id is
    /// taken, or a storage error from the repository.
    #[tracing::instrument(skip(self, room), fields(room_id = %room.id))]
    pub async fn add_room(&self, room: Room) -> Result<Room, IrrigoError> {
        room.validate()?;
        if self.cached_room(&room.id).is_some() {
            return Err(ValidationError::DuplicateRoom(room.id.to_string()).into());
        }
        let room = self.storage.create(room).await?;
        self.rooms
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(room.id.clone(), room.clone());
        self.arm_room(&room.id);
        tracing::info!("room added");
        Ok(self.cached_room(&room.id).unwrap_or(room))
    }

    /// Replace a room and re-arm its timers.
    ///
    /// # Errors
    ///
    /// Returns [`IrrigoError::Validation`] if invariants fail,
    /// [`IrrigoError::NotFound`] if the room does not exist, or a storage
    /// error from the repository.
    #[tracing::instrument(skip(self, room), fields(room_id = %room.id))]
    pub async fn update_room(&self, room: Room) -> Result<Room, IrrigoError> {
        room.validate()?;
        if self.cached_room(&room.id).is_none() {
            return Err(NotFoundError::room(&room.id).into());
        }
        let room = self.storage.update(room).await?;
        self.rooms
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(room.id.clone(), room.clone());
        self.arm_room(&room.id);
        tracing::info!("room updated");
        Ok(self.cached_room(&room.id).unwrap_or(room))
    }

    /// Stop any active run, cancel the room's timers and delete it.
    ///
    /// # Errors
    ///
    /// Returns [`IrrigoError::NotFound`] if the room does not exist, or a
    /// storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn delete_room(&self, room_id: &RoomId) -> Result<(), IrrigoError> {
        if self.cached_room(room_id).is_none() {
            return Err(NotFoundError::room(room_id).into());
        }
        if let Some(active) = self.registry.conflict(room_id) {
            tracing::info!(?active, "stopping active run before deleting room");
            if let Err(err) = self.emergency_stop_room(room_id).await {
                tracing::warn!(error = %err, "hardware shutdown incomplete while deleting room");
            }
        }
        self.timers.cancel_room_events(room_id);
        self.storage.delete(room_id).await?;
        self.rooms
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(room_id);
        self.totals.forget(room_id);
        tracing::info!("room deleted");
        Ok(())
    }

    /// Enable or disable one event of a room.
    ///
    /// # Errors
    ///
    /// Returns [`IrrigoError::NotFound`] for an unknown room or event, or a
    /// storage error from the repository.
    pub async fn set_event_enabled(
        &self,
        room_id: &RoomId,
        event_type: EventType,
        enabled: bool,
    ) -> Result<Room, IrrigoError> {
        self.edit_event(room_id, event_type, |event| {
            event.enabled = enabled;
            Ok(())
        })
        .await
    }

    /// Append a shot to an event.
    ///
    /// # Errors
    ///
    /// Returns [`IrrigoError::Validation`] when the event is full,
    /// [`IrrigoError::NotFound`] for an unknown room or event, or a storage
    /// error from the repository.
    pub async fn add_shot(
        &self,
        room_id: &RoomId,
        event_type: EventType,
        shot: Shot,
    ) -> Result<Room, IrrigoError> {
        self.edit_event(room_id, event_type, |event| event.add_shot(shot))
            .await
    }

    /// Remove the shot at `index` from an event.
    ///
    /// # Errors
    ///
    /// Returns [`IrrigoError::Validation`] for a bad index or when removing
    /// the last shot, [`IrrigoError::NotFound`] for an unknown room or
    /// event, or a storage error from the repository.
    pub async fn remove_shot(
        &self,
        room_id: &RoomId,
        event_type: EventType,
        index: usize,
    ) -> Result<Room, IrrigoError> {
        self.edit_event(room_id, event_type, |event| {
            event.remove_shot(index).map(|_| ())
        })
        .await
    }

    /// Replace the shot at `index` of an event.
    ///
    /// # Errors
    ///
    /// Returns [`IrrigoError::Validation`] for a bad index,
    /// [`IrrigoError::NotFound`] for an unknown room or event, or a storage
    /// error from the repository.
    pub async fn update_shot(
        &self,
        room_id: &RoomId,
        event_type: EventType,
        index: usize,
        shot: Shot,
    ) -> Result<Room, IrrigoError> {
        self.edit_event(room_id, event_type, |event| event.update_shot(index, shot))
            .await
    }

    /// Validate, persist and apply new settings.
    ///
    /// # Errors
    ///
    /// Returns [`IrrigoError::Validation`] for out-of-range values, or a
    /// storage error from the repository.
    #[tracing::instrument(skip(self, settings))]
    pub async fn update_settings(&self, settings: Settings) -> Result<Settings, IrrigoError> {
        settings.validate()?;
        self.storage.save(&settings).await?;
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings.clone();
        tracing::info!("settings updated");
        Ok(settings)
    }

    async fn edit_event(
        &self,
        room_id: &RoomId,
        event_type: EventType,
        edit: impl FnOnce(&mut irrigo_domain::event::IrrigationEvent) -> Result<(), ValidationError>,
    ) -> Result<Room, IrrigoError> {
        let mut room = self.get_room(room_id)?;
        let event = room
            .event_mut(event_type)
            .ok_or_else(|| NotFoundError::event(room_id, event_type))?;
        edit(event)?;
        room.validate()?;
        self.update_room(room).await
    }
}
