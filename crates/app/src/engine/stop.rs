//! Stop and emergency-stop handling.

use std::collections::BTreeMap;

use irrigo_domain::error::{EmergencyStopError, IrrigoError, NotFoundError};
use irrigo_domain::execution::ExecutionState;
use irrigo_domain::id::RoomId;

use super::IrrigationEngine;
use crate::ports::{HardwareControl, NotificationCategory, Notifier, Storage};
use crate::scheduler::TimerKey;

impl<S, HW, N> IrrigationEngine<S, HW, N>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    /// Stop whatever runs in a room. Returns whether anything was running.
    ///
    /// A manual run is closed immediately. A scheduled run finishes its
    /// current shot and then stops before the next one; the room stays
    /// blocked for new runs until that shot has drained.
    #[tracing::instrument(skip(self))]
    pub async fn stop_run(&self, room_id: &RoomId) -> bool {
        match self.registry.request_stop(room_id) {
            Some(ExecutionState::ManualRun(_)) => {
                self.close_manual(room_id).await;
                true
            }
            Some(ExecutionState::ScheduledRun(_)) => {
                tracing::info!("scheduled run will stop at the next shot boundary");
                true
            }
            Some(ExecutionState::Idle) | None => false,
        }
    }

    /// Stop the room's run and close the room as for a manual run.
    pub(super) async fn stop_manual(&self, room_id: &RoomId) -> bool {
        if self.registry.request_stop(room_id).is_none() {
            return false;
        }
        self.close_manual(room_id).await;
        true
    }

    /// Cancel the auto-stop and switch the room off.
    async fn close_manual(&self, room_id: &RoomId) {
        self.timers.cancel(&TimerKey::manual_stop(room_id));
        if let Some(room) = self.cached_room(room_id) {
            let failures = self.sequencer.shut_off(&room).await;
            for failure in &failures {
                self.record_error(
                    "stop_manual_run",
                    &failure.error,
                    &[("room_id", room_id.to_string()), ("operation", failure.operation.clone())],
                );
            }
        }
        tracing::info!(room_id = %room_id, "manual run stopped");
    }

    /// Stop any run and force every zone and the pump of a room off.
    ///
    /// A scheduled sequence caught mid-shot keeps the room blocked until
    /// it reaches its shot boundary.
    ///
    /// # Errors
    ///
    /// Returns [`IrrigoError::NotFound`] for an unknown room, or
    /// [`IrrigoError::EmergencyStop`] listing every device that could not
    /// be turned off.
    #[tracing::instrument(skip(self))]
    pub async fn emergency_stop_room(&self, room_id: &RoomId) -> Result<(), IrrigoError> {
        let room = self
            .cached_room(room_id)
            .ok_or_else(|| NotFoundError::room(room_id))?;
        tracing::warn!("emergency stop");
        self.timers.cancel(&TimerKey::manual_stop(room_id));
        self.registry.request_stop(room_id);

        let failures = self.sequencer.shut_off(&room).await;
        if failures.is_empty() {
            return Ok(());
        }
        let err: IrrigoError = EmergencyStopError {
            scope: format!("room {room_id}"),
            failed_operations: failures.into_iter().map(|f| f.operation).collect(),
        }
        .into();
        self.record_error("emergency_stop_room", &err, &[("room_id", room_id.to_string())]);
        self.notify_error(&room, &err.to_string()).await;
        Err(err)
    }

    /// Emergency-stop every room, whether it is running or not.
    ///
    /// Keys are `<room>_irrigation` and `<room>_manual` for each cleared
    /// run, and `<room>_safety_shutoff` for each room's device shutdown.
    #[tracing::instrument(skip(self))]
    pub async fn emergency_stop_all(&self) -> BTreeMap<String, bool> {
        tracing::warn!("emergency stop of all rooms");
        let mut results = BTreeMap::new();

        for (room_id, _) in self.registry.active() {
            let suffix = match self.registry.request_stop(&room_id) {
                Some(ExecutionState::ScheduledRun(_)) => "irrigation",
                Some(ExecutionState::ManualRun(_)) => "manual",
                Some(ExecutionState::Idle) | None => continue,
            };
            self.timers.cancel(&TimerKey::manual_stop(&room_id));
            results.insert(format!("{room_id}_{suffix}"), true);
        }

        for room in self.cached_rooms() {
            let ok = self.emergency_stop_room(&room.id).await.is_ok();
            results.insert(format!("{}_safety_shutoff", room.id), ok);
        }

        let failed = results.values().filter(|ok| !**ok).count();
        let message = if failed == 0 {
            "All irrigation has been stopped".to_string()
        } else {
            format!("Emergency stop finished with {failed} failed operation(s)")
        };
        self.notify(&message, "Emergency Stop", NotificationCategory::General)
            .await;
        results
    }
}
