//! Shot sequencer: the per-room actuation state machine.
//!
//! Per shot: pump on, stabilise, zones on, water, zones off, pump off,
//! optional interval, then a boundary check. Zones always go off before
//! the pump, on the failure path too.

use std::sync::Arc;
use std::time::Duration;

use irrigo_domain::error::{HardwareControlError, IrrigoError, SwitchCommand};
use irrigo_domain::execution::{ExecutionState, ShotPhase};
use irrigo_domain::id::RunId;
use irrigo_domain::room::Room;
use irrigo_domain::shot::Shot;

use crate::conflict::ExecutionRegistry;
use crate::ports::{Clock, HardwareControl};

/// How a sequence ended.
#[derive(Debug)]
pub enum SequenceOutcome {
    Completed,
    /// The execution was cleared by a stop request.
    ExternallyStopped,
    /// Hardware failed; cleanup already ran.
    Failed(IrrigoError),
}

/// A deactivation call that failed while shutting a room off.
#[derive(Debug)]
pub struct DeviceFailure {
    /// `<role>:<entity>`, e.g. `zone:switch.veg_zone_1`.
    pub operation: String,
    pub error: IrrigoError,
}

pub struct ShotSequencer<HW> {
    hardware: Arc<HW>,
    registry: Arc<ExecutionRegistry>,
    clock: Arc<dyn Clock>,
}

impl<HW> ShotSequencer<HW>
where
    HW: HardwareControl + Send + Sync,
{
    pub fn new(hardware: Arc<HW>, registry: Arc<ExecutionRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            hardware,
            registry,
            clock,
        }
    }

    /// Water every shot of a scheduled run.
    pub async fn run_shots(
        &self,
        room: &Room,
        run_id: RunId,
        shots: &[Shot],
        stabilization: Duration,
    ) -> SequenceOutcome {
        let total = shots.len();
        for (index, shot) in shots.iter().enumerate() {
            let started = self.clock.now();
            self.registry.update(&room.id, run_id, |state| {
                if let ExecutionState::ScheduledRun(run) = state {
                    run.current_shot_index = index;
                    run.shot_start_time = Some(started);
                    run.shot_duration = shot.duration();
                    run.phase = ShotPhase::PumpActivating;
                }
            });
            tracing::debug!(
                room_id = %room.id,
                shot = index + 1,
                total,
                duration = shot.duration(),
                "starting shot"
            );

            match self.open(room, run_id, stabilization).await {
                Ok(true) => {}
                Ok(false) => return SequenceOutcome::ExternallyStopped,
                Err(err) => return SequenceOutcome::Failed(err),
            }

            self.set_phase(room, run_id, ShotPhase::Watering);
            tokio::time::sleep(seconds(shot.duration())).await;

            self.set_phase(room, run_id, ShotPhase::ZonesDeactivating);
            let mut failures = self.deactivate_zones(room).await;
            self.set_phase(room, run_id, ShotPhase::PumpDeactivating);
            failures.extend(self.deactivate_pump(room).await);
            if let Some(failure) = failures.into_iter().next() {
                return SequenceOutcome::Failed(failure.error);
            }
            tracing::debug!(room_id = %room.id, shot = index + 1, total, "shot completed");

            if index + 1 < total && shot.interval_after() > 0 {
                self.set_phase(room, run_id, ShotPhase::Interval);
                tokio::time::sleep(seconds(shot.interval_after())).await;
            }

            if !self.registry.is_current(&room.id, run_id) {
                tracing::info!(room_id = %room.id, shot = index + 1, "run stopped at shot boundary");
                return SequenceOutcome::ExternallyStopped;
            }
        }
        SequenceOutcome::Completed
    }

    /// Open the room for a manual run. Returns once zones are watering.
    pub async fn start_watering(
        &self,
        room: &Room,
        run_id: RunId,
        stabilization: Duration,
    ) -> SequenceOutcome {
        match self.open(room, run_id, stabilization).await {
            Ok(true) => SequenceOutcome::Completed,
            Ok(false) => SequenceOutcome::ExternallyStopped,
            Err(err) => SequenceOutcome::Failed(err),
        }
    }

    /// Best-effort shutdown: every zone off, then the pump off.
    pub async fn shut_off(&self, room: &Room) -> Vec<DeviceFailure> {
        let mut failures = self.deactivate_zones(room).await;
        failures.extend(self.deactivate_pump(room).await);
        failures
    }

    /// Pump on, stabilise, zones on. `Ok(false)` when the run was stopped
    /// during stabilisation; the pump is already off again in that case.
    async fn open(
        &self,
        room: &Room,
        run_id: RunId,
        stabilization: Duration,
    ) -> Result<bool, IrrigoError> {
        if let Err(err) = self.hardware.activate(&room.pump).await {
            tracing::error!(room_id = %room.id, entity = %room.pump, error = %err, "pump activation failed");
            self.shut_off(room).await;
            return Err(err);
        }

        self.set_phase(room, run_id, ShotPhase::PumpStabilizing);
        tokio::time::sleep(stabilization).await;

        if !self.registry.is_current(&room.id, run_id) {
            tracing::info!(room_id = %room.id, "run stopped before zones opened");
            self.shut_off(room).await;
            return Ok(false);
        }

        self.set_phase(room, run_id, ShotPhase::ZonesActivating);
        if let Err(err) = self.activate_zones(room).await {
            self.shut_off(room).await;
            return Err(err);
        }
        Ok(true)
    }

    /// Succeeds when at least one zone opened.
    async fn activate_zones(&self, room: &Room) -> Result<usize, IrrigoError> {
        if room.zones.is_empty() {
            return Err(IrrigoError::Configuration(format!(
                "room {} has no zones configured",
                room.id
            )));
        }

        let mut activated = 0;
        for zone in &room.zones {
            match self.hardware.activate(zone).await {
                Ok(()) => activated += 1,
                Err(err) => {
                    tracing::error!(room_id = %room.id, entity = %zone, error = %err, "zone activation failed");
                }
            }
        }

        if activated == 0 {
            return Err(HardwareControlError {
                entity: room
                    .zones
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
                command: SwitchCommand::Activate,
                reason: "no zone could be activated".to_string(),
            }
            .into());
        }
        if activated < room.zones.len() {
            tracing::warn!(
                room_id = %room.id,
                activated,
                total = room.zones.len(),
                "partial zone activation"
            );
        }
        Ok(activated)
    }

    async fn deactivate_zones(&self, room: &Room) -> Vec<DeviceFailure> {
        let mut failures = Vec::new();
        for zone in &room.zones {
            if let Err(error) = self.hardware.deactivate(zone).await {
                tracing::error!(room_id = %room.id, entity = %zone, error = %error, "zone deactivation failed");
                failures.push(DeviceFailure {
                    operation: format!("zone:{zone}"),
                    error,
                });
            }
        }
        failures
    }

    async fn deactivate_pump(&self, room: &Room) -> Option<DeviceFailure> {
        let error = self.hardware.deactivate(&room.pump).await.err()?;
        tracing::error!(room_id = %room.id, entity = %room.pump, error = %error, "pump deactivation failed");
        Some(DeviceFailure {
            operation: format!("pump:{}", room.pump),
            error,
        })
    }

    fn set_phase(&self, room: &Room, run_id: RunId, phase: ShotPhase) {
        self.registry.update(&room.id, run_id, |state| {
            if let ExecutionState::ScheduledRun(run) = state {
                run.phase = phase;
            }
        });
    }
}

fn seconds(value: u32) -> Duration {
    Duration::from_secs(u64::from(value))
}
