//! Backoff-driven recovery after recoverable failures.

use tracing::Instrument;

use irrigo_domain::error::{ErrorKind, IrrigoError};
use irrigo_domain::id::RoomId;

use super::IrrigationEngine;
use crate::ports::{HardwareControl, Notifier, Storage};

/// What a recovery pass tries to repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOperation {
    /// Force every device of an idle room off.
    HardwareControl,
    /// Wait for entities to settle, then re-check them.
    EntityAvailability,
    /// Re-arm the room's timers.
    Scheduling,
}

impl RecoveryOperation {
    /// The recovery that matches a failure, if there is one.
    #[must_use]
    pub fn for_error(error: &IrrigoError) -> Option<Self> {
        match error.kind() {
            ErrorKind::HardwareControl => Some(Self::HardwareControl),
            ErrorKind::EntityUnavailable => Some(Self::EntityAvailability),
            _ => None,
        }
    }
}

impl<S, HW, N> IrrigationEngine<S, HW, N>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    /// Retry `operation` for a room with exponential backoff.
    ///
    /// Non-recoverable errors are refused outright. Returns whether one of
    /// the attempts succeeded.
    #[tracing::instrument(skip(self, error), fields(kind = %error.kind()))]
    pub async fn attempt_recovery(
        &self,
        operation: RecoveryOperation,
        error: &IrrigoError,
        room_id: &RoomId,
    ) -> bool {
        let kind = error.kind();
        let mut attempt = 1;
        while self.config.retry.should_retry(kind, attempt) {
            let delay = self.config.retry.delay(attempt);
            tracing::info!(attempt, delay_ms = delay.as_millis(), "attempting recovery");
            tokio::time::sleep(delay).await;

            if self.recover_once(operation, room_id).await {
                tracing::info!(attempt, "recovery succeeded");
                return true;
            }
            attempt += 1;
        }
        if kind.is_recoverable() {
            tracing::error!(attempts = attempt - 1, "recovery failed");
        } else {
            tracing::debug!("error is not recoverable");
        }
        false
    }

    /// Start a recovery pass for a failed run in the background, if the
    /// failure has one.
    pub(super) fn spawn_recovery(&self, error: IrrigoError, room_id: &RoomId) {
        let Some(operation) = RecoveryOperation::for_error(&error) else {
            return;
        };
        let Some(engine) = self.this.upgrade() else {
            return;
        };
        let room_id = room_id.clone();
        tokio::spawn(
            async move {
                engine.attempt_recovery(operation, &error, &room_id).await;
            }
            .in_current_span(),
        );
    }

    async fn recover_once(&self, operation: RecoveryOperation, room_id: &RoomId) -> bool {
        match operation {
            RecoveryOperation::HardwareControl => {
                let Some(room) = self.cached_room(room_id) else {
                    return false;
                };
                // Holding the gate keeps new runs out until the reset is done.
                let _gate = self.registry.gate(room_id).await;
                if let Some(active) = self.registry.conflict(room_id) {
                    tracing::info!(?active, "room is running again, hardware reset skipped");
                    return true;
                }
                self.sequencer.shut_off(&room).await.is_empty()
            }
            RecoveryOperation::EntityAvailability => {
                let Some(room) = self.cached_room(room_id) else {
                    return false;
                };
                tokio::time::sleep(self.config.entity_settle_delay).await;
                for (_, entity) in room.actuators() {
                    match self.hardware.state(entity).await {
                        Ok(Some(state)) if state.is_available() => {}
                        _ => return false,
                    }
                }
                true
            }
            RecoveryOperation::Scheduling => {
                if self.cached_room(room_id).is_none() {
                    return false;
                }
                self.arm_room(room_id);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use irrigo_domain::entity::EntityState;
    use irrigo_domain::error::{HardwareControlError, SwitchCommand};
    use irrigo_domain::event::EventType;
    use irrigo_domain::execution::{ExecutionState, RunOutcome};

    use super::*;
    use crate::scheduler::TimerKey;
    use crate::testing::{HardwareCall, Harness, event_with_shots, sample_room, scheduled_event};

    fn veg() -> RoomId {
        RoomId::new("veg").unwrap()
    }

    fn hardware_error() -> IrrigoError {
        HardwareControlError {
            entity: "switch.veg_pump".to_string(),
            command: SwitchCommand::Deactivate,
            reason: "timeout".to_string(),
        }
        .into()
    }

    #[tokio::test(start_paused = true)]
    async fn should_refuse_recovery_for_non_recoverable_errors() {
        let harness = Harness::with_rooms(vec![sample_room("veg")]).await;
        let err = IrrigoError::Configuration("broken".to_string());

        let recovered = harness
            .engine
            .attempt_recovery(RecoveryOperation::HardwareControl, &err, &veg())
            .await;

        assert!(!recovered);
        assert!(harness.hardware.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_reset_hardware_after_backoff() {
        let harness = Harness::with_rooms(vec![sample_room("veg")]).await;
        let started = tokio::time::Instant::now();

        let recovered = harness
            .engine
            .attempt_recovery(RecoveryOperation::HardwareControl, &hardware_error(), &veg())
            .await;

        assert!(recovered);
        // First attempt waits base * 2^1.
        assert_eq!(started.elapsed(), Duration::from_secs(2));
        assert_eq!(
            harness.hardware.calls(),
            vec![
                HardwareCall::Off("switch.veg_zone_1".into()),
                HardwareCall::Off("switch.veg_zone_2".into()),
                HardwareCall::Off("switch.veg_pump".into()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_give_up_after_max_attempts_when_devices_stay_stuck() {
        let room = sample_room("veg");
        let harness = Harness::with_rooms(vec![room.clone()]).await;
        harness.hardware.fail_deactivation(&room.pump);
        let started = tokio::time::Instant::now();

        let recovered = harness
            .engine
            .attempt_recovery(RecoveryOperation::HardwareControl, &hardware_error(), &veg())
            .await;

        assert!(!recovered);
        // 2s + 4s + 8s of backoff, three resets of three devices.
        assert_eq!(started.elapsed(), Duration::from_secs(14));
        assert_eq!(harness.hardware.calls().len(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn should_recover_once_entities_come_back() {
        let room = sample_room("veg");
        let harness = Harness::with_rooms(vec![room.clone()]).await;
        harness.hardware.set_state(&room.pump, EntityState::Unavailable);
        let err = IrrigoError::EntityUnavailable {
            entities: vec![room.pump.to_string()],
        };

        let hardware = Arc::clone(&harness.hardware);
        let pump = room.pump.clone();
        tokio::spawn(async move {
            // Available again before the second attempt checks.
            tokio::time::sleep(Duration::from_secs(10)).await;
            hardware.set_state(&pump, EntityState::Off);
        });

        let recovered = harness
            .engine
            .attempt_recovery(RecoveryOperation::EntityAvailability, &err, &veg())
            .await;

        assert!(recovered);
    }

    #[tokio::test(start_paused = true)]
    async fn should_rearm_room_timers_when_recovering_scheduling() {
        let mut room = sample_room("veg");
        room.add_event(scheduled_event(EventType::P1, "0 8 * * *"))
            .unwrap();
        let harness = Harness::with_rooms(vec![room]).await;
        harness.engine.timers.cancel_room_events(&veg());
        assert_eq!(harness.engine.timers.armed_events(), 0);

        let recovered = harness
            .engine
            .attempt_recovery(
                RecoveryOperation::Scheduling,
                &IrrigoError::Service("timer backend restarted".to_string()),
                &veg(),
            )
            .await;

        assert!(recovered);
        assert_eq!(harness.engine.timers.armed_events(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_run_recovery_after_hardware_failure_in_scheduled_run() {
        let mut room = sample_room("veg");
        room.add_event(scheduled_event(EventType::P1, "0 8 * * *"))
            .unwrap();
        let harness = Harness::with_rooms(vec![room.clone()]).await;
        harness.hardware.fail_activation(&room.pump);

        let outcome = harness
            .engine
            .execute_scheduled_event(&veg(), EventType::P1)
            .await;

        assert!(matches!(
            outcome,
            RunOutcome::Failed {
                kind: ErrorKind::HardwareControl,
                ..
            }
        ));
        // Failed activation and cleanup; recovery waits for its backoff.
        assert_eq!(harness.hardware.calls().len(), 4);
        assert!(harness.engine.registry.state(&veg()).is_idle());
        assert_eq!(harness.notifier.sent().len(), 1);

        tokio::time::sleep(Duration::from_secs(3)).await;
        // One recovery reset.
        assert_eq!(harness.hardware.calls().len(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn should_leave_new_manual_run_alone_when_reset_is_due() {
        let mut room = sample_room("veg");
        room.add_event(event_with_shots(EventType::P1, None, &[(5, 0)]))
            .unwrap();
        let harness = Harness::with_rooms(vec![room.clone()]).await;
        harness.hardware.fail_deactivation(&room.zones[1]);

        let outcome = harness
            .engine
            .execute_scheduled_event(&veg(), EventType::P1)
            .await;
        assert!(matches!(
            outcome,
            RunOutcome::Failed {
                kind: ErrorKind::HardwareControl,
                ..
            }
        ));

        // Started while the first reset is still backing off.
        let manual = harness.engine.start_manual_run(&veg(), Some(600)).await;
        assert_eq!(manual, RunOutcome::Started { duration: 600 });
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert!(matches!(
            harness.engine.registry.state(&veg()),
            ExecutionState::ManualRun(_)
        ));
        assert!(
            harness
                .engine
                .timers
                .is_armed(&TimerKey::manual_stop(&veg()))
        );
        assert_eq!(
            harness.hardware.calls().last(),
            Some(&HardwareCall::On("switch.veg_zone_2".into()))
        );
    }
}
