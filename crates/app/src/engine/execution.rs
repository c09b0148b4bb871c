//! Scheduled and manual runs.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::Instrument;

use irrigo_domain::error::IrrigoError;
use irrigo_domain::event::EventType;
use irrigo_domain::execution::{ExecutionState, ManualRun, RejectReason, RunOutcome, ScheduledRun};
use irrigo_domain::history::{HistoryRecord, RunKind};
use irrigo_domain::id::{RoomId, RunId};
use irrigo_domain::room::Room;
use irrigo_domain::safety::BlockReason;
use irrigo_domain::shot::MAX_SHOT_DURATION;
use irrigo_domain::time::Timestamp;

use super::IrrigationEngine;
use crate::ports::{HardwareControl, Notifier, Storage, TimerTask};
use crate::scheduler::TimerKey;
use crate::sequencer::SequenceOutcome;

impl<S, HW, N> IrrigationEngine<S, HW, N>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    /// Run every shot of an event now, through the fail-safe pipeline.
    ///
    /// Returns once the whole sequence has finished, failed or been stopped.
    /// The sequence runs on its own task: a caller that stops waiting does
    /// not interrupt it, and the room is still closed and released.
    #[tracing::instrument(skip(self), fields(room_id = %room_id, event_type = %event_type))]
    pub async fn execute_scheduled_event(
        &self,
        room_id: &RoomId,
        event_type: EventType,
    ) -> RunOutcome {
        let started = Instant::now();
        let room_id = room_id.clone();
        let outcome = self
            .on_own_task("execute_scheduled_event", move |engine| async move {
                engine.run_scheduled(&room_id, event_type).await
            })
            .await;
        self.diagnostics
            .performance
            .record("execute_scheduled_event", started.elapsed());
        outcome
    }

    async fn run_scheduled(&self, room_id: &RoomId, event_type: EventType) -> RunOutcome {
        let Some(room) = self.cached_room(room_id) else {
            tracing::error!("room not found");
            return rejected(RejectReason::RoomNotFound);
        };
        let Some(event) = room.event(event_type).cloned() else {
            tracing::error!("event not found");
            return rejected(RejectReason::EventNotFound { event_type });
        };
        if !event.enabled {
            tracing::warn!("event is disabled");
            return rejected(RejectReason::EventDisabled { event_type });
        }

        let kind = RunKind::Event(event_type);
        if room.zones.is_empty() {
            let err = IrrigoError::Configuration(format!("room {room_id} has no zones configured"));
            return self
                .fail_run(&room, kind, "execute_scheduled_event", &err, true)
                .await;
        }

        let settings = self.settings();
        let total = event.total_duration();
        let state = ExecutionState::ScheduledRun(ScheduledRun::new(
            event_type,
            event.shots().to_vec(),
            self.clock.now(),
        ));
        let run_id = match self.admit(&room, total, state).await {
            Ok(run_id) => run_id,
            Err(reason) => {
                self.record_block(&room, kind, &reason).await;
                self.notify_error(&room, &format!("Irrigation blocked by fail-safe: {reason}"))
                    .await;
                return RunOutcome::Blocked { block: reason };
            }
        };

        tracing::info!(shots = event.shots().len(), total_duration = total, "starting irrigation");
        let stabilization = Duration::from_secs(u64::from(settings.pump_zone_delay_seconds));
        let outcome = self
            .sequencer
            .run_shots(&room, run_id, event.shots(), stabilization)
            .await;
        self.registry.remove_run(room_id, run_id);

        match outcome {
            SequenceOutcome::Completed => {
                let now = self.clock.now();
                let daily_total = self.totals.add(room_id, total);
                self.record_history(HistoryRecord::success(room_id.clone(), kind, total, now))
                    .await;
                self.record_cycle(true, total).await;
                self.mark_last_run(room_id, event_type, now).await;
                tracing::info!(duration = total, daily_total, "irrigation completed");
                RunOutcome::Completed { duration: total }
            }
            SequenceOutcome::ExternallyStopped => {
                self.record_history(HistoryRecord::failure(
                    room_id.clone(),
                    kind,
                    0,
                    "stopped before completion",
                    self.clock.now(),
                ))
                .await;
                self.record_cycle(false, 0).await;
                tracing::info!("irrigation stopped before completion");
                RunOutcome::Stopped
            }
            SequenceOutcome::Failed(err) => {
                let outcome = self
                    .fail_run(&room, kind, "execute_scheduled_event", &err, true)
                    .await;
                self.spawn_recovery(err, room_id);
                outcome
            }
        }
    }

    /// Water a room for a fixed duration. Returns as soon as water flows;
    /// an auto-stop timer closes the room after `duration` seconds.
    ///
    /// `None` uses the default manual duration from the settings. Like a
    /// scheduled run, the start sequence survives a caller that goes away.
    #[tracing::instrument(skip(self), fields(room_id = %room_id))]
    pub async fn start_manual_run(&self, room_id: &RoomId, duration: Option<u32>) -> RunOutcome {
        let started = Instant::now();
        let room_id = room_id.clone();
        let outcome = self
            .on_own_task("start_manual_run", move |engine| async move {
                engine.run_manual(&room_id, duration).await
            })
            .await;
        self.diagnostics
            .performance
            .record("start_manual_run", started.elapsed());
        outcome
    }

    async fn run_manual(&self, room_id: &RoomId, duration: Option<u32>) -> RunOutcome {
        let Some(room) = self.cached_room(room_id) else {
            tracing::error!("room not found");
            return rejected(RejectReason::RoomNotFound);
        };
        let settings = self.settings();
        let duration = duration.unwrap_or(settings.default_manual_duration_seconds);
        if duration == 0 || duration > MAX_SHOT_DURATION {
            tracing::warn!(duration, "manual duration out of range");
            return rejected(RejectReason::InvalidDuration { duration });
        }
        if room.zones.is_empty() {
            let err = IrrigoError::Configuration(format!("room {room_id} has no zones configured"));
            return self
                .fail_run(&room, RunKind::Manual, "start_manual_run", &err, false)
                .await;
        }

        let state = ExecutionState::ManualRun(ManualRun {
            duration,
            start_time: self.clock.now(),
        });
        let run_id = match self.admit(&room, duration, state).await {
            Ok(run_id) => run_id,
            Err(reason) => {
                self.record_block(&room, RunKind::Manual, &reason).await;
                return RunOutcome::Blocked { block: reason };
            }
        };

        let stabilization = Duration::from_secs(u64::from(settings.pump_zone_delay_seconds));
        match self
            .sequencer
            .start_watering(&room, run_id, stabilization)
            .await
        {
            SequenceOutcome::Completed => {
                if !self.registry.release(room_id, run_id) {
                    // Stopped while the zones were opening.
                    self.sequencer.shut_off(&room).await;
                    self.registry.remove_run(room_id, run_id);
                    return RunOutcome::Stopped;
                }
                let now = self.clock.now();
                let stop_at = now + chrono::Duration::seconds(i64::from(duration));
                self.arm_manual_stop(room_id, run_id, stop_at);
                let daily_total = self.totals.add(room_id, duration);
                self.record_history(HistoryRecord::success(
                    room_id.clone(),
                    RunKind::Manual,
                    duration,
                    now,
                ))
                .await;
                tracing::info!(duration, daily_total, "manual run started");
                RunOutcome::Started { duration }
            }
            SequenceOutcome::ExternallyStopped => {
                self.registry.remove_run(room_id, run_id);
                RunOutcome::Stopped
            }
            SequenceOutcome::Failed(err) => {
                self.registry.remove_run(room_id, run_id);
                self.fail_run(&room, RunKind::Manual, "start_manual_run", &err, false)
                    .await
            }
        }
    }

    /// Drive `job` on a task of its own and wait for it.
    async fn on_own_task<F, Fut>(&self, operation: &'static str, job: F) -> RunOutcome
    where
        F: FnOnce(Arc<Self>) -> Fut,
        Fut: Future<Output = RunOutcome> + Send + 'static,
    {
        let Some(engine) = self.this.upgrade() else {
            let err = IrrigoError::Service("engine is shutting down".to_string());
            return RunOutcome::Failed {
                kind: err.kind(),
                message: err.to_string(),
            };
        };
        match tokio::spawn(job(engine).in_current_span()).await {
            Ok(outcome) => outcome,
            Err(join) => {
                let err = IrrigoError::Service(format!("run task ended abnormally: {join}"));
                self.record_error(operation, &err, &[]);
                RunOutcome::Failed {
                    kind: err.kind(),
                    message: err.to_string(),
                }
            }
        }
    }

    /// Take the room's gate, run the fail-safe pipeline and register the
    /// execution without letting another start slip in between.
    async fn admit(
        &self,
        room: &Room,
        duration: u32,
        state: ExecutionState,
    ) -> Result<RunId, BlockReason> {
        let _gate = self.registry.gate(&room.id).await;
        let settings = self.settings();
        self.pipeline.evaluate(room, duration, &settings).await?;
        self.registry
            .try_insert(&room.id, state)
            .map_err(|active| BlockReason::IrrigationConflict { active })
    }

    fn arm_manual_stop(&self, room_id: &RoomId, run_id: RunId, at: Timestamp) {
        let engine = self.this.clone();
        let task_room = room_id.clone();
        let task: TimerTask = Box::pin(async move {
            if let Some(engine) = engine.upgrade() {
                engine.finish_manual_run(task_room, run_id).await;
            }
        });
        self.timers.install(TimerKey::manual_stop(room_id), at, task);
    }

    /// Auto-stop body. Ignored when the run it was armed for is gone.
    fn finish_manual_run(self: Arc<Self>, room_id: RoomId, run_id: RunId) -> TimerTask {
        Box::pin(async move {
            if self.registry.is_current(&room_id, run_id) {
                tracing::info!(room_id = %room_id, "manual run finished");
                self.stop_manual(&room_id).await;
            }
        })
    }

    async fn record_block(&self, room: &Room, kind: RunKind, reason: &BlockReason) {
        self.record_history(HistoryRecord::failure(
            room.id.clone(),
            kind,
            0,
            reason.to_string(),
            self.clock.now(),
        ))
        .await;
    }

    /// Record, persist and notify a failed run.
    async fn fail_run(
        &self,
        room: &Room,
        kind: RunKind,
        operation: &'static str,
        err: &IrrigoError,
        count_cycle: bool,
    ) -> RunOutcome {
        self.record_error(
            operation,
            err,
            &[("room_id", room.id.to_string()), ("kind", kind.to_string())],
        );
        let message = err.to_string();
        self.record_history(HistoryRecord::failure(
            room.id.clone(),
            kind,
            0,
            message.clone(),
            self.clock.now(),
        ))
        .await;
        if count_cycle {
            self.record_cycle(false, 0).await;
        }
        self.notify_error(room, &format!("Irrigation failed: {message}"))
            .await;
        RunOutcome::Failed {
            kind: err.kind(),
            message,
        }
    }

    async fn mark_last_run(
        &self,
        room_id: &RoomId,
        event_type: EventType,
        at: Timestamp,
    ) {
        let updated = self.with_cached_room(room_id, |room| {
            if let Some(event) = room.event_mut(event_type) {
                event.last_run = Some(at);
            }
            room.clone()
        });
        if let Some(room) = updated
            && let Err(err) = self.storage.update(room).await
        {
            self.record_error("mark_last_run", &err, &[("room_id", room_id.to_string())]);
        }
    }
}

fn rejected(reject: RejectReason) -> RunOutcome {
    RunOutcome::Rejected { reject }
}
