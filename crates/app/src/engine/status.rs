//! Status snapshots, safety validation and diagnostics.

use std::collections::BTreeMap;
use std::sync::PoisonError;

use irrigo_domain::diagnostics::{ErrorStatistics, OperationStats};
use irrigo_domain::entity::EntityRef;
use irrigo_domain::error::{IrrigoError, NotFoundError};
use irrigo_domain::execution::ExecutionState;
use irrigo_domain::history::{CycleMetrics, HistoryRecord};
use irrigo_domain::id::RoomId;
use irrigo_domain::status::{
    EventSchedule, FailSafeStatus, HealthStatus, RoomActivity, RoomStatus, SafetyReport,
    SystemHealth,
};

use super::IrrigationEngine;
use crate::ports::{HardwareControl, Notifier, Storage};

const SCHEDULED_RUN_STALE_AFTER: chrono::Duration = chrono::Duration::hours(2);
const MANUAL_RUN_STALE_AFTER: chrono::Duration = chrono::Duration::hours(1);

impl<S, HW, N> IrrigationEngine<S, HW, N>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    /// Current activity, daily total and schedule of a room.
    ///
    /// # Errors
    ///
    /// Returns [`IrrigoError::NotFound`] for an unknown room.
    pub fn room_status(&self, room_id: &RoomId) -> Result<RoomStatus, IrrigoError> {
        let room = self.get_room(room_id)?;
        let state = self.registry.state(room_id);
        let activity = match &state {
            ExecutionState::Idle => RoomActivity {
                state,
                remaining: None,
                progress: None,
            },
            ExecutionState::ScheduledRun(run) => RoomActivity {
                progress: Some(run.progress()),
                remaining: None,
                state,
            },
            ExecutionState::ManualRun(run) => RoomActivity {
                remaining: Some(run.remaining(self.clock.now())),
                progress: None,
                state,
            },
        };
        let events = room
            .events()
            .iter()
            .filter(|event| event.enabled)
            .map(|event| {
                (
                    event.event_type,
                    EventSchedule {
                        enabled: event.enabled,
                        next_run: event.next_run,
                        last_run: event.last_run,
                    },
                )
            })
            .collect();

        Ok(RoomStatus {
            room_id: room.id,
            name: room.name,
            activity,
            daily_total: self.totals.get(room_id),
            events,
        })
    }

    /// Overall health with the issues that degrade it.
    #[must_use]
    pub fn system_health(&self) -> SystemHealth {
        let now = self.clock.now();
        let settings = self.settings();
        let mut issues = Vec::new();

        for (room_id, state) in self.registry.active() {
            match state {
                ExecutionState::ScheduledRun(run) if now - run.started_at > SCHEDULED_RUN_STALE_AFTER => {
                    issues.push(format!("Long-running irrigation in {room_id}"));
                }
                ExecutionState::ManualRun(run) if now - run.start_time > MANUAL_RUN_STALE_AFTER => {
                    issues.push(format!("Long-running manual run in {room_id}"));
                }
                _ => {}
            }
        }
        let daily_totals = self.totals.snapshot();
        for (room_id, total) in &daily_totals {
            if *total >= settings.max_daily_irrigation_seconds {
                issues.push(format!("Daily irrigation limit reached for {room_id}"));
            }
        }

        let (active_irrigations, active_manual_runs) = self.registry.counts();
        SystemHealth {
            status: HealthStatus::from_issue_count(issues.len()),
            issues,
            rooms: self.rooms.read().unwrap_or_else(PoisonError::into_inner).len(),
            active_irrigations,
            active_manual_runs,
            scheduled_events: self.timers.armed_events(),
            fail_safe_enabled: settings.fail_safe_enabled,
            daily_totals,
            timestamp: now,
        }
    }

    #[must_use]
    pub fn fail_safe_status(&self) -> FailSafeStatus {
        let settings = self.settings();
        let (active_irrigations, active_manual_runs) = self.registry.counts();
        FailSafeStatus {
            fail_safe_enabled: settings.fail_safe_enabled,
            emergency_stop_enabled: settings.emergency_stop_enabled,
            max_daily_irrigation_seconds: settings.max_daily_irrigation_seconds,
            daily_totals: self.totals.snapshot(),
            active_irrigations,
            active_manual_runs,
        }
    }

    /// Check a room's hardware and budget without starting anything.
    ///
    /// # Errors
    ///
    /// Returns [`IrrigoError::NotFound`] for an unknown room.
    pub async fn validate_room_safety(&self, room_id: &RoomId) -> Result<SafetyReport, IrrigoError> {
        let room = self
            .cached_room(room_id)
            .ok_or_else(|| NotFoundError::room(room_id))?;
        let settings = self.settings();
        let mut issues = Vec::new();

        self.check_entity("Pump", &room.pump, &mut issues).await;
        if room.zones.is_empty() {
            issues.push("No zones configured".to_string());
        }
        for zone in &room.zones {
            self.check_entity("Zone", zone, &mut issues).await;
        }
        for sensor in room.sensors.values() {
            self.check_entity("Sensor", sensor, &mut issues).await;
        }
        if let Some(light) = &room.light {
            self.check_entity("Light", light, &mut issues).await;
        }

        let daily_usage = self.totals.get(room_id);
        let daily_limit = settings.max_daily_irrigation_seconds;
        if daily_usage >= daily_limit {
            issues.push(format!(
                "Daily irrigation limit reached ({daily_usage}s / {daily_limit}s)"
            ));
        }

        Ok(SafetyReport {
            room_id: room.id,
            valid: issues.is_empty(),
            issues,
            daily_usage,
            daily_limit,
            remaining_daily: daily_limit.saturating_sub(daily_usage),
        })
    }

    async fn check_entity(&self, role: &str, entity: &EntityRef, issues: &mut Vec<String>) {
        match self.hardware.state(entity).await {
            Ok(Some(state)) if state.is_available() => {}
            Ok(Some(_)) => {
                issues.push(format!("{role} {entity} is unavailable"));
            }
            Ok(None) => issues.push(format!("{role} {entity} not found")),
            Err(err) => issues.push(format!("{role} {entity} could not be checked: {err}")),
        }
    }

    #[must_use]
    pub fn error_statistics(&self) -> ErrorStatistics {
        self.diagnostics.errors.statistics(self.clock.now())
    }

    #[must_use]
    pub fn operation_stats(&self) -> BTreeMap<String, OperationStats> {
        self.diagnostics.performance.stats()
    }

    pub fn clear_error_history(&self) {
        self.diagnostics.errors.clear();
        tracing::info!("error history cleared");
    }

    /// History records of the last `days` days, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the history store.
    pub async fn history(
        &self,
        room_id: Option<&RoomId>,
        days: u32,
    ) -> Result<Vec<HistoryRecord>, IrrigoError> {
        let since = self.clock.now() - chrono::Duration::days(i64::from(days));
        self.storage.find_since(room_id, since).await
    }

    /// # Errors
    ///
    /// Returns a storage error from the history store.
    pub async fn cycle_metrics(&self) -> Result<CycleMetrics, IrrigoError> {
        self.storage.cycle_metrics().await
    }

    /// # Errors
    ///
    /// Returns a storage error from the history store.
    pub async fn reset_cycle_metrics(&self) -> Result<(), IrrigoError> {
        self.storage.reset_cycle_metrics().await?;
        tracing::info!("cycle metrics reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use irrigo_domain::entity::EntityState;
    use irrigo_domain::event::EventType;
    use irrigo_domain::execution::RunOutcome;
    use irrigo_domain::history::RunKind;

    use super::*;
    use crate::testing::{Harness, room_with_light, sample_room, scheduled_event};

    fn veg() -> RoomId {
        RoomId::new("veg").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn should_report_remaining_time_of_manual_run() {
        let harness = Harness::with_rooms(vec![sample_room("veg")]).await;
        harness.engine.start_manual_run(&veg(), Some(300)).await;
        // Stabilisation already took 3 of the 300 seconds.
        tokio::time::sleep(Duration::from_secs(97)).await;

        let status = harness.engine.room_status(&veg()).unwrap();
        assert_eq!(status.activity.remaining, Some(200));
        assert_eq!(status.daily_total, 300);
        assert!(matches!(
            status.activity.state,
            ExecutionState::ManualRun(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn should_list_only_enabled_events_in_status() {
        let mut room = sample_room("veg");
        room.add_event(scheduled_event(EventType::P1, "0 8 * * *"))
            .unwrap();
        let mut p2 = scheduled_event(EventType::P2, "0 9 * * *");
        p2.enabled = false;
        room.add_event(p2).unwrap();
        let harness = Harness::with_rooms(vec![room]).await;

        let status = harness.engine.room_status(&veg()).unwrap();
        assert_eq!(status.events.keys().copied().collect::<Vec<_>>(), vec![EventType::P1]);
        assert!(status.activity.state.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn should_warn_when_room_reaches_daily_limit() {
        let harness = Harness::with_rooms(vec![sample_room("veg")]).await;
        harness.engine.totals.add(&veg(), 3600);

        let health = harness.engine.system_health();
        assert_eq!(health.status, HealthStatus::Warning);
        assert_eq!(health.issues, vec!["Daily irrigation limit reached for veg"]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_flag_manual_run_running_for_over_an_hour() {
        let harness = Harness::with_rooms(vec![sample_room("veg")]).await;
        harness.engine.start_manual_run(&veg(), Some(1800)).await;
        // Cancel the auto-stop so the run outlives its duration.
        harness
            .engine
            .timers
            .cancel(&crate::scheduler::TimerKey::manual_stop(&veg()));
        tokio::time::sleep(Duration::from_secs(3700)).await;

        let health = harness.engine.system_health();
        assert_eq!(health.active_manual_runs, 1);
        assert!(
            health
                .issues
                .contains(&"Long-running manual run in veg".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_report_every_missing_device_when_validating_safety() {
        let room = room_with_light("veg");
        let harness = Harness::with_rooms(vec![room.clone()]).await;
        harness.hardware.forget(&room.zones[0]);
        harness
            .hardware
            .set_state(room.light.as_ref().unwrap(), EntityState::Unavailable);

        let report = harness.engine.validate_room_safety(&veg()).await.unwrap();

        assert!(!report.valid);
        assert_eq!(
            report.issues,
            vec![
                "Zone switch.veg_zone_1 not found".to_string(),
                "Light light.veg_lamp is unavailable".to_string(),
            ]
        );
        assert_eq!(report.remaining_daily, 3600);
    }

    #[tokio::test(start_paused = true)]
    async fn should_pass_safety_validation_when_everything_is_available() {
        let harness = Harness::with_rooms(vec![sample_room("veg")]).await;
        harness.engine.totals.add(&veg(), 600);

        let report = harness.engine.validate_room_safety(&veg()).await.unwrap();

        assert!(report.valid);
        assert_eq!(report.daily_usage, 600);
        assert_eq!(report.remaining_daily, 3000);
    }

    #[tokio::test(start_paused = true)]
    async fn should_query_history_and_metrics_after_runs() {
        let mut room = sample_room("veg");
        room.add_event(scheduled_event(EventType::P1, "0 8 * * *"))
            .unwrap();
        let harness = Harness::with_rooms(vec![room]).await;
        let outcome = harness
            .engine
            .execute_scheduled_event(&veg(), EventType::P1)
            .await;
        assert_eq!(outcome, RunOutcome::Completed { duration: 60 });

        let history = harness.engine.history(Some(&veg()), 7).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, RunKind::Event(EventType::P1));
        let metrics = harness.engine.cycle_metrics().await.unwrap();
        assert_eq!(metrics.successful_cycles, 1);
        assert_eq!(metrics.total_duration, 60);

        harness.engine.reset_cycle_metrics().await.unwrap();
        assert_eq!(
            harness.engine.cycle_metrics().await.unwrap(),
            CycleMetrics::default()
        );
        assert!(harness.engine.operation_stats().contains_key("execute_scheduled_event"));
    }

    #[tokio::test(start_paused = true)]
    async fn should_empty_error_ring_when_cleared() {
        let harness = Harness::with_rooms(vec![sample_room("veg")]).await;
        harness.hardware.fail_activation(&sample_room("veg").pump);
        harness.engine.start_manual_run(&veg(), Some(60)).await;
        assert!(harness.engine.error_statistics().total_errors > 0);

        harness.engine.clear_error_history();

        assert_eq!(harness.engine.error_statistics().total_errors, 0);
    }
}
