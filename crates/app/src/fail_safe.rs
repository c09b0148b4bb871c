//! Fail-safe pipeline: ordered gates run before any actuation.
//!
//! Order: global toggle, light schedule, entity availability, daily budget,
//! conflict. The first block wins. A lookup error on a required entity is a
//! block, never an allow.

use std::sync::Arc;

use irrigo_domain::entity::EntityState;
use irrigo_domain::room::Room;
use irrigo_domain::safety::{BlockReason, Verdict};
use irrigo_domain::settings::Settings;

use crate::conflict::ExecutionRegistry;
use crate::daily_totals::DailyTotals;
use crate::ports::HardwareControl;

pub struct FailSafePipeline<HW> {
    hardware: Arc<HW>,
    totals: Arc<DailyTotals>,
    registry: Arc<ExecutionRegistry>,
}

impl<HW> FailSafePipeline<HW>
where
    HW: HardwareControl + Send + Sync,
{
    pub fn new(hardware: Arc<HW>, totals: Arc<DailyTotals>, registry: Arc<ExecutionRegistry>) -> Self {
        Self {
            hardware,
            totals,
            registry,
        }
    }

    /// Decide whether `room` may water for `duration` seconds.
    pub async fn evaluate(&self, room: &Room, duration: u32, settings: &Settings) -> Verdict {
        if !settings.fail_safe_enabled {
            tracing::debug!(room_id = %room.id, "fail-safes disabled, allowing run");
            return Ok(());
        }

        let verdict = async {
            self.check_light(room).await?;
            self.check_availability(room).await?;
            self.check_budget(room, duration, settings)?;
            self.check_conflict(room)
        }
        .await;

        if let Err(reason) = &verdict {
            tracing::warn!(
                room_id = %room.id,
                check = %reason.check(),
                reason = %reason,
                "fail-safe triggered"
            );
        }
        verdict
    }

    async fn check_light(&self, room: &Room) -> Verdict {
        let Some(light) = &room.light else {
            return Ok(());
        };
        match self.hardware.state(light).await {
            Ok(Some(EntityState::Unavailable)) => Err(BlockReason::LightUnavailable {
                light: light.clone(),
            }),
            Ok(Some(EntityState::Off)) => Err(BlockReason::LightScheduleConflict {
                light: light.clone(),
            }),
            Ok(_) => Ok(()),
            Err(err) => {
                tracing::debug!(entity = %light, error = %err, "light lookup failed, no constraint");
                Ok(())
            }
        }
    }

    async fn check_availability(&self, room: &Room) -> Verdict {
        let mut unavailable = Vec::new();
        for (role, entity) in room.actuators() {
            match self.hardware.state(entity).await {
                Ok(Some(state)) if state.is_available() => {}
                Ok(_) => unavailable.push(format!("{role}: {entity}")),
                Err(err) => {
                    return Err(BlockReason::SystemError {
                        message: format!("availability lookup for {entity} failed: {err}"),
                    });
                }
            }
        }
        if unavailable.is_empty() {
            Ok(())
        } else {
            Err(BlockReason::EntitiesUnavailable {
                entities: unavailable,
            })
        }
    }

    fn check_budget(&self, room: &Room, duration: u32, settings: &Settings) -> Verdict {
        let daily_total = self.totals.get(&room.id);
        let limit = settings.max_daily_irrigation_seconds;
        if daily_total.saturating_add(duration) > limit {
            return Err(BlockReason::overwatering(daily_total, duration, limit));
        }
        Ok(())
    }

    fn check_conflict(&self, room: &Room) -> Verdict {
        match self.registry.conflict(&room.id) {
            Some(active) => Err(BlockReason::IrrigationConflict { active }),
            None => Ok(()),
        }
    }
}
