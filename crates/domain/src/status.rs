//! Read-only snapshots reported by the engine.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::event::EventType;
use crate::execution::ExecutionState;
use crate::id::RoomId;
use crate::time::Timestamp;

/// Remaining seconds of a manual run, reported next to its state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomActivity {
    #[serde(flatten)]
    pub state: ExecutionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventSchedule {
    pub enabled: bool,
    pub next_run: Option<Timestamp>,
    pub last_run: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomStatus {
    pub room_id: RoomId,
    pub name: String,
    pub activity: RoomActivity,
    pub daily_total: u32,
    pub events: BTreeMap<EventType, EventSchedule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl HealthStatus {
    /// Healthy without issues, warning up to two, critical beyond.
    #[must_use]
    pub fn from_issue_count(count: usize) -> Self {
        match count {
            0 => Self::Healthy,
            1 | 2 => Self::Warning,
            _ => Self::Critical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemHealth {
    pub status: HealthStatus,
    pub issues: Vec<String>,
    pub rooms: usize,
    pub active_irrigations: usize,
    pub active_manual_runs: usize,
    pub scheduled_events: usize,
    pub fail_safe_enabled: bool,
    pub daily_totals: BTreeMap<RoomId, u32>,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailSafeStatus {
    pub fail_safe_enabled: bool,
    pub emergency_stop_enabled: bool,
    pub max_daily_irrigation_seconds: u32,
    pub daily_totals: BTreeMap<RoomId, u32>,
    pub active_irrigations: usize,
    pub active_manual_runs: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetyReport {
    pub room_id: RoomId,
    pub valid: bool,
    pub issues: Vec<String>,
    pub daily_usage: u32,
    pub daily_limit: u32,
    pub remaining_daily: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_grade_health_by_issue_count() {
        assert_eq!(HealthStatus::from_issue_count(0), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from_issue_count(2), HealthStatus::Warning);
        assert_eq!(HealthStatus::from_issue_count(3), HealthStatus::Critical);
    }

    #[test]
    fn should_flatten_state_into_activity() {
        let activity = RoomActivity {
            state: ExecutionState::Idle,
            remaining: None,
            progress: None,
        };
        let json = serde_json::to_value(&activity).unwrap();
        assert_eq!(json, serde_json::json!({ "state": "idle" }));
    }
}
