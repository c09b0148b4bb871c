//! Execution state of a room and the outcome of a run request.

use std::fmt;

use serde::Serialize;

use crate::error::ErrorKind;
use crate::event::EventType;
use crate::safety::BlockReason;
use crate::shot::Shot;
use crate::time::Timestamp;

/// Step of the shot state machine a scheduled run is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotPhase {
    PumpActivating,
    PumpStabilizing,
    ZonesActivating,
    Watering,
    ZonesDeactivating,
    PumpDeactivating,
    Interval,
}

/// Progress of a cron-fired or hand-triggered event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledRun {
    pub event_type: EventType,
    pub shots: Vec<Shot>,
    pub current_shot_index: usize,
    pub shot_start_time: Option<Timestamp>,
    pub shot_duration: u32,
    pub phase: ShotPhase,
    pub started_at: Timestamp,
}

impl ScheduledRun {
    #[must_use]
    pub fn new(event_type: EventType, shots: Vec<Shot>, started_at: Timestamp) -> Self {
        let shot_duration = shots.first().map_or(0, Shot::duration);
        Self {
            event_type,
            shots,
            current_shot_index: 0,
            shot_start_time: None,
            shot_duration,
            phase: ShotPhase::PumpActivating,
            started_at,
        }
    }

    #[must_use]
    pub fn total_shots(&self) -> usize {
        self.shots.len()
    }

    /// Share of shots already started, in `0.0..=1.0`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self) -> f64 {
        if self.shots.is_empty() {
            return 0.0;
        }
        (self.current_shot_index + 1) as f64 / self.shots.len() as f64
    }
}

/// Fixed-duration manual watering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManualRun {
    pub duration: u32,
    pub start_time: Timestamp,
}

impl ManualRun {
    /// Seconds left at `now`, never negative.
    #[must_use]
    pub fn remaining(&self, now: Timestamp) -> u32 {
        let elapsed = (now - self.start_time).num_seconds().max(0);
        u32::try_from(elapsed).map_or(0, |elapsed| self.duration.saturating_sub(elapsed))
    }
}

/// What a room is doing right now. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExecutionState {
    #[default]
    Idle,
    ScheduledRun(ScheduledRun),
    ManualRun(ManualRun),
}

impl ExecutionState {
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Why a request was refused before any fail-safe check ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    RoomNotFound,
    EventNotFound { event_type: EventType },
    EventDisabled { event_type: EventType },
    InvalidDuration { duration: u32 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoomNotFound => f.write_str("room not found"),
            Self::EventNotFound { event_type } => write!(f, "event {event_type} not found"),
            Self::EventDisabled { event_type } => write!(f, "event {event_type} is disabled"),
            Self::InvalidDuration { duration } => {
                write!(f, "duration {duration}s out of range 1..=3600")
            }
        }
    }
}

/// Result of asking the engine to run something.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// A scheduled event watered every shot.
    Completed { duration: u32 },
    /// A manual run is watering and will stop on its own.
    Started { duration: u32 },
    Blocked { block: BlockReason },
    Rejected { reject: RejectReason },
    /// A stop request ended the run before it finished.
    Stopped,
    Failed { kind: ErrorKind, message: String },
}

impl RunOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Started { .. })
    }
}
