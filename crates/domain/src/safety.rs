//! Fail-safe verdicts.
//!
//! A blocked run is an ordinary outcome, not an error: every gate returns a
//! [`Verdict`] and the first [`BlockReason`] short-circuits the pipeline.

use std::fmt;

use serde::Serialize;

use crate::entity::EntityRef;

/// Outcome of the fail-safe pipeline.
pub type Verdict = Result<(), BlockReason>;

/// The gate that produced a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailSafeCheck {
    LightSchedule,
    EntityAvailability,
    Overwatering,
    IrrigationConflict,
    SystemError,
}

impl fmt::Display for FailSafeCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LightSchedule => "light_schedule",
            Self::EntityAvailability => "entity_availability",
            Self::Overwatering => "overwatering",
            Self::IrrigationConflict => "irrigation_conflict",
            Self::SystemError => "system_error",
        })
    }
}

/// Which kind of run already occupies a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    ScheduledRun,
    ManualRun,
}

/// Why a run was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum BlockReason {
    LightUnavailable {
        light: EntityRef,
    },
    LightScheduleConflict {
        light: EntityRef,
    },
    /// Each entry is `<role>: <entity>`.
    EntitiesUnavailable {
        entities: Vec<String>,
    },
    Overwatering {
        daily_total: u32,
        requested: u32,
        limit: u32,
        remaining: u32,
    },
    IrrigationConflict {
        active: ConflictKind,
    },
    SystemError {
        message: String,
    },
}

impl BlockReason {
    /// Build an overwatering block, saturating the remaining allowance at zero.
    #[must_use]
    pub fn overwatering(daily_total: u32, requested: u32, limit: u32) -> Self {
        Self::Overwatering {
            daily_total,
            requested,
            limit,
            remaining: limit.saturating_sub(daily_total),
        }
    }

    #[must_use]
    pub fn check(&self) -> FailSafeCheck {
        match self {
            Self::LightUnavailable { .. } | Self::LightScheduleConflict { .. } => {
                FailSafeCheck::LightSchedule
            }
            Self::EntitiesUnavailable { .. } => FailSafeCheck::EntityAvailability,
            Self::Overwatering { .. } => FailSafeCheck::Overwatering,
            Self::IrrigationConflict { .. } => FailSafeCheck::IrrigationConflict,
            Self::SystemError { .. } => FailSafeCheck::SystemError,
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LightUnavailable { light } => write!(f, "Light entity {light} is unavailable"),
            Self::LightScheduleConflict { .. } => {
                f.write_str("Irrigation blocked: lights are off (light schedule conflict)")
            }
            Self::EntitiesUnavailable { entities } => {
                write!(f, "Unavailable entities: {}", entities.join(", "))
            }
            Self::Overwatering {
                remaining, limit, ..
            } => write!(
                f,
                "Daily irrigation limit exceeded. Remaining: {remaining}s of {limit}s"
            ),
            Self::IrrigationConflict {
                active: ConflictKind::ScheduledRun,
            } => f.write_str("Scheduled irrigation already active for this room"),
            Self::IrrigationConflict {
                active: ConflictKind::ManualRun,
            } => f.write_str("Manual irrigation run already active for this room"),
            Self::SystemError { message } => write!(f, "Fail-safe system error: {message}"),
        }
    }
}
