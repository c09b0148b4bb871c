//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`IrrigoError`] via `#[from]`. Expected fail-safe outcomes are not
//! errors: they travel as [`BlockReason`](crate::safety::BlockReason)
//! values instead.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event::EventType;

/// Top-level error shared by the application and adapter layers.
#[derive(Debug, thiserror::Error)]
pub enum IrrigoError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("storage error: {0}")]
    Storage(Box<dyn std::error::Error + Send + Sync>),

    #[error("entities unavailable: {}", .entities.join(", "))]
    EntityUnavailable { entities: Vec<String> },

    #[error(transparent)]
    HardwareControl(#[from] HardwareControlError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("scheduling error: {0}")]
    Scheduling(String),

    #[error("service error: {0}")]
    Service(String),

    #[error(transparent)]
    EmergencyStop(#[from] EmergencyStopError),
}

impl IrrigoError {
    /// Wrap any storage backend error.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage(Box::new(err))
    }

    /// Classification used for retry decisions and error statistics.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::Generic,
            Self::Storage(_) => ErrorKind::Storage,
            Self::EntityUnavailable { .. } => ErrorKind::EntityUnavailable,
            Self::HardwareControl(_) => ErrorKind::HardwareControl,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Scheduling(_) => ErrorKind::Scheduling,
            Self::Service(_) => ErrorKind::Service,
            Self::EmergencyStop(_) => ErrorKind::EmergencyStopFailure,
        }
    }
}

/// Invariant violations detected when constructing or updating domain objects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("room id must not be empty")]
    EmptyRoomId,
    #[error("invalid room id {0:?}: expected lowercase letters, digits, '_' or '-'")]
    InvalidRoomId(String),
    #[error("name must not be empty")]
    EmptyName,
    #[error("room {0} already exists")]
    DuplicateRoom(String),
    #[error("invalid entity reference {0:?}: expected <domain>.<object>")]
    InvalidEntityRef(String),
    #[error("unknown sensor kind {0:?}")]
    UnknownSensorKind(String),
    #[error("unknown event type {0:?}")]
    UnknownEventType(String),
    #[error("shot duration {0}s out of range 1..=3600")]
    ShotDurationOutOfRange(u32),
    #[error("shot interval {0}s out of range 0..=86400")]
    ShotIntervalOutOfRange(u32),
    #[error("an irrigation event needs at least one shot")]
    NoShots,
    #[error("an irrigation event holds at most 20 shots, got {0}")]
    TooManyShots(usize),
    #[error("shot index {index} out of range for {len} shots")]
    ShotIndexOutOfRange { index: usize, len: usize },
    #[error("cannot remove the last remaining shot")]
    LastShot,
    #[error("event {0} is defined more than once")]
    DuplicateEventType(EventType),
    #[error("invalid cron expression {expression:?}: {reason}")]
    InvalidCron { expression: String, reason: String },
    #[error("manual duration {0}s out of range 1..=3600")]
    ManualDurationOutOfRange(u32),
    #[error("setting {field} = {value} out of range {min}..={max}")]
    SettingOutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

/// A lookup that found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

impl NotFoundError {
    #[must_use]
    pub fn room(id: impl fmt::Display) -> Self {
        Self {
            entity: "room",
            id: id.to_string(),
        }
    }

    #[must_use]
    pub fn event(room: impl fmt::Display, event_type: EventType) -> Self {
        Self {
            entity: "event",
            id: format!("{room}/{event_type}"),
        }
    }
}

/// Direction of a failed switch command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchCommand {
    Activate,
    Deactivate,
}

impl fmt::Display for SwitchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activate => f.write_str("activate"),
            Self::Deactivate => f.write_str("deactivate"),
        }
    }
}

/// A hardware call that did not take effect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to {command} {entity}: {reason}")]
pub struct HardwareControlError {
    pub entity: String,
    pub command: SwitchCommand,
    pub reason: String,
}

/// An emergency stop where at least one deactivation failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("emergency stop of {scope} failed: {}", .failed_operations.join(", "))]
pub struct EmergencyStopError {
    pub scope: String,
    pub failed_operations: Vec<String>,
}

/// Error classification driving retry and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EntityUnavailable,
    HardwareControl,
    Storage,
    Scheduling,
    Validation,
    Service,
    EmergencyStopFailure,
    Configuration,
    Generic,
}

impl ErrorKind {
    /// Whether a retry with backoff may succeed.
    #[must_use]
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            Self::EntityUnavailable | Self::HardwareControl | Self::Storage | Self::Service
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EntityUnavailable => "entity_unavailable",
            Self::HardwareControl => "hardware_control",
            Self::Storage => "storage",
            Self::Scheduling => "scheduling",
            Self::Validation => "validation",
            Self::Service => "service",
            Self::EmergencyStopFailure => "emergency_stop_failure",
            Self::Configuration => "configuration",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_classify_hardware_failure_as_recoverable() {
        let err = IrrigoError::from(HardwareControlError {
            entity: "switch.pump".to_string(),
            command: SwitchCommand::Activate,
            reason: "timeout".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::HardwareControl);
        assert!(err.kind().is_recoverable());
    }

    #[test]
    fn should_not_retry_when_kind_is_validation_or_emergency_stop() {
        assert!(!ErrorKind::Validation.is_recoverable());
        assert!(!ErrorKind::Configuration.is_recoverable());
        assert!(!ErrorKind::EmergencyStopFailure.is_recoverable());
        assert!(!ErrorKind::Generic.is_recoverable());
        assert!(!ErrorKind::Scheduling.is_recoverable());
    }

    #[test]
    fn should_list_failed_operations_when_displaying_emergency_stop_error() {
        let err = EmergencyStopError {
            scope: "room veg".to_string(),
            failed_operations: vec!["zone:switch.a".to_string(), "pump:switch.p".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "emergency stop of room veg failed: zone:switch.a, pump:switch.p"
        );
    }

    #[test]
    fn should_describe_missing_room() {
        let err = IrrigoError::from(NotFoundError::room("flower"));
        assert_eq!(err.to_string(), "room flower not found");
    }

    #[test]
    fn should_serialize_kind_in_snake_case() {
        let json = serde_json::to_string(&ErrorKind::EmergencyStopFailure).unwrap();
        assert_eq!(json, "\"emergency_stop_failure\"");
    }
}
