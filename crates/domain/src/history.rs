//! Irrigation history and cumulative cycle counters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::event::EventType;
use crate::id::{HistoryId, RoomId};
use crate::time::Timestamp;

/// What kind of run produced a history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RunKind {
    Event(EventType),
    Manual,
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event(event_type) => event_type.fmt(f),
            Self::Manual => f.write_str("manual"),
        }
    }
}

impl FromStr for RunKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "manual" {
            Ok(Self::Manual)
        } else {
            s.parse().map(Self::Event)
        }
    }
}

impl TryFrom<String> for RunKind {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RunKind> for String {
    fn from(value: RunKind) -> Self {
        value.to_string()
    }
}

/// One attempt to water a room, successful or not.
///
/// Blocked attempts are stored with a zero duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: HistoryId,
    pub room_id: RoomId,
    pub kind: RunKind,
    pub duration: u32,
    pub success: bool,
    pub error_message: Option<String>,
    pub timestamp: Timestamp,
}

impl HistoryRecord {
    #[must_use]
    pub fn success(room_id: RoomId, kind: RunKind, duration: u32, timestamp: Timestamp) -> Self {
        Self {
            id: HistoryId::new(),
            room_id,
            kind,
            duration,
            success: true,
            error_message: None,
            timestamp,
        }
    }

    #[must_use]
    pub fn failure(
        room_id: RoomId,
        kind: RunKind,
        duration: u32,
        error_message: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: HistoryId::new(),
            room_id,
            kind,
            duration,
            success: false,
            error_message: Some(error_message.into()),
            timestamp,
        }
    }
}

/// Counters over every scheduled cycle since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleMetrics {
    pub total_attempts: u64,
    pub successful_cycles: u64,
    pub failed_cycles: u64,
    pub total_duration: u64,
}

impl CycleMetrics {
    pub fn record(&mut self, success: bool, duration: u32) {
        self.total_attempts += 1;
        if success {
            self.successful_cycles += 1;
        } else {
            self.failed_cycles += 1;
        }
        self.total_duration += u64::from(duration);
    }

    /// Mean duration of successful cycles, in seconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_duration(&self) -> f64 {
        if self.successful_cycles == 0 {
            return 0.0;
        }
        self.total_duration as f64 / self.successful_cycles as f64
    }

    /// Share of successful attempts, in percent.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            return 0.0;
        }
        self.successful_cycles as f64 * 100.0 / self.total_attempts as f64
    }
}
