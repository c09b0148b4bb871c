//! Irrigation events: schedulable groups of shots.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::schedule::CronSchedule;
use crate::shot::Shot;
use crate::time::Timestamp;

/// Most shots a single event may hold.
pub const MAX_SHOTS: usize = 20;

/// The two schedule slots a room can own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventType {
    P1,
    P2,
}

impl EventType {
    pub const ALL: [Self; 2] = [Self::P1, Self::P2];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::P1 => "P1",
            Self::P2 => "P2",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "P1" | "p1" => Ok(Self::P1),
            "P2" | "p2" => Ok(Self::P2),
            other => Err(ValidationError::UnknownEventType(other.to_string())),
        }
    }
}

/// An ordered, non-empty group of shots fired on a cron schedule.
///
/// A `None` schedule means the event only runs when triggered by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrrigationEvent {
    pub event_type: EventType,
    shots: Vec<Shot>,
    #[serde(default)]
    pub schedule: Option<CronSchedule>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub last_run: Option<Timestamp>,
    #[serde(default)]
    pub next_run: Option<Timestamp>,
}

fn enabled_by_default() -> bool {
    true
}

impl IrrigationEvent {
    /// Create a builder for constructing an [`IrrigationEvent`].
    #[must_use]
    pub fn builder(event_type: EventType) -> IrrigationEventBuilder {
        IrrigationEventBuilder {
            event_type,
            shots: Vec::new(),
            schedule: None,
            enabled: true,
        }
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the event has no shots, more than
    /// [`MAX_SHOTS`] shots, or a shot outside its allowed range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.shots.is_empty() {
            return Err(ValidationError::NoShots);
        }
        if self.shots.len() > MAX_SHOTS {
            return Err(ValidationError::TooManyShots(self.shots.len()));
        }
        self.shots.iter().try_for_each(Shot::validate)
    }

    #[must_use]
    pub fn shots(&self) -> &[Shot] {
        &self.shots
    }

    /// Sum of every shot duration plus every interval except the last one.
    #[must_use]
    pub fn total_duration(&self) -> u32 {
        let watering: u32 = self.shots.iter().map(Shot::duration).sum();
        let pauses: u32 = self
            .shots
            .iter()
            .rev()
            .skip(1)
            .map(Shot::interval_after)
            .sum();
        watering + pauses
    }

    /// Whether the scheduler should arm a timer for this event.
    #[must_use]
    pub fn is_schedulable(&self) -> bool {
        self.enabled && self.schedule.is_some()
    }

    /// Append a shot at the end of the sequence.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TooManyShots`] when the event is full.
    pub fn add_shot(&mut self, shot: Shot) -> Result<(), ValidationError> {
        shot.validate()?;
        if self.shots.len() >= MAX_SHOTS {
            return Err(ValidationError::TooManyShots(self.shots.len() + 1));
        }
        self.shots.push(shot);
        Ok(())
    }

    /// Remove the shot at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ShotIndexOutOfRange`] for a bad index and
    /// [`ValidationError::LastShot`] when only one shot remains.
    pub fn remove_shot(&mut self, index: usize) -> Result<Shot, ValidationError> {
        self.check_index(index)?;
        if self.shots.len() == 1 {
            return Err(ValidationError::LastShot);
        }
        Ok(self.shots.remove(index))
    }

    /// Replace the shot at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ShotIndexOutOfRange`] for a bad index.
    pub fn update_shot(&mut self, index: usize, shot: Shot) -> Result<(), ValidationError> {
        shot.validate()?;
        self.check_index(index)?;
        self.shots[index] = shot;
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<(), ValidationError> {
        if index >= self.shots.len() {
            return Err(ValidationError::ShotIndexOutOfRange {
                index,
                len: self.shots.len(),
            });
        }
        Ok(())
    }
}

/// Step-by-step builder for [`IrrigationEvent`].
#[derive(Debug)]
pub struct IrrigationEventBuilder {
    event_type: EventType,
    shots: Vec<Shot>,
    schedule: Option<CronSchedule>,
    enabled: bool,
}

impl IrrigationEventBuilder {
    #[must_use]
    pub fn shot(mut self, shot: Shot) -> Self {
        self.shots.push(shot);
        self
    }

    #[must_use]
    pub fn shots(mut self, shots: impl IntoIterator<Item = Shot>) -> Self {
        self.shots.extend(shots);
        self
    }

    #[must_use]
    pub fn schedule(mut self, schedule: CronSchedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Consume the builder, validate, and return an [`IrrigationEvent`].
    ///
    /// # Errors
    ///
    /// See [`IrrigationEvent::validate`].
    pub fn build(self) -> Result<IrrigationEvent, ValidationError> {
        let event = IrrigationEvent {
            event_type: self.event_type,
            shots: self.shots,
            schedule: self.schedule,
            enabled: self.enabled,
            last_run: None,
            next_run: None,
        };
        event.validate()?;
        Ok(event)
    }
}
