//! Shot: one irrigation pulse.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Longest single pulse, in seconds.
pub const MAX_SHOT_DURATION: u32 = 3600;
/// Longest pause between two pulses, in seconds.
pub const MAX_SHOT_INTERVAL: u32 = 86_400;

/// One watering pulse followed by an optional pause before the next one.
///
/// Fields are private: a shot is validated on construction and never
/// changes afterwards. Editing an event replaces its shots instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shot {
    duration: u32,
    #[serde(default)]
    interval_after: u32,
}

impl Shot {
    /// Build a validated shot.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ShotDurationOutOfRange`] unless
    /// `1 <= duration <= 3600`, and
    /// [`ValidationError::ShotIntervalOutOfRange`] when
    /// `interval_after > 86400`.
    pub fn new(duration: u32, interval_after: u32) -> Result<Self, ValidationError> {
        let shot = Self {
            duration,
            interval_after,
        };
        shot.validate()?;
        Ok(shot)
    }

    /// Re-check the invariants, used after deserialization.
    ///
    /// # Errors
    ///
    /// Same as [`Shot::new`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.duration == 0 || self.duration > MAX_SHOT_DURATION {
            return Err(ValidationError::ShotDurationOutOfRange(self.duration));
        }
        if self.interval_after > MAX_SHOT_INTERVAL {
            return Err(ValidationError::ShotIntervalOutOfRange(self.interval_after));
        }
        Ok(())
    }

    /// Watering time in seconds.
    #[must_use]
    pub fn duration(&self) -> u32 {
        self.duration
    }

    /// Pause before the next shot, in seconds. Ignored after the last shot.
    #[must_use]
    pub fn interval_after(&self) -> u32 {
        self.interval_after
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_build_shot_when_values_are_in_range() {
        let shot = Shot::new(30, 60).unwrap();
        assert_eq!(shot.duration(), 30);
        assert_eq!(shot.interval_after(), 60);
    }

    #[test]
    fn should_reject_shot_when_duration_is_zero() {
        assert_eq!(
            Shot::new(0, 0),
            Err(ValidationError::ShotDurationOutOfRange(0))
        );
    }

    #[test]
    fn should_reject_shot_when_duration_exceeds_one_hour() {
        assert!(Shot::new(3601, 0).is_err());
        assert!(Shot::new(3600, 0).is_ok());
    }

    #[test]
    fn should_reject_shot_when_interval_exceeds_one_day() {
        assert_eq!(
            Shot::new(10, 86_401),
            Err(ValidationError::ShotIntervalOutOfRange(86_401))
        );
    }

    #[test]
    fn should_default_interval_to_zero_when_missing_in_json() {
        let shot: Shot = serde_json::from_str(r#"{"duration": 45}"#).unwrap();
        assert_eq!(shot.interval_after(), 0);
    }
}
