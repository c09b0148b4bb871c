//! Runtime settings governing the engine.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Global knobs persisted alongside rooms and editable at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Pause between pump activation and zone activation.
    pub pump_zone_delay_seconds: u32,
    pub sensor_update_interval_seconds: u32,
    /// Used by manual runs started without an explicit duration.
    pub default_manual_duration_seconds: u32,
    pub fail_safe_enabled: bool,
    pub emergency_stop_enabled: bool,
    pub notifications_enabled: bool,
    pub error_notifications_enabled: bool,
    /// Watering budget per room per local calendar day.
    pub max_daily_irrigation_seconds: u32,
    pub max_history_days: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pump_zone_delay_seconds: 3,
            sensor_update_interval_seconds: 30,
            default_manual_duration_seconds: 300,
            fail_safe_enabled: true,
            emergency_stop_enabled: true,
            notifications_enabled: true,
            error_notifications_enabled: true,
            max_daily_irrigation_seconds: 3600,
            max_history_days: 30,
        }
    }
}

impl Settings {
    /// Check every numeric setting against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::SettingOutOfRange`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check("pump_zone_delay_seconds", self.pump_zone_delay_seconds, 0, 60)?;
        check(
            "sensor_update_interval_seconds",
            self.sensor_update_interval_seconds,
            5,
            3600,
        )?;
        check(
            "default_manual_duration_seconds",
            self.default_manual_duration_seconds,
            1,
            3600,
        )?;
        check(
            "max_daily_irrigation_seconds",
            self.max_daily_irrigation_seconds,
            1,
            86_400,
        )?;
        check("max_history_days", self.max_history_days, 1, 365)
    }
}

fn check(field: &'static str, value: u32, min: u32, max: u32) -> Result<(), ValidationError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::SettingOutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_validate_defaults() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn should_name_field_when_delay_out_of_range() {
        let settings = Settings {
            pump_zone_delay_seconds: 61,
            ..Settings::default()
        };
        assert_eq!(
            settings.validate(),
            Err(ValidationError::SettingOutOfRange {
                field: "pump_zone_delay_seconds",
                value: 61,
                min: 0,
                max: 60,
            })
        );
    }

    #[test]
    fn should_reject_zero_daily_budget() {
        let settings = Settings {
            max_daily_irrigation_seconds: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn should_fill_missing_fields_with_defaults_when_deserializing() {
        let settings: Settings =
            serde_json::from_str(r#"{"max_daily_irrigation_seconds": 1200}"#).unwrap();
        assert_eq!(settings.max_daily_irrigation_seconds, 1200);
        assert_eq!(settings.pump_zone_delay_seconds, 3);
        assert!(settings.fail_safe_enabled);
    }
}
