//! Room: a growing zone with its own pump, zone valves and schedules.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entity::EntityRef;
use crate::error::ValidationError;
use crate::event::{EventType, IrrigationEvent};
use crate::id::RoomId;

/// Closed set of sensor kinds a room can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    SoilRh,
    Temperature,
    Ec,
    Ph,
    Humidity,
}

impl SensorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SoilRh => "soil_rh",
            Self::Temperature => "temperature",
            Self::Ec => "ec",
            Self::Ph => "ph",
            Self::Humidity => "humidity",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "soil_rh" => Ok(Self::SoilRh),
            "temperature" => Ok(Self::Temperature),
            "ec" => Ok(Self::Ec),
            "ph" => Ok(Self::Ph),
            "humidity" => Ok(Self::Humidity),
            other => Err(ValidationError::UnknownSensorKind(other.to_string())),
        }
    }
}

/// The unit of concurrency: at most one run is active per room.
///
/// `zones` may be empty; that is reported as a configuration error when a
/// run is attempted, not when the room is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub pump: EntityRef,
    #[serde(default)]
    pub zones: Vec<EntityRef>,
    #[serde(default)]
    pub light: Option<EntityRef>,
    #[serde(default)]
    pub sensors: BTreeMap<SensorKind, EntityRef>,
    #[serde(default)]
    events: Vec<IrrigationEvent>,
}

impl Room {
    /// Create a builder for constructing a [`Room`].
    #[must_use]
    pub fn builder(id: RoomId, pump: EntityRef) -> RoomBuilder {
        RoomBuilder {
            id,
            name: None,
            pump,
            zones: Vec::new(),
            light: None,
            sensors: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the name is empty, an event type
    /// appears twice, or any event is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        for (index, event) in self.events.iter().enumerate() {
            if self.events[..index]
                .iter()
                .any(|other| other.event_type == event.event_type)
            {
                return Err(ValidationError::DuplicateEventType(event.event_type));
            }
            event.validate()?;
        }
        Ok(())
    }

    #[must_use]
    pub fn events(&self) -> &[IrrigationEvent] {
        &self.events
    }

    #[must_use]
    pub fn event(&self, event_type: EventType) -> Option<&IrrigationEvent> {
        self.events.iter().find(|e| e.event_type == event_type)
    }

    pub fn event_mut(&mut self, event_type: EventType) -> Option<&mut IrrigationEvent> {
        self.events.iter_mut().find(|e| e.event_type == event_type)
    }

    /// Attach an event.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateEventType`] when the room already
    /// has an event of that type.
    pub fn add_event(&mut self, event: IrrigationEvent) -> Result<(), ValidationError> {
        if self.event(event.event_type).is_some() {
            return Err(ValidationError::DuplicateEventType(event.event_type));
        }
        event.validate()?;
        self.events.push(event);
        self.events.sort_by_key(|e| e.event_type);
        Ok(())
    }

    /// Detach an event. Returns `None` when no event of that type exists.
    pub fn remove_event(&mut self, event_type: EventType) -> Option<IrrigationEvent> {
        let index = self
            .events
            .iter()
            .position(|e| e.event_type == event_type)?;
        Some(self.events.remove(index))
    }

    /// Pump first, then every zone in order, each tagged with its role.
    #[must_use]
    pub fn actuators(&self) -> Vec<(&'static str, &EntityRef)> {
        std::iter::once(("pump", &self.pump))
            .chain(self.zones.iter().map(|zone| ("zone", zone)))
            .collect()
    }
}

/// Step-by-step builder for [`Room`].
#[derive(Debug)]
pub struct RoomBuilder {
    id: RoomId,
    name: Option<String>,
    pump: EntityRef,
    zones: Vec<EntityRef>,
    light: Option<EntityRef>,
    sensors: BTreeMap<SensorKind, EntityRef>,
    events: Vec<IrrigationEvent>,
}

impl RoomBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn zone(mut self, zone: EntityRef) -> Self {
        self.zones.push(zone);
        self
    }

    #[must_use]
    pub fn light(mut self, light: EntityRef) -> Self {
        self.light = Some(light);
        self
    }

    #[must_use]
    pub fn sensor(mut self, kind: SensorKind, entity: EntityRef) -> Self {
        self.sensors.insert(kind, entity);
        self
    }

    #[must_use]
    pub fn event(mut self, event: IrrigationEvent) -> Self {
        self.events.push(event);
        self
    }

    /// Consume the builder, validate, and return a [`Room`].
    ///
    /// The name defaults to the room id.
    ///
    /// # Errors
    ///
    /// See [`Room::validate`].
    pub fn build(self) -> Result<Room, ValidationError> {
        let mut events = self.events;
        events.sort_by_key(|e| e.event_type);
        let room = Room {
            name: self.name.unwrap_or_else(|| self.id.to_string()),
            id: self.id,
            pump: self.pump,
            zones: self.zones,
            light: self.light,
            sensors: self.sensors,
            events,
        };
        room.validate()?;
        Ok(room)
    }
}
