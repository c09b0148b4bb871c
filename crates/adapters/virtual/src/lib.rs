//! # irrigo-adapter-virtual
//!
//! Virtual hardware that simulates the entities a room references, for
//! testing and demonstration without real pumps or valves.
//!
//! ## Simulated entities
//!
//! | Role | Initial state | Behaviour |
//! |------|---------------|-----------|
//! | Pump / zone | `off` | Responds to `activate` / `deactivate` |
//! | Light | `on` | Responds to `activate` / `deactivate` |
//! | Sensor | `unknown` | Read-only |
//!
//! Any entity can be forced `unavailable` with
//! [`VirtualHardware::set_state`]; switching it then fails.
//!
//! ## Dependency rule
//!
//! Depends on `irrigo-app` (port traits) and `irrigo-domain` only.

mod switch;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use irrigo_app::ports::HardwareControl;
use irrigo_domain::entity::{EntityRef, EntityState};
use irrigo_domain::error::{HardwareControlError, IrrigoError, SwitchCommand};
use irrigo_domain::room::Room;

pub use switch::VirtualSwitch;

/// Simulated hardware keyed by entity reference.
#[derive(Default)]
pub struct VirtualHardware {
    switches: RwLock<HashMap<EntityRef, Arc<VirtualSwitch>>>,
}

impl VirtualHardware {
    /// Build a simulation holding every entity of `rooms`.
    #[must_use]
    pub fn from_rooms(rooms: &[Room]) -> Self {
        let hardware = Self::default();
        for room in rooms {
            hardware.register_room(room);
        }
        hardware
    }

    /// Add the entities of a room. Entities already simulated keep their state.
    pub fn register_room(&self, room: &Room) {
        for (_, entity) in room.actuators() {
            self.add(entity.clone(), EntityState::Off);
        }
        if let Some(light) = &room.light {
            self.add(light.clone(), EntityState::On);
        }
        for sensor in room.sensors.values() {
            self.add(sensor.clone(), EntityState::Unknown);
        }
    }

    /// Add a single entity unless it is already simulated.
    pub fn add(&self, entity: EntityRef, initial: EntityState) {
        self.switches
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(entity.clone())
            .or_insert_with(|| Arc::new(VirtualSwitch::new(entity, initial)));
    }

    /// Force the state of an entity, returning `false` when it is unknown.
    pub fn set_state(&self, entity: &EntityRef, state: EntityState) -> bool {
        match self.find(entity) {
            Some(switch) => {
                switch.set_state(state);
                true
            }
            None => false,
        }
    }

    /// Number of simulated entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.switches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find(&self, entity: &EntityRef) -> Option<Arc<VirtualSwitch>> {
        self.switches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity)
            .cloned()
    }

    fn switch(&self, entity: &EntityRef, command: SwitchCommand) -> Result<(), IrrigoError> {
        let switch = self.find(entity).ok_or_else(|| HardwareControlError {
            entity: entity.to_string(),
            command,
            reason: "entity not found".to_string(),
        })?;
        let state = switch.apply(command)?;
        tracing::debug!(%entity, %state, "virtual entity switched");
        Ok(())
    }
}

impl HardwareControl for VirtualHardware {
    fn activate(&self, entity: &EntityRef) -> impl Future<Output = Result<(), IrrigoError>> + Send {
        let result = self.switch(entity, SwitchCommand::Activate);
        async { result }
    }

    fn deactivate(
        &self,
        entity: &EntityRef,
    ) -> impl Future<Output = Result<(), IrrigoError>> + Send {
        let result = self.switch(entity, SwitchCommand::Deactivate);
        async { result }
    }

    fn state(
        &self,
        entity: &EntityRef,
    ) -> impl Future<Output = Result<Option<EntityState>, IrrigoError>> + Send {
        let state = self.find(entity).map(|switch| switch.state());
        async move { Ok(state) }
    }
}
