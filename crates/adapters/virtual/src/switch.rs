//! Virtual switch: responds to `activate` / `deactivate` unless it is offline.

use std::sync::{Mutex, MutexGuard, PoisonError};

use irrigo_domain::entity::{EntityRef, EntityState};
use irrigo_domain::error::{HardwareControlError, SwitchCommand};

/// A simulated entity holding a single on/off state.
pub struct VirtualSwitch {
    entity: EntityRef,
    state: Mutex<EntityState>,
}

impl VirtualSwitch {
    #[must_use]
    pub fn new(entity: EntityRef, initial: EntityState) -> Self {
        Self {
            entity,
            state: Mutex::new(initial),
        }
    }

    #[must_use]
    pub fn state(&self) -> EntityState {
        *self.lock_state()
    }

    /// Force the reported state, e.g. to simulate a device dropping offline.
    pub fn set_state(&self, state: EntityState) {
        *self.lock_state() = state;
    }

    /// Apply a switch command.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareControlError`] when the switch is unavailable.
    pub fn apply(&self, command: SwitchCommand) -> Result<EntityState, HardwareControlError> {
        let mut state = self.lock_state();
        if !state.is_available() {
            return Err(HardwareControlError {
                entity: self.entity.to_string(),
                command,
                reason: "entity is unavailable".to_string(),
            });
        }
        *state = match command {
            SwitchCommand::Activate => EntityState::On,
            SwitchCommand::Deactivate => EntityState::Off,
        };
        Ok(*state)
    }

    fn lock_state(&self) -> MutexGuard<'_, EntityState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
