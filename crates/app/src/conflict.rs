//! Conflict manager: at most one execution per room.
//!
//! Starting a run takes the room's gate, runs the fail-safe pipeline and
//! inserts the execution before releasing the gate, so no other run for
//! the same room can slip in between the check and the insert. Removal is
//! idempotent.
//!
//! A stop request never frees a room whose sequence is still switching
//! hardware: the run is marked as stopping and keeps blocking new starts
//! until the task driving it removes it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OwnedMutexGuard;

use irrigo_domain::execution::ExecutionState;
use irrigo_domain::id::{RoomId, RunId};
use irrigo_domain::safety::ConflictKind;

/// A registered execution together with the id of the run that owns it.
#[derive(Debug, Clone)]
pub struct ActiveRun {
    pub run_id: RunId,
    pub state: ExecutionState,
    /// A sequence task still owns the hardware of this run.
    driven: bool,
    /// Stop requested; the driving task clears the entry once it drains.
    stopping: bool,
}

impl ActiveRun {
    fn conflict_kind(&self) -> Option<ConflictKind> {
        match self.state {
            ExecutionState::ScheduledRun(_) => Some(ConflictKind::ScheduledRun),
            ExecutionState::ManualRun(_) => Some(ConflictKind::ManualRun),
            ExecutionState::Idle => None,
        }
    }
}

/// Execution states keyed by room.
#[derive(Debug, Default)]
pub struct ExecutionRegistry {
    runs: Mutex<HashMap<RoomId, ActiveRun>>,
    gates: Mutex<HashMap<RoomId, Arc<tokio::sync::Mutex<()>>>>,
}

impl ExecutionRegistry {
    /// Serialise start attempts on one room. Hold the guard across the
    /// fail-safe check and [`try_insert`](Self::try_insert).
    pub async fn gate(&self, room_id: &RoomId) -> OwnedMutexGuard<()> {
        let gate = {
            let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(gates.entry(room_id.clone()).or_default())
        };
        gate.lock_owned().await
    }

    /// The kind of run occupying a room, if any.
    #[must_use]
    pub fn conflict(&self, room_id: &RoomId) -> Option<ConflictKind> {
        self.lock().get(room_id).and_then(ActiveRun::conflict_kind)
    }

    /// Register a new execution.
    ///
    /// # Errors
    ///
    /// Returns the kind of the run already registered for the room.
    pub fn try_insert(
        &self,
        room_id: &RoomId,
        state: ExecutionState,
    ) -> Result<RunId, ConflictKind> {
        let mut runs = self.lock();
        if let Some(kind) = runs.get(room_id).and_then(ActiveRun::conflict_kind) {
            return Err(kind);
        }
        let run_id = RunId::new();
        runs.insert(
            room_id.clone(),
            ActiveRun {
                run_id,
                state,
                driven: true,
                stopping: false,
            },
        );
        Ok(run_id)
    }

    /// Whether `run_id` still owns the room and has not been asked to stop.
    #[must_use]
    pub fn is_current(&self, room_id: &RoomId, run_id: RunId) -> bool {
        self.lock()
            .get(room_id)
            .is_some_and(|active| active.run_id == run_id && !active.stopping)
    }

    /// Whether the room holds a run that is draining after a stop.
    #[must_use]
    pub fn is_stopping(&self, room_id: &RoomId) -> bool {
        self.lock().get(room_id).is_some_and(|active| active.stopping)
    }

    /// Hand a run over from its sequence task once water flows.
    ///
    /// Returns `false` when the run was stopped in the meantime; the caller
    /// still owns the entry then and must shut off and remove it.
    pub fn release(&self, room_id: &RoomId, run_id: RunId) -> bool {
        match self.lock().get_mut(room_id) {
            Some(active) if active.run_id == run_id && !active.stopping => {
                active.driven = false;
                true
            }
            _ => false,
        }
    }

    /// Ask the room's run to stop and return its state.
    ///
    /// A run still driven by a sequence task is only marked and keeps the
    /// room until that task removes it; a released run is removed at once.
    /// `None` when the room is idle or already stopping.
    pub fn request_stop(&self, room_id: &RoomId) -> Option<ExecutionState> {
        let mut runs = self.lock();
        let active = runs.get_mut(room_id)?;
        if active.stopping {
            return None;
        }
        if active.driven {
            active.stopping = true;
            return Some(active.state.clone());
        }
        runs.remove(room_id).map(|active| active.state)
    }

    /// Mutate the state of `run_id`. No-op once the run was removed.
    pub fn update(&self, room_id: &RoomId, run_id: RunId, f: impl FnOnce(&mut ExecutionState)) {
        if let Some(active) = self.lock().get_mut(room_id)
            && active.run_id == run_id
        {
            f(&mut active.state);
        }
    }

    /// Remove the room's execution only if it still belongs to `run_id`.
    pub fn remove_run(&self, room_id: &RoomId, run_id: RunId) -> Option<ActiveRun> {
        let mut runs = self.lock();
        if runs.get(room_id).is_some_and(|active| active.run_id == run_id) {
            runs.remove(room_id)
        } else {
            None
        }
    }

    #[must_use]
    pub fn state(&self, room_id: &RoomId) -> ExecutionState {
        self.lock()
            .get(room_id)
            .map(|active| active.state.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn active(&self) -> Vec<(RoomId, ExecutionState)> {
        self.lock()
            .iter()
            .map(|(room, active)| (room.clone(), active.state.clone()))
            .collect()
    }

    /// Counts of (scheduled, manual) runs.
    #[must_use]
    pub fn counts(&self) -> (usize, usize) {
        self.lock()
            .values()
            .fold((0, 0), |(scheduled, manual), active| match active.state {
                ExecutionState::ScheduledRun(_) => (scheduled + 1, manual),
                ExecutionState::ManualRun(_) => (scheduled, manual + 1),
                ExecutionState::Idle => (scheduled, manual),
            })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RoomId, ActiveRun>> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
