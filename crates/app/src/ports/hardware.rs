//! Hardware control port: switching pumps and zone valves, reading lights.

use std::future::Future;

use irrigo_domain::entity::{EntityRef, EntityState};
use irrigo_domain::error::IrrigoError;

/// Drives the physical (or simulated) switches a room references.
pub trait HardwareControl {
    /// Turn an entity on.
    fn activate(&self, entity: &EntityRef) -> impl Future<Output = Result<(), IrrigoError>> + Send;

    /// Turn an entity off.
    fn deactivate(
        &self,
        entity: &EntityRef,
    ) -> impl Future<Output = Result<(), IrrigoError>> + Send;

    /// Current state of an entity, or `None` when the entity does not exist.
    fn state(
        &self,
        entity: &EntityRef,
    ) -> impl Future<Output = Result<Option<EntityState>, IrrigoError>> + Send;
}

impl<T: HardwareControl + Send + Sync> HardwareControl for std::sync::Arc<T> {
    fn activate(&self, entity: &EntityRef) -> impl Future<Output = Result<(), IrrigoError>> + Send {
        (**self).activate(entity)
    }

    fn deactivate(
        &self,
        entity: &EntityRef,
    ) -> impl Future<Output = Result<(), IrrigoError>> + Send {
        (**self).deactivate(entity)
    }

    fn state(
        &self,
        entity: &EntityRef,
    ) -> impl Future<Output = Result<Option<EntityState>, IrrigoError>> + Send {
        (**self).state(entity)
    }
}
