//! Shared application state for axum handlers.

use std::sync::Arc;

use irrigo_app::engine::IrrigationEngine;
use irrigo_app::ports::{HardwareControl, Notifier, Storage};

/// Application state shared across all axum handlers.
///
/// Generic over the engine's collaborators to avoid dynamic dispatch.
/// `Clone` is implemented manually so the collaborators themselves do not
/// need to be `Clone`, only the `Arc` is cloned.
pub struct AppState<S, HW, N> {
    pub engine: Arc<IrrigationEngine<S, HW, N>>,
}

impl<S, HW, N> Clone for AppState<S, HW, N> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<S, HW, N> AppState<S, HW, N>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    /// Wrap an engine that is already shared with the timer callbacks.
    pub fn new(engine: Arc<IrrigationEngine<S, HW, N>>) -> Self {
        Self { engine }
    }
}
