//! # irrigo-app
//!
//! Application layer: the irrigation engine and its **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `RoomRepository`, `SettingsRepository`, `HistoryStore`: persistence
//!   - `HardwareControl`: pump, zone and light switches
//!   - `Notifier`: user-facing notifications
//!   - `Clock`, `TimerService`: time and deferred callbacks
//! - Provide the **driving/inbound** entry point, [`engine::IrrigationEngine`]:
//!   cron scheduling, the fail-safe pipeline, shot sequencing, daily
//!   accounting, conflict control, emergency stop and recovery
//! - Provide **in-process infrastructure** that doesn't need IO (tokio timers)
//!
//! ## Dependency rule
//! Depends on `irrigo-domain` only (plus `tokio` for timers and locks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod conflict;
pub mod daily_totals;
pub mod diagnostics;
pub mod engine;
pub mod fail_safe;
pub mod ports;
pub mod scheduler;
pub mod sequencer;
pub mod timer;

#[cfg(test)]
pub(crate) mod testing;
