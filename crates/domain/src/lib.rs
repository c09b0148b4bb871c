//! # irrigo-domain
//!
//! Pure domain model for the irrigo irrigation controller.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error taxonomy, timestamps
//! - Define **Rooms** (a pump, zone valves, an optional light, sensors)
//! - Define **Irrigation events** (`P1`/`P2` cron-scheduled groups of **Shots**)
//! - Define **Settings**, **execution state** and **fail-safe verdicts**
//! - Define **history records** and diagnostic snapshots
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod diagnostics;
pub mod entity;
pub mod event;
pub mod execution;
pub mod history;
pub mod room;
pub mod safety;
pub mod schedule;
pub mod settings;
pub mod shot;
pub mod status;
