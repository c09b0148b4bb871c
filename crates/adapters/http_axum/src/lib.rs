//! # irrigo-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve a **JSON API** for rooms, runs, stops, status and settings
//!   (`/api/rooms`, `/api/rooms/{id}/manual`, `/api/system/health`, …)
//! - Map HTTP requests into [`IrrigationEngine`](irrigo_app::engine::IrrigationEngine)
//!   calls (driving adapter)
//! - Map engine results and errors into HTTP status codes
//!
//! ## Dependency rule
//! Depends on `irrigo-app` (for the engine and port traits) and
//! `irrigo-domain` (for domain types used in request/response mapping).
//! Never leaks axum types into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;
