//! JSON REST API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod events;
#[allow(clippy::missing_errors_doc)]
pub mod rooms;
#[allow(clippy::missing_errors_doc)]
pub mod runs;
#[allow(clippy::missing_errors_doc)]
pub mod settings;
#[allow(clippy::missing_errors_doc)]
pub mod status;
#[allow(clippy::missing_errors_doc)]
pub mod system;

use std::str::FromStr;

use axum::Router;
use axum::routing::{get, post, put};

use irrigo_app::ports::{HardwareControl, Notifier, Storage};
use irrigo_domain::event::EventType;
use irrigo_domain::id::RoomId;

use crate::error::ApiError;
use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<S, HW, N>() -> Router<AppState<S, HW, N>>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    Router::new()
        // Rooms
        .route(
            "/rooms",
            get(rooms::list::<S, HW, N>).post(rooms::create::<S, HW, N>),
        )
        .route(
            "/rooms/{id}",
            get(rooms::get::<S, HW, N>)
                .put(rooms::update::<S, HW, N>)
                .delete(rooms::delete::<S, HW, N>),
        )
        .route("/rooms/{id}/status", get(status::room::<S, HW, N>))
        .route("/rooms/{id}/safety", get(status::safety::<S, HW, N>))
        .route("/rooms/{id}/history", get(status::room_history::<S, HW, N>))
        // Runs
        .route("/rooms/{id}/manual", post(runs::manual::<S, HW, N>))
        .route("/rooms/{id}/stop", post(runs::stop::<S, HW, N>))
        .route(
            "/rooms/{id}/emergency_stop",
            post(runs::emergency_stop_room::<S, HW, N>),
        )
        .route(
            "/rooms/{id}/events/{event_type}/run",
            post(runs::execute_event::<S, HW, N>),
        )
        .route("/emergency_stop", post(runs::emergency_stop_all::<S, HW, N>))
        // Event editing
        .route(
            "/rooms/{id}/events/{event_type}/enabled",
            put(events::set_enabled::<S, HW, N>),
        )
        .route(
            "/rooms/{id}/events/{event_type}/shots",
            post(events::add_shot::<S, HW, N>),
        )
        .route(
            "/rooms/{id}/events/{event_type}/shots/{index}",
            put(events::update_shot::<S, HW, N>).delete(events::remove_shot::<S, HW, N>),
        )
        // System
        .route("/history", get(status::history::<S, HW, N>))
        .route("/system/health", get(system::health::<S, HW, N>))
        .route(
            "/system/errors",
            get(system::errors::<S, HW, N>).delete(system::clear_errors::<S, HW, N>),
        )
        .route("/system/operations", get(system::operations::<S, HW, N>))
        .route("/system/fail_safe", get(system::fail_safe::<S, HW, N>))
        .route(
            "/system/metrics",
            get(system::metrics::<S, HW, N>).delete(system::reset_metrics::<S, HW, N>),
        )
        // Settings
        .route(
            "/settings",
            get(settings::get::<S, HW, N>).put(settings::update::<S, HW, N>),
        )
}

fn parse_room_id(value: &str) -> Result<RoomId, ApiError> {
    RoomId::from_str(value).map_err(ApiError::from)
}

fn parse_event_type(value: &str) -> Result<EventType, ApiError> {
    EventType::from_str(value).map_err(ApiError::from)
}
