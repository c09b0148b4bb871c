//! JSON REST handlers editing a room's events and their shots.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use irrigo_app::ports::{HardwareControl, Notifier, Storage};
use irrigo_domain::room::Room;
use irrigo_domain::shot::Shot;

use super::{parse_event_type, parse_room_id};
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for enabling or disabling an event.
#[derive(Deserialize)]
pub struct SetEnabledRequest {
    pub enabled: bool,
}

/// Request body describing a shot.
#[derive(Deserialize)]
pub struct ShotRequest {
    pub duration: u32,
    #[serde(default)]
    pub interval_after: u32,
}

impl ShotRequest {
    fn into_shot(self) -> Result<Shot, ApiError> {
        Shot::new(self.duration, self.interval_after).map_err(ApiError::from)
    }
}

/// Possible responses from the editing endpoints: the updated room.
pub enum EditResponse {
    Ok(Json<Room>),
    Created(Json<Room>),
}

impl IntoResponse for EditResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// `PUT /api/rooms/:id/events/:event_type/enabled`
pub async fn set_enabled<S, HW, N>(
    State(state): State<AppState<S, HW, N>>,
    Path((id, event_type)): Path<(String, String)>,
    Json(req): Json<SetEnabledRequest>,
) -> Result<EditResponse, ApiError>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let room_id = parse_room_id(&id)?;
    let event_type = parse_event_type(&event_type)?;
    let room = state
        .engine
        .set_event_enabled(&room_id, event_type, req.enabled)
        .await?;
    Ok(EditResponse::Ok(Json(room)))
}

/// `POST /api/rooms/:id/events/:event_type/shots`
pub async fn add_shot<S, HW, N>(
    State(state): State<AppState<S, HW, N>>,
    Path((id, event_type)): Path<(String, String)>,
    Json(req): Json<ShotRequest>,
) -> Result<EditResponse, ApiError>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let room_id = parse_room_id(&id)?;
    let event_type = parse_event_type(&event_type)?;
    let shot = req.into_shot()?;
    let room = state.engine.add_shot(&room_id, event_type, shot).await?;
    Ok(EditResponse::Created(Json(room)))
}

/// `PUT /api/rooms/:id/events/:event_type/shots/:index`
pub async fn update_shot<S, HW, N>(
    State(state): State<AppState<S, HW, N>>,
    Path((id, event_type, index)): Path<(String, String, usize)>,
    Json(req): Json<ShotRequest>,
) -> Result<EditResponse, ApiError>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let room_id = parse_room_id(&id)?;
    let event_type = parse_event_type(&event_type)?;
    let shot = req.into_shot()?;
    let room = state
        .engine
        .update_shot(&room_id, event_type, index, shot)
        .await?;
    Ok(EditResponse::Ok(Json(room)))
}

/// `DELETE /api/rooms/:id/events/:event_type/shots/:index`
pub async fn remove_shot<S, HW, N>(
    State(state): State<AppState<S, HW, N>>,
    Path((id, event_type, index)): Path<(String, String, usize)>,
) -> Result<EditResponse, ApiError>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let room_id = parse_room_id(&id)?;
    let event_type = parse_event_type(&event_type)?;
    let room = state
        .engine
        .remove_shot(&room_id, event_type, index)
        .await?;
    Ok(EditResponse::Ok(Json(room)))
}
