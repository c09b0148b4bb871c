//! Read-only views of a room: live status, safety check and history.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use irrigo_app::ports::{HardwareControl, Notifier, Storage};
use irrigo_domain::history::HistoryRecord;
use irrigo_domain::id::RoomId;
use irrigo_domain::status::{RoomStatus, SafetyReport};

use super::parse_room_id;
use crate::error::ApiError;
use crate::state::AppState;

/// Default history window, in days.
const DEFAULT_HISTORY_DAYS: u32 = 7;

/// Query parameters for the history endpoints.
#[derive(Deserialize)]
pub struct HistoryQuery {
    /// Number of trailing days to return. Defaults to 7.
    pub days: Option<u32>,
}

/// Possible responses from the status endpoint.
pub enum StatusResponse {
    Ok(Json<RoomStatus>),
}

impl IntoResponse for StatusResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the safety endpoint.
pub enum SafetyResponse {
    Ok(Json<SafetyReport>),
}

impl IntoResponse for SafetyResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the history endpoints.
pub enum HistoryResponse {
    /// 200 OK with records, newest first.
    Ok(Json<Vec<HistoryRecord>>),
}

impl IntoResponse for HistoryResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// `GET /api/rooms/:id/status`
pub async fn room<S, HW, N>(
    State(state): State<AppState<S, HW, N>>,
    Path(id): Path<String>,
) -> Result<StatusResponse, ApiError>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let room_id = parse_room_id(&id)?;
    let status = state.engine.room_status(&room_id)?;
    Ok(StatusResponse::Ok(Json(status)))
}

/// `GET /api/rooms/:id/safety`
pub async fn safety<S, HW, N>(
    State(state): State<AppState<S, HW, N>>,
    Path(id): Path<String>,
) -> Result<SafetyResponse, ApiError>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let room_id = parse_room_id(&id)?;
    let report = state.engine.validate_room_safety(&room_id).await?;
    Ok(SafetyResponse::Ok(Json(report)))
}

/// `GET /api/rooms/:id/history?days=`
pub async fn room_history<S, HW, N>(
    State(state): State<AppState<S, HW, N>>,
    Path(id): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Result<HistoryResponse, ApiError>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let room_id = parse_room_id(&id)?;
    state.engine.get_room(&room_id)?;
    load_history(&state, Some(&room_id), params).await
}

/// `GET /api/history?days=`
pub async fn history<S, HW, N>(
    State(state): State<AppState<S, HW, N>>,
    Query(params): Query<HistoryQuery>,
) -> Result<HistoryResponse, ApiError>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    load_history(&state, None, params).await
}

async fn load_history<S, HW, N>(
    state: &AppState<S, HW, N>,
    room_id: Option<&RoomId>,
    params: HistoryQuery,
) -> Result<HistoryResponse, ApiError>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let days = params.days.unwrap_or(DEFAULT_HISTORY_DAYS);
    let records = state.engine.history(room_id, days).await?;
    Ok(HistoryResponse::Ok(Json(records)))
}
