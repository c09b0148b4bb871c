//! JSON REST handlers for rooms.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use irrigo_app::ports::{HardwareControl, Notifier, Storage};
use irrigo_domain::error::ValidationError;
use irrigo_domain::room::Room;

use super::parse_room_id;
use crate::error::ApiError;
use crate::state::AppState;

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<Room>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the get and update endpoints.
pub enum GetResponse {
    Ok(Json<Room>),
}

impl IntoResponse for GetResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the create endpoint.
pub enum CreateResponse {
    Created(Json<Room>),
}

impl IntoResponse for CreateResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// Possible responses from the delete endpoint.
pub enum DeleteResponse {
    NoContent,
}

impl IntoResponse for DeleteResponse {
    fn into_response(self) -> Response {
        match self {
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `GET /api/rooms`
pub async fn list<S, HW, N>(State(state): State<AppState<S, HW, N>>) -> ListResponse
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    ListResponse::Ok(Json(state.engine.list_rooms()))
}

/// `GET /api/rooms/:id`
pub async fn get<S, HW, N>(
    State(state): State<AppState<S, HW, N>>,
    Path(id): Path<String>,
) -> Result<GetResponse, ApiError>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let room_id = parse_room_id(&id)?;
    let room = state.engine.get_room(&room_id)?;
    Ok(GetResponse::Ok(Json(room)))
}

/// `POST /api/rooms`
pub async fn create<S, HW, N>(
    State(state): State<AppState<S, HW, N>>,
    Json(room): Json<Room>,
) -> Result<CreateResponse, ApiError>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let created = state.engine.add_room(room).await?;
    Ok(CreateResponse::Created(Json(created)))
}

/// `PUT /api/rooms/:id`
pub async fn update<S, HW, N>(
    State(state): State<AppState<S, HW, N>>,
    Path(id): Path<String>,
    Json(room): Json<Room>,
) -> Result<GetResponse, ApiError>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let room_id = parse_room_id(&id)?;
    if room.id != room_id {
        return Err(ValidationError::InvalidRoomId(room.id.to_string()).into());
    }
    let updated = state.engine.update_room(room).await?;
    Ok(GetResponse::Ok(Json(updated)))
}

/// `DELETE /api/rooms/:id`
pub async fn delete<S, HW, N>(
    State(state): State<AppState<S, HW, N>>,
    Path(id): Path<String>,
) -> Result<DeleteResponse, ApiError>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let room_id = parse_room_id(&id)?;
    state.engine.delete_room(&room_id).await?;
    Ok(DeleteResponse::NoContent)
}
