//! Handlers that start and stop watering.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use irrigo_app::ports::{HardwareControl, Notifier, Storage};
use irrigo_domain::execution::{RejectReason, RunOutcome};

use super::{parse_event_type, parse_room_id};
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for starting a manual run.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ManualRunRequest {
    /// Seconds to water; the configured default when absent.
    pub duration: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct StopBody {
    pub stopped: bool,
}

/// The outcome of a run request, with a status code matching what happened.
pub struct RunResponse(RunOutcome);

impl IntoResponse for RunResponse {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RunOutcome::Completed { .. } | RunOutcome::Started { .. } | RunOutcome::Stopped => {
                StatusCode::OK
            }
            RunOutcome::Blocked { .. } => StatusCode::CONFLICT,
            RunOutcome::Rejected {
                reject: RejectReason::RoomNotFound | RejectReason::EventNotFound { .. },
            } => StatusCode::NOT_FOUND,
            RunOutcome::Rejected { .. } => StatusCode::BAD_REQUEST,
            RunOutcome::Failed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self.0)).into_response()
    }
}

/// Possible responses from the stop endpoint.
pub enum StopResponse {
    Ok(Json<StopBody>),
}

impl IntoResponse for StopResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the room emergency-stop endpoint.
pub enum EmergencyStopResponse {
    NoContent,
}

impl IntoResponse for EmergencyStopResponse {
    fn into_response(self) -> Response {
        match self {
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `POST /api/rooms/:id/events/:event_type/run`
///
/// Waits until every shot has run, so the request lasts as long as the
/// event does.
pub async fn execute_event<S, HW, N>(
    State(state): State<AppState<S, HW, N>>,
    Path((id, event_type)): Path<(String, String)>,
) -> Result<RunResponse, ApiError>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let room_id = parse_room_id(&id)?;
    let event_type = parse_event_type(&event_type)?;
    let outcome = state
        .engine
        .execute_scheduled_event(&room_id, event_type)
        .await;
    Ok(RunResponse(outcome))
}

/// `POST /api/rooms/:id/manual`
pub async fn manual<S, HW, N>(
    State(state): State<AppState<S, HW, N>>,
    Path(id): Path<String>,
    Json(req): Json<ManualRunRequest>,
) -> Result<RunResponse, ApiError>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let room_id = parse_room_id(&id)?;
    let outcome = state.engine.start_manual_run(&room_id, req.duration).await;
    Ok(RunResponse(outcome))
}

/// `POST /api/rooms/:id/stop`
pub async fn stop<S, HW, N>(
    State(state): State<AppState<S, HW, N>>,
    Path(id): Path<String>,
) -> Result<StopResponse, ApiError>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let room_id = parse_room_id(&id)?;
    state.engine.get_room(&room_id)?;
    let stopped = state.engine.stop_run(&room_id).await;
    Ok(StopResponse::Ok(Json(StopBody { stopped })))
}

/// `POST /api/rooms/:id/emergency_stop`
pub async fn emergency_stop_room<S, HW, N>(
    State(state): State<AppState<S, HW, N>>,
    Path(id): Path<String>,
) -> Result<EmergencyStopResponse, ApiError>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let room_id = parse_room_id(&id)?;
    state.engine.emergency_stop_room(&room_id).await?;
    Ok(EmergencyStopResponse::NoContent)
}

/// `POST /api/emergency_stop`
///
/// Always answers 200; the body tells which shutdown steps succeeded.
pub async fn emergency_stop_all<S, HW, N>(
    State(state): State<AppState<S, HW, N>>,
) -> Json<BTreeMap<String, bool>>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    Json(state.engine.emergency_stop_all().await)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::testing::{app_with, json, send, veg_room};

    #[tokio::test]
    async fn should_start_manual_run_with_default_duration() {
        let (app, _) = app_with(vec![veg_room()]).await;

        let response = send(&app, "POST", "/api/rooms/veg/manual", Some("{}")).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["outcome"], "started");
        assert_eq!(body["duration"], 300);
    }

    #[tokio::test]
    async fn should_return_conflict_when_room_already_watering() {
        let (app, _) = app_with(vec![veg_room()]).await;
        send(&app, "POST", "/api/rooms/veg/manual", Some(r#"{"duration": 60}"#)).await;

        let response = send(&app, "POST", "/api/rooms/veg/manual", Some(r#"{"duration": 60}"#)).await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json(response).await["outcome"], "blocked");
    }

    #[tokio::test]
    async fn should_reject_manual_run_when_duration_out_of_range() {
        let (app, _) = app_with(vec![veg_room()]).await;

        let response = send(&app, "POST", "/api/rooms/veg/manual", Some(r#"{"duration": 0}"#)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["outcome"], "rejected");
    }

    #[tokio::test]
    async fn should_return_not_found_when_manual_room_unknown() {
        let (app, _) = app_with(vec![]).await;

        let response = send(&app, "POST", "/api/rooms/ghost/manual", Some("{}")).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test(start_paused = true)]
    async fn should_complete_event_when_run_by_hand() {
        let (app, _) = app_with(vec![veg_room()]).await;

        let response = send(&app, "POST", "/api/rooms/veg/events/P1/run", None).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["outcome"], "completed");
        assert_eq!(body["duration"], 6);
    }

    #[tokio::test]
    async fn should_return_not_found_when_event_missing() {
        let (app, _) = app_with(vec![veg_room()]).await;

        let response = send(&app, "POST", "/api/rooms/veg/events/P2/run", None).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn should_return_bad_request_when_event_type_unknown() {
        let (app, _) = app_with(vec![veg_room()]).await;

        let response = send(&app, "POST", "/api/rooms/veg/events/P3/run", None).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn should_report_not_stopped_when_room_idle() {
        let (app, _) = app_with(vec![veg_room()]).await;

        let response = send(&app, "POST", "/api/rooms/veg/stop", None).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["stopped"], false);
    }

    #[tokio::test]
    async fn should_stop_manual_run() {
        let (app, _) = app_with(vec![veg_room()]).await;
        send(&app, "POST", "/api/rooms/veg/manual", Some("{}")).await;

        let response = send(&app, "POST", "/api/rooms/veg/stop", None).await;

        assert_eq!(json(response).await["stopped"], true);
    }

    #[tokio::test]
    async fn should_list_failed_operations_when_emergency_stop_fails() {
        let (app, hardware) = app_with(vec![veg_room()]).await;
        hardware.break_entity("switch.veg_zone_2");

        let response = send(&app, "POST", "/api/rooms/veg/emergency_stop", None).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json(response).await;
        assert_eq!(body["failed_operations"][0], "zone:switch.veg_zone_2");
    }

    #[tokio::test]
    async fn should_return_no_content_when_emergency_stop_succeeds() {
        let (app, _) = app_with(vec![veg_room()]).await;

        let response = send(&app, "POST", "/api/rooms/veg/emergency_stop", None).await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn should_report_every_room_when_stopping_all() {
        let (app, _) = app_with(vec![veg_room()]).await;

        let response = send(&app, "POST", "/api/emergency_stop", None).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["veg_safety_shutoff"], true);
    }
}
