//! System-wide health, fail-safe and diagnostics endpoints.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use irrigo_app::ports::{HardwareControl, Notifier, Storage};
use irrigo_domain::diagnostics::{ErrorStatistics, OperationStats};
use irrigo_domain::history::CycleMetrics;
use irrigo_domain::status::{FailSafeStatus, SystemHealth};

use crate::error::ApiError;
use crate::state::AppState;

/// Cycle counters together with their derived ratios.
#[derive(Debug, Serialize)]
pub struct MetricsBody {
    #[serde(flatten)]
    pub counters: CycleMetrics,
    pub average_duration: f64,
    pub success_rate: f64,
}

impl From<CycleMetrics> for MetricsBody {
    fn from(counters: CycleMetrics) -> Self {
        Self {
            average_duration: counters.average_duration(),
            success_rate: counters.success_rate(),
            counters,
        }
    }
}

/// Possible responses from the metrics endpoint.
pub enum MetricsResponse {
    Ok(Json<MetricsBody>),
}

impl IntoResponse for MetricsResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the clearing endpoints.
pub enum ClearResponse {
    NoContent,
}

impl IntoResponse for ClearResponse {
    fn into_response(self) -> Response {
        match self {
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `GET /api/system/health`
pub async fn health<S, HW, N>(State(state): State<AppState<S, HW, N>>) -> Json<SystemHealth>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    Json(state.engine.system_health())
}

/// `GET /api/system/fail_safe`
pub async fn fail_safe<S, HW, N>(State(state): State<AppState<S, HW, N>>) -> Json<FailSafeStatus>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    Json(state.engine.fail_safe_status())
}

/// `GET /api/system/errors`
pub async fn errors<S, HW, N>(State(state): State<AppState<S, HW, N>>) -> Json<ErrorStatistics>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    Json(state.engine.error_statistics())
}

/// `DELETE /api/system/errors`
pub async fn clear_errors<S, HW, N>(State(state): State<AppState<S, HW, N>>) -> ClearResponse
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    state.engine.clear_error_history();
    ClearResponse::NoContent
}

/// `GET /api/system/operations`
pub async fn operations<S, HW, N>(
    State(state): State<AppState<S, HW, N>>,
) -> Json<BTreeMap<String, OperationStats>>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    Json(state.engine.operation_stats())
}

/// `GET /api/system/metrics`
pub async fn metrics<S, HW, N>(
    State(state): State<AppState<S, HW, N>>,
) -> Result<MetricsResponse, ApiError>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let metrics = state.engine.cycle_metrics().await?;
    Ok(MetricsResponse::Ok(Json(metrics.into())))
}

/// `DELETE /api/system/metrics`
pub async fn reset_metrics<S, HW, N>(
    State(state): State<AppState<S, HW, N>>,
) -> Result<ClearResponse, ApiError>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    state.engine.reset_cycle_metrics().await?;
    Ok(ClearResponse::NoContent)
}
