//! JSON REST handlers for runtime settings.

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};

use irrigo_app::ports::{HardwareControl, Notifier, Storage};
use irrigo_domain::settings::Settings;

use crate::error::ApiError;
use crate::state::AppState;

/// Possible responses from the settings endpoints.
pub enum SettingsResponse {
    Ok(Json<Settings>),
}

impl IntoResponse for SettingsResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// `GET /api/settings`
pub async fn get<S, HW, N>(State(state): State<AppState<S, HW, N>>) -> SettingsResponse
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    SettingsResponse::Ok(Json(state.engine.settings()))
}

/// `PUT /api/settings`
///
/// Missing fields fall back to their defaults, not to the current values.
pub async fn update<S, HW, N>(
    State(state): State<AppState<S, HW, N>>,
    Json(settings): Json<Settings>,
) -> Result<SettingsResponse, ApiError>
where
    S: Storage + Send + Sync + 'static,
    HW: HardwareControl + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let updated = state.engine.update_settings(settings).await?;
    Ok(SettingsResponse::Ok(Json(updated)))
}
