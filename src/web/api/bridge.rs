//! Event ingress from the bridge sidecar.

use axum::{extract::State, http::StatusCode, Json};

use crate::error::Error;
use crate::transport::SessionEvent;
use crate::web::{error::ApiError, AppState};

pub async fn events(
    State(state): State<AppState>,
    Json(event): Json<SessionEvent>,
) -> Result<StatusCode, ApiError> {
    state
        .events
        .send(event)
        .await
        .map_err(|_| Error::Transport("event router is not running".to_string()))?;
    Ok(StatusCode::ACCEPTED)
}
