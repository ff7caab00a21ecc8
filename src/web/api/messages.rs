//! Outbound messages through the ready session.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::transport::OutgoingContent;
use crate::web::{error::ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    /// Bare number or full chat id
    pub target: String,
    pub text: String,
    #[serde(default)]
    pub media_url: Option<String>,
}

#[derive(Serialize)]
pub struct SendResponse {
    pub status: &'static str,
    pub target: String,
}

/// `254700000000` → `254700000000@c.us`; chat ids pass through.
fn chat_id(target: &str) -> String {
    let target = target.trim();
    if target.contains('@') {
        target.to_string()
    } else {
        format!("{}@c.us", target.trim_start_matches('+'))
    }
}

pub async fn send(
    State(state): State<AppState>,
    Json(req): Json<SendRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    if req.target.trim().is_empty() {
        return Err(Error::Validation("target must not be empty".to_string()).into());
    }
    let target = chat_id(&req.target);
    let content = OutgoingContent {
        text: req.text,
        media_url: req.media_url,
    };

    state.arbiter.send(&target, &content).await?;
    tracing::info!("Sent message to {}", target);
    Ok(Json(SendResponse {
        status: "sent",
        target,
    }))
}
