//! Web-driven login endpoints.

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::{qr::render_png, AuthSnapshot};
use crate::web::{error::ApiError, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct QrQuery {
    /// `text` returns the raw payload instead of a PNG
    pub format: Option<String>,
}

#[derive(Serialize)]
pub struct QrText {
    pub qr: String,
}

/// Start (or rejoin) a web QR login and return the code to scan.
pub async fn qr(
    State(state): State<AppState>,
    Query(query): Query<QrQuery>,
) -> Result<Response, ApiError> {
    let payload = state.arbiter.begin_web_qr().await?;

    if query.format.as_deref() == Some("text") {
        return Ok(Json(QrText { qr: payload }).into_response());
    }
    let png = render_png(&payload)?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

#[derive(Debug, Deserialize)]
pub struct PairRequest {
    pub phone: String,
}

#[derive(Serialize)]
pub struct PairResponse {
    pub code: String,
}

/// Start a pairing-code login for the given number.
pub async fn pair(
    State(state): State<AppState>,
    Json(req): Json<PairRequest>,
) -> Result<Json<PairResponse>, ApiError> {
    let code = state.arbiter.begin_web_pairing(&req.phone).await?;
    Ok(Json(PairResponse { code }))
}

pub async fn status(State(state): State<AppState>) -> Json<AuthSnapshot> {
    Json(state.arbiter.snapshot().await)
}
