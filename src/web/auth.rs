//! Bearer-token guard for the control surface.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use super::{error::ApiError, AppState};
use crate::error::{Error, Result};

/// Default token lifetime in hours.
pub const DEFAULT_TOKEN_HOURS: u64 = 24;

/// JWT claims.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (operator name)
    pub exp: usize,  // Expiration time
    pub iat: usize,  // Issued at
}

fn now() -> Result<usize> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| Error::Other(e.to_string()))?
        .as_secs() as usize)
}

/// Generate an HS256 token for `subject`, valid for `hours`.
pub fn generate_token(secret: &str, subject: &str, hours: u64) -> Result<String> {
    let now = now()?;
    let claims = Claims {
        sub: subject.to_string(),
        exp: now + (hours * 3600) as usize,
        iat: now,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| Error::Other(format!("token encoding failed: {}", e)))
}

/// Validate a token against `secret`.
pub fn validate_token(secret: &str, token: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| Error::Unauthorized(e.to_string()))?;

    Ok(token_data.claims)
}

/// Extract token from Authorization header.
pub fn extract_token(auth_header: Option<&str>) -> Result<&str> {
    let header =
        auth_header.ok_or_else(|| Error::Unauthorized("missing Authorization header".to_string()))?;

    header
        .strip_prefix("Bearer ")
        .ok_or_else(|| Error::Unauthorized("invalid Authorization header format".to_string()))
}

/// Reject requests without a valid bearer token. Open when no secret is set.
pub async fn require_token(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(secret) = state.secret.as_deref() else {
        return next.run(req).await;
    };

    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let checked = extract_token(header).and_then(|token| validate_token(secret, token));

    match checked {
        Ok(claims) => {
            tracing::debug!("Control request from '{}'", claims.sub);
            next.run(req).await
        }
        Err(e) => {
            tracing::warn!("Rejected control request to {}: {}", req.uri().path(), e);
            ApiError::from(e).into_response()
        }
    }
}
