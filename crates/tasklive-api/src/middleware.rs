use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::error;

use tasklive_types::api::Claims;

use crate::auth::AppState;
use crate::error::ApiError;

/// Extract and validate the bearer token from the Authorization header,
/// attaching the verified claims to the request for downstream handlers.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())
        .ok_or(ApiError::Unauthenticated)?
        .to_owned();

    let claims = verify_token(&state, &token).await?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// The ledger is consulted before the signature: a revoked token is a
/// closed session, not a forgery, and the two must stay distinguishable.
/// A ledger failure denies access rather than skipping the check.
pub async fn verify_token(state: &AppState, token: &str) -> Result<Claims, ApiError> {
    let db = state.clone();
    let raw = token.to_owned();
    let ttl = state.token_ttl;
    let revoked = tokio::task::spawn_blocking(move || db.db.is_token_revoked(&raw, Utc::now(), ttl))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::VerificationUnavailable
        })?
        .map_err(|e| {
            error!("revocation lookup failed: {}", e);
            ApiError::VerificationUnavailable
        })?;

    if revoked {
        return Err(ApiError::SessionClosed);
    }

    decode_claims(token, &state.jwt_secret).map_err(|_| ApiError::InvalidToken)
}

/// Signature + expiry validation only. The WebSocket handshake calls this
/// directly and skips the ledger.
pub fn decode_claims(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}
