use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::error;
use uuid::Uuid;

use tasklive_db::Database;
use tasklive_gateway::dispatcher::Dispatcher;
use tasklive_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::error::{ApiError, join_error};
use crate::middleware::bearer_token;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    /// Process-wide signing key, injected at startup.
    pub jwt_secret: String,
    /// Token lifetime; doubles as the revocation-entry TTL.
    pub token_ttl: Duration,
    pub dispatcher: Dispatcher,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("password hashing failed: {}", e);
            ApiError::Persistence
        })?
        .to_string();

    let user_id = Uuid::new_v4();

    // A taken email surfaces as StoreError::Duplicate -> duplicate_identity.
    let db = state.clone();
    let (email, username) = (req.email, req.username);
    tokio::task::spawn_blocking(move || {
        db.db
            .create_user(&user_id.to_string(), &email, &username, &password_hash)
    })
    .await
    .map_err(join_error)??;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let email = req.email.clone();
    let user = tokio::task::spawn_blocking(move || db.db.get_user_by_email(&email))
        .await
        .map_err(join_error)??
        // Unknown email and wrong password collapse into the same error so
        // the response never reveals which check failed.
        .ok_or(ApiError::InvalidCredentials)?;

    let parsed_hash = PasswordHash::new(&user.password).map_err(|e| {
        error!("stored password hash is unreadable: {}", e);
        ApiError::Persistence
    })?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::InvalidCredentials)?;

    let user_id: Uuid = user.id.parse().map_err(|e| {
        error!("corrupt user id '{}': {}", user.id, e);
        ApiError::Persistence
    })?;

    let token = issue_token(
        &state.jwt_secret,
        state.token_ttl,
        user_id,
        &user.email,
        &user.username,
    )
    .map_err(|e| {
        error!("token encoding failed: {}", e);
        ApiError::Persistence
    })?;

    Ok(Json(LoginResponse { token }))
}

/// Idempotent: revoking a token already in the ledger succeeds again, so
/// a client may retry logout freely. The signature is not checked first —
/// an unverifiable value in the ledger blocks nothing that the verifier
/// wouldn't reject anyway.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token = bearer_token(&headers)
        .ok_or(ApiError::Unauthenticated)?
        .to_owned();

    let db = state.clone();
    let ttl = state.token_ttl;
    tokio::task::spawn_blocking(move || db.db.revoke_token(&token, Utc::now(), ttl))
        .await
        .map_err(join_error)??;

    Ok(StatusCode::OK)
}

pub fn issue_token(
    secret: &str,
    ttl: Duration,
    user_id: Uuid,
    email: &str,
    username: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        username: username.to_string(),
        iat: now.timestamp() as usize,
        exp: (now + ttl).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}
