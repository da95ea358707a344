//! Registration, login, token refresh, logout and password recovery

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use hr_common::api::requests::{
    LoginRequest, LogoutRequest, RecoverRequest, RefreshRequest, RegisterRequest,
};
use hr_common::api::types::{DetailResponse, RegisterResponse, TokenResponse};
use hr_common::uuid_utils::parse_column;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::ApiJson;
use crate::auth::{expires_after, hash_password_blocking, verify_password_blocking};
use crate::db::{profiles, sessions};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/recover", post(recover))
}

/// Access token plus a fresh refresh token for a new or rotated session
fn token_response(
    state: &AppState,
    profile_id: Uuid,
    username: &str,
    refresh_token: String,
) -> ApiResult<TokenResponse> {
    Ok(TokenResponse {
        access_token: state.tokens.issue_access_token(profile_id, username)?,
        refresh_token,
        expires_in: state.tokens.access_ttl_secs(),
        token_type: "bearer".to_string(),
    })
}

/// POST /api/auth/register
///
/// Returns the one-time recovery codes; only their hashes are kept.
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    payload.validate()?;
    let auth = state.tokens.config();

    let password_hash = hash_password_blocking(payload.password.clone(), auth.password_cost).await?;

    let codes = state.tokens.new_recovery_codes();
    let code_hashes = codes
        .iter()
        .map(|code| state.tokens.hash_secret(code))
        .collect::<ApiResult<Vec<_>>>()?;
    let codes_expire_at = expires_after(auth.recovery_code_ttl)?;

    let profile = profiles::create_with_recovery_codes(
        &state.db,
        &payload.username,
        payload.display_name.as_deref(),
        &password_hash,
        &code_hashes,
        &codes_expire_at,
    )
    .await?;

    info!(username = %profile.username, "Registered new profile");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: parse_column("profiles.id", &profile.id)?,
            username: profile.username,
            display_name: profile.display_name,
            codes,
        }),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());

    let profile = profiles::find_by_username(&state.db, &payload.username)
        .await?
        .ok_or_else(invalid)?;
    let stored = profile.password_hash.clone().ok_or_else(invalid)?;

    if !verify_password_blocking(payload.password, stored).await? {
        warn!(username = %profile.username, "Failed login attempt");
        return Err(invalid());
    }

    let profile_id = parse_column("profiles.id", &profile.id)?;
    let refresh_token = state.tokens.new_refresh_token();
    sessions::create(
        &state.db,
        profile_id,
        &state.tokens.hash_secret(&refresh_token)?,
        &expires_after(state.tokens.config().refresh_ttl)?,
    )
    .await?;

    Ok(Json(token_response(
        &state,
        profile_id,
        &profile.username,
        refresh_token,
    )?))
}

/// POST /api/auth/refresh
///
/// Rotates the refresh token; the presented one stops working.
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let revoked = || ApiError::Unauthorized("Invalid or revoked refresh token".to_string());

    let presented_hash = state.tokens.hash_secret(&payload.refresh_token)?;
    let session = sessions::find_active(&state.db, &presented_hash)
        .await?
        .ok_or_else(revoked)?;

    if session.is_expired() {
        return Err(ApiError::Unauthorized("Refresh token expired".to_string()));
    }

    let profile_id = parse_column("user_sessions.profile_id", &session.profile_id)?;
    let profile = profiles::find_by_id(&state.db, profile_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid session".to_string()))?;

    let refresh_token = state.tokens.new_refresh_token();
    let rotated = sessions::rotate(
        &state.db,
        &session.id,
        &presented_hash,
        &state.tokens.hash_secret(&refresh_token)?,
        &expires_after(state.tokens.config().refresh_ttl)?,
    )
    .await?;
    if !rotated {
        return Err(revoked());
    }

    Ok(Json(token_response(
        &state,
        profile_id,
        &profile.username,
        refresh_token,
    )?))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LogoutRequest>,
) -> ApiResult<StatusCode> {
    let hash = state.tokens.hash_secret(&payload.refresh_token)?;
    sessions::revoke(&state.db, &hash).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/auth/recover
///
/// Spends one recovery code to set a new password. Existing sessions are
/// revoked so that whoever held the old password is signed out.
pub async fn recover(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RecoverRequest>,
) -> ApiResult<Json<DetailResponse>> {
    payload.validate()?;
    let unusable = || ApiError::Unauthorized("Invalid or already used recovery code".to_string());

    let code_hash = state.tokens.hash_secret(&payload.recovery_code)?;
    let code = sessions::find_recovery_code(&state.db, &code_hash)
        .await?
        .ok_or_else(unusable)?;

    if code.is_expired() {
        return Err(ApiError::Unauthorized("Recovery code expired".to_string()));
    }

    let password_hash =
        hash_password_blocking(payload.new_password, state.tokens.config().password_cost).await?;

    if !sessions::redeem_recovery_code(&state.db, &code, &password_hash).await? {
        return Err(unusable());
    }

    info!(profile_id = %code.profile_id, "Password reset with recovery code");
    Ok(Json(DetailResponse::new(
        "Password updated. You may now login using your username and new password.",
    )))
}
