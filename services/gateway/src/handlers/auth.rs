//! Auth endpoints: register, login, refresh, logout, me.

use axum::{extract::State, response::IntoResponse, Extension, Json};
use serde::{Deserialize, Serialize};

use common::api::success_response;
use errors::EntregaError;

use crate::auth::{Principal, Role};
use crate::error::{ApiError, ApiResult};
use crate::users::{UserPublic, UserRecord};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    /// Accepts the legacy Spanish aliases; normalized at the boundary
    pub role: String,
    #[serde(default)]
    pub city: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub token_type: String,
    pub user: UserPublic,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub expires_in: u64,
    pub token_type: String,
}

fn issue_pair(state: &AppState, record: &UserRecord) -> ApiResult<TokenPairResponse> {
    let access_token = state
        .codec
        .issue_access(record.id, &record.email, record.role)?;
    let refresh_token = state
        .codec
        .issue_refresh(record.id, &record.email, record.role)?;
    state.users.store_refresh(record.id, refresh_token.clone());

    Ok(TokenPairResponse {
        access_token,
        refresh_token,
        expires_in: state.codec.access_expires_in(),
        token_type: "Bearer".to_string(),
        user: UserPublic::from(record),
    })
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let role: Role = req.role.parse()?;
    if role == Role::Admin {
        // Admin accounts are provisioned out of band, never via the
        // open registration endpoint.
        return Err(ApiError(EntregaError::Forbidden("access denied".to_string())));
    }

    let record = state
        .users
        .register(&req.email, &req.password, role, req.city)?;
    tracing::info!(user = %record.id, role = role.as_str(), "account registered");

    Ok(success_response(issue_pair(&state, &record)?))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let record = state.users.verify_login(&req.email, &req.password)?;
    Ok(success_response(issue_pair(&state, &record)?))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<impl IntoResponse> {
    let principal = state.codec.verify_refresh(&req.refresh_token)?;

    // The refresh token must also be the one currently on file; logout
    // removes it, which invalidates refresh immediately.
    if !state.users.refresh_matches(principal.id, &req.refresh_token) {
        return Err(ApiError(EntregaError::Unauthorized(
            "refresh token revoked".to_string(),
        )));
    }

    let access_token = state
        .codec
        .issue_access(principal.id, &principal.email, principal.role)?;

    Ok(success_response(RefreshResponse {
        access_token,
        expires_in: state.codec.access_expires_in(),
        token_type: "Bearer".to_string(),
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<impl IntoResponse> {
    state.users.revoke_refresh(principal.id);
    Ok(success_response(serde_json::json!({
        "message": "logged out"
    })))
}

pub async fn current_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<impl IntoResponse> {
    let record = state.users.get(principal.id).ok_or(ApiError(
        EntregaError::Unauthorized("account no longer exists".to_string()),
    ))?;
    Ok(success_response(UserPublic::from(&record)))
}
