use std::sync::Arc;

use axum::{extract::State, Json};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;

use shared_database::AppState;
use shared_models::auth::TokenResponse;
use shared_models::error::AppError;
use shared_utils::extractor::{CurrentProfile, CurrentUser};
use shared_utils::jwt::validate_token as decode_token;

type BearerHeader = Option<TypedHeader<Authorization<Bearer>>>;

fn bearer(header: BearerHeader) -> Result<String, AppError> {
    header
        .map(|TypedHeader(auth)| auth.token().to_string())
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))
}

/// Decodes the bearer token and echoes its principal. Invalid tokens are 401.
#[axum::debug_handler]
pub async fn validate_token(
    State(state): State<Arc<AppState>>,
    header: BearerHeader,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = bearer(header)?;
    let user = decode_token(&token, &state.config.jwt_secret).map_err(AppError::Auth)?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        username: user.username,
        role: user.role,
    }))
}

/// Like `validate_token`, but answers `{"valid": false}` instead of failing.
#[axum::debug_handler]
pub async fn verify_token(
    State(state): State<Arc<AppState>>,
    header: BearerHeader,
) -> Result<Json<Value>, AppError> {
    debug!("Verifying token");

    let token = bearer(header)?;
    let valid = decode_token(&token, &state.config.jwt_secret).is_ok();

    Ok(Json(json!({ "valid": valid })))
}

#[axum::debug_handler]
pub async fn get_me(
    CurrentUser(user): CurrentUser,
    CurrentProfile(profile): CurrentProfile,
) -> Result<Json<Value>, AppError> {
    debug!("Getting profile for user: {}", user.id);

    Ok(Json(json!({
        "user_id": user.id,
        "username": user.username,
        "profile": profile
    })))
}
