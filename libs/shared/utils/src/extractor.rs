use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use shared_database::{AppState, MarketplaceStore};
use shared_models::auth::{Profile, Role, User};
use shared_models::error::AppError;
use shared_models::{Clinic, Patient, Regulator};

use crate::jwt::validate_token;

/// Validates the bearer token, resolves the caller's profile once and stores
/// both `User` and `Profile` in the request extensions.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = {
        let token = bearer_token(&request)?;
        validate_token(token, &state.config.jwt_secret).map_err(AppError::Auth)?
    };
    let profile = resolve_profile(state.store.as_ref(), &user).await?;
    debug!("Resolved {} profile for user {}", profile.role(), user.id);

    request.extensions_mut().insert(user);
    request.extensions_mut().insert(profile);

    Ok(next.run(request).await)
}

fn bearer_token<B>(request: &Request<B>) -> Result<&str, AppError> {
    let auth_value = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))
}

pub async fn resolve_profile(
    store: &dyn MarketplaceStore,
    user: &User,
) -> Result<Profile, AppError> {
    let profile = match user.role {
        Role::Patient => store.patient_by_user_id(user.id).await?.map(Profile::Patient),
        Role::Clinic => store.clinic_by_user_id(user.id).await?.map(Profile::Clinic),
        Role::Regulator => store
            .regulator_by_user_id(user.id)
            .await?
            .map(Profile::Regulator),
    };
    profile.ok_or_else(|| AppError::NotFound(format!("{} profile not found", user.role)))
}

async fn require_role(role: Role, request: Request<Body>, next: Next) -> Result<Response, AppError> {
    let actual = request
        .extensions()
        .get::<Profile>()
        .map(Profile::role)
        .ok_or_else(|| AppError::Auth("Profile not found in request extensions".to_string()))?;

    if actual != role {
        warn!("Rejected {} caller on {} route", actual, role);
        return Err(AppError::Forbidden(format!("{} access required", role)));
    }
    Ok(next.run(request).await)
}

pub async fn require_patient(request: Request<Body>, next: Next) -> Result<Response, AppError> {
    require_role(Role::Patient, request, next).await
}

pub async fn require_clinic(request: Request<Body>, next: Next) -> Result<Response, AppError> {
    require_role(Role::Clinic, request, next).await
}

pub async fn require_regulator(request: Request<Body>, next: Next) -> Result<Response, AppError> {
    require_role(Role::Regulator, request, next).await
}

// ==============================================================================
// EXTRACTORS
// ==============================================================================

pub struct CurrentUser(pub User);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<User>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Auth("User not found in request extensions".to_string()))
    }
}

fn profile_from(parts: &Parts) -> Result<&Profile, AppError> {
    parts
        .extensions
        .get::<Profile>()
        .ok_or_else(|| AppError::Auth("Profile not found in request extensions".to_string()))
}

pub struct CurrentProfile(pub Profile);

impl<S: Send + Sync> FromRequestParts<S> for CurrentProfile {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        profile_from(parts).cloned().map(CurrentProfile)
    }
}

pub struct CurrentPatient(pub Patient);

impl<S: Send + Sync> FromRequestParts<S> for CurrentPatient {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        profile_from(parts)?
            .as_patient()
            .cloned()
            .map(CurrentPatient)
            .ok_or_else(|| AppError::Forbidden("patient access required".to_string()))
    }
}

pub struct CurrentClinic(pub Clinic);

impl<S: Send + Sync> FromRequestParts<S> for CurrentClinic {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        profile_from(parts)?
            .as_clinic()
            .cloned()
            .map(CurrentClinic)
            .ok_or_else(|| AppError::Forbidden("clinic access required".to_string()))
    }
}

pub struct CurrentRegulator(pub Regulator);

impl<S: Send + Sync> FromRequestParts<S> for CurrentRegulator {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        profile_from(parts)?
            .as_regulator()
            .cloned()
            .map(CurrentRegulator)
            .ok_or_else(|| AppError::Forbidden("regulator access required".to_string()))
    }
}
