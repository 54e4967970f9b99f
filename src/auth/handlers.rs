use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{
    AuthResponse, LoginRequest, MeData, MeResponse, MessageResponse, PublicUser, RefreshRequest,
    RegisterRequest, UpdateUserRequest, UserProfile, UsersCountResponse,
};
use super::extractors::{ensure_owner, AdminUser, AuthUser};
use super::jwt::JwtKeys;
use super::repo::User;
use super::services;
use crate::error::ApiError;
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signin", post(signin))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/confirm-email/:confirmation_id", get(confirm_email))
        .route("/me", get(get_me))
        .route("/user/:id", put(update_user).delete(delete_user))
        .route("/users", get(list_users))
}

#[instrument(skip(state, payload))]
pub async fn signin(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    services::register(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::ok(
            "Your account has been created. Please check your emails to activate it.",
        )),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| {
            warn!(email = %payload.email, "login unknown email");
            ApiError::unauthorized("Invalid credentials.")
        })?;

    if !services::verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::unauthorized("Invalid credentials."));
    }

    if user.is_banned() {
        warn!(user_id = %user.id, "login on banned account");
        return Err(ApiError::unauthorized("Your account has been banned."));
    }
    if !user.is_active() {
        return Err(ApiError::unauthorized(
            "Your account is not activated. Please check your emails.",
        ));
    }

    let keys = JwtKeys::from_ref(&state);
    let roles = user.effective_roles();
    let access_token = keys.sign_access(user.id, &roles)?;
    let refresh_token = keys.sign_refresh(user.id, &roles)?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser {
            id: user.id,
            email: user.email,
            firstname: user.firstname,
        },
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|_| ApiError::unauthorized("Invalid refresh token."))?;

    // reload so role or status changes since sign time take effect
    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid refresh token."))?;

    let roles = user.effective_roles();
    let access_token = keys.sign_access(user.id, &roles)?;
    let refresh_token = keys.sign_refresh(user.id, &roles)?;

    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser {
            id: user.id,
            email: user.email,
            firstname: user.firstname,
        },
    }))
}

#[instrument(skip(state))]
pub async fn confirm_email(
    State(state): State<AppState>,
    Path(confirmation_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    services::confirm(&state, &confirmation_id).await?;
    Ok(Json(MessageResponse::ok(
        "Your account has been activated!",
    )))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> Result<Json<MeResponse>, ApiError> {
    let user = User::find_by_id(&state.db, principal.id)
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    Ok(Json(MeResponse {
        success: true,
        message: "You are logged in.".into(),
        data: MeData {
            user: UserProfile {
                id: user.id,
                email: user.email,
                firstname: user.firstname,
                lastname: user.lastname,
                status: user.status,
            },
        },
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<StatusCode, ApiError> {
    ensure_owner(&principal, id)?;
    services::update_account(&state, id, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    ensure_owner(&principal, id)?;
    services::delete_account(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_principal): AdminUser,
) -> Result<Json<UsersCountResponse>, ApiError> {
    let count = User::count(&state.db).await?;
    Ok(Json(UsersCountResponse { count }))
}
