use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::jwt::AuthUser,
    error::ApiError,
    state::AppState,
    users::{
        dto::{MeResponse, MessageResponse, PublicUser, UpdateProfileRequest, UpdateSettingsRequest},
        repo::User,
    },
};

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_me).put(update_me))
        .route("/users/me/settings", put(update_settings))
}

#[instrument(skip(state, user))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<MeResponse>, ApiError> {
    let user = User::find_by_id(&state.db, user.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(MeResponse {
        user: PublicUser::from(&user),
        settings: user.settings.clone(),
    }))
}

#[instrument(skip(state, user, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if payload.name.is_none() && payload.avatar_url.is_none() {
        return Ok(Json(MessageResponse::new("No changes")));
    }

    User::update_profile(
        &state.db,
        user.user_id,
        payload.name.as_deref(),
        payload.avatar_url.as_deref(),
    )
    .await?;

    info!(user_id = %user.user_id, "profile updated");
    Ok(Json(MessageResponse::new("Profile updated")))
}

#[instrument(skip(state, user, payload))]
pub async fn update_settings(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<UpdateSettingsRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    User::update_settings(&state.db, user.user_id, &payload.settings).await?;
    info!(user_id = %user.user_id, "settings updated");
    Ok(Json(MessageResponse::new("Settings updated")))
}
