use axum::Json;
use axum::extract::State;
use sea_orm::*;
use tracing::instrument;

use crate::entity::profile;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::profile::*;
use crate::models::shared::optional_text;
use crate::state::AppState;

/// Fetch the user's profile, creating an empty one on first access.
async fn get_or_create<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<profile::Model, AppError> {
    let existing = profile::Entity::find()
        .filter(profile::Column::UserId.eq(user_id))
        .one(db)
        .await?;
    if let Some(model) = existing {
        return Ok(model);
    }

    let now = chrono::Utc::now();
    let inserted = profile::ActiveModel {
        user_id: Set(user_id),
        avatar: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await;

    match inserted {
        Ok(model) => Ok(model),
        // Lost a race with a concurrent first access.
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            profile::Entity::find()
                .filter(profile::Column::UserId.eq(user_id))
                .one(db)
                .await?
                .ok_or_else(|| AppError::Internal("Profile vanished after conflict".into()))
        }
        Err(e) => Err(e.into()),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/profiles/me",
    tag = "Profiles",
    operation_id = "getMyProfile",
    summary = "Get own profile",
    description = "Creates an empty profile on first access.",
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth), fields(user_id = auth.user_id))]
pub async fn get_my_profile(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ProfileResponse>, AppError> {
    let model = get_or_create(&state.db, auth.user_id).await?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    put,
    path = "/api/v1/profiles/me/avatar",
    tag = "Profiles",
    operation_id = "updateMyAvatar",
    summary = "Set own avatar",
    request_body = UpdateAvatarRequest,
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth, payload), fields(user_id = auth.user_id))]
pub async fn update_my_avatar(
    auth: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<UpdateAvatarRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    let avatar = optional_text(payload.avatar);
    if avatar.as_ref().is_some_and(|a| a.chars().count() > 2048) {
        return Err(AppError::Validation(
            "Avatar URL must be at most 2048 characters".into(),
        ));
    }

    let model = get_or_create(&state.db, auth.user_id).await?;
    let mut active: profile::ActiveModel = model.into();
    active.avatar = Set(avatar);
    active.updated_at = Set(chrono::Utc::now());
    let model = active.update(&state.db).await?;
    Ok(Json(model.into()))
}
