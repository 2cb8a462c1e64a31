use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::*;
use tracing::instrument;

use crate::entity::notification;
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::notification::*;
use crate::models::shared::required_text;
use crate::policy::Actor;
use crate::state::AppState;
use crate::utils::user::{find_active_user, institutions_of};

async fn find_owned<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    id: i32,
) -> Result<notification::Model, AppError> {
    let model = notification::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Notification not found".into()))?;
    if model.user_id != actor.user_id && !actor.is_super_admin {
        return Err(AppError::PermissionDenied);
    }
    Ok(model)
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications",
    tag = "Notifications",
    operation_id = "createNotification",
    summary = "Notify a user",
    description = "Admins may notify anyone; other callers only users sharing one of their institutions.",
    request_body = CreateNotificationRequest,
    responses(
        (status = 201, description = "Notification created", body = NotificationResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor, payload), fields(user_id = actor.user_id, target = payload.user_id, kind = ?payload.kind))]
pub async fn create_notification(
    actor: Actor,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateNotificationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let message = required_text(&payload.message, "Message", 2_000)?;
    find_active_user(&state.db, payload.user_id).await?;

    if !actor.is_admin() && payload.user_id != actor.user_id {
        let shared = institutions_of(&state.db, payload.user_id)
            .await?
            .iter()
            .any(|iid| actor.institutions.contains(iid));
        if !shared {
            return Err(AppError::PermissionDenied);
        }
    }

    let model = notification::ActiveModel {
        user_id: Set(payload.user_id),
        message: Set(message),
        kind: Set(payload.kind),
        is_read: Set(false),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(NotificationResponse::from(model))))
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications/user/{user_id}",
    tag = "Notifications",
    operation_id = "listUserNotifications",
    summary = "List a user's notifications",
    description = "Newest first. Only the user themselves or a super admin may read them.",
    params(("user_id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Notifications", body = Vec<NotificationResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor), fields(user_id = actor.user_id, target = user_id))]
pub async fn list_user_notifications(
    actor: Actor,
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<Json<Vec<NotificationResponse>>, AppError> {
    if user_id != actor.user_id && !actor.is_super_admin {
        return Err(AppError::PermissionDenied);
    }
    let models = notification::Entity::find()
        .filter(notification::Column::UserId.eq(user_id))
        .order_by_desc(notification::Column::CreatedAt)
        .order_by_desc(notification::Column::Id)
        .all(&state.db)
        .await?;
    Ok(Json(models.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    put,
    path = "/api/v1/notifications/{id}/read",
    tag = "Notifications",
    operation_id = "markNotificationRead",
    summary = "Mark a notification as read",
    params(("id" = i32, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Updated notification", body = NotificationResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Notification not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor), fields(user_id = actor.user_id, id))]
pub async fn mark_read(
    actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<NotificationResponse>, AppError> {
    let model = find_owned(&state.db, &actor, id).await?;
    if model.is_read {
        return Ok(Json(model.into()));
    }
    let mut active: notification::ActiveModel = model.into();
    active.is_read = Set(true);
    let model = active.update(&state.db).await?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/notifications/{id}",
    tag = "Notifications",
    operation_id = "deleteNotification",
    summary = "Delete a notification",
    params(("id" = i32, Path, description = "Notification ID")),
    responses(
        (status = 204, description = "Notification deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Notification not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor), fields(user_id = actor.user_id, id))]
pub async fn delete_notification(
    actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let model = find_owned(&state.db, &actor, id).await?;
    model.delete(&state.db).await?;
    Ok(StatusCode::NO_CONTENT)
}
