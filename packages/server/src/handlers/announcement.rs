use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::*;
use tracing::instrument;

use crate::entity::announcement;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::announcement::*;
use crate::models::shared::{optional_text, required_text};
use crate::policy::Actor;
use crate::state::AppState;

async fn find_announcement<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<announcement::Model, AppError> {
    announcement::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Announcement not found".into()))
}

#[utoipa::path(
    get,
    path = "/api/v1/announcements",
    tag = "Announcements",
    operation_id = "listAnnouncements",
    summary = "List announcements",
    description = "Newest first by announcement date.",
    responses(
        (status = 200, description = "Announcements", body = Vec<AnnouncementResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth), fields(user_id = auth.user_id))]
pub async fn list_announcements(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<AnnouncementResponse>>, AppError> {
    let models = announcement::Entity::find()
        .order_by_desc(announcement::Column::Date)
        .order_by_desc(announcement::Column::Id)
        .all(&state.db)
        .await?;
    Ok(Json(models.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/api/v1/announcements",
    tag = "Announcements",
    operation_id = "createAnnouncement",
    summary = "Publish an announcement",
    request_body = CreateAnnouncementRequest,
    responses(
        (status = 201, description = "Announcement created", body = AnnouncementResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor, payload), fields(user_id = actor.user_id))]
pub async fn create_announcement(
    actor: Actor,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateAnnouncementRequest>,
) -> Result<impl IntoResponse, AppError> {
    actor.require_admin_role()?;
    let title = required_text(&payload.title, "Title", 256)?;
    let body = required_text(&payload.body, "Body", 20_000)?;

    let now = chrono::Utc::now();
    let model = announcement::ActiveModel {
        title: Set(title),
        body: Set(body),
        date: Set(payload.date.unwrap_or(now)),
        file: Set(optional_text(payload.file)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    tracing::info!(announcement_id = model.id, "Announcement published");
    Ok((StatusCode::CREATED, Json(AnnouncementResponse::from(model))))
}

#[utoipa::path(
    get,
    path = "/api/v1/announcements/{id}",
    tag = "Announcements",
    operation_id = "getAnnouncement",
    summary = "Get an announcement",
    params(("id" = i32, Path, description = "Announcement ID")),
    responses(
        (status = 200, description = "Announcement", body = AnnouncementResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Announcement not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth), fields(user_id = auth.user_id, id))]
pub async fn get_announcement(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<AnnouncementResponse>, AppError> {
    let model = find_announcement(&state.db, id).await?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/announcements/{id}",
    tag = "Announcements",
    operation_id = "deleteAnnouncement",
    summary = "Delete an announcement",
    params(("id" = i32, Path, description = "Announcement ID")),
    responses(
        (status = 204, description = "Announcement deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Announcement not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor), fields(user_id = actor.user_id, id))]
pub async fn delete_announcement(
    actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    actor.require_admin_role()?;
    let model = find_announcement(&state.db, id).await?;
    model.delete(&state.db).await?;
    Ok(StatusCode::NO_CONTENT)
}
