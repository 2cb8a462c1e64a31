use axum::Json;
use axum::extract::{Path, Query, State};
use common::Role;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{form_submission, user};
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::shared::{
    InstitutionQuery, MessageResponse, normalize_username, optional_text, required_text,
};
use crate::models::user::*;
use crate::policy::Actor;
use crate::state::AppState;
use crate::utils::hash;
use crate::utils::submission::submission_responses;
use crate::utils::user::*;

#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "Users",
    operation_id = "getMe",
    summary = "Get the caller's account",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor), fields(user_id = actor.user_id))]
pub async fn get_me(
    actor: Actor,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, AppError> {
    let model = find_active_user(&state.db, actor.user_id).await?;
    Ok(Json(user_response(&state.db, model).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/me",
    tag = "Users",
    operation_id = "updateMe",
    summary = "Update the caller's account",
    description = "Updates username, name, email, phone or image. Absent fields are left unchanged.",
    request_body = UpdateMeRequest,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR, USERNAME_TAKEN)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor, payload), fields(user_id = actor.user_id))]
pub async fn update_me(
    actor: Actor,
    State(state): State<AppState>,
    AppJson(payload): AppJson<UpdateMeRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let txn = state.db.begin().await?;
    let existing = find_active_user(&txn, actor.user_id).await?;
    let mut active: user::ActiveModel = existing.into();

    if let Some(ref raw) = payload.username {
        let username = normalize_username(raw)?;
        if username_taken_by_other(&txn, &username, actor.user_id).await? {
            return Err(AppError::UsernameTaken);
        }
        active.username = Set(username);
    }
    if let Some(ref name) = payload.name {
        active.name = Set(Some(required_text(name, "Name", 128)?));
    }
    if let Some(email) = payload.email {
        active.email = Set(optional_text(email));
    }
    if let Some(phone) = payload.phone {
        active.phone = Set(optional_text(phone));
    }
    if let Some(image) = payload.image {
        active.image = Set(optional_text(image));
    }

    let model = active.update(&txn).await.map_err(map_username_conflict)?;
    let body = user_response(&txn, model).await?;
    txn.commit().await?;

    Ok(Json(body))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/me",
    tag = "Users",
    operation_id = "deleteMe",
    summary = "Delete the caller's account",
    description = "Soft-deletes the account after confirming the password. Rejected while the caller administers any institution.",
    request_body = DeleteMeRequest,
    responses(
        (status = 200, description = "Account deleted", body = MessageResponse),
        (status = 400, description = "Still an institution admin (CONFLICT)", body = ErrorBody),
        (status = 401, description = "Wrong password (INVALID_CREDENTIALS) or unauthorized", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor, payload), fields(user_id = actor.user_id))]
pub async fn delete_me(
    actor: Actor,
    State(state): State<AppState>,
    AppJson(payload): AppJson<DeleteMeRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if payload.password.is_empty() {
        return Err(AppError::Validation(
            "Password is required to delete account".into(),
        ));
    }

    let model = find_active_user(&state.db, actor.user_id).await?;
    let valid = hash::verify_password(&payload.password, &model.password)
        .map_err(|e| AppError::Internal(format!("Password verify error: {}", e)))?;
    if !valid {
        return Err(AppError::InvalidCredentials);
    }

    if !actor.admin_of.is_empty() {
        return Err(AppError::Conflict(
            "Cannot delete account while administering an institution. Transfer admin rights first."
                .into(),
        ));
    }

    let mut active: user::ActiveModel = model.into();
    active.is_deleted = Set(true);
    active.deleted_at = Set(Some(chrono::Utc::now()));
    active.update(&state.db).await?;

    tracing::info!(user_id = actor.user_id, "Account soft-deleted");
    Ok(Json(MessageResponse::new("Account deleted successfully")))
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "Users",
    operation_id = "listUsers",
    summary = "List users of the caller's institutions",
    description = "Returns users sharing an institution with the caller (all users for super admins), newest first, each with a submission total.",
    params(UserListQuery),
    responses(
        (status = 200, description = "Users", body = Vec<UserListItem>),
        (status = 400, description = "Unknown role filter (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Institution outside the caller's memberships (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor, query), fields(user_id = actor.user_id))]
pub async fn list_users(
    actor: Actor,
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<UserListItem>>, AppError> {
    let scope = actor.scope(query.institution_id)?;

    let mut select = user::Entity::find()
        .filter(user::Column::IsDeleted.eq(false))
        .filter(member_condition(&scope))
        .filter(search_condition(query.search.as_deref()));

    if let Some(ref raw) = query.role {
        let role: Role = raw
            .parse()
            .map_err(|e: common::ParseEnumError| AppError::Validation(e.to_string()))?;
        select = select.filter(role_condition(&[role]));
    }

    let models = select
        .order_by_desc(user::Column::CreatedAt)
        .order_by_desc(user::Column::Id)
        .all(&state.db)
        .await?;

    let users = user_responses(&state.db, models).await?;
    let totals = submission_totals(&state.db, &users, &scope).await?;

    Ok(Json(
        users
            .into_iter()
            .map(|user| UserListItem {
                total_submissions: totals.get(&user.id).copied().unwrap_or(0),
                user,
            })
            .collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/tutors",
    tag = "Users",
    operation_id = "listTutors",
    summary = "List tutors of the caller's institutions",
    description = "Users holding the tutor or admin role, scoped like the user listing.",
    params(InstitutionQuery),
    responses(
        (status = 200, description = "Tutors", body = Vec<UserResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Institution outside the caller's memberships (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor, query), fields(user_id = actor.user_id))]
pub async fn list_tutors(
    actor: Actor,
    State(state): State<AppState>,
    Query(query): Query<InstitutionQuery>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let scope = actor.scope(query.institution_id)?;

    let models = user::Entity::find()
        .filter(user::Column::IsDeleted.eq(false))
        .filter(member_condition(&scope))
        .filter(role_condition(&[Role::Tutor, Role::Admin]))
        .order_by_asc(user::Column::Username)
        .all(&state.db)
        .await?;

    Ok(Json(user_responses(&state.db, models).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/tutors/{tutor_id}/residents",
    tag = "Users",
    operation_id = "listTutorResidents",
    summary = "List the residents supervised by a tutor",
    description = "Residents whose supervisor is the tutor, each with submission counters. Residents and counters are limited to the caller's institutions. Visible to the tutor, admins of the tutor's institutions and super admins.",
    params(("tutor_id" = i32, Path, description = "Tutor user ID"), InstitutionQuery),
    responses(
        (status = 200, description = "Residents", body = TutorResidentsResponse),
        (status = 400, description = "User is not a tutor (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Tutor not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor, query), fields(user_id = actor.user_id, tutor_id))]
pub async fn list_tutor_residents(
    actor: Actor,
    State(state): State<AppState>,
    Path(tutor_id): Path<i32>,
    Query(query): Query<InstitutionQuery>,
) -> Result<Json<TutorResidentsResponse>, AppError> {
    let tutor = find_active_user(&state.db, tutor_id)
        .await
        .map_err(|_| AppError::NotFound("Tutor not found".into()))?;
    let tutor = user_response(&state.db, tutor).await?;
    if !tutor.roles.contains(&Role::Tutor) {
        return Err(AppError::Validation("User is not a tutor".into()));
    }
    if actor.user_id != tutor_id && !administers_user(&actor, &tutor.institutions) {
        return Err(AppError::PermissionDenied);
    }

    let scope = actor.scope(query.institution_id)?;
    let models = user::Entity::find()
        .filter(user::Column::IsDeleted.eq(false))
        .filter(user::Column::SupervisorId.eq(tutor_id))
        .filter(role_condition(&[Role::Resident]))
        .filter(member_condition(&scope))
        .order_by_asc(user::Column::Username)
        .all(&state.db)
        .await?;

    let mut residents = Vec::with_capacity(models.len());
    for user in user_responses(&state.db, models).await? {
        let stats = resident_stats(&state.db, user.id, &scope).await?;
        residents.push(ResidentWithStats { user, stats });
    }

    Ok(Json(TutorResidentsResponse { tutor, residents }))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/residents/{resident_id}",
    tag = "Users",
    operation_id = "getResidentDetails",
    summary = "Get a resident with their submissions",
    description = "Tutors may view their own supervisees, institution admins residents of their institutions, everyone else only themselves. Submissions outside the caller's institutions are omitted. Super admins may view anyone.",
    params(("resident_id" = i32, Path, description = "Resident user ID")),
    responses(
        (status = 200, description = "Resident details", body = ResidentDetailsResponse),
        (status = 400, description = "User is not a resident (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Resident not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor), fields(user_id = actor.user_id, resident_id))]
pub async fn get_resident_details(
    actor: Actor,
    State(state): State<AppState>,
    Path(resident_id): Path<i32>,
) -> Result<Json<ResidentDetailsResponse>, AppError> {
    let model = find_active_user(&state.db, resident_id)
        .await
        .map_err(|_| AppError::NotFound("Resident not found".into()))?;
    let supervisor_id = model.supervisor_id;
    let resident = user_response(&state.db, model).await?;
    if !resident.roles.contains(&Role::Resident) {
        return Err(AppError::Validation("User is not a resident".into()));
    }

    let allowed = actor.is_super_admin
        || actor.user_id == resident_id
        || (actor.has_role(Role::Tutor) && supervisor_id == Some(actor.user_id))
        || administers_user(&actor, &resident.institutions);
    if !allowed {
        return Err(AppError::PermissionDenied);
    }

    let scope = actor.scope(None)?;
    let submissions = form_submission::Entity::find()
        .filter(form_submission::Column::ResidentId.eq(resident_id))
        .filter(scope.condition(form_submission::Column::InstitutionId))
        .order_by_desc(form_submission::Column::SubmissionDate)
        .all(&state.db)
        .await?;
    let statuses: Vec<_> = submissions.iter().map(|s| s.status).collect();
    let stats = stats_from(&statuses);
    let submissions = submission_responses(&state.db, submissions).await?;

    Ok(Json(ResidentDetailsResponse {
        resident,
        submissions,
        stats,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = "Users",
    operation_id = "getUser",
    summary = "Get a user by ID",
    description = "Visible to the user themselves, members of a shared institution and super admins.",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor), fields(user_id = actor.user_id, id))]
pub async fn get_user(
    actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<UserResponse>, AppError> {
    let model = find_active_user(&state.db, id).await?;
    let body = user_response(&state.db, model).await?;
    if !can_view_user(&actor, id, &body.institutions) {
        return Err(AppError::PermissionDenied);
    }
    Ok(Json(body))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    tag = "Users",
    operation_id = "updateUser",
    summary = "Update a user as institution admin",
    description = "Updates username, email, phone, image or supervisor of a user in one of the caller's administered institutions.",
    params(("id" = i32, Path, description = "User ID")),
    request_body = AdminUpdateUserRequest,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR, USERNAME_TAKEN)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor, payload), fields(user_id = actor.user_id, id))]
pub async fn update_user(
    actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<AdminUpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let txn = state.db.begin().await?;
    let existing = find_active_user(&txn, id).await?;
    let memberships = institutions_of(&txn, id).await?;
    if !administers_user(&actor, &memberships) {
        return Err(AppError::PermissionDenied);
    }
    if existing.is_super_admin && !actor.is_super_admin {
        return Err(AppError::PermissionDenied);
    }

    let mut active: user::ActiveModel = existing.into();
    if let Some(ref raw) = payload.username {
        let username = normalize_username(raw)?;
        if username_taken_by_other(&txn, &username, id).await? {
            return Err(AppError::UsernameTaken);
        }
        active.username = Set(username);
    }
    if let Some(email) = payload.email {
        active.email = Set(optional_text(email));
    }
    if let Some(phone) = payload.phone {
        active.phone = Set(optional_text(phone));
    }
    if let Some(image) = payload.image {
        active.image = Set(optional_text(image));
    }
    if let Some(supervisor_id) = payload.supervisor_id {
        if let Some(sid) = supervisor_id {
            if sid == id {
                return Err(AppError::Validation(
                    "A user cannot supervise themselves".into(),
                ));
            }
            ensure_supervisor(&txn, sid).await?;
        }
        active.supervisor_id = Set(supervisor_id);
    }

    let model = active.update(&txn).await.map_err(map_username_conflict)?;
    let body = user_response(&txn, model).await?;
    txn.commit().await?;

    Ok(Json(body))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    tag = "Users",
    operation_id = "deleteUser",
    summary = "Delete a user as institution admin",
    description = "Permanently deletes a user of one of the caller's administered institutions. Rejected for users taking part in submissions and for the last admin of an institution.",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 400, description = "User still referenced (CONFLICT)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor), fields(user_id = actor.user_id, id))]
pub async fn delete_user(
    actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    if id == actor.user_id {
        return Err(AppError::Validation(
            "Use DELETE /users/me to delete your own account".into(),
        ));
    }

    let txn = state.db.begin().await?;
    let existing = user::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    let memberships = institutions_of(&txn, id).await?;
    if !administers_user(&actor, &memberships) || existing.is_super_admin {
        return Err(AppError::PermissionDenied);
    }

    purge_user(&txn, id).await?;
    txn.commit().await?;

    tracing::info!(deleted_user = id, by = actor.user_id, "User deleted");
    Ok(Json(MessageResponse::new("User deleted successfully")))
}
