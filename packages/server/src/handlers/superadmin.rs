use std::collections::BTreeSet;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::{Role, SubmissionStatus};
use sea_orm::*;
use tracing::instrument;

use crate::entity::{form_submission, form_template, institution, institution_admin, user};
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::shared::{
    MessageResponse, normalize_username, optional_text, required_text, validate_bulk_ids,
    validate_password,
};
use crate::models::superadmin::*;
use crate::models::user::{UserListItem, UserListQuery, UserResponse};
use crate::policy::{Actor, InstitutionScope};
use crate::state::AppState;
use crate::utils::hash;
use crate::utils::user::*;

const MAX_INSTITUTIONS_PER_USER: usize = 50;

/// Replace a user's memberships, keeping those of institutions they administer.
async fn replace_institutions<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    institution_ids: &[i32],
) -> Result<(), AppError> {
    validate_bulk_ids(institution_ids, "institution_ids", MAX_INSTITUTIONS_PER_USER)?;
    ensure_institutions_exist(db, institution_ids).await?;

    let administered: Vec<i32> = institution_admin::Entity::find()
        .filter(institution_admin::Column::UserId.eq(user_id))
        .select_only()
        .column(institution_admin::Column::InstitutionId)
        .into_tuple()
        .all(db)
        .await?;
    if let Some(missing) = administered
        .iter()
        .find(|iid| !institution_ids.contains(iid))
    {
        return Err(AppError::Conflict(format!(
            "User administers institution {missing}; remove them as admin first"
        )));
    }

    set_institutions(db, user_id, institution_ids).await?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/v1/superadmin/users",
    tag = "Super Admin",
    operation_id = "superadminListUsers",
    summary = "List every user",
    params(UserListQuery),
    responses(
        (status = 200, description = "Users", body = Vec<UserListItem>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor, query), fields(user_id = actor.user_id))]
pub async fn list_users(
    actor: Actor,
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<UserListItem>>, AppError> {
    actor.require_super_admin()?;

    let scope = match query.institution_id {
        Some(iid) => InstitutionScope::Only(vec![iid]),
        None => InstitutionScope::All,
    };
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
    let totals = submission_totals(&state.db, &users, &InstitutionScope::All).await?;

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
    post,
    path = "/api/v1/superadmin/users",
    tag = "Super Admin",
    operation_id = "superadminCreateUser",
    summary = "Create a user",
    description = "Creates an account in one or more institutions. The user must change the password on first login.",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR, USERNAME_TAKEN)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Institution or supervisor not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor, payload), fields(user_id = actor.user_id, username = %payload.username))]
pub async fn create_user_account(
    actor: Actor,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    actor.require_super_admin()?;
    let username = normalize_username(&payload.username)?;
    validate_password(&payload.password)?;
    let name = required_text(&payload.name, "Name", 128)?;
    let roles = parse_assignable_roles(&payload.roles)?;
    validate_bulk_ids(
        &payload.institution_ids,
        "institution_ids",
        MAX_INSTITUTIONS_PER_USER,
    )?;

    let txn = state.db.begin().await?;
    ensure_institutions_exist(&txn, &payload.institution_ids).await?;
    if let Some(sid) = payload.supervisor_id {
        ensure_supervisor(&txn, sid).await?;
    }

    let model = create_user(
        &txn,
        NewUser {
            username,
            password: payload.password,
            name: Some(name),
            email: optional_text(payload.email),
            phone: optional_text(payload.phone),
            roles,
            institution_ids: payload.institution_ids,
            supervisor_id: payload.supervisor_id,
            is_super_admin: false,
            is_first_login: true,
        },
    )
    .await?;
    let body = user_response(&txn, model).await?;
    txn.commit().await?;

    tracing::info!(new_user = body.id, "User created by super admin");
    Ok((StatusCode::CREATED, Json(body)))
}

#[utoipa::path(
    get,
    path = "/api/v1/superadmin/users/{id}",
    tag = "Super Admin",
    operation_id = "superadminGetUser",
    summary = "Get any user",
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
    actor.require_super_admin()?;
    let model = find_active_user(&state.db, id).await?;
    Ok(Json(user_response(&state.db, model).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/superadmin/users/{id}",
    tag = "Super Admin",
    operation_id = "superadminUpdateUser",
    summary = "Update any user",
    description = "Updates profile fields, roles, memberships and supervisor. A new password forces a change on next login.",
    params(("id" = i32, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Validation error or conflict (VALIDATION_ERROR, USERNAME_TAKEN, CONFLICT)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "User, institution or supervisor not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor, payload), fields(user_id = actor.user_id, id))]
pub async fn update_user(
    actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    actor.require_super_admin()?;
    let username = payload
        .username
        .as_deref()
        .map(normalize_username)
        .transpose()?;
    let name = payload
        .name
        .as_deref()
        .map(|n| required_text(n, "Name", 128))
        .transpose()?;
    let roles = payload
        .roles
        .as_deref()
        .map(parse_assignable_roles)
        .transpose()?;
    if let Some(ref password) = payload.password {
        validate_password(password)?;
    }

    let txn = state.db.begin().await?;
    let existing = find_active_user(&txn, id).await?;
    let is_super_admin = existing.is_super_admin;
    let mut active: user::ActiveModel = existing.into();

    if let Some(username) = username {
        if username_taken_by_other(&txn, &username, id).await? {
            return Err(AppError::UsernameTaken);
        }
        active.username = Set(username);
    }
    if let Some(name) = name {
        active.name = Set(Some(name));
    }
    if let Some(email) = payload.email {
        active.email = Set(optional_text(email));
    }
    if let Some(phone) = payload.phone {
        active.phone = Set(optional_text(phone));
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
    if let Some(ref password) = payload.password {
        let hashed = hash::hash_password(password)
            .map_err(|e| AppError::Internal(format!("Password hash error: {}", e)))?;
        active.password = Set(hashed);
        active.is_first_login = Set(true);
    }
    let model = active.update(&txn).await.map_err(map_username_conflict)?;

    if let Some(mut roles) = roles {
        if is_super_admin {
            roles.insert(Role::SuperAdmin);
        }
        set_roles(&txn, id, &roles).await?;
    }
    if let Some(ref institution_ids) = payload.institution_ids {
        replace_institutions(&txn, id, institution_ids).await?;
    }

    let body = user_response(&txn, model).await?;
    txn.commit().await?;

    Ok(Json(body))
}

#[utoipa::path(
    patch,
    path = "/api/v1/superadmin/users/{id}/institutions",
    tag = "Super Admin",
    operation_id = "superadminSetUserInstitutions",
    summary = "Replace a user's institutions",
    params(("id" = i32, Path, description = "User ID")),
    request_body = SetInstitutionsRequest,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Validation error or conflict (VALIDATION_ERROR, CONFLICT)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "User or institution not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor, payload), fields(user_id = actor.user_id, id))]
pub async fn set_user_institutions(
    actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<SetInstitutionsRequest>,
) -> Result<Json<UserResponse>, AppError> {
    actor.require_super_admin()?;

    let txn = state.db.begin().await?;
    let model = find_active_user(&txn, id).await?;
    replace_institutions(&txn, id, &payload.institution_ids).await?;
    let body = user_response(&txn, model).await?;
    txn.commit().await?;

    Ok(Json(body))
}

#[utoipa::path(
    delete,
    path = "/api/v1/superadmin/users/{id}",
    tag = "Super Admin",
    operation_id = "superadminDeleteUser",
    summary = "Delete any user",
    description = "Permanently deletes the account. Super admins and users taking part in submissions cannot be deleted.",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 400, description = "User cannot be deleted (VALIDATION_ERROR, CONFLICT)", body = ErrorBody),
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
    actor.require_super_admin()?;

    let txn = state.db.begin().await?;
    let existing = user::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    if existing.is_super_admin {
        return Err(AppError::Validation("Cannot delete a super admin".into()));
    }
    purge_user(&txn, id).await?;
    txn.commit().await?;

    tracing::info!(deleted_user = id, "User deleted by super admin");
    Ok(Json(MessageResponse::new("User deleted successfully")))
}

#[utoipa::path(
    post,
    path = "/api/v1/superadmin/create-superadmin",
    tag = "Super Admin",
    operation_id = "createSuperAdmin",
    summary = "Create another super admin",
    request_body = CreateSuperAdminRequest,
    responses(
        (status = 201, description = "Super admin created", body = UserResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR, USERNAME_TAKEN)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor, payload), fields(user_id = actor.user_id, username = %payload.username))]
pub async fn create_super_admin(
    actor: Actor,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateSuperAdminRequest>,
) -> Result<impl IntoResponse, AppError> {
    actor.require_super_admin()?;
    let username = normalize_username(&payload.username)?;
    validate_password(&payload.password)?;
    let name = required_text(&payload.name, "Name", 128)?;

    let txn = state.db.begin().await?;
    let model = create_user(
        &txn,
        NewUser {
            username,
            password: payload.password,
            name: Some(name),
            email: optional_text(payload.email),
            phone: None,
            roles: BTreeSet::from([Role::SuperAdmin]),
            institution_ids: Vec::new(),
            supervisor_id: None,
            is_super_admin: true,
            is_first_login: true,
        },
    )
    .await?;
    let body = user_response(&txn, model).await?;
    txn.commit().await?;

    tracing::info!(new_user = body.id, "Super admin created");
    Ok((StatusCode::CREATED, Json(body)))
}

#[utoipa::path(
    get,
    path = "/api/v1/superadmin/stats",
    tag = "Super Admin",
    operation_id = "platformStats",
    summary = "Platform-wide counters",
    responses(
        (status = 200, description = "Statistics", body = PlatformStats),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor), fields(user_id = actor.user_id))]
pub async fn platform_stats(
    actor: Actor,
    State(state): State<AppState>,
) -> Result<Json<PlatformStats>, AppError> {
    actor.require_super_admin()?;
    let db = &state.db;
    let live_users = || user::Entity::find().filter(user::Column::IsDeleted.eq(false));

    Ok(Json(PlatformStats {
        institutions: institution::Entity::find().count(db).await?,
        active_institutions: institution::Entity::find()
            .filter(institution::Column::IsActive.eq(true))
            .count(db)
            .await?,
        users: live_users().count(db).await?,
        super_admins: live_users()
            .filter(user::Column::IsSuperAdmin.eq(true))
            .count(db)
            .await?,
        form_templates: form_template::Entity::find().count(db).await?,
        submissions: form_submission::Entity::find().count(db).await?,
        completed_submissions: form_submission::Entity::find()
            .filter(form_submission::Column::Status.eq(SubmissionStatus::Completed))
            .count(db)
            .await?,
    }))
}
