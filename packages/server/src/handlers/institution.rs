use std::collections::BTreeSet;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::{Role, SubmissionStatus};
use sea_orm::*;
use tracing::instrument;

use crate::entity::{
    form_submission, form_template, institution, institution_admin, user, user_institution,
};
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::institution::*;
use crate::models::shared::{MessageResponse, optional_text, validate_bulk_ids};
use crate::models::user::UserResponse;
use crate::policy::{Actor, InstitutionScope};
use crate::state::AppState;
use crate::utils::form_template::delete_template_rows;
use crate::utils::institution::*;
use crate::utils::user::{
    find_active_user, member_condition, role_condition, roles_of, user_responses,
};

fn map_institution_conflict(e: DbErr) -> AppError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("Institution with this name or code already exists".into())
        }
        _ => AppError::from(e),
    }
}

async fn ensure_unique_identity<C: ConnectionTrait>(
    db: &C,
    name: Option<&str>,
    code: Option<&str>,
    except: Option<i32>,
) -> Result<(), AppError> {
    let mut clash = Condition::any();
    if let Some(name) = name {
        clash = clash.add(institution::Column::Name.eq(name));
    }
    if let Some(code) = code {
        clash = clash.add(institution::Column::Code.eq(code));
    }
    if clash.is_empty() {
        return Ok(());
    }
    let mut select = institution::Entity::find().filter(clash);
    if let Some(id) = except {
        select = select.filter(institution::Column::Id.ne(id));
    }
    if select.count(db).await? > 0 {
        return Err(AppError::Conflict(
            "Institution with this name or code already exists".into(),
        ));
    }
    Ok(())
}

/// Remove `user_id` from the admin set. Admins without a tutor or resident
/// role also lose their membership.
async fn drop_admin<C: ConnectionTrait>(
    db: &C,
    institution_id: i32,
    user_id: i32,
) -> Result<(), AppError> {
    institution_admin::Entity::delete_by_id((institution_id, user_id))
        .exec(db)
        .await?;
    let roles = roles_of(db, user_id).await?;
    if !roles.contains(&Role::Tutor) && !roles.contains(&Role::Resident) {
        remove_member(db, user_id, institution_id).await?;
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/v1/institutions",
    tag = "Institutions",
    operation_id = "listAdministeredInstitutions",
    summary = "List institutions the caller administers",
    description = "Super admins see every institution.",
    responses(
        (status = 200, description = "Institutions", body = Vec<InstitutionResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Caller holds no admin role (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor), fields(user_id = actor.user_id))]
pub async fn list_institutions(
    actor: Actor,
    State(state): State<AppState>,
) -> Result<Json<Vec<InstitutionResponse>>, AppError> {
    actor.require_admin_role()?;

    let models = institution::Entity::find()
        .filter(actor.administered_scope().condition(institution::Column::Id))
        .order_by_asc(institution::Column::Name)
        .all(&state.db)
        .await?;

    Ok(Json(institution_responses(&state.db, models).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/institutions",
    tag = "Institutions",
    operation_id = "createInstitution",
    summary = "Create an institution",
    description = "The creator becomes its first admin and member. Requires an admin role.",
    request_body = CreateInstitutionRequest,
    responses(
        (status = 201, description = "Institution created", body = InstitutionResponse),
        (status = 400, description = "Validation error or duplicate name/code (VALIDATION_ERROR, CONFLICT)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor, payload), fields(user_id = actor.user_id, code = %payload.code))]
pub async fn create_institution(
    actor: Actor,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateInstitutionRequest>,
) -> Result<impl IntoResponse, AppError> {
    actor.require_admin_role()?;
    let name = validate_name(&payload.name)?;
    let code = normalize_code(&payload.code)?;
    let settings = payload.settings.unwrap_or_else(|| serde_json::json!({}));
    validate_settings(&settings)?;

    let txn = state.db.begin().await?;
    ensure_unique_identity(&txn, Some(&name), Some(&code), None).await?;

    let now = chrono::Utc::now();
    let model = institution::ActiveModel {
        name: Set(name),
        code: Set(code),
        description: Set(optional_text(payload.description)),
        logo: Set(optional_text(payload.logo)),
        contact_email: Set(optional_text(payload.contact_email)),
        contact_phone: Set(optional_text(payload.contact_phone)),
        address: Set(optional_text(payload.address)),
        is_active: Set(true),
        settings: Set(settings),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(map_institution_conflict)?;

    add_admin(&txn, model.id, actor.user_id).await?;
    let body = institution_response(&txn, model).await?;
    txn.commit().await?;

    tracing::info!(institution_id = body.id, "Institution created");
    Ok((StatusCode::CREATED, Json(body)))
}

#[utoipa::path(
    get,
    path = "/api/v1/institutions/me",
    tag = "Institutions",
    operation_id = "listMyInstitutions",
    summary = "List the caller's institutions",
    responses(
        (status = 200, description = "Institutions the caller belongs to or administers", body = Vec<InstitutionResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor), fields(user_id = actor.user_id))]
pub async fn my_institutions(
    actor: Actor,
    State(state): State<AppState>,
) -> Result<Json<Vec<InstitutionResponse>>, AppError> {
    let ids: BTreeSet<i32> = actor.institutions.union(&actor.admin_of).copied().collect();
    let models = institution::Entity::find()
        .filter(institution::Column::Id.is_in(ids))
        .order_by_asc(institution::Column::Name)
        .all(&state.db)
        .await?;
    Ok(Json(institution_responses(&state.db, models).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/institutions/all",
    tag = "Institutions",
    operation_id = "listAllInstitutions",
    summary = "List all institutions",
    description = "Directory of every institution, for picking one to join.",
    responses(
        (status = 200, description = "Institutions", body = Vec<InstitutionSummary>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor), fields(user_id = actor.user_id))]
pub async fn all_institutions(
    actor: Actor,
    State(state): State<AppState>,
) -> Result<Json<Vec<InstitutionSummary>>, AppError> {
    let models = institution::Entity::find()
        .order_by_asc(institution::Column::Name)
        .all(&state.db)
        .await?;
    Ok(Json(models.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/v1/institutions/{id}",
    tag = "Institutions",
    operation_id = "getInstitution",
    summary = "Get an institution",
    params(("id" = i32, Path, description = "Institution ID")),
    responses(
        (status = 200, description = "Institution", body = InstitutionResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not a member (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Institution not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor), fields(user_id = actor.user_id, id))]
pub async fn get_institution(
    actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<InstitutionResponse>, AppError> {
    let model = find_institution(&state.db, id).await?;
    actor.require_member(id)?;
    Ok(Json(institution_response(&state.db, model).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/institutions/{id}",
    tag = "Institutions",
    operation_id = "updateInstitution",
    summary = "Update an institution",
    description = "Partial update by an institution admin. `admin_ids` replaces the admin set.",
    params(("id" = i32, Path, description = "Institution ID")),
    request_body = UpdateInstitutionRequest,
    responses(
        (status = 200, description = "Institution updated", body = InstitutionResponse),
        (status = 400, description = "Validation error or duplicate name/code (VALIDATION_ERROR, CONFLICT)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not an institution admin (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Institution or admin user not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor, payload), fields(user_id = actor.user_id, id))]
pub async fn update_institution(
    actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateInstitutionRequest>,
) -> Result<Json<InstitutionResponse>, AppError> {
    let name = payload.name.as_deref().map(validate_name).transpose()?;
    let code = payload.code.as_deref().map(normalize_code).transpose()?;
    if let Some(ref settings) = payload.settings {
        validate_settings(settings)?;
    }
    if let Some(ref admin_ids) = payload.admin_ids {
        validate_bulk_ids(admin_ids, "admin_ids", 100)?;
    }

    let txn = state.db.begin().await?;
    let existing = find_institution_for_update(&txn, id).await?;
    actor.require_institution_admin(id)?;
    ensure_unique_identity(&txn, name.as_deref(), code.as_deref(), Some(id)).await?;

    let mut active: institution::ActiveModel = existing.into();
    if let Some(name) = name {
        active.name = Set(name);
    }
    if let Some(code) = code {
        active.code = Set(code);
    }
    if let Some(description) = payload.description {
        active.description = Set(optional_text(description));
    }
    if let Some(logo) = payload.logo {
        active.logo = Set(optional_text(logo));
    }
    if let Some(contact_email) = payload.contact_email {
        active.contact_email = Set(optional_text(contact_email));
    }
    if let Some(contact_phone) = payload.contact_phone {
        active.contact_phone = Set(optional_text(contact_phone));
    }
    if let Some(address) = payload.address {
        active.address = Set(optional_text(address));
    }
    if let Some(settings) = payload.settings {
        active.settings = Set(settings);
    }
    active.updated_at = Set(chrono::Utc::now());
    let model = active.update(&txn).await.map_err(map_institution_conflict)?;

    if let Some(new_admins) = payload.admin_ids {
        for &uid in &new_admins {
            find_active_user(&txn, uid).await?;
        }
        let current = admin_ids(&txn, id).await?;
        for &uid in current.iter().filter(|uid| !new_admins.contains(uid)) {
            drop_admin(&txn, id, uid).await?;
        }
        for &uid in new_admins.iter().filter(|uid| !current.contains(uid)) {
            add_admin(&txn, id, uid).await?;
        }
    }

    let body = institution_response(&txn, model).await?;
    txn.commit().await?;

    Ok(Json(body))
}

#[utoipa::path(
    delete,
    path = "/api/v1/institutions/{id}",
    tag = "Institutions",
    operation_id = "deleteInstitution",
    summary = "Delete an institution",
    description = "Super admin only. Rejected while any user, including soft-deleted ones, belongs to the institution or any submission references it; otherwise its templates go with it.",
    params(("id" = i32, Path, description = "Institution ID")),
    responses(
        (status = 200, description = "Institution deleted", body = MessageResponse),
        (status = 400, description = "Institution still has users or submissions (CONFLICT)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Institution not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor), fields(user_id = actor.user_id, id))]
pub async fn delete_institution(
    actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    actor.require_super_admin()?;

    let txn = state.db.begin().await?;
    find_institution_for_update(&txn, id).await?;

    let users = member_count(&txn, id).await?;
    if users > 0 {
        return Err(AppError::Conflict(format!(
            "Cannot delete institution. It has {users} associated users."
        )));
    }
    let submissions = form_submission::Entity::find()
        .filter(form_submission::Column::InstitutionId.eq(id))
        .count(&txn)
        .await?;
    if submissions > 0 {
        return Err(AppError::Conflict(format!(
            "Cannot delete institution. It has {submissions} submissions."
        )));
    }

    let template_ids: Vec<i32> = form_template::Entity::find()
        .filter(form_template::Column::InstitutionId.eq(id))
        .select_only()
        .column(form_template::Column::Id)
        .into_tuple()
        .all(&txn)
        .await?;
    for template_id in template_ids {
        delete_template_rows(&txn, template_id).await?;
    }

    institution_admin::Entity::delete_many()
        .filter(institution_admin::Column::InstitutionId.eq(id))
        .exec(&txn)
        .await?;
    // Super admin memberships do not block deletion.
    user_institution::Entity::delete_many()
        .filter(user_institution::Column::InstitutionId.eq(id))
        .exec(&txn)
        .await?;
    institution::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!(institution_id = id, "Institution deleted");
    Ok(Json(MessageResponse::new("Institution deleted successfully")))
}

#[utoipa::path(
    patch,
    path = "/api/v1/institutions/{id}/toggle-status",
    tag = "Institutions",
    operation_id = "toggleInstitutionStatus",
    summary = "Activate or deactivate an institution",
    description = "Super admin only. Inactive institutions cannot be joined.",
    params(("id" = i32, Path, description = "Institution ID")),
    responses(
        (status = 200, description = "Institution with its new status", body = InstitutionResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Institution not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor), fields(user_id = actor.user_id, id))]
pub async fn toggle_status(
    actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<InstitutionResponse>, AppError> {
    actor.require_super_admin()?;

    let txn = state.db.begin().await?;
    let existing = find_institution_for_update(&txn, id).await?;
    let is_active = !existing.is_active;
    let mut active: institution::ActiveModel = existing.into();
    active.is_active = Set(is_active);
    active.updated_at = Set(chrono::Utc::now());
    let model = active.update(&txn).await?;
    let body = institution_response(&txn, model).await?;
    txn.commit().await?;

    tracing::info!(institution_id = id, is_active, "Institution status toggled");
    Ok(Json(body))
}

#[utoipa::path(
    get,
    path = "/api/v1/institutions/{id}/stats",
    tag = "Institutions",
    operation_id = "getInstitutionStats",
    summary = "Counters for an institution",
    params(("id" = i32, Path, description = "Institution ID")),
    responses(
        (status = 200, description = "Statistics", body = InstitutionStats),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not an institution admin (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Institution not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor), fields(user_id = actor.user_id, id))]
pub async fn institution_stats(
    actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<InstitutionStats>, AppError> {
    find_institution(&state.db, id).await?;
    actor.require_institution_admin(id)?;

    let scope = InstitutionScope::Only(vec![id]);
    let members = || {
        user::Entity::find()
            .filter(user::Column::IsDeleted.eq(false))
            .filter(member_condition(&scope))
    };
    let submissions =
        || form_submission::Entity::find().filter(form_submission::Column::InstitutionId.eq(id));

    Ok(Json(InstitutionStats {
        users: members().count(&state.db).await?,
        admins: admin_ids(&state.db, id).await?.len() as u64,
        tutors: members()
            .filter(role_condition(&[Role::Tutor]))
            .count(&state.db)
            .await?,
        residents: members()
            .filter(role_condition(&[Role::Resident]))
            .count(&state.db)
            .await?,
        form_templates: form_template::Entity::find()
            .filter(form_template::Column::InstitutionId.eq(id))
            .count(&state.db)
            .await?,
        submissions: submissions().count(&state.db).await?,
        completed_submissions: submissions()
            .filter(form_submission::Column::Status.eq(SubmissionStatus::Completed))
            .count(&state.db)
            .await?,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/institutions/{id}/admins",
    tag = "Institutions",
    operation_id = "listInstitutionAdmins",
    summary = "List an institution's admins",
    params(("id" = i32, Path, description = "Institution ID")),
    responses(
        (status = 200, description = "Admins", body = Vec<UserResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not a member (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Institution not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor), fields(user_id = actor.user_id, id))]
pub async fn list_admins(
    actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    find_institution(&state.db, id).await?;
    actor.require_member(id)?;

    let ids = admin_ids(&state.db, id).await?;
    let models = user::Entity::find()
        .filter(user::Column::Id.is_in(ids))
        .order_by_asc(user::Column::Username)
        .all(&state.db)
        .await?;
    Ok(Json(user_responses(&state.db, models).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/institutions/{id}/admins",
    tag = "Institutions",
    operation_id = "addInstitutionAdmin",
    summary = "Add an admin to an institution",
    description = "The new admin also becomes a member.",
    params(("id" = i32, Path, description = "Institution ID")),
    request_body = AddAdminRequest,
    responses(
        (status = 200, description = "Updated institution", body = InstitutionResponse),
        (status = 400, description = "Already an admin (CONFLICT)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not an institution admin (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Institution or user not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor, payload), fields(user_id = actor.user_id, id, new_admin = payload.user_id))]
pub async fn add_institution_admin(
    actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<AddAdminRequest>,
) -> Result<Json<InstitutionResponse>, AppError> {
    let txn = state.db.begin().await?;
    let model = find_institution_for_update(&txn, id).await?;
    actor.require_institution_admin(id)?;
    find_active_user(&txn, payload.user_id).await?;

    if admin_ids(&txn, id).await?.contains(&payload.user_id) {
        return Err(AppError::Conflict(
            "User is already an admin of this institution".into(),
        ));
    }
    add_admin(&txn, id, payload.user_id).await?;

    let body = institution_response(&txn, model).await?;
    txn.commit().await?;
    Ok(Json(body))
}

#[utoipa::path(
    delete,
    path = "/api/v1/institutions/{id}/admins/{user_id}",
    tag = "Institutions",
    operation_id = "removeInstitutionAdmin",
    summary = "Remove an admin from an institution",
    description = "The last admin cannot be removed. Removed admins without a tutor or resident role also lose their membership.",
    params(
        ("id" = i32, Path, description = "Institution ID"),
        ("user_id" = i32, Path, description = "Admin user ID"),
    ),
    responses(
        (status = 200, description = "Updated institution", body = InstitutionResponse),
        (status = 400, description = "Not an admin, or the last admin (CONFLICT)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not an institution admin (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Institution not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor), fields(user_id = actor.user_id, id, admin_id))]
pub async fn remove_institution_admin(
    actor: Actor,
    State(state): State<AppState>,
    Path((id, admin_id)): Path<(i32, i32)>,
) -> Result<Json<InstitutionResponse>, AppError> {
    let txn = state.db.begin().await?;
    let model = find_institution_for_update(&txn, id).await?;
    actor.require_institution_admin(id)?;

    let current = admin_ids(&txn, id).await?;
    if !current.contains(&admin_id) {
        return Err(AppError::Conflict(
            "User is not an admin of this institution".into(),
        ));
    }
    if current.len() == 1 {
        return Err(AppError::Conflict(
            "Cannot remove the last admin. Please assign another admin first.".into(),
        ));
    }
    drop_admin(&txn, id, admin_id).await?;

    let body = institution_response(&txn, model).await?;
    txn.commit().await?;
    Ok(Json(body))
}

#[utoipa::path(
    post,
    path = "/api/v1/institutions/{id}/join",
    tag = "Institutions",
    operation_id = "joinInstitution",
    summary = "Join an institution",
    description = "Adds the caller as a member of an active institution.",
    params(("id" = i32, Path, description = "Institution ID")),
    responses(
        (status = 200, description = "Joined", body = InstitutionSummary),
        (status = 400, description = "Inactive institution or already a member (VALIDATION_ERROR, CONFLICT)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Institution not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor), fields(user_id = actor.user_id, id))]
pub async fn join_institution(
    actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<InstitutionSummary>, AppError> {
    let model = find_institution(&state.db, id).await?;
    if !model.is_active {
        return Err(AppError::Validation("Institution is not active".into()));
    }
    if actor.institutions.contains(&id) {
        return Err(AppError::Conflict(
            "You are already a member of this institution".into(),
        ));
    }
    add_member(&state.db, actor.user_id, id).await?;

    tracing::info!(institution_id = id, "User joined institution");
    Ok(Json(model.into()))
}
