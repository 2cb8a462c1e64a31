use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::SubmissionStatus;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{field_record, field_template, form_submission, form_template};
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::form_template::*;
use crate::models::shared::{InstitutionQuery, required_text};
use crate::policy::Actor;
use crate::state::AppState;
use crate::utils::form_template::*;
use crate::utils::institution::find_institution;

async fn submission_count<C: ConnectionTrait>(db: &C, template_id: i32) -> Result<u64, DbErr> {
    form_submission::Entity::find()
        .filter(form_submission::Column::FormTemplateId.eq(template_id))
        .count(db)
        .await
}

#[utoipa::path(
    get,
    path = "/api/v1/formTemplates",
    tag = "Form Templates",
    operation_id = "listFormTemplates",
    summary = "List form templates",
    description = "Templates of the caller's institutions (all for super admins), each with its ordered fields.",
    params(InstitutionQuery),
    responses(
        (status = 200, description = "Templates", body = Vec<FormTemplateResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Institution outside the caller's memberships (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor, query), fields(user_id = actor.user_id))]
pub async fn list_form_templates(
    actor: Actor,
    State(state): State<AppState>,
    Query(query): Query<InstitutionQuery>,
) -> Result<Json<Vec<FormTemplateResponse>>, AppError> {
    let scope = actor.scope(query.institution_id)?;

    let models = form_template::Entity::find()
        .filter(scope.condition(form_template::Column::InstitutionId))
        .order_by_asc(form_template::Column::FormName)
        .order_by_asc(form_template::Column::Id)
        .all(&state.db)
        .await?;

    Ok(Json(load_template_responses(&state.db, models).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/formTemplates",
    tag = "Form Templates",
    operation_id = "createFormTemplate",
    summary = "Create a form template with its fields",
    description = "Creates the template and every field in one transaction. Field positions follow the request order. Requires admin rights on the institution.",
    request_body = CreateFormTemplateRequest,
    responses(
        (status = 201, description = "Template created", body = FormTemplateResponse),
        (status = 400, description = "Validation error or duplicate name (VALIDATION_ERROR, CONFLICT)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not an institution admin (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Institution not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor, payload), fields(user_id = actor.user_id, institution_id = payload.institution_id))]
pub async fn create_form_template(
    actor: Actor,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateFormTemplateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let form_name = required_text(&payload.form_name, "Form name", 256)?;
    let scale_description = validate_scoring(payload.score, payload.scale_description)?;
    let fields = validate_fields(&payload.field_templates)?;

    find_institution(&state.db, payload.institution_id).await?;
    actor.require_institution_admin(payload.institution_id)?;

    let txn = state.db.begin().await?;
    ensure_form_name_free(&txn, payload.institution_id, &form_name, None).await?;

    let now = chrono::Utc::now();
    let template = form_template::ActiveModel {
        form_name: Set(form_name),
        score: Set(payload.score),
        scale_description: Set(scale_description),
        institution_id: Set(payload.institution_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(map_form_name_conflict)?;

    let created = insert_fields(&txn, template.id, &fields).await?;
    txn.commit().await?;

    tracing::info!(template_id = template.id, fields = created.len(), "Form template created");
    Ok((StatusCode::CREATED, Json(template_response(template, created))))
}

#[utoipa::path(
    get,
    path = "/api/v1/formTemplates/{id}",
    tag = "Form Templates",
    operation_id = "getFormTemplate",
    summary = "Get a form template",
    params(("id" = i32, Path, description = "Form template ID")),
    responses(
        (status = 200, description = "Template", body = FormTemplateResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not a member of the owning institution (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Template not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor), fields(user_id = actor.user_id, id))]
pub async fn get_form_template(
    actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<FormTemplateResponse>, AppError> {
    let model = find_template(&state.db, id).await?;
    actor.require_member(model.institution_id)?;
    Ok(Json(load_template_response(&state.db, model).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/formTemplates/{id}",
    tag = "Form Templates",
    operation_id = "updateFormTemplate",
    summary = "Update a form template",
    description = "Partial update. A `field_templates` list replaces every field and is rejected once submissions exist.",
    params(("id" = i32, Path, description = "Form template ID")),
    request_body = UpdateFormTemplateRequest,
    responses(
        (status = 200, description = "Template updated", body = FormTemplateResponse),
        (status = 400, description = "Validation error or conflict (VALIDATION_ERROR, CONFLICT)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not an institution admin (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Template not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor, payload), fields(user_id = actor.user_id, id))]
pub async fn update_form_template(
    actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateFormTemplateRequest>,
) -> Result<Json<FormTemplateResponse>, AppError> {
    let form_name = payload
        .form_name
        .as_deref()
        .map(|n| required_text(n, "Form name", 256))
        .transpose()?;
    let fields = payload
        .field_templates
        .as_deref()
        .map(validate_fields)
        .transpose()?;

    let txn = state.db.begin().await?;
    let existing = find_template_for_update(&txn, id).await?;
    actor.require_institution_admin(existing.institution_id)?;

    let score = payload.score.unwrap_or(existing.score);
    let scale_description = validate_scoring(
        score,
        payload
            .scale_description
            .unwrap_or_else(|| existing.scale_description.clone()),
    )?;

    if let Some(ref name) = form_name {
        ensure_form_name_free(&txn, existing.institution_id, name, Some(id)).await?;
    }

    let mut active: form_template::ActiveModel = existing.into();
    if let Some(name) = form_name {
        active.form_name = Set(name);
    }
    active.score = Set(score);
    active.scale_description = Set(scale_description);
    active.updated_at = Set(chrono::Utc::now());
    let model = active.update(&txn).await.map_err(map_form_name_conflict)?;

    if let Some(fields) = fields {
        if submission_count(&txn, id).await? > 0 {
            return Err(AppError::Conflict(
                "Cannot replace fields of a template that has submissions".into(),
            ));
        }
        field_template::Entity::delete_many()
            .filter(field_template::Column::FormTemplateId.eq(id))
            .exec(&txn)
            .await?;
        insert_fields(&txn, id, &fields).await?;
    }

    let body = load_template_response(&txn, model).await?;
    txn.commit().await?;

    Ok(Json(body))
}

#[utoipa::path(
    delete,
    path = "/api/v1/formTemplates/{id}",
    tag = "Form Templates",
    operation_id = "deleteFormTemplate",
    summary = "Delete a form template",
    description = "Deletes the template and its fields. Rejected while submissions reference it.",
    params(("id" = i32, Path, description = "Form template ID")),
    responses(
        (status = 204, description = "Template deleted"),
        (status = 400, description = "Template has submissions (CONFLICT)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not an institution admin (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Template not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor), fields(user_id = actor.user_id, id))]
pub async fn delete_form_template(
    actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    let txn = state.db.begin().await?;
    let existing = find_template_for_update(&txn, id).await?;
    actor.require_institution_admin(existing.institution_id)?;

    let submissions = submission_count(&txn, id).await?;
    if submissions > 0 {
        return Err(AppError::Conflict(format!(
            "Cannot delete form template. It has {submissions} submissions."
        )));
    }

    delete_template_rows(&txn, id).await?;
    txn.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/api/v1/fieldTemplates/{id}",
    tag = "Form Templates",
    operation_id = "deleteFieldTemplate",
    summary = "Delete a single field template",
    description = "Removes the field from its template's ordered list. Rejected once any submission has a record for it. Pending submissions that now answer every remaining field become completed.",
    params(("id" = i32, Path, description = "Field template ID")),
    responses(
        (status = 200, description = "Field deleted", body = DeleteFieldTemplateResponse),
        (status = 400, description = "Field has records (CONFLICT)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not an institution admin (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Field template not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor), fields(user_id = actor.user_id, id))]
pub async fn delete_field_template(
    actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<DeleteFieldTemplateResponse>, AppError> {
    let field = field_template::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Field template not found".into()))?;

    let txn = state.db.begin().await?;
    let template = find_template_for_update(&txn, field.form_template_id).await?;
    actor.require_institution_admin(template.institution_id)?;

    let records = field_record::Entity::find()
        .filter(field_record::Column::FieldTemplateId.eq(id))
        .count(&txn)
        .await?;
    if records > 0 {
        return Err(AppError::Conflict(
            "Cannot delete a field that already has records".into(),
        ));
    }
    if field_count(&txn, template.id).await? <= 1 {
        return Err(AppError::Validation(
            "A form template needs at least one field".into(),
        ));
    }

    field_template::Entity::delete_by_id(id).exec(&txn).await?;

    // Close the gap left in the ordering.
    for (position, remaining) in ordered_fields(&txn, template.id).await?.into_iter().enumerate() {
        let position = i32::try_from(position)
            .map_err(|_| AppError::Internal("field position overflow".into()))?;
        if remaining.position != position {
            let mut active: field_template::ActiveModel = remaining.into();
            active.position = Set(position);
            active.update(&txn).await?;
        }
    }

    let required = field_count(&txn, template.id).await?;
    let pending = form_submission::Entity::find()
        .filter(form_submission::Column::FormTemplateId.eq(template.id))
        .filter(form_submission::Column::Status.eq(SubmissionStatus::Pending))
        .all(&txn)
        .await?;
    for submission in pending {
        let recorded = field_record::Entity::find()
            .filter(field_record::Column::FormSubmissionId.eq(submission.id))
            .count(&txn)
            .await?;
        let status = submission.status.advance(recorded, required);
        if status != submission.status {
            let mut active: form_submission::ActiveModel = submission.into();
            active.status = Set(status);
            active.updated_at = Set(chrono::Utc::now());
            active.update(&txn).await?;
        }
    }

    txn.commit().await?;

    Ok(Json(DeleteFieldTemplateResponse {
        message: "Field template deleted successfully".into(),
        deleted_field_id: id,
    }))
}
