use std::collections::HashSet;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::{Role, SubmissionStatus};
use sea_orm::*;
use tracing::instrument;

use crate::entity::form_submission;
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::form_submission::*;
use crate::models::shared::InstitutionQuery;
use crate::policy::Actor;
use crate::state::AppState;
use crate::utils::form_template::{find_template, ordered_fields};
use crate::utils::institution::is_member;
use crate::utils::submission::*;
use crate::utils::user::{find_active_user, roles_of};

/// Participants and institution admins may act on a submission.
fn require_participant(actor: &Actor, submission: &form_submission::Model) -> Result<(), AppError> {
    actor.require_member(submission.institution_id)?;
    if actor.user_id == submission.resident_id
        || actor.user_id == submission.tutor_id
        || actor.is_institution_admin(submission.institution_id)
    {
        Ok(())
    } else {
        Err(AppError::PermissionDenied)
    }
}

async fn ensure_participant_member<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    institution_id: i32,
    label: &str,
) -> Result<(), AppError> {
    find_active_user(db, user_id)
        .await
        .map_err(|_| AppError::NotFound(format!("{label} not found")))?;
    if !is_member(db, user_id, institution_id).await? {
        return Err(AppError::Validation(format!(
            "{label} is not a member of this institution"
        )));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/v1/formSubmitions",
    tag = "Form Submissions",
    operation_id = "createFormSubmission",
    summary = "Create a form submission",
    description = "Creates a submission for a template with any initial field records. The status is `completed` when every field of the template has a record, `pending` otherwise.",
    request_body = CreateSubmissionRequest,
    responses(
        (status = 201, description = "Submission created", body = SubmissionResponse),
        (status = 400, description = "Invalid records or participants (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Template or user not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor, payload), fields(user_id = actor.user_id, template_id = payload.form_template_id))]
pub async fn create_submission(
    actor: Actor,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateSubmissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let template = find_template(&state.db, payload.form_template_id).await?;
    let institution_id = template.institution_id;
    actor.require_member(institution_id)?;
    if actor.user_id != payload.resident_id
        && actor.user_id != payload.tutor_id
        && !actor.is_institution_admin(institution_id)
    {
        return Err(AppError::PermissionDenied);
    }

    let txn = state.db.begin().await?;
    ensure_participant_member(&txn, payload.resident_id, institution_id, "Resident").await?;
    ensure_participant_member(&txn, payload.tutor_id, institution_id, "Tutor").await?;
    let tutor_roles = roles_of(&txn, payload.tutor_id).await?;
    if !tutor_roles.contains(&Role::Tutor) && !tutor_roles.contains(&Role::Admin) {
        return Err(AppError::Validation(
            "Tutor must hold the tutor or admin role".into(),
        ));
    }

    let fields = ordered_fields(&txn, template.id).await?;
    let planned = plan_records(&field_names(&fields), &HashSet::new(), &payload.field_records)?;

    let now = chrono::Utc::now();
    let submission = form_submission::ActiveModel {
        form_template_id: Set(template.id),
        institution_id: Set(institution_id),
        resident_id: Set(payload.resident_id),
        tutor_id: Set(payload.tutor_id),
        status: Set(SubmissionStatus::Pending),
        submission_date: Set(payload.submission_date.unwrap_or(now)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let recorded = append_records(&txn, submission.id, planned).await?;
    let status = SubmissionStatus::from_progress(recorded, fields.len() as u64);
    let submission = if status != submission.status {
        let mut active: form_submission::ActiveModel = submission.into();
        active.status = Set(status);
        active.update(&txn).await?
    } else {
        submission
    };

    let body = submission_response(&txn, submission).await?;
    txn.commit().await?;

    tracing::info!(submission_id = body.id, status = %body.status, "Form submission created");
    Ok((StatusCode::CREATED, Json(body)))
}

#[utoipa::path(
    get,
    path = "/api/v1/formSubmitions/user/{id}",
    tag = "Form Submissions",
    operation_id = "listUserSubmissions",
    summary = "List a user's submissions",
    description = "Submissions where the user is the resident or the tutor, restricted to the caller's institutions.",
    params(("id" = i32, Path, description = "User ID"), InstitutionQuery),
    responses(
        (status = 200, description = "Submissions, newest first", body = Vec<SubmissionResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Institution outside the caller's memberships (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor, query), fields(user_id = actor.user_id, id))]
pub async fn list_user_submissions(
    actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(query): Query<InstitutionQuery>,
) -> Result<Json<Vec<SubmissionResponse>>, AppError> {
    let scope = actor.scope(query.institution_id)?;

    let models = form_submission::Entity::find()
        .filter(
            Condition::any()
                .add(form_submission::Column::ResidentId.eq(id))
                .add(form_submission::Column::TutorId.eq(id)),
        )
        .filter(scope.condition(form_submission::Column::InstitutionId))
        .order_by_desc(form_submission::Column::SubmissionDate)
        .order_by_desc(form_submission::Column::Id)
        .all(&state.db)
        .await?;

    Ok(Json(submission_responses(&state.db, models).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/formSubmitions/{id}",
    tag = "Form Submissions",
    operation_id = "getFormSubmission",
    summary = "Get a submission with its records",
    params(("id" = i32, Path, description = "Submission ID")),
    responses(
        (status = 200, description = "Submission", body = SubmissionResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not a member of the institution (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Submission not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor), fields(user_id = actor.user_id, id))]
pub async fn get_submission(
    actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let model = find_submission(&state.db, id).await?;
    actor.require_member(model.institution_id)?;
    Ok(Json(submission_response(&state.db, model).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/formSubmitions/{id}/review",
    tag = "Form Submissions",
    operation_id = "reviewFormSubmission",
    summary = "Append field records to a submission",
    description = "Adds records for fields not yet answered, then re-evaluates completeness. The submission row is locked for the duration. Completed submissions cannot be reviewed again.",
    params(("id" = i32, Path, description = "Submission ID")),
    request_body = ReviewSubmissionRequest,
    responses(
        (status = 200, description = "Updated submission", body = SubmissionResponse),
        (status = 400, description = "Invalid records or already completed (VALIDATION_ERROR, CONFLICT)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Submission not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor, payload), fields(user_id = actor.user_id, id, records = payload.field_records.len()))]
pub async fn review_submission(
    actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<ReviewSubmissionRequest>,
) -> Result<Json<SubmissionResponse>, AppError> {
    if payload.field_records.is_empty() {
        return Err(AppError::Validation(
            "field_records must not be empty".into(),
        ));
    }

    let txn = state.db.begin().await?;
    let submission = find_submission_for_update(&txn, id).await?;
    require_participant(&actor, &submission)?;
    if submission.status.is_closed() {
        return Err(AppError::Conflict(format!(
            "Submission is already {}",
            submission.status
        )));
    }

    let fields = ordered_fields(&txn, submission.form_template_id).await?;
    let answered: HashSet<i32> = records_of(&txn, id)
        .await?
        .into_iter()
        .map(|r| r.field_template_id)
        .collect();
    let planned = plan_records(&field_names(&fields), &answered, &payload.field_records)?;

    let recorded = append_records(&txn, id, planned).await?;
    let status = submission.status.advance(recorded, fields.len() as u64);

    let mut active: form_submission::ActiveModel = submission.into();
    active.status = Set(status);
    active.updated_at = Set(chrono::Utc::now());
    let submission = active.update(&txn).await?;

    let body = submission_response(&txn, submission).await?;
    txn.commit().await?;

    tracing::info!(submission_id = id, recorded, status = %status, "Submission reviewed");
    Ok(Json(body))
}

#[utoipa::path(
    delete,
    path = "/api/v1/formSubmitions/{id}",
    tag = "Form Submissions",
    operation_id = "deleteFormSubmission",
    summary = "Delete a submission and its records",
    params(("id" = i32, Path, description = "Submission ID")),
    responses(
        (status = 204, description = "Submission deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Submission not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, actor), fields(user_id = actor.user_id, id))]
pub async fn delete_submission(
    actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    let txn = state.db.begin().await?;
    let submission = find_submission_for_update(&txn, id).await?;
    require_participant(&actor, &submission)?;

    delete_submissions(&txn, vec![id]).await?;
    txn.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}
