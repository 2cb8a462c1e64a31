use std::collections::{HashMap, HashSet};

use sea_orm::sea_query::LockType;
use sea_orm::*;

use crate::entity::{field_record, field_template, form_submission, form_template};
use crate::error::AppError;
use crate::models::form_submission::{FieldRecordInput, FieldRecordResponse, SubmissionResponse};

/// Look up a submission by ID, returning 404 if not found.
pub async fn find_submission<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<form_submission::Model, AppError> {
    form_submission::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Form submission not found".into()))
}

pub async fn find_submission_for_update(
    txn: &DatabaseTransaction,
    id: i32,
) -> Result<form_submission::Model, AppError> {
    form_submission::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Form submission not found".into()))
}

/// A validated answer, ready to insert.
#[derive(Debug, PartialEq, Eq)]
pub struct PlannedRecord {
    pub field_template_id: i32,
    pub field_name: String,
    pub value: String,
}

/// Check `inputs` against the template's fields and the fields already answered.
///
/// Every input must name a field of the template, at most once, and that
/// field must not have been answered before.
pub fn plan_records(
    field_names: &HashMap<i32, String>,
    answered: &HashSet<i32>,
    inputs: &[FieldRecordInput],
) -> Result<Vec<PlannedRecord>, AppError> {
    let mut seen = HashSet::new();
    let mut planned = Vec::with_capacity(inputs.len());

    for input in inputs {
        let name = field_names.get(&input.field_template_id).ok_or_else(|| {
            AppError::Validation(format!(
                "Field template {} does not belong to this form",
                input.field_template_id
            ))
        })?;
        if !seen.insert(input.field_template_id) {
            return Err(AppError::Validation(format!(
                "Duplicate record for field template {}",
                input.field_template_id
            )));
        }
        if answered.contains(&input.field_template_id) {
            return Err(AppError::Conflict(format!(
                "Field template {} already has a record",
                input.field_template_id
            )));
        }
        planned.push(PlannedRecord {
            field_template_id: input.field_template_id,
            field_name: name.clone(),
            value: input.value.clone(),
        });
    }
    Ok(planned)
}

pub async fn records_of<C: ConnectionTrait>(
    db: &C,
    submission_id: i32,
) -> Result<Vec<field_record::Model>, DbErr> {
    field_record::Entity::find()
        .filter(field_record::Column::FormSubmissionId.eq(submission_id))
        .order_by_asc(field_record::Column::Id)
        .all(db)
        .await
}

/// Insert planned records and return the submission's total record count.
pub async fn append_records<C: ConnectionTrait>(
    db: &C,
    submission_id: i32,
    planned: Vec<PlannedRecord>,
) -> Result<u64, DbErr> {
    let now = chrono::Utc::now();
    for record in planned {
        field_record::ActiveModel {
            value: Set(record.value),
            field_name: Set(record.field_name),
            form_submission_id: Set(submission_id),
            field_template_id: Set(record.field_template_id),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }
    field_record::Entity::find()
        .filter(field_record::Column::FormSubmissionId.eq(submission_id))
        .count(db)
        .await
}

/// Delete submissions and their records.
pub async fn delete_submissions<C: ConnectionTrait>(db: &C, ids: Vec<i32>) -> Result<(), DbErr> {
    if ids.is_empty() {
        return Ok(());
    }
    field_record::Entity::delete_many()
        .filter(field_record::Column::FormSubmissionId.is_in(ids.clone()))
        .exec(db)
        .await?;
    form_submission::Entity::delete_many()
        .filter(form_submission::Column::Id.is_in(ids))
        .exec(db)
        .await?;
    Ok(())
}

/// Build responses for many submissions, batching the lookups.
pub async fn submission_responses<C: ConnectionTrait>(
    db: &C,
    models: Vec<form_submission::Model>,
) -> Result<Vec<SubmissionResponse>, DbErr> {
    if models.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i32> = models.iter().map(|m| m.id).collect();
    let template_ids: Vec<i32> = models
        .iter()
        .map(|m| m.form_template_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let names: HashMap<i32, String> = form_template::Entity::find()
        .filter(form_template::Column::Id.is_in(template_ids.clone()))
        .select_only()
        .column(form_template::Column::Id)
        .column(form_template::Column::FormName)
        .into_tuple::<(i32, String)>()
        .all(db)
        .await?
        .into_iter()
        .collect();

    let required: HashMap<i32, u64> = field_template::Entity::find()
        .filter(field_template::Column::FormTemplateId.is_in(template_ids))
        .select_only()
        .column(field_template::Column::FormTemplateId)
        .column_as(field_template::Column::Id.count(), "total")
        .group_by(field_template::Column::FormTemplateId)
        .into_tuple::<(i32, i64)>()
        .all(db)
        .await?
        .into_iter()
        .map(|(id, n)| (id, u64::try_from(n).unwrap_or(0)))
        .collect();

    let mut records: HashMap<i32, Vec<FieldRecordResponse>> = HashMap::new();
    for record in field_record::Entity::find()
        .filter(field_record::Column::FormSubmissionId.is_in(ids))
        .order_by_asc(field_record::Column::Id)
        .all(db)
        .await?
    {
        records
            .entry(record.form_submission_id)
            .or_default()
            .push(record.into());
    }

    Ok(models
        .into_iter()
        .map(|m| SubmissionResponse {
            id: m.id,
            form_name: names.get(&m.form_template_id).cloned().unwrap_or_default(),
            required_fields: required.get(&m.form_template_id).copied().unwrap_or(0),
            field_records: records.remove(&m.id).unwrap_or_default(),
            form_template_id: m.form_template_id,
            institution_id: m.institution_id,
            resident_id: m.resident_id,
            tutor_id: m.tutor_id,
            status: m.status,
            submission_date: m.submission_date,
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
        .collect())
}

pub async fn submission_response<C: ConnectionTrait>(
    db: &C,
    model: form_submission::Model,
) -> Result<SubmissionResponse, DbErr> {
    submission_responses(db, vec![model])
        .await?
        .pop()
        .ok_or_else(|| DbErr::Custom("submission response lost".into()))
}

/// Field names of a template keyed by field ID.
pub fn field_names(fields: &[field_template::Model]) -> HashMap<i32, String> {
    fields.iter().map(|f| (f.id, f.name.clone())).collect()
}
