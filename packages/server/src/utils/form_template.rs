use std::collections::HashMap;

use sea_orm::sea_query::LockType;
use sea_orm::*;

use crate::entity::{field_template, form_template};
use crate::error::AppError;
use crate::models::form_template::{FieldTemplateResponse, FormTemplateResponse, ValidField};

/// Look up a form template by ID, returning 404 if not found.
pub async fn find_template<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<form_template::Model, AppError> {
    form_template::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Form template not found".into()))
}

pub async fn find_template_for_update(
    txn: &DatabaseTransaction,
    id: i32,
) -> Result<form_template::Model, AppError> {
    form_template::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Form template not found".into()))
}

/// Fields of a template in position order.
pub async fn ordered_fields<C: ConnectionTrait>(
    db: &C,
    template_id: i32,
) -> Result<Vec<field_template::Model>, DbErr> {
    field_template::Entity::find()
        .filter(field_template::Column::FormTemplateId.eq(template_id))
        .order_by_asc(field_template::Column::Position)
        .order_by_asc(field_template::Column::Id)
        .all(db)
        .await
}

pub async fn field_count<C: ConnectionTrait>(db: &C, template_id: i32) -> Result<u64, DbErr> {
    field_template::Entity::find()
        .filter(field_template::Column::FormTemplateId.eq(template_id))
        .count(db)
        .await
}

/// Reject a form name already used by another template of the institution.
pub async fn ensure_form_name_free<C: ConnectionTrait>(
    db: &C,
    institution_id: i32,
    form_name: &str,
    except: Option<i32>,
) -> Result<(), AppError> {
    let mut select = form_template::Entity::find()
        .filter(form_template::Column::InstitutionId.eq(institution_id))
        .filter(form_template::Column::FormName.eq(form_name));
    if let Some(id) = except {
        select = select.filter(form_template::Column::Id.ne(id));
    }
    if select.count(db).await? > 0 {
        return Err(AppError::Conflict(format!(
            "A form template named '{form_name}' already exists in this institution"
        )));
    }
    Ok(())
}

pub fn map_form_name_conflict(e: DbErr) -> AppError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("A form template with this name already exists".into())
        }
        _ => AppError::from(e),
    }
}

/// Persist `fields` under `template_id`, each at its index in the slice.
pub async fn insert_fields<C: ConnectionTrait>(
    db: &C,
    template_id: i32,
    fields: &[ValidField],
) -> Result<Vec<field_template::Model>, AppError> {
    let now = chrono::Utc::now();
    let mut created = Vec::with_capacity(fields.len());
    for (position, field) in fields.iter().enumerate() {
        let position = i32::try_from(position)
            .map_err(|_| AppError::Validation("Too many fields".into()))?;
        let model = field_template::ActiveModel {
            name: Set(field.name.clone()),
            field_type: Set(field.field_type),
            options: Set(serde_json::json!(field.options)),
            scale_options: Set(serde_json::json!(field.scale_options)),
            has_details: Set(field.has_details),
            details: Set(field.details.clone()),
            section: Set(field.section.clone()),
            position: Set(position),
            form_template_id: Set(template_id),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
        created.push(model);
    }
    Ok(created)
}

pub fn template_response(
    model: form_template::Model,
    fields: Vec<field_template::Model>,
) -> FormTemplateResponse {
    let field_templates: Vec<FieldTemplateResponse> =
        fields.into_iter().map(FieldTemplateResponse::from).collect();
    FormTemplateResponse {
        id: model.id,
        form_name: model.form_name,
        score: model.score,
        scale_description: model.scale_description,
        institution_id: model.institution_id,
        field_template_ids: field_templates.iter().map(|f| f.id).collect(),
        field_templates,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

pub async fn load_template_response<C: ConnectionTrait>(
    db: &C,
    model: form_template::Model,
) -> Result<FormTemplateResponse, DbErr> {
    let fields = ordered_fields(db, model.id).await?;
    Ok(template_response(model, fields))
}

/// Responses for many templates with a single field query.
pub async fn load_template_responses<C: ConnectionTrait>(
    db: &C,
    models: Vec<form_template::Model>,
) -> Result<Vec<FormTemplateResponse>, DbErr> {
    let ids: Vec<i32> = models.iter().map(|m| m.id).collect();
    let fields = field_template::Entity::find()
        .filter(field_template::Column::FormTemplateId.is_in(ids))
        .order_by_asc(field_template::Column::Position)
        .order_by_asc(field_template::Column::Id)
        .all(db)
        .await?;

    let mut by_template: HashMap<i32, Vec<field_template::Model>> = HashMap::new();
    for field in fields {
        by_template.entry(field.form_template_id).or_default().push(field);
    }

    Ok(models
        .into_iter()
        .map(|m| {
            let fields = by_template.remove(&m.id).unwrap_or_default();
            template_response(m, fields)
        })
        .collect())
}

/// Delete a template and its fields. Callers clear submissions first.
pub async fn delete_template_rows<C: ConnectionTrait>(db: &C, template_id: i32) -> Result<(), DbErr> {
    field_template::Entity::delete_many()
        .filter(field_template::Column::FormTemplateId.eq(template_id))
        .exec(db)
        .await?;
    form_template::Entity::delete_by_id(template_id).exec(db).await?;
    Ok(())
}
