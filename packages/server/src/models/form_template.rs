use chrono::{DateTime, Utc};
use common::{FieldType, ScoreKind};
use serde::{Deserialize, Serialize};

use super::shared::{double_option, optional_text, required_text};
use crate::entity::field_template;
use crate::error::AppError;

pub const MAX_FIELDS_PER_TEMPLATE: usize = 200;

/// One field of a template, as submitted by the client.
#[derive(Deserialize, Clone, utoipa::ToSchema)]
pub struct FieldSpec {
    #[schema(example = "Procedure performed")]
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Choices for `select` and `checkbox` fields.
    #[serde(default)]
    pub options: Vec<String>,
    /// Labels for `scale` fields.
    #[serde(default)]
    pub scale_options: Vec<String>,
    #[serde(default)]
    pub has_details: bool,
    #[serde(default)]
    pub details: String,
    pub section: Option<String>,
}

/// A field spec after normalization, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidField {
    pub name: String,
    pub field_type: FieldType,
    pub options: Vec<String>,
    pub scale_options: Vec<String>,
    pub has_details: bool,
    pub details: String,
    pub section: Option<String>,
}

fn clean_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Options are kept only for the types that use them.
pub fn validate_field(spec: &FieldSpec) -> Result<ValidField, AppError> {
    let name = required_text(&spec.name, "Field name", 256)?;

    let options = if spec.field_type.takes_options() {
        let options = clean_list(&spec.options);
        if options.is_empty() {
            return Err(AppError::Validation(format!(
                "Field '{name}' of type {} needs at least one option",
                spec.field_type
            )));
        }
        options
    } else {
        Vec::new()
    };

    let scale_options = if spec.field_type.takes_scale_options() {
        clean_list(&spec.scale_options)
    } else {
        Vec::new()
    };

    Ok(ValidField {
        name,
        field_type: spec.field_type,
        options,
        scale_options,
        has_details: spec.has_details,
        details: spec.details.trim().to_string(),
        section: optional_text(spec.section.clone()),
    })
}

pub fn validate_fields(specs: &[FieldSpec]) -> Result<Vec<ValidField>, AppError> {
    if specs.is_empty() {
        return Err(AppError::Validation(
            "A form template needs at least one field".into(),
        ));
    }
    if specs.len() > MAX_FIELDS_PER_TEMPLATE {
        return Err(AppError::Validation(format!(
            "Too many fields: max {MAX_FIELDS_PER_TEMPLATE}"
        )));
    }
    specs.iter().map(validate_field).collect()
}

pub fn validate_scoring(
    score: ScoreKind,
    scale_description: Option<String>,
) -> Result<Option<String>, AppError> {
    let scale_description = optional_text(scale_description);
    if score.requires_scale_description() && scale_description.is_none() {
        return Err(AppError::Validation(
            "scale_description is required for scored templates".into(),
        ));
    }
    Ok(scale_description)
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateFormTemplateRequest {
    #[schema(example = "Weekly logbook")]
    pub form_name: String,
    #[serde(default)]
    pub score: ScoreKind,
    pub scale_description: Option<String>,
    pub institution_id: i32,
    /// Fields in display order.
    pub field_templates: Vec<FieldSpec>,
}

/// Partial update. `field_templates`, when present, replaces the whole list.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateFormTemplateRequest {
    pub form_name: Option<String>,
    pub score: Option<ScoreKind>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub scale_description: Option<Option<String>>,
    pub field_templates: Option<Vec<FieldSpec>>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct FieldTemplateResponse {
    pub id: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub options: Vec<String>,
    pub scale_options: Vec<String>,
    pub has_details: bool,
    pub details: String,
    pub section: Option<String>,
    pub position: i32,
    pub form_template_id: i32,
}

fn string_list(value: serde_json::Value) -> Vec<String> {
    serde_json::from_value(value).unwrap_or_default()
}

impl From<field_template::Model> for FieldTemplateResponse {
    fn from(m: field_template::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            field_type: m.field_type,
            options: string_list(m.options),
            scale_options: string_list(m.scale_options),
            has_details: m.has_details,
            details: m.details,
            section: m.section,
            position: m.position,
            form_template_id: m.form_template_id,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct FormTemplateResponse {
    pub id: i32,
    pub form_name: String,
    pub score: ScoreKind,
    pub scale_description: Option<String>,
    pub institution_id: i32,
    /// Field IDs in position order.
    pub field_template_ids: Vec<i32>,
    pub field_templates: Vec<FieldTemplateResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct DeleteFieldTemplateResponse {
    #[schema(example = "Field template deleted successfully")]
    pub message: String,
    pub deleted_field_id: i32,
}
