use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shared::{double_option, required_text};
use crate::entity::institution;
use crate::error::AppError;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateInstitutionRequest {
    #[schema(example = "City General Hospital")]
    pub name: String,
    /// Short unique code; stored upper-case.
    #[schema(example = "CGH")]
    pub code: String,
    pub description: Option<String>,
    pub logo: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub settings: Option<serde_json::Value>,
}

/// Partial update. `admin_ids`, when present, replaces the admin set.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateInstitutionRequest {
    pub name: Option<String>,
    pub code: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub logo: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub contact_email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub contact_phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub address: Option<Option<String>>,
    #[schema(value_type = Option<Object>)]
    pub settings: Option<serde_json::Value>,
    pub admin_ids: Option<Vec<i32>>,
}

pub fn validate_name(name: &str) -> Result<String, AppError> {
    required_text(name, "Institution name", 256)
}

pub fn normalize_code(code: &str) -> Result<String, AppError> {
    let code = required_text(code, "Institution code", 32)?;
    if code.chars().any(char::is_whitespace) {
        return Err(AppError::Validation(
            "Institution code must not contain whitespace".into(),
        ));
    }
    Ok(code.to_uppercase())
}

pub fn validate_settings(settings: &serde_json::Value) -> Result<(), AppError> {
    if !settings.is_object() {
        return Err(AppError::Validation("settings must be a JSON object".into()));
    }
    Ok(())
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct InstitutionResponse {
    pub id: i32,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub logo: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    #[schema(value_type = Object)]
    pub settings: serde_json::Value,
    pub admin_ids: Vec<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InstitutionResponse {
    pub fn new(m: institution::Model, admin_ids: Vec<i32>) -> Self {
        Self {
            id: m.id,
            name: m.name,
            code: m.code,
            description: m.description,
            logo: m.logo,
            contact_email: m.contact_email,
            contact_phone: m.contact_phone,
            address: m.address,
            is_active: m.is_active,
            settings: m.settings,
            admin_ids,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Public listing entry; exposes no admin or settings data.
#[derive(Serialize, utoipa::ToSchema)]
pub struct InstitutionSummary {
    pub id: i32,
    pub name: String,
    pub code: String,
    pub logo: Option<String>,
    pub is_active: bool,
}

impl From<institution::Model> for InstitutionSummary {
    fn from(m: institution::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            code: m.code,
            logo: m.logo,
            is_active: m.is_active,
        }
    }
}

#[derive(Serialize, Default, utoipa::ToSchema)]
pub struct InstitutionStats {
    pub users: u64,
    pub admins: u64,
    pub tutors: u64,
    pub residents: u64,
    pub form_templates: u64,
    pub submissions: u64,
    pub completed_submissions: u64,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct AddAdminRequest {
    pub user_id: i32,
}
