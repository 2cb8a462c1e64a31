use std::collections::BTreeSet;

use common::Role;
use serde::{Deserialize, Serialize};

use super::shared::double_option;
use crate::error::AppError;

/// Account created from the super admin console.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateUserRequest {
    pub username: String,
    /// Initial password; the user must change it on first login.
    pub password: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[schema(example = json!(["tutor"]))]
    pub roles: Vec<String>,
    /// At least one institution.
    pub institution_ids: Vec<i32>,
    pub supervisor_id: Option<i32>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub phone: Option<Option<String>>,
    pub roles: Option<Vec<String>>,
    pub institution_ids: Option<Vec<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i32>)]
    pub supervisor_id: Option<Option<i32>>,
    /// Resets the password and forces a change on next login.
    pub password: Option<String>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct SetInstitutionsRequest {
    pub institution_ids: Vec<i32>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateSuperAdminRequest {
    pub username: String,
    pub password: String,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Serialize, Default, utoipa::ToSchema)]
pub struct PlatformStats {
    pub institutions: u64,
    pub active_institutions: u64,
    pub users: u64,
    pub super_admins: u64,
    pub form_templates: u64,
    pub submissions: u64,
    pub completed_submissions: u64,
}

/// Parse console-assigned roles. `superadmin` is granted only through
/// the dedicated endpoint.
pub fn parse_assignable_roles(raw: &[String]) -> Result<BTreeSet<Role>, AppError> {
    if raw.is_empty() {
        return Err(AppError::Validation("roles must not be empty".into()));
    }
    let mut roles = BTreeSet::new();
    for value in raw {
        let role: Role = value
            .parse()
            .map_err(|e: common::ParseEnumError| AppError::Validation(e.to_string()))?;
        if !Role::ASSIGNABLE.contains(&role) {
            return Err(AppError::Validation(format!(
                "Role '{role}' cannot be assigned here"
            )));
        }
        roles.insert(role);
    }
    Ok(roles)
}
