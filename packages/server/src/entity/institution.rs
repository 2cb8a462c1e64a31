use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Tenant boundary: owns templates, submissions and member users.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "institution")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub name: String,
    #[sea_orm(unique)]
    pub code: String,
    pub description: Option<String>,
    pub logo: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    /// Free-form per-institution settings.
    #[sea_orm(column_type = "Json")]
    pub settings: serde_json::Value,

    #[sea_orm(has_many)]
    pub admins: HasMany<super::institution_admin::Entity>,

    #[sea_orm(has_many)]
    pub members: HasMany<super::user_institution::Entity>,

    #[sea_orm(has_many)]
    pub form_templates: HasMany<super::form_template::Entity>,

    #[sea_orm(has_many)]
    pub submissions: HasMany<super::form_submission::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
