use common::FieldType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "field_template")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,
    pub field_type: FieldType,
    /// JSON array of strings; only populated for select/checkbox fields.
    #[sea_orm(column_type = "Json")]
    pub options: serde_json::Value,
    /// JSON array of strings; only populated for scale fields.
    #[sea_orm(column_type = "Json")]
    pub scale_options: serde_json::Value,
    pub has_details: bool,
    #[sea_orm(column_type = "Text")]
    pub details: String,
    pub section: Option<String>,
    /// Zero-based order within the template.
    pub position: i32,

    pub form_template_id: i32,
    #[sea_orm(belongs_to, from = "form_template_id", to = "id")]
    pub form_template: HasOne<super::form_template::Entity>,

    #[sea_orm(has_many)]
    pub records: HasMany<super::field_record::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
