use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A filled-in answer for one field template of a submission.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "field_record")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(column_type = "Text")]
    pub value: String,
    /// Copy of the field template's name at the time of answering.
    pub field_name: String,

    pub form_submission_id: i32,
    #[sea_orm(belongs_to, from = "form_submission_id", to = "id")]
    pub form_submission: HasOne<super::form_submission::Entity>,

    pub field_template_id: i32,
    #[sea_orm(belongs_to, from = "field_template_id", to = "id")]
    pub field_template: HasOne<super::field_template::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
