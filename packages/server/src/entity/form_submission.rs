use common::SubmissionStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "form_submission")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub form_template_id: i32,
    #[sea_orm(belongs_to, from = "form_template_id", to = "id")]
    pub form_template: HasOne<super::form_template::Entity>,

    pub institution_id: i32,
    #[sea_orm(belongs_to, from = "institution_id", to = "id")]
    pub institution: HasOne<super::institution::Entity>,

    /// Both reference `user.id`.
    pub resident_id: i32,
    pub tutor_id: i32,

    pub status: SubmissionStatus,
    pub submission_date: DateTimeUtc,

    #[sea_orm(has_many)]
    pub field_records: HasMany<super::field_record::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
