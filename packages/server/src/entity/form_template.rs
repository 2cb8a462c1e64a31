use common::ScoreKind;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "form_template")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Unique within the owning institution (see `seed::ensure_indexes`).
    pub form_name: String,
    pub score: ScoreKind,
    pub scale_description: Option<String>,

    pub institution_id: i32,
    #[sea_orm(belongs_to, from = "institution_id", to = "id")]
    pub institution: HasOne<super::institution::Entity>,

    #[sea_orm(has_many)]
    pub field_templates: HasMany<super::field_template::Entity>,

    #[sea_orm(has_many)]
    pub submissions: HasMany<super::form_submission::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
