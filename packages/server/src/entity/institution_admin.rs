use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "institution_admin")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub institution_id: i32,
    #[sea_orm(primary_key)]
    pub user_id: i32,
    #[sea_orm(belongs_to, from = "institution_id", to = "id")]
    pub institution: HasOne<super::institution::Entity>,
    #[sea_orm(belongs_to, from = "user_id", to = "id")]
    pub user: HasOne<super::user::Entity>,

    pub added_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
