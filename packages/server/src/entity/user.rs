use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: String,
    pub password: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub image: Option<String>,

    /// Tutor responsible for this user, if any.
    pub supervisor_id: Option<i32>,

    pub is_super_admin: bool,
    /// Set for accounts created on someone's behalf; cleared by the first password change.
    pub is_first_login: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTimeUtc>,

    #[sea_orm(has_many)]
    pub roles: HasMany<super::user_role::Entity>,

    #[sea_orm(has_many)]
    pub memberships: HasMany<super::user_institution::Entity>,

    #[sea_orm(has_many)]
    pub administered: HasMany<super::institution_admin::Entity>,

    #[sea_orm(has_many)]
    pub notifications: HasMany<super::notification::Entity>,

    #[sea_orm(has_one)]
    pub profile: HasOne<super::profile::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
