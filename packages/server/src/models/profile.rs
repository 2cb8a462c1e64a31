use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::profile;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateAvatarRequest {
    /// URL of the new avatar; `null` removes it.
    pub avatar: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ProfileResponse {
    pub id: i32,
    pub user_id: i32,
    pub avatar: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<profile::Model> for ProfileResponse {
    fn from(m: profile::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            avatar: m.avatar,
            updated_at: m.updated_at,
        }
    }
}
