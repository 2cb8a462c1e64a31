use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::announcement;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateAnnouncementRequest {
    #[schema(example = "Rotation schedule")]
    pub title: String,
    pub body: String,
    /// Defaults to now.
    pub date: Option<DateTime<Utc>>,
    /// Path or URL of an attached file.
    pub file: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct AnnouncementResponse {
    pub id: i32,
    pub title: String,
    pub body: String,
    pub date: DateTime<Utc>,
    pub file: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<announcement::Model> for AnnouncementResponse {
    fn from(m: announcement::Model) -> Self {
        Self {
            id: m.id,
            title: m.title,
            body: m.body,
            date: m.date,
            file: m.file,
            created_at: m.created_at,
        }
    }
}
