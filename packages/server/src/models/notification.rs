use chrono::{DateTime, Utc};
use common::NotificationKind;
use serde::{Deserialize, Serialize};

use crate::entity::notification;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateNotificationRequest {
    pub user_id: i32,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct NotificationResponse {
    pub id: i32,
    pub user_id: i32,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<notification::Model> for NotificationResponse {
    fn from(m: notification::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            message: m.message,
            kind: m.kind,
            is_read: m.is_read,
            created_at: m.created_at,
        }
    }
}
