#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};

/// Why a user was notified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "comment"))]
    Comment,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "mention"))]
    Mention,
}
