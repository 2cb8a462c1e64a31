#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseEnumError;

/// Status of a form submission.
///
/// Only `Pending -> Completed` is ever taken. `Reviewed`, `Approved` and
/// `Rejected` are accepted on the wire and in storage so that older rows keep
/// decoding, but nothing transitions into them.
///
/// When the `sea-orm` feature is enabled, this enum can be used directly in SeaORM entities.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    /// Waiting for more field records.
    #[default]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "pending"))]
    Pending,
    /// Every field template of the form has a record.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "completed"))]
    Completed,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "reviewed"))]
    Reviewed,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "approved"))]
    Approved,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "rejected"))]
    Rejected,
}

impl SubmissionStatus {
    /// All possible status values.
    pub const ALL: &'static [SubmissionStatus] = &[
        Self::Pending,
        Self::Completed,
        Self::Reviewed,
        Self::Approved,
        Self::Rejected,
    ];

    /// Status implied by the number of recorded answers against the number of
    /// fields the template defines.
    pub fn from_progress(recorded: u64, required: u64) -> Self {
        if recorded == required {
            Self::Completed
        } else {
            Self::Pending
        }
    }

    /// Apply a completeness check without ever leaving a terminal state.
    pub fn advance(self, recorded: u64, required: u64) -> Self {
        match self {
            Self::Pending => Self::from_progress(recorded, required),
            other => other,
        }
    }

    /// Returns true once no more field records may be appended.
    pub fn is_closed(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Reviewed => "reviewed",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("status", s, Self::ALL.iter().map(|v| v.as_str())))
    }
}
