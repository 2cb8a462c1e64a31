#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseEnumError;

/// A role held by a user. Users carry a set of these.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "resident"))]
    Resident,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "tutor"))]
    Tutor,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "admin"))]
    Admin,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "superadmin"))]
    SuperAdmin,
}

impl Role {
    pub const ALL: &'static [Role] = &[Self::Resident, Self::Tutor, Self::Admin, Self::SuperAdmin];

    /// Roles a user may pick for themselves at signup.
    pub const SELF_SERVICE: &'static [Role] = &[Self::Resident, Self::Tutor];

    /// Roles a super admin may hand out through the user console.
    pub const ASSIGNABLE: &'static [Role] = &[Self::Resident, Self::Tutor, Self::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resident => "resident",
            Self::Tutor => "tutor",
            Self::Admin => "admin",
            Self::SuperAdmin => "superadmin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|role| role.as_str() == wanted)
            .ok_or_else(|| ParseEnumError::new("role", s, Self::ALL.iter().map(|r| r.as_str())))
    }
}
