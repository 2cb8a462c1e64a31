#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Input kind of a field template.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
pub enum FieldType {
    #[serde(rename = "text")]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "text"))]
    Text,
    #[serde(rename = "select")]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "select"))]
    Select,
    #[serde(rename = "checkbox")]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "checkbox"))]
    Checkbox,
    #[serde(rename = "scale")]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "scale"))]
    Scale,
    #[serde(rename = "date")]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "date"))]
    Date,
    #[serde(rename = "textArea")]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "textArea"))]
    TextArea,
}

impl FieldType {
    /// Whether `options` carries meaning for this type.
    pub fn takes_options(&self) -> bool {
        matches!(self, Self::Select | Self::Checkbox)
    }

    /// Whether `scale_options` carries meaning for this type.
    pub fn takes_scale_options(&self) -> bool {
        matches!(self, Self::Scale)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Select => "select",
            Self::Checkbox => "checkbox",
            Self::Scale => "scale",
            Self::Date => "date",
            Self::TextArea => "textArea",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scoring mode of a form template.
///
/// The unscored mode travels as an empty string on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
pub enum ScoreKind {
    #[serde(rename = "SCORE")]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "SCORE"))]
    Score,
    #[serde(rename = "OTHER")]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "OTHER"))]
    Other,
    #[default]
    #[serde(rename = "", alias = "NONE")]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "NONE"))]
    Unscored,
}

impl ScoreKind {
    /// Scored templates must describe their scale.
    pub fn requires_scale_description(&self) -> bool {
        !matches!(self, Self::Unscored)
    }
}
