use chrono::{DateTime, Utc};
use common::SubmissionStatus;
use serde::{Deserialize, Serialize};

use crate::entity::field_record;

/// Answer to one field of the submission's template.
#[derive(Deserialize, Clone, utoipa::ToSchema)]
pub struct FieldRecordInput {
    pub field_template_id: i32,
    #[serde(default)]
    pub value: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateSubmissionRequest {
    pub form_template_id: i32,
    pub resident_id: i32,
    pub tutor_id: i32,
    /// Answers known at creation time; more can be added by review.
    #[serde(default)]
    pub field_records: Vec<FieldRecordInput>,
    /// Defaults to now.
    pub submission_date: Option<DateTime<Utc>>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct ReviewSubmissionRequest {
    pub field_records: Vec<FieldRecordInput>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct FieldRecordResponse {
    pub id: i32,
    pub field_template_id: i32,
    pub field_name: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
}

impl From<field_record::Model> for FieldRecordResponse {
    fn from(m: field_record::Model) -> Self {
        Self {
            id: m.id,
            field_template_id: m.field_template_id,
            field_name: m.field_name,
            value: m.value,
            created_at: m.created_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct SubmissionResponse {
    pub id: i32,
    pub form_template_id: i32,
    pub form_name: String,
    pub institution_id: i32,
    pub resident_id: i32,
    pub tutor_id: i32,
    pub status: SubmissionStatus,
    pub submission_date: DateTime<Utc>,
    /// Number of fields the template asks for.
    pub required_fields: u64,
    pub field_records: Vec<FieldRecordResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
