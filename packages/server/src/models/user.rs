use chrono::{DateTime, Utc};
use common::Role;
use serde::{Deserialize, Serialize};

use super::form_submission::SubmissionResponse;
use super::shared::double_option;

/// Public view of an account. Never carries the password hash.
#[derive(Serialize, Clone, utoipa::ToSchema)]
pub struct UserResponse {
    #[schema(example = 42)]
    pub id: i32,
    #[schema(example = "dr_smith")]
    pub username: String,
    #[schema(example = "Jane Smith")]
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Path or URL of the user's picture.
    pub image: Option<String>,
    pub roles: Vec<Role>,
    /// IDs of the institutions the user belongs to.
    #[schema(example = json!([1, 3]))]
    pub institutions: Vec<i32>,
    pub supervisor_id: Option<i32>,
    pub is_super_admin: bool,
    pub is_first_login: bool,
    pub created_at: DateTime<Utc>,
}

/// Entry of a user listing.
#[derive(Serialize, utoipa::ToSchema)]
pub struct UserListItem {
    #[serde(flatten)]
    pub user: UserResponse,
    /// Submissions where the user is the tutor (for tutors) or the resident.
    pub total_submissions: u64,
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    /// Restrict to members of this institution.
    pub institution_id: Option<i32>,
    /// Case-insensitive substring of the username or name.
    pub search: Option<String>,
    /// Only users holding this role.
    pub role: Option<String>,
}

/// Self-service account update. Absent fields are left unchanged.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateMeRequest {
    pub username: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub image: Option<Option<String>>,
}

/// Confirmation for deleting one's own account.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct DeleteMeRequest {
    pub password: String,
}

/// Update of a user by an admin of one of their institutions.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct AdminUpdateUserRequest {
    pub username: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub image: Option<Option<String>>,
    /// Tutor supervising this user; `null` clears it.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i32>)]
    pub supervisor_id: Option<Option<i32>>,
}

/// Submission counters of a resident.
#[derive(Serialize, Default, Debug, PartialEq, Eq, utoipa::ToSchema)]
pub struct SubmissionStats {
    pub total: u64,
    pub completed: u64,
    pub pending: u64,
}

/// A supervisee of a tutor together with their counters.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ResidentWithStats {
    #[serde(flatten)]
    pub user: UserResponse,
    pub stats: SubmissionStats,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct TutorResidentsResponse {
    pub tutor: UserResponse,
    pub residents: Vec<ResidentWithStats>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ResidentDetailsResponse {
    pub resident: UserResponse,
    pub submissions: Vec<SubmissionResponse>,
    pub stats: SubmissionStats,
}
