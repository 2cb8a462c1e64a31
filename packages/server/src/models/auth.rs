use common::Role;
use serde::{Deserialize, Serialize};

use super::shared::{normalize_username, optional_text, required_text, validate_password};
use super::user::UserResponse;
use crate::error::AppError;

/// Request body for self-service signup.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct SignupRequest {
    /// Unique username; whitespace is stripped.
    #[schema(example = "dr_smith")]
    pub username: String,
    /// Password (8-128 characters).
    #[schema(example = "s3cure_P@ss!")]
    pub password: String,
    #[schema(example = "Jane Smith")]
    pub name: String,
    /// Either `resident` or `tutor`.
    #[schema(example = "resident")]
    pub role: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Active institution to join right away.
    pub institution_id: Option<i32>,
}

/// Signup input after normalization.
pub struct ValidSignup {
    pub username: String,
    pub name: String,
    pub role: Role,
    pub email: Option<String>,
    pub phone: Option<String>,
}

pub fn validate_signup(payload: &SignupRequest) -> Result<ValidSignup, AppError> {
    let username = normalize_username(&payload.username)?;
    validate_password(&payload.password)?;
    let name = required_text(&payload.name, "Name", 128)?;

    let role: Role = payload
        .role
        .parse()
        .map_err(|e: common::ParseEnumError| AppError::Validation(e.to_string()))?;
    if !Role::SELF_SERVICE.contains(&role) {
        return Err(AppError::Validation(
            "Role must be either 'resident' or 'tutor'".into(),
        ));
    }

    Ok(ValidSignup {
        username,
        name,
        role,
        email: optional_text(payload.email.clone()),
        phone: optional_text(payload.phone.clone()),
    })
}

/// Request body for user login.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    #[schema(example = "dr_smith")]
    pub username: String,
    #[schema(example = "s3cure_P@ss!")]
    pub password: String,
}

pub fn validate_login_request(payload: &LoginRequest) -> Result<(), AppError> {
    if payload.username.trim().is_empty() {
        return Err(AppError::Validation("Username must not be empty".into()));
    }
    if payload.password.is_empty() {
        return Err(AppError::Validation("Password must not be empty".into()));
    }
    Ok(())
}

/// Successful login response.
#[derive(Serialize, utoipa::ToSchema)]
pub struct LoginResponse {
    /// JWT bearer token.
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub token: String,
    /// Set while the account still carries an assigned initial password.
    pub require_password_change: bool,
    pub user: UserResponse,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Returned after a password change; carries a fresh token.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ChangePasswordResponse {
    #[schema(example = "Password updated successfully")]
    pub message: String,
    pub token: String,
}
