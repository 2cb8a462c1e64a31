use std::collections::BTreeSet;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use sea_orm::*;
use tracing::instrument;

use crate::entity::user;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::auth::*;
use crate::models::shared::validate_password;
use crate::models::user::UserResponse;
use crate::state::AppState;
use crate::utils::institution::find_institution;
use crate::utils::user::{NewUser, create_user, find_active_user, user_response};
use crate::utils::{hash, jwt};

fn issue_token(state: &AppState, model: &user::Model) -> Result<String, AppError> {
    jwt::sign(
        model.id,
        &model.username,
        &state.config.auth.jwt_secret,
        state.config.auth.token_ttl_hours,
    )
    .map_err(|e| AppError::Internal(format!("JWT sign error: {}", e)))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/signup",
    tag = "Users",
    operation_id = "signup",
    summary = "Create an account",
    description = "Self-service signup as a resident or tutor, optionally joining an active institution.",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR, USERNAME_TAKEN)", body = ErrorBody),
        (status = 404, description = "Institution not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn signup(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let valid = validate_signup(&payload)?;

    let txn = state.db.begin().await?;

    let mut institution_ids = Vec::new();
    if let Some(iid) = payload.institution_id {
        let institution = find_institution(&txn, iid).await?;
        if !institution.is_active {
            return Err(AppError::Validation("Institution is not active".into()));
        }
        institution_ids.push(iid);
    }

    let model = create_user(
        &txn,
        NewUser {
            username: valid.username,
            password: payload.password,
            name: Some(valid.name),
            email: valid.email,
            phone: valid.phone,
            roles: BTreeSet::from([valid.role]),
            institution_ids,
            supervisor_id: None,
            is_super_admin: false,
            is_first_login: false,
        },
    )
    .await?;

    let body = user_response(&txn, model).await?;
    txn.commit().await?;

    tracing::info!(user_id = body.id, "User signed up");
    Ok((StatusCode::CREATED, Json(body)))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/login",
    tag = "Users",
    operation_id = "login",
    summary = "Log in and obtain a JWT",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Invalid credentials (INVALID_CREDENTIALS)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    validate_login_request(&payload)?;

    let username: String = payload.username.split_whitespace().collect();

    let model = user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .filter(user::Column::IsDeleted.eq(false))
        .one(&state.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let is_valid = hash::verify_password(&payload.password, &model.password)
        .map_err(|e| AppError::Internal(format!("Password verify error: {}", e)))?;
    if !is_valid {
        return Err(AppError::InvalidCredentials);
    }

    let token = issue_token(&state, &model)?;
    let require_password_change = model.is_first_login;
    let user = user_response(&state.db, model).await?;

    Ok(Json(LoginResponse {
        token,
        require_password_change,
        user,
    }))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/change-password",
    tag = "Users",
    operation_id = "changePassword",
    summary = "Change the caller's password",
    description = "Verifies the current password, stores the new one, clears the first-login flag and returns a fresh token.",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = ChangePasswordResponse),
        (status = 400, description = "Wrong current password or invalid new one (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id))]
pub async fn change_password(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<ChangePasswordRequest>,
) -> Result<Json<ChangePasswordResponse>, AppError> {
    validate_password(&payload.new_password)?;

    let model = find_active_user(&state.db, auth_user.user_id)
        .await
        .map_err(|_| AppError::TokenInvalid)?;

    let matches = hash::verify_password(&payload.old_password, &model.password)
        .map_err(|e| AppError::Internal(format!("Password verify error: {}", e)))?;
    if !matches {
        return Err(AppError::Validation("Current password is incorrect".into()));
    }

    let hashed = hash::hash_password(&payload.new_password)
        .map_err(|e| AppError::Internal(format!("Password hash error: {}", e)))?;

    let mut active: user::ActiveModel = model.into();
    active.password = Set(hashed);
    active.is_first_login = Set(false);
    let model = active.update(&state.db).await?;

    Ok(Json(ChangePasswordResponse {
        message: "Password updated successfully".into(),
        token: issue_token(&state, &model)?,
    }))
}
