use std::collections::{BTreeSet, HashMap};

use common::Role;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, LikeExpr, Query as SeaQuery};
use sea_orm::*;

use crate::entity::{
    form_submission, institution, institution_admin, notification, profile, user, user_institution,
    user_role,
};
use crate::error::AppError;
use crate::models::shared::escape_like;
use crate::models::user::{SubmissionStats, UserResponse};
use crate::policy::{Actor, InstitutionScope};
use crate::utils::hash;

pub async fn roles_of<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<BTreeSet<Role>, DbErr> {
    let rows: Vec<String> = user_role::Entity::find()
        .filter(user_role::Column::UserId.eq(user_id))
        .select_only()
        .column(user_role::Column::Role)
        .into_tuple()
        .all(db)
        .await?;
    Ok(parse_roles(user_id, rows))
}

fn parse_roles(user_id: i32, rows: impl IntoIterator<Item = String>) -> BTreeSet<Role> {
    rows.into_iter()
        .filter_map(|raw| match raw.parse::<Role>() {
            Ok(role) => Some(role),
            Err(e) => {
                tracing::warn!(user_id, "Ignoring stored role: {}", e);
                None
            }
        })
        .collect()
}

pub async fn institutions_of<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<Vec<i32>, DbErr> {
    user_institution::Entity::find()
        .filter(user_institution::Column::UserId.eq(user_id))
        .select_only()
        .column(user_institution::Column::InstitutionId)
        .order_by_asc(user_institution::Column::InstitutionId)
        .into_tuple()
        .all(db)
        .await
}

/// Fetch a user that has not been soft-deleted.
pub async fn find_active_user<C: ConnectionTrait>(db: &C, id: i32) -> Result<user::Model, AppError> {
    user::Entity::find_by_id(id)
        .filter(user::Column::IsDeleted.eq(false))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

pub async fn user_response<C: ConnectionTrait>(
    db: &C,
    model: user::Model,
) -> Result<UserResponse, DbErr> {
    let mut list = user_responses(db, vec![model]).await?;
    list.pop()
        .ok_or_else(|| DbErr::Custom("user response lost".into()))
}

/// Build responses for many users with one query per relation.
pub async fn user_responses<C: ConnectionTrait>(
    db: &C,
    models: Vec<user::Model>,
) -> Result<Vec<UserResponse>, DbErr> {
    let ids: Vec<i32> = models.iter().map(|m| m.id).collect();
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let role_rows: Vec<(i32, String)> = user_role::Entity::find()
        .filter(user_role::Column::UserId.is_in(ids.clone()))
        .select_only()
        .column(user_role::Column::UserId)
        .column(user_role::Column::Role)
        .into_tuple()
        .all(db)
        .await?;
    let mut roles: HashMap<i32, Vec<String>> = HashMap::new();
    for (uid, role) in role_rows {
        roles.entry(uid).or_default().push(role);
    }

    let member_rows: Vec<(i32, i32)> = user_institution::Entity::find()
        .filter(user_institution::Column::UserId.is_in(ids))
        .select_only()
        .column(user_institution::Column::UserId)
        .column(user_institution::Column::InstitutionId)
        .order_by_asc(user_institution::Column::InstitutionId)
        .into_tuple()
        .all(db)
        .await?;
    let mut memberships: HashMap<i32, Vec<i32>> = HashMap::new();
    for (uid, iid) in member_rows {
        memberships.entry(uid).or_default().push(iid);
    }

    Ok(models
        .into_iter()
        .map(|m| {
            let roles = parse_roles(m.id, roles.remove(&m.id).unwrap_or_default());
            UserResponse {
                id: m.id,
                username: m.username,
                name: m.name,
                email: m.email,
                phone: m.phone,
                image: m.image,
                roles: roles.into_iter().collect(),
                institutions: memberships.remove(&m.id).unwrap_or_default(),
                supervisor_id: m.supervisor_id,
                is_super_admin: m.is_super_admin,
                is_first_login: m.is_first_login,
                created_at: m.created_at,
            }
        })
        .collect())
}

pub async fn set_roles<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    roles: &BTreeSet<Role>,
) -> Result<(), DbErr> {
    user_role::Entity::delete_many()
        .filter(user_role::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    for role in roles {
        user_role::ActiveModel {
            user_id: Set(user_id),
            role: Set(role.as_str().to_string()),
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

/// Replace the user's memberships with `institution_ids`.
pub async fn set_institutions<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    institution_ids: &[i32],
) -> Result<(), DbErr> {
    user_institution::Entity::delete_many()
        .filter(user_institution::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    let now = chrono::Utc::now();
    for &institution_id in institution_ids {
        user_institution::ActiveModel {
            user_id: Set(user_id),
            institution_id: Set(institution_id),
            joined_at: Set(now),
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

pub async fn ensure_institutions_exist<C: ConnectionTrait>(
    db: &C,
    institution_ids: &[i32],
) -> Result<(), AppError> {
    let found = institution::Entity::find()
        .filter(institution::Column::Id.is_in(institution_ids.iter().copied()))
        .count(db)
        .await?;
    if found != institution_ids.len() as u64 {
        return Err(AppError::NotFound("Institution not found".into()));
    }
    Ok(())
}

/// Supervisors must be live tutors.
pub async fn ensure_supervisor<C: ConnectionTrait>(db: &C, supervisor_id: i32) -> Result<(), AppError> {
    find_active_user(db, supervisor_id).await?;
    if !roles_of(db, supervisor_id).await?.contains(&Role::Tutor) {
        return Err(AppError::Validation("Supervisor must be a tutor".into()));
    }
    Ok(())
}

/// Everything needed to create an account.
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub roles: BTreeSet<Role>,
    pub institution_ids: Vec<i32>,
    pub supervisor_id: Option<i32>,
    pub is_super_admin: bool,
    pub is_first_login: bool,
}

/// Insert a user with their roles and memberships.
///
/// Run inside a transaction; a duplicate username surfaces as
/// [`AppError::UsernameTaken`].
pub async fn create_user<C: ConnectionTrait>(db: &C, new: NewUser) -> Result<user::Model, AppError> {
    let taken = user::Entity::find()
        .filter(user::Column::Username.eq(&new.username))
        .count(db)
        .await?;
    if taken > 0 {
        return Err(AppError::UsernameTaken);
    }

    let password = hash::hash_password(&new.password)
        .map_err(|e| AppError::Internal(format!("Password hash error: {}", e)))?;

    let model = user::ActiveModel {
        username: Set(new.username),
        password: Set(password),
        name: Set(new.name),
        email: Set(new.email),
        phone: Set(new.phone),
        image: Set(None),
        supervisor_id: Set(new.supervisor_id),
        is_super_admin: Set(new.is_super_admin),
        is_first_login: Set(new.is_first_login),
        is_deleted: Set(false),
        deleted_at: Set(None),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(map_username_conflict)?;

    set_roles(db, model.id, &new.roles).await?;
    set_institutions(db, model.id, &new.institution_ids).await?;

    Ok(model)
}

pub fn map_username_conflict(e: DbErr) -> AppError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            tracing::debug!("Username race: unique constraint caught on write");
            AppError::UsernameTaken
        }
        _ => AppError::from(e),
    }
}

/// Whether another account already uses `username`.
pub async fn username_taken_by_other<C: ConnectionTrait>(
    db: &C,
    username: &str,
    user_id: i32,
) -> Result<bool, DbErr> {
    let count = user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .filter(user::Column::Id.ne(user_id))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Submission totals keyed by user: tutors count as tutor, everyone else as resident.
///
/// Only submissions inside `scope` are counted.
pub async fn submission_totals<C: ConnectionTrait>(
    db: &C,
    users: &[UserResponse],
    scope: &InstitutionScope,
) -> Result<HashMap<i32, u64>, DbErr> {
    let ids: Vec<i32> = users.iter().map(|u| u.id).collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let as_resident = count_grouped(db, form_submission::Column::ResidentId, &ids, scope).await?;
    let as_tutor = count_grouped(db, form_submission::Column::TutorId, &ids, scope).await?;

    Ok(users
        .iter()
        .map(|u| {
            let source = if u.roles.contains(&Role::Tutor) {
                &as_tutor
            } else {
                &as_resident
            };
            (u.id, source.get(&u.id).copied().unwrap_or(0))
        })
        .collect())
}

async fn count_grouped<C: ConnectionTrait>(
    db: &C,
    column: form_submission::Column,
    ids: &[i32],
    scope: &InstitutionScope,
) -> Result<HashMap<i32, u64>, DbErr> {
    let rows: Vec<(i32, i64)> = form_submission::Entity::find()
        .filter(column.is_in(ids.iter().copied()))
        .filter(scope.condition(form_submission::Column::InstitutionId))
        .select_only()
        .column(column)
        .column_as(form_submission::Column::Id.count(), "total")
        .group_by(column)
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(id, n)| (id, u64::try_from(n).unwrap_or(0)))
        .collect())
}

/// Counters over the resident's submissions within `scope`.
pub async fn resident_stats<C: ConnectionTrait>(
    db: &C,
    resident_id: i32,
    scope: &InstitutionScope,
) -> Result<SubmissionStats, DbErr> {
    let statuses: Vec<common::SubmissionStatus> = form_submission::Entity::find()
        .filter(form_submission::Column::ResidentId.eq(resident_id))
        .filter(scope.condition(form_submission::Column::InstitutionId))
        .select_only()
        .column(form_submission::Column::Status)
        .into_tuple()
        .all(db)
        .await?;
    Ok(stats_from(&statuses))
}

pub fn stats_from(statuses: &[common::SubmissionStatus]) -> SubmissionStats {
    use common::SubmissionStatus;
    let mut stats = SubmissionStats::default();
    for status in statuses {
        stats.total += 1;
        match status {
            SubmissionStatus::Pending => stats.pending += 1,
            SubmissionStatus::Completed => stats.completed += 1,
            _ => {}
        }
    }
    stats
}

/// Users belonging to at least one institution of the scope.
pub fn member_condition(scope: &InstitutionScope) -> Condition {
    match scope {
        InstitutionScope::All => Condition::all(),
        InstitutionScope::Only(ids) => Condition::all().add(
            user::Column::Id.in_subquery(
                SeaQuery::select()
                    .column(user_institution::Column::UserId)
                    .from(user_institution::Entity)
                    .and_where(user_institution::Column::InstitutionId.is_in(ids.iter().copied()))
                    .to_owned(),
            ),
        ),
    }
}

/// Users holding any of `roles`.
pub fn role_condition(roles: &[Role]) -> Condition {
    Condition::all().add(
        user::Column::Id.in_subquery(
            SeaQuery::select()
                .column(user_role::Column::UserId)
                .from(user_role::Entity)
                .and_where(user_role::Column::Role.is_in(roles.iter().map(|r| r.as_str())))
                .to_owned(),
        ),
    )
}

/// Case-insensitive match on username or name.
pub fn search_condition(search: Option<&str>) -> Condition {
    let term = escape_like(search.unwrap_or_default().trim()).to_lowercase();
    if term.is_empty() {
        return Condition::all();
    }
    let pattern = format!("%{term}%");
    Condition::any()
        .add(
            Expr::expr(Func::lower(Expr::col(user::Column::Username)))
                .like(LikeExpr::new(pattern.clone()).escape('\\')),
        )
        .add(
            Expr::expr(Func::lower(Expr::col(user::Column::Name)))
                .like(LikeExpr::new(pattern).escape('\\')),
        )
}

/// Whether `actor` administers an institution `target` belongs to.
pub fn administers_user(actor: &Actor, target_institutions: &[i32]) -> bool {
    actor.is_super_admin
        || target_institutions
            .iter()
            .any(|iid| actor.admin_of.contains(iid))
}

/// Whether `actor` may see `target`: themselves, or someone sharing an institution.
pub fn can_view_user(actor: &Actor, target_id: i32, target_institutions: &[i32]) -> bool {
    actor.user_id == target_id
        || actor.is_super_admin
        || target_institutions.iter().any(|iid| actor.is_member(*iid))
}

/// Hard-delete a user and everything hanging off the account.
///
/// Rejected while the user takes part in submissions or is the last admin
/// of an institution. Supervisees lose their supervisor link.
pub async fn purge_user<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<(), AppError> {
    let submissions = form_submission::Entity::find()
        .filter(
            Condition::any()
                .add(form_submission::Column::ResidentId.eq(user_id))
                .add(form_submission::Column::TutorId.eq(user_id)),
        )
        .count(db)
        .await?;
    if submissions > 0 {
        return Err(AppError::Conflict(format!(
            "Cannot delete user. They take part in {submissions} submissions."
        )));
    }

    let administered: Vec<i32> = institution_admin::Entity::find()
        .filter(institution_admin::Column::UserId.eq(user_id))
        .select_only()
        .column(institution_admin::Column::InstitutionId)
        .into_tuple()
        .all(db)
        .await?;
    for institution_id in administered {
        let admins = institution_admin::Entity::find()
            .filter(institution_admin::Column::InstitutionId.eq(institution_id))
            .count(db)
            .await?;
        if admins <= 1 {
            return Err(AppError::Conflict(
                "Cannot delete the last admin of an institution".into(),
            ));
        }
    }

    user::Entity::update_many()
        .col_expr(user::Column::SupervisorId, Expr::value(Option::<i32>::None))
        .filter(user::Column::SupervisorId.eq(user_id))
        .exec(db)
        .await?;
    institution_admin::Entity::delete_many()
        .filter(institution_admin::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    user_institution::Entity::delete_many()
        .filter(user_institution::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    user_role::Entity::delete_many()
        .filter(user_role::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    notification::Entity::delete_many()
        .filter(notification::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    profile::Entity::delete_many()
        .filter(profile::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    user::Entity::delete_by_id(user_id).exec(db).await?;
    Ok(())
}
