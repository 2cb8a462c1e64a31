use sea_orm::sea_query::{LockType, Query as SeaQuery};
use sea_orm::*;

use crate::entity::{institution, institution_admin, user, user_institution};
use crate::error::AppError;
use crate::models::institution::InstitutionResponse;

/// Look up an institution by ID, returning 404 if not found.
pub async fn find_institution<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<institution::Model, AppError> {
    institution::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Institution not found".into()))
}

pub async fn find_institution_for_update(
    txn: &DatabaseTransaction,
    id: i32,
) -> Result<institution::Model, AppError> {
    institution::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Institution not found".into()))
}

pub async fn admin_ids<C: ConnectionTrait>(db: &C, institution_id: i32) -> Result<Vec<i32>, DbErr> {
    institution_admin::Entity::find()
        .filter(institution_admin::Column::InstitutionId.eq(institution_id))
        .select_only()
        .column(institution_admin::Column::UserId)
        .order_by_asc(institution_admin::Column::UserId)
        .into_tuple()
        .all(db)
        .await
}

pub async fn institution_response<C: ConnectionTrait>(
    db: &C,
    model: institution::Model,
) -> Result<InstitutionResponse, DbErr> {
    let admins = admin_ids(db, model.id).await?;
    Ok(InstitutionResponse::new(model, admins))
}

pub async fn institution_responses<C: ConnectionTrait>(
    db: &C,
    models: Vec<institution::Model>,
) -> Result<Vec<InstitutionResponse>, DbErr> {
    let ids: Vec<i32> = models.iter().map(|m| m.id).collect();
    let rows: Vec<(i32, i32)> = institution_admin::Entity::find()
        .filter(institution_admin::Column::InstitutionId.is_in(ids))
        .select_only()
        .column(institution_admin::Column::InstitutionId)
        .column(institution_admin::Column::UserId)
        .order_by_asc(institution_admin::Column::UserId)
        .into_tuple()
        .all(db)
        .await?;

    Ok(models
        .into_iter()
        .map(|m| {
            let admins = rows
                .iter()
                .filter(|(iid, _)| *iid == m.id)
                .map(|(_, uid)| *uid)
                .collect();
            InstitutionResponse::new(m, admins)
        })
        .collect())
}

pub async fn is_member<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    institution_id: i32,
) -> Result<bool, DbErr> {
    Ok(user_institution::Entity::find_by_id((user_id, institution_id))
        .one(db)
        .await?
        .is_some())
}

/// Add a membership unless it already exists.
pub async fn add_member<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    institution_id: i32,
) -> Result<(), DbErr> {
    if is_member(db, user_id, institution_id).await? {
        return Ok(());
    }
    user_institution::ActiveModel {
        user_id: Set(user_id),
        institution_id: Set(institution_id),
        joined_at: Set(chrono::Utc::now()),
    }
    .insert(db)
    .await?;
    Ok(())
}

pub async fn remove_member<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    institution_id: i32,
) -> Result<(), DbErr> {
    user_institution::Entity::delete_by_id((user_id, institution_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Add `user_id` to the admin set; admins are always members too.
pub async fn add_admin<C: ConnectionTrait>(
    db: &C,
    institution_id: i32,
    user_id: i32,
) -> Result<(), DbErr> {
    institution_admin::ActiveModel {
        institution_id: Set(institution_id),
        user_id: Set(user_id),
        added_at: Set(chrono::Utc::now()),
    }
    .insert(db)
    .await?;
    add_member(db, user_id, institution_id).await
}

/// Number of non-super-admin users referencing the institution.
///
/// Soft-deleted accounts still count: their submission history hangs off it.
pub async fn member_count<C: ConnectionTrait>(db: &C, institution_id: i32) -> Result<u64, DbErr> {
    user_institution::Entity::find()
        .filter(user_institution::Column::InstitutionId.eq(institution_id))
        .filter(
            user_institution::Column::UserId.in_subquery(
                SeaQuery::select()
                    .column(user::Column::Id)
                    .from(user::Entity)
                    .and_where(user::Column::IsSuperAdmin.eq(false))
                    .to_owned(),
            ),
        )
        .count(db)
        .await
}
