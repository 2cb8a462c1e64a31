//! Institution-scoped authorization.
//!
//! Every handler resolves the caller into an [`Actor`] and asks it, rather
//! than re-checking roles and memberships inline.

use std::collections::BTreeSet;

use common::Role;
use sea_orm::{ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect};

use crate::entity::{institution_admin, user, user_institution};
use crate::error::AppError;
use crate::utils::user::roles_of;

/// The authenticated caller together with everything authorization needs.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: i32,
    pub username: String,
    pub is_super_admin: bool,
    pub roles: BTreeSet<Role>,
    /// Institutions the caller is a member of.
    pub institutions: BTreeSet<i32>,
    /// Institutions listing the caller in their admin set.
    pub admin_of: BTreeSet<i32>,
}

/// Which institutions a query may touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstitutionScope {
    All,
    Only(Vec<i32>),
}

impl InstitutionScope {
    /// Condition restricting `column` to the scope.
    pub fn condition<C: ColumnTrait>(&self, column: C) -> Condition {
        match self {
            Self::All => Condition::all(),
            Self::Only(ids) => Condition::all().add(column.is_in(ids.iter().copied())),
        }
    }

    pub fn contains(&self, institution_id: i32) -> bool {
        match self {
            Self::All => true,
            Self::Only(ids) => ids.contains(&institution_id),
        }
    }
}

impl Actor {
    /// Load the caller's flags, roles, memberships and admin set.
    ///
    /// Missing or soft-deleted accounts are treated as an invalid token.
    pub async fn load<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<Self, AppError> {
        let account = user::Entity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or(AppError::TokenInvalid)?;
        if account.is_deleted {
            return Err(AppError::TokenInvalid);
        }

        let roles = roles_of(db, user_id).await?;

        let institutions: Vec<i32> = user_institution::Entity::find()
            .filter(user_institution::Column::UserId.eq(user_id))
            .select_only()
            .column(user_institution::Column::InstitutionId)
            .into_tuple()
            .all(db)
            .await?;

        let admin_of: Vec<i32> = institution_admin::Entity::find()
            .filter(institution_admin::Column::UserId.eq(user_id))
            .select_only()
            .column(institution_admin::Column::InstitutionId)
            .into_tuple()
            .all(db)
            .await?;

        Ok(Actor {
            user_id,
            username: account.username,
            is_super_admin: account.is_super_admin,
            roles,
            institutions: institutions.into_iter().collect(),
            admin_of: admin_of.into_iter().collect(),
        })
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn require_super_admin(&self) -> Result<(), AppError> {
        if self.is_super_admin {
            Ok(())
        } else {
            Err(AppError::PermissionDenied)
        }
    }

    /// Admin role holders, institution admins and super admins.
    pub fn is_admin(&self) -> bool {
        self.is_super_admin || self.has_role(Role::Admin) || !self.admin_of.is_empty()
    }

    pub fn require_admin_role(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::PermissionDenied)
        }
    }

    pub fn is_member(&self, institution_id: i32) -> bool {
        self.is_super_admin
            || self.institutions.contains(&institution_id)
            || self.admin_of.contains(&institution_id)
    }

    pub fn require_member(&self, institution_id: i32) -> Result<(), AppError> {
        if self.is_member(institution_id) {
            Ok(())
        } else {
            Err(AppError::PermissionDenied)
        }
    }

    pub fn is_institution_admin(&self, institution_id: i32) -> bool {
        self.is_super_admin || self.admin_of.contains(&institution_id)
    }

    pub fn require_institution_admin(&self, institution_id: i32) -> Result<(), AppError> {
        if self.is_institution_admin(institution_id) {
            Ok(())
        } else {
            Err(AppError::PermissionDenied)
        }
    }

    /// Resolve the institutions a read may cover.
    ///
    /// Super admins get everything, or just the requested institution.
    /// Everyone else gets their memberships, or the requested institution if
    /// they belong to it; asking for any other institution is a 403.
    pub fn scope(&self, requested: Option<i32>) -> Result<InstitutionScope, AppError> {
        match (self.is_super_admin, requested) {
            (true, None) => Ok(InstitutionScope::All),
            (true, Some(id)) => Ok(InstitutionScope::Only(vec![id])),
            (false, Some(id)) => {
                self.require_member(id)?;
                Ok(InstitutionScope::Only(vec![id]))
            }
            (false, None) => Ok(InstitutionScope::Only(
                self.institutions.union(&self.admin_of).copied().collect(),
            )),
        }
    }

    /// Institutions the caller administers.
    pub fn administered_scope(&self) -> InstitutionScope {
        if self.is_super_admin {
            InstitutionScope::All
        } else {
            InstitutionScope::Only(self.admin_of.iter().copied().collect())
        }
    }
}
