use std::collections::BTreeSet;

use common::Role;
use sea_orm::sea_query::{
    Index, IndexCreateStatement, MysqlQueryBuilder, PostgresQueryBuilder, SqliteQueryBuilder,
};
use sea_orm::*;
use tracing::info;

use crate::config::BootstrapConfig;
use crate::entity::{form_submission, form_template, user};
use crate::utils::user::{NewUser, create_user};

fn render(db: &DatabaseConnection, stmt: &IndexCreateStatement) -> String {
    match db.get_database_backend() {
        DbBackend::Postgres => stmt.to_string(PostgresQueryBuilder),
        DbBackend::MySql => stmt.to_string(MysqlQueryBuilder),
        _ => stmt.to_string(SqliteQueryBuilder),
    }
}

async fn create_index(db: &DatabaseConnection, name: &str, stmt: IndexCreateStatement) {
    match db.execute_unprepared(&render(db, &stmt)).await {
        Ok(_) => info!("Ensured index {} exists", name),
        Err(e) => tracing::warn!("Failed to create index {}: {}", name, e),
    }
}

/// Ensure required database indexes exist.
///
/// Schema sync only knows single-column constraints, so the composite ones
/// are created here on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Form names are unique per institution.
    create_index(
        db,
        "idx_form_template_institution_name",
        Index::create()
            .if_not_exists()
            .unique()
            .name("idx_form_template_institution_name")
            .table(form_template::Entity)
            .col(form_template::Column::InstitutionId)
            .col(form_template::Column::FormName)
            .to_owned(),
    )
    .await;

    // SELECT ... FROM form_submission WHERE resident_id = ? ORDER BY submission_date DESC
    create_index(
        db,
        "idx_form_submission_resident_date",
        Index::create()
            .if_not_exists()
            .name("idx_form_submission_resident_date")
            .table(form_submission::Entity)
            .col(form_submission::Column::ResidentId)
            .col(form_submission::Column::SubmissionDate)
            .to_owned(),
    )
    .await;

    create_index(
        db,
        "idx_form_submission_tutor_date",
        Index::create()
            .if_not_exists()
            .name("idx_form_submission_tutor_date")
            .table(form_submission::Entity)
            .col(form_submission::Column::TutorId)
            .col(form_submission::Column::SubmissionDate)
            .to_owned(),
    )
    .await;

    Ok(())
}

/// Create the configured super admin unless that username already exists.
pub async fn ensure_super_admin(
    db: &DatabaseConnection,
    bootstrap: &BootstrapConfig,
) -> anyhow::Result<()> {
    let (Some(username), Some(password)) = (
        bootstrap.superadmin_username.as_deref(),
        bootstrap.superadmin_password.as_deref(),
    ) else {
        return Ok(());
    };

    let existing = user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await?;
    if let Some(existing) = existing {
        if !existing.is_super_admin {
            tracing::warn!(
                username,
                "Bootstrap username belongs to a regular user; not promoting"
            );
        }
        return Ok(());
    }

    let txn = db.begin().await?;
    let model = create_user(
        &txn,
        NewUser {
            username: username.to_string(),
            password: password.to_string(),
            name: Some("Super Admin".into()),
            email: None,
            phone: None,
            roles: BTreeSet::from([Role::SuperAdmin]),
            institution_ids: Vec::new(),
            supervisor_id: None,
            is_super_admin: true,
            is_first_login: false,
        },
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to create bootstrap super admin: {:?}", e))?;
    txn.commit().await?;

    info!(user_id = model.id, username, "Bootstrap super admin created");
    Ok(())
}
