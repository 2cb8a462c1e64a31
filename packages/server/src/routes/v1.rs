use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

use crate::handlers;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/users", user_routes())
        .nest("/institutions", institution_routes())
        .nest("/formTemplates", form_template_routes())
        .nest("/fieldTemplates", field_template_routes())
        .nest("/formSubmitions", form_submission_routes())
        .nest("/superadmin", superadmin_routes())
        .nest("/announcements", announcement_routes())
        .nest("/notifications", notification_routes())
        .nest("/profiles", profile_routes())
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(handlers::auth::signup))
        .route("/login", post(handlers::auth::login))
        .route("/change-password", put(handlers::auth::change_password))
        .route(
            "/me",
            get(handlers::user::get_me)
                .put(handlers::user::update_me)
                .delete(handlers::user::delete_me),
        )
        .route("/", get(handlers::user::list_users))
        .route("/tutors", get(handlers::user::list_tutors))
        .route(
            "/tutors/{tutor_id}/residents",
            get(handlers::user::list_tutor_residents),
        )
        .route(
            "/residents/{resident_id}",
            get(handlers::user::get_resident_details),
        )
        .route(
            "/{id}",
            get(handlers::user::get_user)
                .put(handlers::user::update_user)
                .delete(handlers::user::delete_user),
        )
}

fn institution_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::institution::list_institutions)
                .post(handlers::institution::create_institution),
        )
        .route("/me", get(handlers::institution::my_institutions))
        .route("/all", get(handlers::institution::all_institutions))
        .route(
            "/{id}",
            get(handlers::institution::get_institution)
                .put(handlers::institution::update_institution)
                .delete(handlers::institution::delete_institution),
        )
        .route(
            "/{id}/toggle-status",
            patch(handlers::institution::toggle_status),
        )
        .route("/{id}/stats", get(handlers::institution::institution_stats))
        .route(
            "/{id}/admins",
            get(handlers::institution::list_admins)
                .post(handlers::institution::add_institution_admin),
        )
        .route(
            "/{id}/admins/{user_id}",
            delete(handlers::institution::remove_institution_admin),
        )
        .route("/{id}/join", post(handlers::institution::join_institution))
}

fn form_template_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::form_template::list_form_templates)
                .post(handlers::form_template::create_form_template),
        )
        .route(
            "/{id}",
            get(handlers::form_template::get_form_template)
                .put(handlers::form_template::update_form_template)
                .delete(handlers::form_template::delete_form_template),
        )
}

fn field_template_routes() -> Router<AppState> {
    Router::new().route(
        "/{id}",
        delete(handlers::form_template::delete_field_template),
    )
}

fn form_submission_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::form_submission::create_submission))
        .route(
            "/user/{id}",
            get(handlers::form_submission::list_user_submissions),
        )
        .route(
            "/{id}",
            get(handlers::form_submission::get_submission)
                .delete(handlers::form_submission::delete_submission),
        )
        .route(
            "/{id}/review",
            put(handlers::form_submission::review_submission),
        )
}

fn superadmin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/users",
            get(handlers::superadmin::list_users).post(handlers::superadmin::create_user_account),
        )
        .route(
            "/users/{id}",
            get(handlers::superadmin::get_user)
                .put(handlers::superadmin::update_user)
                .delete(handlers::superadmin::delete_user),
        )
        .route(
            "/users/{id}/institutions",
            patch(handlers::superadmin::set_user_institutions),
        )
        .route(
            "/create-superadmin",
            post(handlers::superadmin::create_super_admin),
        )
        .route("/stats", get(handlers::superadmin::platform_stats))
}

fn announcement_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::announcement::list_announcements)
                .post(handlers::announcement::create_announcement),
        )
        .route(
            "/{id}",
            get(handlers::announcement::get_announcement)
                .delete(handlers::announcement::delete_announcement),
        )
}

fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::notification::create_notification))
        .route(
            "/user/{user_id}",
            get(handlers::notification::list_user_notifications),
        )
        .route("/{id}/read", put(handlers::notification::mark_read))
        .route("/{id}", delete(handlers::notification::delete_notification))
}

fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(handlers::profile::get_my_profile))
        .route("/me/avatar", put(handlers::profile::update_my_avatar))
}
