pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod policy;
pub mod routes;
pub mod seed;
pub mod state;
pub mod utils;

use std::time::Duration;

use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_scalar::{Scalar, Servable as ScalarServable};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::CorsConfig;
use crate::handlers::*;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Formdesk API",
        version = "1.0.0",
        description = "Multi-tenant form templates, submissions and institution management"
    ),
    paths(
        auth::signup,
        auth::login,
        auth::change_password,
        user::get_me,
        user::update_me,
        user::delete_me,
        user::list_users,
        user::list_tutors,
        user::list_tutor_residents,
        user::get_resident_details,
        user::get_user,
        user::update_user,
        user::delete_user,
        institution::list_institutions,
        institution::create_institution,
        institution::my_institutions,
        institution::all_institutions,
        institution::get_institution,
        institution::update_institution,
        institution::delete_institution,
        institution::toggle_status,
        institution::institution_stats,
        institution::list_admins,
        institution::add_institution_admin,
        institution::remove_institution_admin,
        institution::join_institution,
        form_template::list_form_templates,
        form_template::create_form_template,
        form_template::get_form_template,
        form_template::update_form_template,
        form_template::delete_form_template,
        form_template::delete_field_template,
        form_submission::create_submission,
        form_submission::list_user_submissions,
        form_submission::get_submission,
        form_submission::review_submission,
        form_submission::delete_submission,
        superadmin::list_users,
        superadmin::create_user_account,
        superadmin::get_user,
        superadmin::update_user,
        superadmin::set_user_institutions,
        superadmin::delete_user,
        superadmin::create_super_admin,
        superadmin::platform_stats,
        announcement::list_announcements,
        announcement::create_announcement,
        announcement::get_announcement,
        announcement::delete_announcement,
        notification::create_notification,
        notification::list_user_notifications,
        notification::mark_read,
        notification::delete_notification,
        profile::get_my_profile,
        profile::update_my_avatar,
    ),
    tags(
        (name = "Auth", description = "Signup, login and password changes"),
        (name = "Users", description = "Own account and institution-scoped user management"),
        (name = "Institutions", description = "Institutions, memberships and admin sets"),
        (name = "Form Templates", description = "Form templates and their ordered fields"),
        (name = "Form Submissions", description = "Submissions and their completeness"),
        (name = "Super Admin", description = "Platform-wide user management and statistics"),
        (name = "Announcements", description = "Platform announcements"),
        (name = "Notifications", description = "Per-user notifications"),
        (name = "Profiles", description = "User profiles and avatars"),
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();
        components.add_security_scheme(
            "jwt",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// `"*"` allows any origin; unparsable origins are skipped.
fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origin = if config.allow_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = config
            .allow_origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(config.max_age))
}

/// Build the application router.
pub fn build_router(state: AppState) -> axum::Router {
    let api = ApiDoc::openapi();
    let cors = cors_layer(&state.config.server.cors);

    axum::Router::new()
        .nest("/api", routes::api_routes())
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api.clone()))
        .merge(Scalar::with_url("/scalar", api))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
