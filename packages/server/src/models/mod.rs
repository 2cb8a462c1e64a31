pub mod announcement;
pub mod auth;
pub mod form_submission;
pub mod form_template;
pub mod institution;
pub mod notification;
pub mod profile;
pub mod shared;
pub mod superadmin;
pub mod user;
