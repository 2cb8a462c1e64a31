pub mod announcement;
pub mod field_record;
pub mod field_template;
pub mod form_submission;
pub mod form_template;
pub mod institution;
pub mod institution_admin;
pub mod notification;
pub mod profile;
pub mod user;
pub mod user_institution;
pub mod user_role;
