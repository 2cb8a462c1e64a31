pub mod form_template;
pub mod hash;
pub mod institution;
pub mod jwt;
pub mod submission;
pub mod user;
