
mod form_submissions;
mod form_templates;
mod institutions;
mod superadmin;
mod users;
