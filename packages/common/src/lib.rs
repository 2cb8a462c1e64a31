pub mod error;
pub mod form;
pub mod notification;
pub mod role;
pub mod submission_status;

pub use error::ParseEnumError;
pub use form::{FieldType, ScoreKind};
pub use notification::NotificationKind;
pub use role::Role;
pub use submission_status::SubmissionStatus;
