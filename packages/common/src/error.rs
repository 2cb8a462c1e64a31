use thiserror::Error;

/// Error when parsing a string into one of the domain enums.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {kind} '{invalid}'. Valid values: {valid}")]
pub struct ParseEnumError {
    kind: &'static str,
    invalid: String,
    valid: String,
}

impl ParseEnumError {
    pub fn new<'a>(
        kind: &'static str,
        invalid: &str,
        valid: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            kind,
            invalid: invalid.to_string(),
            valid: valid.into_iter().collect::<Vec<_>>().join(", "),
        }
    }
}
