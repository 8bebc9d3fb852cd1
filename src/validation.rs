use thiserror::Error;

/// Column widths from the migrations.
pub const TEXT_MAX: usize = 255;
pub const LABEL_MAX: usize = 100;
pub const GENDER_MAX: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("{field} exceeds maximum length of {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("{field} must not be negative")]
    Negative { field: &'static str },
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
}

/// Non-blank after trimming and at most `max` characters.
pub fn required(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    bounded(field, value, max)
}

pub fn bounded(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}

pub fn optional(field: &'static str, value: Option<&str>, max: usize) -> Result<(), ValidationError> {
    value.map_or(Ok(()), |value| bounded(field, value, max))
}

pub fn non_negative(field: &'static str, value: Option<i32>) -> Result<(), ValidationError> {
    if value.is_some_and(|v| v < 0) {
        return Err(ValidationError::Negative { field });
    }
    Ok(())
}
