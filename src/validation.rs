use thiserror::Error;

use crate::models::{ContactPatch, NewContact, Patch};

const MAX_NAME_LEN: usize = 100;
const MAX_EMAIL_LEN: usize = 255;
const MAX_PHONE_LEN: usize = 50;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("{0} must not be null")]
    NullField(&'static str),

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("days must be between 0 and {max}, got {got}")]
    WindowOutOfRange { got: u32, max: u32 },
}

pub fn validate_new_contact(contact: &NewContact) -> Result<(), ValidationError> {
    validate_name("first_name", &contact.first_name)?;
    validate_name("last_name", &contact.last_name)?;
    validate_email(&contact.email)?;
    if let Some(phone) = &contact.phone {
        validate_len("phone", phone, MAX_PHONE_LEN)?;
    }
    Ok(())
}

pub fn validate_patch(patch: &ContactPatch) -> Result<(), ValidationError> {
    required(&patch.first_name, "first_name", |v| validate_name("first_name", v))?;
    required(&patch.last_name, "last_name", |v| validate_name("last_name", v))?;
    required(&patch.email, "email", |v| validate_email(v))?;
    required(&patch.sent, "sent", |_| Ok(()))?;
    if let Patch::Value(phone) = &patch.phone {
        validate_len("phone", phone, MAX_PHONE_LEN)?;
    }
    Ok(())
}

fn required<T>(
    field: &Patch<T>,
    name: &'static str,
    check: impl FnOnce(&T) -> Result<(), ValidationError>,
) -> Result<(), ValidationError> {
    match field {
        Patch::Unset => Ok(()),
        Patch::Null => Err(ValidationError::NullField(name)),
        Patch::Value(value) => check(value),
    }
}

fn validate_name(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    validate_len(field, value, MAX_NAME_LEN)
}

fn validate_len(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::EmptyField("email"));
    }
    validate_len("email", email, MAX_EMAIL_LEN)?;

    let invalid = || ValidationError::InvalidEmail(email.to_string());
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(invalid());
    };
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid());
    }
    Ok(())
}

pub fn validate_window(days: u32, max: u32) -> Result<(), ValidationError> {
    if days > max {
        return Err(ValidationError::WindowOutOfRange { got: days, max });
    }
    Ok(())
}
