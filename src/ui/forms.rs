//! Patient registration and login forms.
//!
//! Forms validate synchronously and hand themselves to a caller-supplied
//! submit callback only when every field passes. They perform no I/O.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

/// Philippine local mobile format: `09` followed by nine digits.
static PHONE_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^09\d{9}$").expect("phone number pattern compiles"));

pub const PHONE_NUMBER_HINT: &str = "Phone number must be 11 digits and start with 09";

pub fn is_valid_phone_number(phone_number: &str) -> bool {
    PHONE_NUMBER_RE.is_match(phone_number)
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("blank");
        error.message = Some("This field is required".into());
        return Err(error);
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error("invalid form input: {0}")]
    Invalid(#[from] ValidationErrors),
}

impl FormError {
    /// One `field: message` line per failed check, sorted by field name.
    pub fn messages(&self) -> Vec<String> {
        let FormError::Invalid(errors) = self;
        let mut lines: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| error.code.to_string());
                    format!("{}: {}", field, message)
                })
            })
            .collect();
        lines.sort();
        lines
    }
}

pub trait Form: Validate + Sized {
    /// Validate, then pass the form to `on_submit`. The callback never runs on invalid input.
    fn submit<F, R>(self, on_submit: F) -> Result<R, FormError>
    where
        F: FnOnce(Self) -> R,
    {
        self.validate()?;
        Ok(on_submit(self))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Validate)]
pub struct RegistrationForm {
    #[validate(custom = "not_blank")]
    pub name: String,
    #[validate(regex(
        path = "PHONE_NUMBER_RE",
        message = "Phone number must be 11 digits and start with 09"
    ))]
    pub phone_number: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[serde(skip_serializing)]
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
}

impl Form for RegistrationForm {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Validate)]
pub struct LoginForm {
    #[validate(regex(
        path = "PHONE_NUMBER_RE",
        message = "Phone number must be 11 digits and start with 09"
    ))]
    pub phone_number: String,
    #[validate(custom = "not_blank")]
    pub password: String,
}

impl Form for LoginForm {}
