//! Field-level constraints shared by the entity constructors and the console prompts.
//!
//! Every check is a pure function returning `Ok` or a [`ValidationError`] that names the
//! field and says what is wrong with it.

use lazy_static::lazy_static;
use regex::Regex;

pub const MIN_AGE: i32 = 18;
pub const MAX_AGE: i32 = 100;

/// A field failed its constraint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

pub type Validated<T = ()> = Result<T, ValidationError>;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    // UK mobile (+44 7xxx / 07xxx, optional spacing) or a bare 10-digit national number.
    static ref PHONE_RE: Regex =
        Regex::new(r"^(?:(?:\+44\s?7\d{3}|\(?07\d{3}\)?)\s?\d{3}\s?\d{3}|\d{10})$").unwrap();
}

pub fn validate_name(field: &'static str, value: &str) -> Validated {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be blank"));
    }
    Ok(())
}

pub fn validate_password(value: &str) -> Validated {
    if value.trim().is_empty() {
        return Err(ValidationError::new("password", "Please input your password"));
    }
    Ok(())
}

pub fn validate_age(age: i32) -> Validated {
    if age < MIN_AGE {
        return Err(ValidationError::new(
            "age",
            format!("You must be at least {MIN_AGE} years old"),
        ));
    }
    if age > MAX_AGE {
        return Err(ValidationError::new(
            "age",
            format!("Age must not exceed {MAX_AGE} years"),
        ));
    }
    Ok(())
}

pub fn validate_non_negative_int(field: &'static str, value: i32) -> Validated {
    if value < 0 {
        return Err(ValidationError::new(field, "must not be negative"));
    }
    Ok(())
}

pub fn validate_non_negative(field: &'static str, value: f64) -> Validated {
    if !value.is_finite() {
        return Err(ValidationError::new(field, "must be a finite number"));
    }
    if value < 0.0 {
        return Err(ValidationError::new(field, "must not be negative"));
    }
    Ok(())
}

/// Macro-nutrients are stored as `f32` grams.
pub fn validate_macro(field: &'static str, value: f32) -> Validated {
    validate_non_negative(field, f64::from(value))
}

/// Trims and lowercases an address before checking its shape.
pub fn normalize_email(value: &str) -> Validated<String> {
    let email = value.trim().to_lowercase();
    validate_email(&email)?;
    Ok(email)
}

pub fn validate_email(value: &str) -> Validated {
    if !EMAIL_RE.is_match(value) {
        return Err(ValidationError::new("email", "Please input a valid email"));
    }
    Ok(())
}

pub fn validate_phone(value: &str) -> Validated {
    if !PHONE_RE.is_match(value.trim()) {
        return Err(ValidationError::new("phone", "Invalid mobile phone number"));
    }
    Ok(())
}
