//! Input validation
//!
//! Field-level checks shared by the auth, notes and labels services. Each
//! check returns the message for its field, or `None` when the value passes.

use crate::config::{
    EMAIL_PATTERN, MAX_LABEL_COLOR_LENGTH, MAX_LABEL_NAME_LENGTH, MAX_NOTE_COLOR_LENGTH,
    MAX_NOTE_TITLE_LENGTH, MAX_PHONE_NUMBER_LENGTH, MAX_USERNAME_LENGTH, MIN_PASSWORD_LENGTH,
    PASSWORD_SPECIAL_CHARS,
};
use crate::database::{LabelInput, NoteInput};
use crate::error::{AppError, FieldErrors, Result};
use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(EMAIL_PATTERN).expect("email pattern compiles"));

pub const INVALID_EMAIL: &str = "Invalid email format.";
pub const WEAK_PASSWORD: &str = "Password must be at least 8 characters long and contain both letters and numbers, at least 1 uppercase letter, and 1 special character.";

pub fn check_email(email: &str) -> Option<String> {
    if EMAIL_RE.is_match(email) {
        None
    } else {
        Some(INVALID_EMAIL.to_string())
    }
}

/// At least 8 characters with one uppercase letter, one special character
/// and one alphanumeric character
pub fn check_password(password: &str) -> Option<String> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_LENGTH;
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_special = password.chars().any(|c| PASSWORD_SPECIAL_CHARS.contains(c));
    let has_alnum = password.chars().any(|c| c.is_ascii_alphanumeric());

    if long_enough && has_upper && has_special && has_alnum {
        None
    } else {
        Some(WEAK_PASSWORD.to_string())
    }
}

pub fn check_username(username: &str) -> Option<String> {
    if username.trim().is_empty() {
        Some("This field may not be blank.".to_string())
    } else if username.chars().count() > MAX_USERNAME_LENGTH {
        Some(too_long(MAX_USERNAME_LENGTH))
    } else {
        None
    }
}

pub fn check_phone_number(phone_number: &str) -> Option<String> {
    if phone_number.chars().count() > MAX_PHONE_NUMBER_LENGTH {
        Some(too_long(MAX_PHONE_NUMBER_LENGTH))
    } else {
        None
    }
}

fn too_long(max: usize) -> String {
    format!("Ensure this field has no more than {} characters.", max)
}

fn check_max_len(errors: &mut FieldErrors, field: &str, value: Option<&str>, max: usize) {
    if let Some(value) = value {
        if value.chars().count() > max {
            errors.insert(field.to_string(), too_long(max));
        }
    }
}

fn into_result(errors: FieldErrors) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

/// Title is required and non-blank. Lengths are bounded.
pub fn validate_note(input: &NoteInput) -> Result<()> {
    let mut errors = FieldErrors::new();

    match input.title.as_deref() {
        None => {
            errors.insert("title".into(), "This field is required.".into());
        }
        Some(title) if title.trim().is_empty() => {
            errors.insert("title".into(), "This field may not be blank.".into());
        }
        Some(title) => check_max_len(&mut errors, "title", Some(title), MAX_NOTE_TITLE_LENGTH),
    }
    check_max_len(&mut errors, "color", input.color.as_deref(), MAX_NOTE_COLOR_LENGTH);

    into_result(errors)
}

/// Field edits only need to fit. A blank title is accepted here.
pub fn validate_note_edit(title: &str, color: Option<&str>) -> Result<()> {
    let mut errors = FieldErrors::new();
    check_max_len(&mut errors, "title", Some(title), MAX_NOTE_TITLE_LENGTH);
    check_max_len(&mut errors, "color", color, MAX_NOTE_COLOR_LENGTH);
    into_result(errors)
}

pub fn validate_note_color(color: &str) -> Result<()> {
    let mut errors = FieldErrors::new();
    check_max_len(&mut errors, "color", Some(color), MAX_NOTE_COLOR_LENGTH);
    into_result(errors)
}

/// Name is required when creating. Updates may omit any field.
pub fn validate_label(input: &LabelInput, creating: bool) -> Result<()> {
    let mut errors = FieldErrors::new();

    match input.name.as_deref() {
        None if creating => {
            errors.insert("name".into(), "This field is required.".into());
        }
        Some(name) if name.trim().is_empty() => {
            errors.insert("name".into(), "This field may not be blank.".into());
        }
        name => check_max_len(&mut errors, "name", name, MAX_LABEL_NAME_LENGTH),
    }
    check_max_len(&mut errors, "color", input.color.as_deref(), MAX_LABEL_COLOR_LENGTH);

    into_result(errors)
}
