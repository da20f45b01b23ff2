//! Field-level validation shared by every submitted form.
//!
//! Each field resolves to either a cleaned value or a [`FieldError`]. Errors are
//! collected into [`FormErrors`] so a rejected form can be redisplayed with the
//! offending fields annotated and nothing written.

use std::fmt;

use bytes::Bytes;

use super::slug::{SlugError, validate_slug};

pub const GROUP_TITLE_MAX: usize = 200;
pub const USERNAME_MAX: usize = 150;
pub const NAME_MAX: usize = 150;
pub const EMAIL_MAX: usize = 254;
pub const PASSWORD_MIN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    Required,
    MaxLength { max: usize, actual: usize },
    MinLength { min: usize },
    InvalidChoice,
    InvalidSlug(SlugError),
    InvalidImage(String),
    InvalidFormat(&'static str),
    Mismatch,
    Taken,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::Required => f.write_str("This field is required."),
            FieldError::MaxLength { max, actual } => write!(
                f,
                "Ensure this value has at most {max} characters (it has {actual})."
            ),
            FieldError::MinLength { min } => {
                write!(f, "Ensure this value has at least {min} characters.")
            }
            FieldError::InvalidChoice => {
                f.write_str("Select a valid choice. That choice is not one of the available choices.")
            }
            FieldError::InvalidSlug(err) => write!(f, "{err}"),
            FieldError::InvalidImage(reason) => write!(
                f,
                "Upload a valid image. The file you uploaded was either not an image or a corrupted image ({reason})."
            ),
            FieldError::InvalidFormat(hint) => f.write_str(hint),
            FieldError::Mismatch => f.write_str("The two password fields didn't match."),
            FieldError::Taken => f.write_str("A record with that value already exists."),
        }
    }
}

/// Accumulated field errors for one submission, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    entries: Vec<(&'static str, FieldError)>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, error: FieldError) {
        self.entries.push((field, error));
    }

    /// Record the outcome of a field check, returning the cleaned value when it passed.
    pub fn check<T>(&mut self, field: &'static str, result: Result<T, FieldError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.push(field, error);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.entries.iter().any(|(name, _)| *name == field)
    }

    pub fn messages(&self, field: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(name, _)| *name == field)
            .map(|(_, error)| error.to_string())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldError)> {
        self.entries.iter().map(|(name, error)| (*name, error))
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, error) in &self.entries {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            write!(f, "{field}: {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for FormErrors {}

/// Trimmed, non-empty text of any length.
pub fn required_text(raw: &str) -> Result<String, FieldError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(FieldError::Required);
    }
    Ok(value.to_string())
}

/// Trimmed text that may be empty.
pub fn optional_text(raw: &str, max: usize) -> Result<String, FieldError> {
    let value = raw.trim();
    max_length(value, max)?;
    Ok(value.to_string())
}

pub fn max_length(value: &str, max: usize) -> Result<(), FieldError> {
    let actual = value.chars().count();
    if actual > max {
        return Err(FieldError::MaxLength { max, actual });
    }
    Ok(())
}

/// Parse a select-box value referencing a row by id. Blank means "no choice".
pub fn optional_choice(raw: Option<&str>) -> Result<Option<i64>, FieldError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<i64>()
            .map(Some)
            .map_err(|_| FieldError::InvalidChoice),
    }
}

pub fn slug_field(raw: &str) -> Result<Option<String>, FieldError> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }
    validate_slug(value).map_err(FieldError::InvalidSlug)?;
    Ok(Some(value.to_string()))
}

/// Usernames: 150 characters or fewer, letters, digits and `@.+-_` only.
pub fn username_field(raw: &str) -> Result<String, FieldError> {
    let value = required_text(raw)?;
    max_length(&value, USERNAME_MAX)?;
    let valid = value
        .chars()
        .all(|ch| ch.is_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_'));
    if !valid {
        return Err(FieldError::InvalidFormat(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }
    Ok(value)
}

pub fn email_field(raw: &str) -> Result<Option<String>, FieldError> {
    let value = optional_text(raw, EMAIL_MAX)?;
    if value.is_empty() {
        return Ok(None);
    }
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(Some(value)),
        _ => Err(FieldError::InvalidFormat("Enter a valid email address.")),
    }
}

/// Password checks applied at signup. Errors are reported against `password2`.
pub fn password_pair(password1: &str, password2: &str) -> Result<String, FieldError> {
    if password1.is_empty() || password2.is_empty() {
        return Err(FieldError::Required);
    }
    if password1 != password2 {
        return Err(FieldError::Mismatch);
    }
    if password1.chars().count() < PASSWORD_MIN {
        return Err(FieldError::MinLength { min: PASSWORD_MIN });
    }
    if password1.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(FieldError::InvalidFormat("This password is entirely numeric."));
    }
    Ok(password1.to_string())
}

/// An image file submitted through a multipart form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: usize,
    pub height: usize,
}

/// Accept the payload only when its header decodes as a known image format.
pub fn image_field(upload: &ImageUpload) -> Result<ImageDimensions, FieldError> {
    if upload.bytes.is_empty() {
        return Err(FieldError::InvalidImage("the submitted file is empty".to_string()));
    }
    let size = imagesize::blob_size(&upload.bytes)
        .map_err(|err| FieldError::InvalidImage(err.to_string()))?;
    if size.width == 0 || size.height == 0 {
        return Err(FieldError::InvalidImage("zero-sized image".to_string()));
    }
    Ok(ImageDimensions {
        width: size.width,
        height: size.height,
    })
}
