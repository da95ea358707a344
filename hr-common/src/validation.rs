//! Field validation rules
//!
//! The client runs these before any network call so that invalid forms are
//! never submitted. The server applies the same rules to request bodies.

use std::fmt;

pub const USERNAME_MAX: usize = 60;
pub const PASSWORD_MIN: usize = 8;
pub const DISPLAY_NAME_MAX: usize = 100;
pub const BIO_MAX: usize = 1000;
pub const AVATAR_URL_MAX: usize = 1024;
pub const NAME_MAX: usize = 200;
pub const SLUG_MAX: usize = 120;
pub const TITLE_MAX: usize = 200;
pub const BODY_MAX: usize = 5000;
pub const RATING_MIN: i64 = 1;
pub const RATING_MAX: i64 = 5;

/// A single field that failed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = std::result::Result<(), ValidationError>;

/// Check a required text field, measured in characters after trimming
pub fn required_text(field: &'static str, value: &str, max: usize) -> ValidationResult {
    let len = value.trim().chars().count();
    if len == 0 {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    if len > max {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max),
        ));
    }
    Ok(())
}

/// Check an optional text field; `None` always passes
pub fn optional_text(field: &'static str, value: Option<&str>, max: usize) -> ValidationResult {
    match value {
        Some(v) if v.chars().count() > max => Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max),
        )),
        _ => Ok(()),
    }
}

pub fn username(value: &str) -> ValidationResult {
    required_text("username", value, USERNAME_MAX)?;
    if value.chars().any(char::is_whitespace) {
        return Err(ValidationError::new("username", "must not contain whitespace"));
    }
    Ok(())
}

pub fn password(value: &str) -> ValidationResult {
    if value.chars().count() < PASSWORD_MIN {
        return Err(ValidationError::new(
            "password",
            format!("must be at least {} characters", PASSWORD_MIN),
        ));
    }
    Ok(())
}

/// Display names are optional, but when present they may not be blank
pub fn display_name(value: Option<&str>) -> ValidationResult {
    match value {
        Some(v) => required_text("display_name", v, DISPLAY_NAME_MAX),
        None => Ok(()),
    }
}

pub fn bio(value: Option<&str>) -> ValidationResult {
    optional_text("bio", value, BIO_MAX)
}

pub fn avatar_url(value: Option<&str>) -> ValidationResult {
    optional_text("avatar_url", value, AVATAR_URL_MAX)
}

/// Organization and personality names
pub fn name(value: &str) -> ValidationResult {
    required_text("name", value, NAME_MAX)
}

pub fn title(value: &str) -> ValidationResult {
    required_text("title", value, TITLE_MAX)
}

pub fn body(value: &str) -> ValidationResult {
    required_text("body", value, BODY_MAX)
}

/// Ratings are whole stars from 1 to 5
pub fn rating(value: i64) -> ValidationResult {
    if !(RATING_MIN..=RATING_MAX).contains(&value) {
        return Err(ValidationError::new(
            "rating",
            format!("must be between {} and {}", RATING_MIN, RATING_MAX),
        ));
    }
    Ok(())
}

/// Optional rating bounds used by review list filters
pub fn rating_range(min: Option<i64>, max: Option<i64>) -> ValidationResult {
    if let Some(v) = min {
        rating(v).map_err(|e| ValidationError::new("rating_min", e.message))?;
    }
    if let Some(v) = max {
        rating(v).map_err(|e| ValidationError::new("rating_max", e.message))?;
    }
    if let (Some(lo), Some(hi)) = (min, max) {
        if lo > hi {
            return Err(ValidationError::new(
                "rating_min",
                "must not be greater than rating_max",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        assert!(rating(0).is_err());
        assert!(rating(6).is_err());
        for r in 1..=5 {
            assert!(rating(r).is_ok());
        }
    }

    #[test]
    fn test_rating_error_names_field() {
        let err = rating(6).unwrap_err();
        assert_eq!(err.field, "rating");
        assert_eq!(err.to_string(), "rating: must be between 1 and 5");
    }

    #[test]
    fn test_required_text_trims_before_measuring() {
        assert!(title("   ").is_err());
        assert!(title(" ok ").is_ok());
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let name_at_limit: String = "é".repeat(NAME_MAX);
        assert!(name(&name_at_limit).is_ok());
        assert!(name(&format!("{}é", name_at_limit)).is_err());
    }

    #[test]
    fn test_password_minimum() {
        assert!(password("short").is_err());
        assert!(password("long enough").is_ok());
    }

    #[test]
    fn test_username_rejects_whitespace() {
        assert!(username("alice").is_ok());
        assert!(username("al ice").is_err());
        assert!(username(&"a".repeat(USERNAME_MAX + 1)).is_err());
    }

    #[test]
    fn test_display_name_blank_rejected_when_present() {
        assert!(display_name(None).is_ok());
        assert!(display_name(Some("  ")).is_err());
    }

    #[test]
    fn test_rating_range_order() {
        assert!(rating_range(Some(2), Some(4)).is_ok());
        assert!(rating_range(Some(4), Some(2)).is_err());
        assert_eq!(rating_range(Some(0), None).unwrap_err().field, "rating_min");
    }
}
