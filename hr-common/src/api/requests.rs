//! Shared API request bodies
//!
//! Every body has a `validate` method. The client calls it before sending
//! and the server calls it again on arrival.

use serde::{Deserialize, Serialize};

use crate::validation::{self, ValidationResult};

// ========================================
// Authentication
// ========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl RegisterRequest {
    pub fn validate(&self) -> ValidationResult {
        validation::username(&self.username)?;
        validation::password(&self.password)?;
        validation::display_name(self.display_name.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> ValidationResult {
        validation::required_text("username", &self.username, validation::USERNAME_MAX)?;
        validation::required_text("password", &self.password, usize::MAX)
    }
}

/// Body for `/auth/refresh` and `/auth/logout`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub type LogoutRequest = RefreshRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoverRequest {
    pub recovery_code: String,
    pub new_password: String,
}

impl RecoverRequest {
    pub fn validate(&self) -> ValidationResult {
        validation::required_text("recovery_code", &self.recovery_code, 64)?;
        validation::password(&self.new_password)
            .map_err(|e| validation::ValidationError::new("new_password", e.message))
    }
}

// ========================================
// Profiles
// ========================================

/// Partial profile update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ProfileUpdate {
    pub fn validate(&self) -> ValidationResult {
        validation::display_name(self.display_name.as_deref())?;
        validation::bio(self.bio.as_deref())?;
        validation::avatar_url(self.avatar_url.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.bio.is_none() && self.avatar_url.is_none()
    }

    /// Copy with surrounding whitespace removed from every field
    pub fn trimmed(&self) -> Self {
        let trim = |v: &Option<String>| v.as_ref().map(|s| s.trim().to_string());
        Self {
            display_name: trim(&self.display_name),
            bio: trim(&self.bio),
            avatar_url: trim(&self.avatar_url),
        }
    }
}

// ========================================
// Organizations and personalities
// ========================================

/// Create body shared by organizations and personalities
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamedCreate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NamedCreate {
    pub fn validate(&self) -> ValidationResult {
        validation::name(&self.name)
    }
}

/// Partial update shared by organizations and personalities
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamedUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NamedUpdate {
    pub fn validate(&self) -> ValidationResult {
        match &self.name {
            Some(name) => validation::name(name),
            None => Ok(()),
        }
    }
}

pub type OrgCreate = NamedCreate;
pub type OrgUpdate = NamedUpdate;
pub type PersonalityCreate = NamedCreate;
pub type PersonalityUpdate = NamedUpdate;

// ========================================
// Reviews
// ========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewCreate {
    pub title: String,
    pub body: String,
    pub rating: i64,
}

impl ReviewCreate {
    pub fn validate(&self) -> ValidationResult {
        validation::title(&self.title)?;
        validation::body(&self.body)?;
        validation::rating(self.rating)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<i64>,
}

impl ReviewUpdate {
    pub fn validate(&self) -> ValidationResult {
        if let Some(title) = &self.title {
            validation::title(title)?;
        }
        if let Some(body) = &self.body {
            validation::body(body)?;
        }
        if let Some(rating) = self.rating {
            validation::rating(rating)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_create_rejects_out_of_range_rating() {
        for rating in [0, 6] {
            let req = ReviewCreate {
                title: "t".into(),
                body: "b".into(),
                rating,
            };
            assert_eq!(req.validate().unwrap_err().field, "rating");
        }
    }

    #[test]
    fn test_review_update_only_checks_present_fields() {
        assert!(ReviewUpdate::default().validate().is_ok());
        let bad = ReviewUpdate {
            title: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(bad.validate().unwrap_err().field, "title");
    }

    #[test]
    fn test_profile_update_rejects_unknown_fields() {
        let result: Result<ProfileUpdate, _> =
            serde_json::from_str(r#"{"username": "mallory"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_profile_update_trimmed() {
        let update = ProfileUpdate {
            display_name: Some("  Bob ".into()),
            ..Default::default()
        };
        assert_eq!(update.trimmed().display_name.as_deref(), Some("Bob"));
        assert!(!update.is_empty());
    }

    #[test]
    fn test_register_skips_absent_display_name() {
        let req = RegisterRequest {
            username: "bob".into(),
            password: "password1".into(),
            display_name: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("display_name").is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_recover_reports_new_password_field() {
        let req = RecoverRequest {
            recovery_code: "abc".into(),
            new_password: "short".into(),
        };
        assert_eq!(req.validate().unwrap_err().field, "new_password");
    }
}
