//! Shared API response types
//!
//! Wire representations returned by `hr-server` and decoded by `hr-client`.
//! Timestamps travel as RFC 3339 strings, ids as hyphenated UUIDs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::stats::Aggregate;

/// Characters of a review body kept in list snippets
pub const SNIPPET_LEN: usize = 200;

// ========================================
// Profiles
// ========================================

/// Full profile, returned for `/profile/me` and public lookups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileOut {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Author information embedded in reviews
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl ProfileSummary {
    /// Name to show in lists: display name when set, username otherwise
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

// ========================================
// Organizations
// ========================================

/// Role of a member inside an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Creator,
    Moderator,
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Creator => "creator",
            MemberRole::Moderator => "moderator",
            MemberRole::Member => "member",
        }
    }

    /// Creators and moderators manage personalities and moderate reviews
    pub fn can_moderate(&self) -> bool {
        matches!(self, MemberRole::Creator | MemberRole::Moderator)
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberRole {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "creator" => Ok(MemberRole::Creator),
            "moderator" => Ok(MemberRole::Moderator),
            "member" => Ok(MemberRole::Member),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown member role: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgOut {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Option<Uuid>,
    pub members_count: i64,
    pub personalities_count: i64,
    pub reviews_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Organization plus the caller's membership
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgWithMembershipOut {
    #[serde(flatten)]
    pub org: OrgOut,
    pub is_member: bool,
    pub member_role: Option<MemberRole>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgMemberOut {
    pub member_id: Uuid,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

// ========================================
// Personalities
// ========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityOut {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_by: Option<Uuid>,
    pub total_reviews: i64,
    pub average_review: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PersonalityOut {
    pub fn aggregate(&self) -> Aggregate {
        Aggregate::new(self.total_reviews, self.average_review)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalitySummary {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub slug: String,
    pub total_reviews: i64,
    pub average_review: f64,
}

// ========================================
// Reviews
// ========================================

/// Full review, returned by create and update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewOut {
    pub id: Uuid,
    pub personality: PersonalitySummary,
    pub author: Option<ProfileSummary>,
    pub title: String,
    pub body: String,
    pub rating: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Review as it appears in a paginated list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewListItem {
    pub id: Uuid,
    pub title: String,
    pub rating: i64,
    pub snippet: String,
    pub author: Option<ProfileSummary>,
    pub created_at: DateTime<Utc>,
}

impl ReviewListItem {
    /// Shorten a review body for list display
    ///
    /// ```
    /// use hr_common::api::types::ReviewListItem;
    ///
    /// assert_eq!(ReviewListItem::snippet_of("short"), "short");
    /// let long = "x".repeat(250);
    /// assert_eq!(ReviewListItem::snippet_of(&long).len(), 203);
    /// ```
    pub fn snippet_of(body: &str) -> String {
        if body.chars().count() > SNIPPET_LEN {
            let cut: String = body.chars().take(SNIPPET_LEN).collect();
            format!("{}...", cut)
        } else {
            body.to_string()
        }
    }
}

impl From<&ReviewOut> for ReviewListItem {
    fn from(review: &ReviewOut) -> Self {
        Self {
            id: review.id,
            title: review.title.clone(),
            rating: review.rating,
            snippet: Self::snippet_of(&review.body),
            author: review.author.clone(),
            created_at: review.created_at,
        }
    }
}

/// Server-side aggregate for one personality
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReviewStats {
    pub personality_id: Uuid,
    pub total_reviews: i64,
    pub average_review: f64,
}

impl ReviewStats {
    pub fn aggregate(&self) -> Aggregate {
        Aggregate::new(self.total_reviews, self.average_review)
    }

    pub fn from_aggregate(personality_id: Uuid, agg: Aggregate) -> Self {
        Self {
            personality_id,
            total_reviews: agg.total_reviews,
            average_review: agg.average_review,
        }
    }
}

/// Cursor-paginated review list envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewPage {
    pub items: Vec<ReviewListItem>,
    pub next_cursor: Option<String>,
    pub stats: ReviewStats,
}

// ========================================
// Authentication
// ========================================

/// Issued on login and on every refresh (the refresh token rotates)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub token_type: String,
}

/// Registration result; `codes` are shown once and never again
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub codes: Vec<String>,
}

// ========================================
// Error and status bodies
// ========================================

/// Plain `{"detail": "..."}` body used for errors and simple acknowledgements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailResponse {
    pub detail: String,
}

impl DetailResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Structured detail returned with 401 when an access token has expired
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiredTokenDetail {
    pub message: String,
    /// Issue time of the rejected token (RFC 3339)
    pub token_iat: Option<String>,
    /// Expiry of the rejected token (RFC 3339)
    pub token_exp: Option<String>,
    pub server_time: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_member_role_wire_format() {
        assert_eq!(serde_json::to_value(MemberRole::Moderator).unwrap(), json!("moderator"));
        assert_eq!("creator".parse::<MemberRole>().unwrap(), MemberRole::Creator);
        assert!("owner".parse::<MemberRole>().is_err());
    }

    #[test]
    fn test_can_moderate() {
        assert!(MemberRole::Creator.can_moderate());
        assert!(MemberRole::Moderator.can_moderate());
        assert!(!MemberRole::Member.can_moderate());
    }

    #[test]
    fn test_org_with_membership_is_flat() {
        let body = json!({
            "id": "00000000-0000-0000-0000-000000000001",
            "slug": "acme",
            "name": "Acme",
            "description": null,
            "created_by": null,
            "members_count": 3,
            "personalities_count": 1,
            "reviews_count": 9,
            "created_at": "2026-01-01T00:00:00.000Z",
            "updated_at": "2026-01-01T00:00:00.000Z",
            "is_member": true,
            "member_role": "member"
        });
        let parsed: OrgWithMembershipOut = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.org.slug, "acme");
        assert_eq!(parsed.member_role, Some(MemberRole::Member));
    }

    #[test]
    fn test_snippet_respects_multibyte_boundaries() {
        let body = "é".repeat(SNIPPET_LEN + 1);
        let snippet = ReviewListItem::snippet_of(&body);
        assert!(snippet.ends_with("..."));
        assert_eq!(snippet.chars().count(), SNIPPET_LEN + 3);
    }

    #[test]
    fn test_profile_summary_label() {
        let mut author = ProfileSummary {
            id: Uuid::nil(),
            username: "alice".into(),
            display_name: None,
            avatar_url: None,
        };
        assert_eq!(author.label(), "alice");
        author.display_name = Some("Alice A.".into());
        assert_eq!(author.label(), "Alice A.");
    }
}
