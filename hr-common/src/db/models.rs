//! Database row types
//!
//! Rows mirror the SQLite columns (ids and timestamps as TEXT) and convert
//! into the shared API types, validating ids and timestamps on the way.

use crate::api::types::{
    MemberRole, OrgMemberOut, OrgOut, PersonalityOut, PersonalitySummary, ProfileOut,
    ProfileSummary, ReviewListItem,
};
use crate::time::parse_db;
use crate::uuid_utils::parse_column;
use crate::{Error, Result};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct ProfileRow {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub password_hash: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<ProfileRow> for ProfileOut {
    type Error = Error;

    fn try_from(row: ProfileRow) -> Result<Self> {
        Ok(ProfileOut {
            id: parse_column("profiles.id", &row.id)?,
            created_at: parse_db("profiles.created_at", &row.created_at)?,
            updated_at: parse_db("profiles.updated_at", &row.updated_at)?,
            username: row.username,
            display_name: row.display_name,
            bio: row.bio,
            avatar_url: row.avatar_url,
        })
    }
}

impl TryFrom<&ProfileRow> for ProfileSummary {
    type Error = Error;

    fn try_from(row: &ProfileRow) -> Result<Self> {
        Ok(ProfileSummary {
            id: parse_column("profiles.id", &row.id)?,
            username: row.username.clone(),
            display_name: row.display_name.clone(),
            avatar_url: row.avatar_url.clone(),
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct OrgRow {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Option<String>,
    pub members_count: i64,
    pub personalities_count: i64,
    pub reviews_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<OrgRow> for OrgOut {
    type Error = Error;

    fn try_from(row: OrgRow) -> Result<Self> {
        Ok(OrgOut {
            id: parse_column("organizations.id", &row.id)?,
            created_by: row
                .created_by
                .as_deref()
                .map(|v| parse_column("organizations.created_by", v))
                .transpose()?,
            created_at: parse_db("organizations.created_at", &row.created_at)?,
            updated_at: parse_db("organizations.updated_at", &row.updated_at)?,
            slug: row.slug,
            name: row.name,
            description: row.description,
            members_count: row.members_count,
            personalities_count: row.personalities_count,
            reviews_count: row.reviews_count,
        })
    }
}

/// Membership joined with the member's profile
#[derive(Debug, Clone, FromRow)]
pub struct MemberRow {
    pub member_id: String,
    pub role: String,
    pub joined_at: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl TryFrom<MemberRow> for OrgMemberOut {
    type Error = Error;

    fn try_from(row: MemberRow) -> Result<Self> {
        Ok(OrgMemberOut {
            member_id: parse_column("org_memberships.member_id", &row.member_id)?,
            role: row.role.parse::<MemberRole>()?,
            joined_at: parse_db("org_memberships.joined_at", &row.joined_at)?,
            username: row.username,
            display_name: row.display_name,
            avatar_url: row.avatar_url,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PersonalityRow {
    pub id: String,
    pub org_id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_by: Option<String>,
    pub total_reviews: i64,
    pub average_review: f64,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<&PersonalityRow> for PersonalitySummary {
    type Error = Error;

    fn try_from(row: &PersonalityRow) -> Result<Self> {
        Ok(PersonalitySummary {
            id: parse_column("personalities.id", &row.id)?,
            org_id: parse_column("personalities.org_id", &row.org_id)?,
            name: row.name.clone(),
            slug: row.slug.clone(),
            total_reviews: row.total_reviews,
            average_review: row.average_review,
        })
    }
}

impl TryFrom<PersonalityRow> for PersonalityOut {
    type Error = Error;

    fn try_from(row: PersonalityRow) -> Result<Self> {
        Ok(PersonalityOut {
            id: parse_column("personalities.id", &row.id)?,
            org_id: parse_column("personalities.org_id", &row.org_id)?,
            created_by: row
                .created_by
                .as_deref()
                .map(|v| parse_column("personalities.created_by", v))
                .transpose()?,
            created_at: parse_db("personalities.created_at", &row.created_at)?,
            updated_at: parse_db("personalities.updated_at", &row.updated_at)?,
            name: row.name,
            slug: row.slug,
            description: row.description,
            total_reviews: row.total_reviews,
            average_review: row.average_review,
        })
    }
}

/// Review joined with its (optional) author
#[derive(Debug, Clone, FromRow)]
pub struct ReviewRow {
    pub id: String,
    pub personality_id: String,
    pub author_id: Option<String>,
    pub title: String,
    pub body: String,
    pub rating: i64,
    pub created_at: String,
    pub updated_at: String,
    pub author_username: Option<String>,
    pub author_display_name: Option<String>,
    pub author_avatar_url: Option<String>,
}

impl ReviewRow {
    /// Author summary; `None` once the author's profile is deleted
    pub fn author(&self) -> Result<Option<ProfileSummary>> {
        match (&self.author_id, &self.author_username) {
            (Some(id), Some(username)) => Ok(Some(ProfileSummary {
                id: parse_column("reviews.author_id", id)?,
                username: username.clone(),
                display_name: self.author_display_name.clone(),
                avatar_url: self.author_avatar_url.clone(),
            })),
            _ => Ok(None),
        }
    }
}

impl TryFrom<&ReviewRow> for ReviewListItem {
    type Error = Error;

    fn try_from(row: &ReviewRow) -> Result<Self> {
        Ok(ReviewListItem {
            id: parse_column("reviews.id", &row.id)?,
            title: row.title.clone(),
            rating: row.rating,
            snippet: ReviewListItem::snippet_of(&row.body),
            author: row.author()?,
            created_at: parse_db("reviews.created_at", &row.created_at)?,
        })
    }
}
