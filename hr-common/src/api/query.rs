//! List query parameters
//!
//! Page-based lists (organizations, personalities, members) and the
//! cursor-based review list. Sort fields are closed enums so that only
//! allow-listed columns ever reach an `ORDER BY`.

use serde::{Deserialize, Serialize};

pub const PAGE_LIMIT_DEFAULT: u32 = 25;
pub const PAGE_LIMIT_MAX: u32 = 100;
pub const MEMBER_LIMIT_DEFAULT: u32 = 50;
pub const MEMBER_LIMIT_MAX: u32 = 200;
pub const REVIEW_LIMIT_DEFAULT: u32 = 20;
pub const REVIEW_LIMIT_MAX: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

/// Sort field for a page-based list
pub trait SortField: Copy + PartialEq + Default + 'static {
    /// Every allow-listed field
    const ALL: &'static [Self];

    /// Query string value
    fn as_str(&self) -> &'static str;
    /// Column expression used in `ORDER BY`
    fn column(&self) -> &'static str;

    /// Field for a query string value, if allow-listed
    fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|field| field.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgSort {
    #[default]
    CreatedAt,
    MembersCount,
    PersonalitiesCount,
    ReviewsCount,
    Name,
}

impl SortField for OrgSort {
    const ALL: &'static [Self] = &[
        OrgSort::CreatedAt,
        OrgSort::MembersCount,
        OrgSort::PersonalitiesCount,
        OrgSort::ReviewsCount,
        OrgSort::Name,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            OrgSort::CreatedAt => "created_at",
            OrgSort::MembersCount => "members_count",
            OrgSort::PersonalitiesCount => "personalities_count",
            OrgSort::ReviewsCount => "reviews_count",
            OrgSort::Name => "name",
        }
    }

    fn column(&self) -> &'static str {
        match self {
            OrgSort::CreatedAt => "o.created_at",
            OrgSort::MembersCount => "o.members_count",
            OrgSort::PersonalitiesCount => "o.personalities_count",
            OrgSort::ReviewsCount => "o.reviews_count",
            OrgSort::Name => "o.name COLLATE NOCASE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonalitySort {
    #[default]
    CreatedAt,
    AverageReview,
    TotalReviews,
    Name,
}

impl SortField for PersonalitySort {
    const ALL: &'static [Self] = &[
        PersonalitySort::CreatedAt,
        PersonalitySort::AverageReview,
        PersonalitySort::TotalReviews,
        PersonalitySort::Name,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            PersonalitySort::CreatedAt => "created_at",
            PersonalitySort::AverageReview => "average_review",
            PersonalitySort::TotalReviews => "total_reviews",
            PersonalitySort::Name => "name",
        }
    }

    fn column(&self) -> &'static str {
        match self {
            PersonalitySort::CreatedAt => "p.created_at",
            PersonalitySort::AverageReview => "p.average_review",
            PersonalitySort::TotalReviews => "p.total_reviews",
            PersonalitySort::Name => "p.name COLLATE NOCASE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberSort {
    #[default]
    JoinedAt,
    Username,
}

impl SortField for MemberSort {
    const ALL: &'static [Self] = &[MemberSort::JoinedAt, MemberSort::Username];

    fn as_str(&self) -> &'static str {
        match self {
            MemberSort::JoinedAt => "joined_at",
            MemberSort::Username => "username",
        }
    }

    fn column(&self) -> &'static str {
        match self {
            MemberSort::JoinedAt => "m.joined_at",
            MemberSort::Username => "pr.username COLLATE NOCASE",
        }
    }
}

/// Query for page-based lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListQuery<S> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<S>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<SortOrder>,
}

impl<S> Default for ListQuery<S> {
    fn default() -> Self {
        Self {
            page: None,
            limit: None,
            search: None,
            sort: None,
            order: None,
        }
    }
}

impl<S: SortField> ListQuery<S> {
    /// Query string pairs with absent values omitted
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            pairs.push(("search", search.trim().to_string()));
        }
        if let Some(sort) = self.sort {
            pairs.push(("sort", sort.as_str().to_string()));
        }
        if let Some(order) = self.order {
            pairs.push(("order", order.as_str().to_string()));
        }
        pairs
    }
}

/// Sort order of a personality's reviews
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewSort {
    #[default]
    Newest,
    Oldest,
    RatingDesc,
    RatingAsc,
}

impl ReviewSort {
    pub const ALL: &'static [ReviewSort] = &[
        ReviewSort::Newest,
        ReviewSort::Oldest,
        ReviewSort::RatingDesc,
        ReviewSort::RatingAsc,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|sort| sort.as_str() == value)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewSort::Newest => "newest",
            ReviewSort::Oldest => "oldest",
            ReviewSort::RatingDesc => "rating_desc",
            ReviewSort::RatingAsc => "rating_asc",
        }
    }
}

/// Query for a personality's cursor-paginated reviews
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewListQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<ReviewSort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_max: Option<i64>,
}

impl ReviewListQuery {
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(cursor) = &self.cursor {
            pairs.push(("cursor", cursor.clone()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(sort) = self.sort {
            pairs.push(("sort", sort.as_str().to_string()));
        }
        if let Some(min) = self.rating_min {
            pairs.push(("rating_min", min.to_string()));
        }
        if let Some(max) = self.rating_max {
            pairs.push(("rating_max", max.to_string()));
        }
        pairs
    }
}
