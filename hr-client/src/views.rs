//! View models, memoized selectors and plain-text rendering
//!
//! Selectors key their memos on revision counters, so asking twice without
//! an intervening store change returns the same `Arc`.

use std::fmt::Write as _;
use std::sync::Arc;

use hr_common::api::types::{MemberRole, OrgMemberOut, PersonalityOut, ProfileOut, ReviewListItem};
use hr_common::Aggregate;
use uuid::Uuid;

use crate::session::TokenClaims;
use crate::store::memo::{Memo, MemoMap};
use crate::store::orgs::{JoinState, OrgEntry};
use crate::store::paged::ListStatus;
use crate::store::reviews::ScopeStatus;
use crate::store::Store;

/// "4.50" style average
pub fn format_average(average: f64) -> String {
    format!("{:.2}", average)
}

/// Five-character star bar for a 1-5 rating
pub fn stars(rating: i64) -> String {
    let filled = rating.clamp(0, 5) as usize;
    format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsView {
    pub total_reviews: i64,
    pub average: String,
}

impl From<Aggregate> for StatsView {
    fn from(stats: Aggregate) -> Self {
        Self {
            total_reviews: stats.total_reviews,
            average: format_average(stats.average_review),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRow {
    pub id: Uuid,
    pub title: String,
    pub stars: String,
    pub snippet: String,
    pub author: String,
    pub date: String,
}

impl From<&ReviewListItem> for ReviewRow {
    fn from(item: &ReviewListItem) -> Self {
        let author = item
            .author
            .as_ref()
            .map(|a| a.display_name.clone().unwrap_or_else(|| a.username.clone()))
            .unwrap_or_else(|| "[deleted]".to_string());
        Self {
            id: item.id,
            title: item.title.clone(),
            stars: stars(item.rating),
            snippet: item.snippet.clone(),
            author,
            date: item.created_at.format("%Y-%m-%d").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReviewListView {
    pub rows: Vec<ReviewRow>,
    pub stats: Option<StatsView>,
    pub has_next: bool,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrgCard {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub members_count: i64,
    pub personalities_count: i64,
    pub reviews_count: i64,
    pub is_member: bool,
    pub role: Option<MemberRole>,
    pub join_pending: bool,
    pub join_error: Option<String>,
}

impl OrgCard {
    fn new(entry: &OrgEntry, join: Option<&JoinState>) -> Self {
        Self {
            slug: entry.org.slug.clone(),
            name: entry.org.name.clone(),
            description: entry.org.description.clone(),
            members_count: entry.org.members_count,
            personalities_count: entry.org.personalities_count,
            reviews_count: entry.org.reviews_count,
            is_member: entry.is_member,
            role: entry.role,
            join_pending: matches!(join, Some(JoinState::Pending(_))),
            join_error: match join {
                Some(JoinState::RolledBack { error, .. }) => Some(error.user_message()),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrgListView {
    pub cards: Vec<OrgCard>,
    pub has_more: bool,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersonalityCard {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub stats: StatsView,
}

impl From<&PersonalityOut> for PersonalityCard {
    fn from(p: &PersonalityOut) -> Self {
        Self {
            id: p.id,
            slug: p.slug.clone(),
            name: p.name.clone(),
            description: p.description.clone(),
            stats: Aggregate::new(p.total_reviews, p.average_review).into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PersonalityListView {
    pub cards: Vec<PersonalityCard>,
    pub has_more: bool,
    pub loading: bool,
    pub error: Option<String>,
}

fn list_flags(status: &ListStatus) -> (bool, Option<String>) {
    match status {
        ListStatus::Loading => (true, None),
        ListStatus::Failed(err) => (false, Some(err.user_message())),
        _ => (false, None),
    }
}

/// Memoized projections of the store
#[derive(Debug, Default)]
pub struct Selectors {
    reviews: MemoMap<Uuid, (u64, u64), ReviewListView>,
    orgs: Memo<(u64, u64), OrgListView>,
    personalities: MemoMap<String, (u64, u64), PersonalityListView>,
}

impl Selectors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn review_list(&mut self, store: &Store, personality_id: Uuid) -> Arc<ReviewListView> {
        let scope_revision = store
            .reviews
            .scope(&personality_id)
            .map(|scope| scope.revision)
            .unwrap_or(0);
        let key = (scope_revision, store.reviews.entities_revision());

        self.reviews.get_or_compute(personality_id, key, || {
            let Some(scope) = store.reviews.scope(&personality_id) else {
                return ReviewListView::default();
            };
            ReviewListView {
                rows: store
                    .reviews
                    .items(&personality_id)
                    .into_iter()
                    .map(ReviewRow::from)
                    .collect(),
                stats: scope.stats.map(StatsView::from),
                has_next: scope.has_next(),
                loading: scope.is_loading(),
                error: match &scope.status {
                    ScopeStatus::Failed(err) => Some(err.user_message()),
                    _ => None,
                },
            }
        })
    }

    pub fn org_list(&mut self, store: &Store) -> Arc<OrgListView> {
        let key = (store.orgs.list.revision(), store.orgs.revision());
        self.orgs.get_or_compute(key, || {
            let (loading, error) = list_flags(store.orgs.list.status());
            OrgListView {
                cards: store
                    .orgs
                    .listed()
                    .into_iter()
                    .map(|entry| OrgCard::new(entry, store.orgs.join_state(&entry.org.slug)))
                    .collect(),
                has_more: store.orgs.list.has_more(),
                loading,
                error,
            }
        })
    }

    pub fn personality_list(&mut self, store: &Store, org_slug: &str) -> Arc<PersonalityListView> {
        let list_revision = store
            .personalities
            .list(org_slug)
            .map(|list| list.revision())
            .unwrap_or(0);
        let key = (list_revision, store.personalities.revision());

        self.personalities
            .get_or_compute(org_slug.to_string(), key, || {
                let Some(list) = store.personalities.list(org_slug) else {
                    return PersonalityListView::default();
                };
                let (loading, error) = list_flags(list.status());
                PersonalityListView {
                    cards: store
                        .personalities
                        .listed(org_slug)
                        .into_iter()
                        .map(PersonalityCard::from)
                        .collect(),
                    has_more: list.has_more(),
                    loading,
                    error,
                }
            })
    }
}

// ========================================
// Text rendering
// ========================================

pub fn render_org_list(view: &OrgListView) -> String {
    let mut out = String::new();
    if view.cards.is_empty() {
        out.push_str("No organizations found.\n");
    }
    for card in &view.cards {
        let _ = write!(out, "{:<24} {}", card.slug, card.name);
        if let Some(role) = card.role.filter(|_| card.is_member) {
            let _ = write!(out, " [{}]", role);
        }
        let _ = writeln!(
            out,
            "  members: {}  personalities: {}  reviews: {}",
            card.members_count, card.personalities_count, card.reviews_count
        );
        if let Some(err) = &card.join_error {
            let _ = writeln!(out, "  join failed: {}", err);
        }
    }
    push_footer(&mut out, view.has_more, view.error.as_deref());
    out
}

pub fn render_personality_list(view: &PersonalityListView) -> String {
    let mut out = String::new();
    if view.cards.is_empty() {
        out.push_str("No personalities found.\n");
    }
    for card in &view.cards {
        let _ = writeln!(
            out,
            "{:<24} {}  {} ({} reviews)",
            card.slug, card.name, card.stats.average, card.stats.total_reviews
        );
    }
    push_footer(&mut out, view.has_more, view.error.as_deref());
    out
}

pub fn render_review_list(view: &ReviewListView) -> String {
    let mut out = String::new();
    if let Some(stats) = &view.stats {
        let _ = writeln!(
            out,
            "Average {} from {} reviews\n",
            stats.average, stats.total_reviews
        );
    }
    if view.rows.is_empty() {
        out.push_str("No reviews yet.\n");
    }
    for row in &view.rows {
        let _ = writeln!(out, "{} {}  by {} on {}", row.stars, row.title, row.author, row.date);
        let _ = writeln!(out, "    {}", row.snippet);
        let _ = writeln!(out, "    id: {}", row.id);
    }
    push_footer(&mut out, view.has_next, view.error.as_deref());
    out
}

pub fn render_members(members: &[&OrgMemberOut]) -> String {
    let mut out = String::new();
    for m in members {
        let name = m.display_name.as_deref().unwrap_or(&m.username);
        let _ = writeln!(
            out,
            "{:<20} {:<20} {:<10} joined {}  id: {}",
            m.username,
            name,
            m.role.as_str(),
            m.joined_at.format("%Y-%m-%d"),
            m.member_id
        );
    }
    out
}

pub fn render_profile(profile: &ProfileOut) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", profile.username);
    if let Some(name) = &profile.display_name {
        let _ = writeln!(out, "  name:   {}", name);
    }
    if let Some(bio) = &profile.bio {
        let _ = writeln!(out, "  bio:    {}", bio);
    }
    if let Some(url) = &profile.avatar_url {
        let _ = writeln!(out, "  avatar: {}", url);
    }
    let _ = writeln!(out, "  joined: {}", profile.created_at.format("%Y-%m-%d"));
    out
}

/// One line describing the stored access token
pub fn render_session(claims: &TokenClaims) -> String {
    let who = claims.username.as_deref().unwrap_or(&claims.sub);
    match claims.exp.and_then(|exp| chrono::DateTime::<chrono::Utc>::from_timestamp(exp, 0)) {
        Some(exp) => format!(
            "session: {} (access token expires {})\n",
            who,
            exp.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => format!("session: {}\n", who),
    }
}

fn push_footer(out: &mut String, more: bool, error: Option<&str>) {
    if more {
        out.push_str("(more available, use --page or --cursor)\n");
    }
    if let Some(err) = error {
        let _ = writeln!(out, "error: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use chrono::Utc;
    use hr_common::api::types::{OrgOut, OrgWithMembershipOut};

    fn org(slug: &str) -> OrgWithMembershipOut {
        OrgWithMembershipOut {
            org: OrgOut {
                id: Uuid::new_v4(),
                slug: slug.into(),
                name: "Acme".into(),
                description: None,
                created_by: None,
                members_count: 3,
                personalities_count: 1,
                reviews_count: 4,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            is_member: false,
            member_role: None,
        }
    }

    #[test]
    fn test_stars_and_average() {
        assert_eq!(stars(4), "★★★★☆");
        assert_eq!(stars(9), "★★★★★");
        assert_eq!(format_average(4.5), "4.50");
        assert_eq!(format_average(0.0), "0.00");
    }

    #[test]
    fn test_unchanged_store_gives_same_arc() {
        let mut store = Store::new();
        let ticket = store.orgs.list.begin_first().unwrap();
        store.orgs.apply_page(ticket, vec![org("acme")]);

        let mut selectors = Selectors::new();
        let a = selectors.org_list(&store);
        let b = selectors.org_list(&store);
        assert!(Arc::ptr_eq(&a, &b));

        store.orgs.begin_join("acme");
        let c = selectors.org_list(&store);
        assert!(!Arc::ptr_eq(&a, &c));
        assert!(c.cards[0].join_pending);
        assert_eq!(c.cards[0].members_count, 4);
    }

    #[test]
    fn test_rolled_back_join_shows_error() {
        let mut store = Store::new();
        let ticket = store.orgs.list.begin_first().unwrap();
        store.orgs.apply_page(ticket, vec![org("acme")]);
        store.orgs.begin_join("acme");
        store
            .orgs
            .rollback_join("acme", ClientError::api(500, "Internal server error"));

        let view = Selectors::new().org_list(&store);
        let card = &view.cards[0];
        assert!(!card.is_member);
        assert_eq!(card.members_count, 3);
        assert_eq!(card.join_error.as_deref(), Some("Internal server error"));
        assert!(render_org_list(&view).contains("join failed"));
    }

    #[test]
    fn test_review_list_for_unknown_scope_is_empty() {
        let store = Store::new();
        let view = Selectors::new().review_list(&store, Uuid::new_v4());

        assert_eq!(*view, ReviewListView::default());
        assert!(render_review_list(&view).contains("No reviews yet."));
    }

    #[test]
    fn test_render_session_line() {
        let claims = TokenClaims {
            sub: "3f0c".into(),
            username: Some("alice".into()),
            iat: Some(1_700_000_000),
            exp: Some(1_700_000_900),
        };
        assert_eq!(
            render_session(&claims),
            "session: alice (access token expires 2023-11-14 22:28:20 UTC)\n"
        );

        let bare = TokenClaims {
            sub: "3f0c".into(),
            username: None,
            iat: None,
            exp: None,
        };
        assert_eq!(render_session(&bare), "session: 3f0c\n");
    }
}
