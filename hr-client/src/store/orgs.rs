//! Organization list cache with optimistic join
//!
//! Joining flips the membership fields immediately and keeps a snapshot of
//! what they were. The server's answer either commits the change or restores
//! the snapshot.

use std::collections::HashMap;

use hr_common::api::query::{OrgSort, PAGE_LIMIT_DEFAULT};
use hr_common::api::types::{MemberRole, OrgOut, OrgWithMembershipOut};

use crate::error::ClientError;
use crate::store::paged::{PageParams, PageTicket, PagedScope};

/// Cached organization plus the current user's membership
#[derive(Debug, Clone, PartialEq)]
pub struct OrgEntry {
    pub org: OrgOut,
    pub is_member: bool,
    pub role: Option<MemberRole>,
}

impl From<OrgWithMembershipOut> for OrgEntry {
    fn from(value: OrgWithMembershipOut) -> Self {
        Self {
            org: value.org,
            is_member: value.is_member,
            role: value.member_role,
        }
    }
}

/// Membership fields as they were before an optimistic join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipSnapshot {
    pub is_member: bool,
    pub role: Option<MemberRole>,
    pub members_count: i64,
}

impl MembershipSnapshot {
    fn of(entry: &OrgEntry) -> Self {
        Self {
            is_member: entry.is_member,
            role: entry.role,
            members_count: entry.org.members_count,
        }
    }

    fn restore(&self, entry: &mut OrgEntry) {
        entry.is_member = self.is_member;
        entry.role = self.role;
        entry.org.members_count = self.members_count;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinState {
    Pending(MembershipSnapshot),
    Committed,
    RolledBack {
        snapshot: MembershipSnapshot,
        error: ClientError,
    },
}

pub type OrgParams = PageParams<OrgSort>;

#[derive(Debug)]
pub struct OrgSlice {
    entities: HashMap<String, OrgEntry>,
    pub list: PagedScope<String, OrgParams>,
    joins: HashMap<String, JoinState>,
    revision: u64,
}

impl Default for OrgSlice {
    fn default() -> Self {
        Self::with_page_size(PAGE_LIMIT_DEFAULT)
    }
}

impl OrgSlice {
    pub fn with_page_size(page_size: u32) -> Self {
        Self {
            entities: HashMap::new(),
            list: PagedScope::new(page_size),
            joins: HashMap::new(),
            revision: 0,
        }
    }

    pub fn get(&self, slug: &str) -> Option<&OrgEntry> {
        self.entities.get(slug)
    }

    /// Listed organizations, in list order
    pub fn listed(&self) -> Vec<&OrgEntry> {
        self.list
            .ids()
            .iter()
            .filter_map(|slug| self.entities.get(slug))
            .collect()
    }

    pub fn join_state(&self, slug: &str) -> Option<&JoinState> {
        self.joins.get(slug)
    }

    /// Bumped on any entity or join change; list changes show in `list.revision()`
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn join_pending(&self, slug: &str) -> bool {
        matches!(self.joins.get(slug), Some(JoinState::Pending(_)))
    }

    /// Cache an organization fetched without membership info
    ///
    /// Known membership fields are kept. An entry with a join in flight is
    /// left as is; its server copy predates the join.
    pub fn upsert(&mut self, org: OrgOut) {
        if self.join_pending(&org.slug) {
            return;
        }
        match self.entities.get_mut(&org.slug) {
            Some(entry) => entry.org = org,
            None => {
                self.entities.insert(
                    org.slug.clone(),
                    OrgEntry {
                        org,
                        is_member: false,
                        role: None,
                    },
                );
            }
        }
        self.revision += 1;
    }

    pub fn upsert_with_membership(&mut self, entry: OrgEntry) {
        if self.join_pending(&entry.org.slug) {
            return;
        }
        self.entities.insert(entry.org.slug.clone(), entry);
        self.revision += 1;
    }

    pub fn remove(&mut self, slug: &str) {
        self.entities.remove(slug);
        self.joins.remove(slug);
        self.list.reset();
        self.revision += 1;
    }

    /// Switch list params; a change clears the list before the next fetch
    pub fn set_params(&mut self, params: OrgParams) -> bool {
        self.list.set_params(params.normalized())
    }

    pub fn apply_page(&mut self, ticket: PageTicket, orgs: Vec<OrgWithMembershipOut>) -> bool {
        if ticket.generation != self.list.generation() {
            return false;
        }
        let slugs = orgs.iter().map(|o| o.org.slug.clone()).collect();
        for org in orgs {
            self.upsert_with_membership(org.into());
        }
        self.list.apply(ticket, slugs)
    }

    pub fn apply_public_page(&mut self, ticket: PageTicket, orgs: Vec<OrgOut>) -> bool {
        if ticket.generation != self.list.generation() {
            return false;
        }
        let slugs = orgs.iter().map(|o| o.slug.clone()).collect();
        for org in orgs {
            self.upsert(org);
        }
        self.list.apply(ticket, slugs)
    }

    pub fn fail_page(&mut self, ticket: PageTicket, err: ClientError) -> bool {
        self.list.fail(ticket, err)
    }

    /// Optimistically join; false when unknown, already a member, or pending
    pub fn begin_join(&mut self, slug: &str) -> bool {
        if self.join_pending(slug) {
            return false;
        }
        let Some(entry) = self.entities.get_mut(slug) else {
            return false;
        };
        if entry.is_member {
            return false;
        }

        let snapshot = MembershipSnapshot::of(entry);
        entry.is_member = true;
        entry.role = Some(MemberRole::Member);
        entry.org.members_count += 1;
        self.joins.insert(slug.to_string(), JoinState::Pending(snapshot));
        self.revision += 1;
        true
    }

    pub fn commit_join(&mut self, slug: &str) -> bool {
        let Some(state) = self.joins.get_mut(slug) else {
            return false;
        };
        if !matches!(state, JoinState::Pending(_)) {
            return false;
        }
        *state = JoinState::Committed;
        self.revision += 1;
        true
    }

    /// Restore the pre-join fields; all three change together
    pub fn rollback_join(&mut self, slug: &str, error: ClientError) -> bool {
        let Some(JoinState::Pending(snapshot)) = self.joins.get(slug).cloned() else {
            return false;
        };
        if let Some(entry) = self.entities.get_mut(slug) {
            snapshot.restore(entry);
        }
        self.joins
            .insert(slug.to_string(), JoinState::RolledBack { snapshot, error });
        self.revision += 1;
        true
    }
}
