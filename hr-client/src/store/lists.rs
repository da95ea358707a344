//! Personality and member lists, one scope per organization

use std::collections::HashMap;

use hr_common::api::query::{MemberSort, PersonalitySort, MEMBER_LIMIT_DEFAULT, PAGE_LIMIT_DEFAULT};
use hr_common::api::types::{OrgMemberOut, PersonalityOut};
use hr_common::Aggregate;
use uuid::Uuid;

use crate::error::ClientError;
use crate::store::paged::{PageParams, PageTicket, PagedScope};

pub type PersonalityParams = PageParams<PersonalitySort>;
pub type MemberParams = PageParams<MemberSort>;

#[derive(Debug, Default)]
pub struct PersonalitySlice {
    entities: HashMap<Uuid, PersonalityOut>,
    lists: HashMap<String, PagedScope<Uuid, PersonalityParams>>,
    revision: u64,
}

impl PersonalitySlice {
    pub fn get(&self, id: &Uuid) -> Option<&PersonalityOut> {
        self.entities.get(id)
    }

    pub fn find(&self, org_id: Uuid, slug: &str) -> Option<&PersonalityOut> {
        self.entities
            .values()
            .find(|p| p.org_id == org_id && p.slug == slug)
    }

    pub fn list(&self, org_slug: &str) -> Option<&PagedScope<Uuid, PersonalityParams>> {
        self.lists.get(org_slug)
    }

    /// Scope for `org_slug`, created on first use
    pub fn list_mut(&mut self, org_slug: &str) -> &mut PagedScope<Uuid, PersonalityParams> {
        self.lists
            .entry(org_slug.to_string())
            .or_insert_with(|| PagedScope::new(PAGE_LIMIT_DEFAULT))
    }

    pub fn listed(&self, org_slug: &str) -> Vec<&PersonalityOut> {
        self.lists
            .get(org_slug)
            .map(|list| list.ids().iter().filter_map(|id| self.entities.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn upsert(&mut self, personality: PersonalityOut) {
        self.entities.insert(personality.id, personality);
        self.revision += 1;
    }

    pub fn remove(&mut self, id: &Uuid) {
        self.entities.remove(id);
        for list in self.lists.values_mut() {
            if list.ids().contains(id) {
                list.reset();
            }
        }
        self.revision += 1;
    }

    /// Mirror a locally adjusted review aggregate
    pub fn set_aggregate(&mut self, id: &Uuid, stats: Aggregate) {
        if let Some(p) = self.entities.get_mut(id) {
            p.total_reviews = stats.total_reviews;
            p.average_review = stats.average_review;
            self.revision += 1;
        }
    }

    pub fn apply_page(&mut self, org_slug: &str, ticket: PageTicket, items: Vec<PersonalityOut>) -> bool {
        if self.list_mut(org_slug).generation() != ticket.generation {
            return false;
        }
        let ids = items.iter().map(|p| p.id).collect();
        for p in items {
            self.upsert(p);
        }
        self.list_mut(org_slug).apply(ticket, ids)
    }

    pub fn fail_page(&mut self, org_slug: &str, ticket: PageTicket, err: ClientError) -> bool {
        self.list_mut(org_slug).fail(ticket, err)
    }
}

/// Members are cached per organization since the role is per organization
#[derive(Debug, Default)]
pub struct MemberSlice {
    entities: HashMap<String, HashMap<Uuid, OrgMemberOut>>,
    lists: HashMap<String, PagedScope<Uuid, MemberParams>>,
    revision: u64,
}

impl MemberSlice {
    pub fn list(&self, org_slug: &str) -> Option<&PagedScope<Uuid, MemberParams>> {
        self.lists.get(org_slug)
    }

    pub fn list_mut(&mut self, org_slug: &str) -> &mut PagedScope<Uuid, MemberParams> {
        self.lists
            .entry(org_slug.to_string())
            .or_insert_with(|| PagedScope::new(MEMBER_LIMIT_DEFAULT))
    }

    pub fn listed(&self, org_slug: &str) -> Vec<&OrgMemberOut> {
        match (self.lists.get(org_slug), self.entities.get(org_slug)) {
            (Some(list), Some(members)) => list
                .ids()
                .iter()
                .filter_map(|id| members.get(id))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn apply_page(&mut self, org_slug: &str, ticket: PageTicket, items: Vec<OrgMemberOut>) -> bool {
        if self.list_mut(org_slug).generation() != ticket.generation {
            return false;
        }
        let ids = items.iter().map(|m| m.member_id).collect();
        let members = self.entities.entry(org_slug.to_string()).or_default();
        for m in items {
            members.insert(m.member_id, m);
        }
        self.revision += 1;
        self.list_mut(org_slug).apply(ticket, ids)
    }

    pub fn fail_page(&mut self, org_slug: &str, ticket: PageTicket, err: ClientError) -> bool {
        self.list_mut(org_slug).fail(ticket, err)
    }

    /// Drop an organization's cached members, e.g. after a promotion
    pub fn invalidate(&mut self, org_slug: &str) {
        if let Some(list) = self.lists.get_mut(org_slug) {
            list.reset();
        }
        self.revision += 1;
    }
}
