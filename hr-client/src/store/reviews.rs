//! Normalized review cache with cursor pagination
//!
//! Review records live in one id-keyed map shared by every personality.
//! Each personality has a scope holding its ordered ids, next cursor, the
//! server's aggregate and a generation counter. Responses carry a
//! [`FetchTicket`]; a ticket from an older generation is dropped.

use std::collections::HashMap;

use hr_common::api::query::{ReviewListQuery, ReviewSort};
use hr_common::api::types::{ReviewListItem, ReviewPage};
use hr_common::Aggregate;
use uuid::Uuid;

use crate::error::ClientError;

/// Sort and rating filter of one personality's review list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewParams {
    pub sort: ReviewSort,
    pub rating_min: Option<i64>,
    pub rating_max: Option<i64>,
}

impl ReviewParams {
    pub fn to_query(&self, cursor: Option<String>, limit: Option<u32>) -> ReviewListQuery {
        ReviewListQuery {
            cursor,
            limit,
            sort: Some(self.sort),
            rating_min: self.rating_min,
            rating_max: self.rating_max,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScopeStatus {
    Empty,
    Loading,
    Loaded { has_next: bool },
    Failed(ClientError),
}

/// One personality's review list
#[derive(Debug, Clone)]
pub struct ReviewScope {
    pub ids: Vec<Uuid>,
    pub next_cursor: Option<String>,
    /// Server aggregate, adjusted by local mutations; `None` until fetched
    pub stats: Option<Aggregate>,
    pub params: ReviewParams,
    pub status: ScopeStatus,
    pub generation: u64,
    pub revision: u64,
}

impl Default for ReviewScope {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            next_cursor: None,
            stats: None,
            params: ReviewParams::default(),
            status: ScopeStatus::Empty,
            generation: 0,
            revision: 0,
        }
    }
}

impl ReviewScope {
    pub fn is_loading(&self) -> bool {
        self.status == ScopeStatus::Loading
    }

    pub fn has_next(&self) -> bool {
        matches!(self.status, ScopeStatus::Loaded { has_next: true })
    }

    pub fn error(&self) -> Option<&ClientError> {
        match &self.status {
            ScopeStatus::Failed(err) => Some(err),
            _ => None,
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}

/// Issued by `begin_fetch`/`begin_load_more`, redeemed by `apply_page`/`fail_page`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub personality_id: Uuid,
    pub generation: u64,
    pub cursor: Option<String>,
    pub params: ReviewParams,
}

impl FetchTicket {
    pub fn is_append(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn query(&self, limit: Option<u32>) -> ReviewListQuery {
        self.params.to_query(self.cursor.clone(), limit)
    }
}

#[derive(Debug, Default)]
pub struct ReviewSlice {
    entities: HashMap<Uuid, ReviewListItem>,
    scopes: HashMap<Uuid, ReviewScope>,
    entities_revision: u64,
}

impl ReviewSlice {
    pub fn review(&self, id: &Uuid) -> Option<&ReviewListItem> {
        self.entities.get(id)
    }

    pub fn scope(&self, personality_id: &Uuid) -> Option<&ReviewScope> {
        self.scopes.get(personality_id)
    }

    /// Resolved records of a scope, in list order
    pub fn items(&self, personality_id: &Uuid) -> Vec<&ReviewListItem> {
        self.scopes
            .get(personality_id)
            .map(|scope| {
                scope
                    .ids
                    .iter()
                    .filter_map(|id| self.entities.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn stats(&self, personality_id: &Uuid) -> Option<Aggregate> {
        self.scopes.get(personality_id).and_then(|s| s.stats)
    }

    /// Bumped whenever any shared record changes
    pub fn entities_revision(&self) -> u64 {
        self.entities_revision
    }

    fn put_entity(&mut self, item: ReviewListItem) {
        self.entities.insert(item.id, item);
        self.entities_revision += 1;
    }

    /// Start loading the first page with `params`
    ///
    /// Different params reset the scope first, so an in-flight response for
    /// the old params becomes stale. Returns `None` while a load is running.
    pub fn begin_fetch(&mut self, personality_id: Uuid, params: ReviewParams) -> Option<FetchTicket> {
        let scope = self.scopes.entry(personality_id).or_default();
        if scope.params != params {
            reset(scope);
            scope.params = params;
        }
        if scope.is_loading() {
            return None;
        }
        scope.status = ScopeStatus::Loading;
        scope.touch();
        Some(FetchTicket {
            personality_id,
            generation: scope.generation,
            cursor: None,
            params,
        })
    }

    /// Start loading the page after the last one, if there is one
    pub fn begin_load_more(&mut self, personality_id: Uuid) -> Option<FetchTicket> {
        let scope = self.scopes.get_mut(&personality_id)?;
        if !scope.has_next() {
            return None;
        }
        let cursor = scope.next_cursor.clone()?;
        scope.status = ScopeStatus::Loading;
        scope.touch();
        Some(FetchTicket {
            personality_id,
            generation: scope.generation,
            cursor: Some(cursor),
            params: scope.params,
        })
    }

    /// Apply a fetched page; false when the ticket is stale
    ///
    /// A first page replaces the list, a cursor page appends without
    /// duplicates. The aggregate is taken from the server as-is.
    pub fn apply_page(&mut self, ticket: &FetchTicket, page: ReviewPage) -> bool {
        match self.scopes.get(&ticket.personality_id) {
            Some(scope) if scope.generation == ticket.generation => {}
            _ => return false,
        }

        let ids: Vec<Uuid> = page.items.iter().map(|item| item.id).collect();
        for item in page.items {
            self.put_entity(item);
        }

        let Some(scope) = self.scopes.get_mut(&ticket.personality_id) else {
            return false;
        };
        if !ticket.is_append() {
            scope.ids.clear();
        }
        for id in ids {
            if !scope.ids.contains(&id) {
                scope.ids.push(id);
            }
        }
        scope.stats = Some(page.stats.aggregate());
        scope.status = ScopeStatus::Loaded {
            has_next: page.next_cursor.is_some(),
        };
        scope.next_cursor = page.next_cursor;
        scope.touch();
        true
    }

    /// Record a failed fetch; false when the ticket is stale
    pub fn fail_page(&mut self, ticket: &FetchTicket, err: ClientError) -> bool {
        match self.scopes.get_mut(&ticket.personality_id) {
            Some(scope) if scope.generation == ticket.generation => {
                scope.status = ScopeStatus::Failed(err);
                scope.touch();
                true
            }
            _ => false,
        }
    }

    /// Insert a review the user just created at the top of its list
    ///
    /// Returns false (and leaves the aggregate alone) when the review was
    /// already cached for this personality.
    pub fn create_local(&mut self, personality_id: Uuid, item: ReviewListItem) -> bool {
        let id = item.id;
        let rating = item.rating;
        self.put_entity(item);

        let scope = self.scopes.entry(personality_id).or_default();
        if scope.ids.contains(&id) {
            scope.touch();
            return false;
        }
        scope.ids.insert(0, id);
        scope.stats = scope.stats.map(|stats| stats.with_added(rating));
        scope.touch();
        true
    }

    /// Replace a review after an edit, adjusting the average if the rating moved
    pub fn update_local(&mut self, personality_id: Uuid, item: ReviewListItem) {
        let old_rating = self.entities.get(&item.id).map(|old| old.rating);
        let (id, new_rating) = (item.id, item.rating);
        self.put_entity(item);

        if let Some(scope) = self.scopes.get_mut(&personality_id) {
            if let (Some(old), true) = (old_rating, scope.ids.contains(&id)) {
                scope.stats = scope.stats.map(|stats| stats.with_changed(old, new_rating));
            }
            scope.touch();
        }
    }

    /// Remove a deleted review; returns the removed record
    pub fn delete_local(&mut self, review_id: Uuid, personality_id: Uuid) -> Option<ReviewListItem> {
        let removed = self.entities.remove(&review_id);
        if removed.is_some() {
            self.entities_revision += 1;
        }

        if let Some(scope) = self.scopes.get_mut(&personality_id) {
            let before = scope.ids.len();
            scope.ids.retain(|id| *id != review_id);
            if let (Some(item), true) = (&removed, scope.ids.len() < before) {
                scope.stats = scope.stats.map(|stats| stats.with_removed(item.rating));
            }
            scope.touch();
        }
        removed
    }

    /// Clear a personality's list before refetching; shared records stay
    pub fn reset_scope(&mut self, personality_id: Uuid) {
        if let Some(scope) = self.scopes.get_mut(&personality_id) {
            reset(scope);
        }
    }
}

fn reset(scope: &mut ReviewScope) {
    scope.ids.clear();
    scope.next_cursor = None;
    scope.status = ScopeStatus::Empty;
    scope.generation += 1;
    scope.touch();
}
