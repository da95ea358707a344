//! Client-side normalized cache
//!
//! [`Store`] is a plain struct mutated through `&mut self`. Applications
//! share it as a [`SharedStore`], which wraps it in a mutex and broadcasts a
//! [`StoreEvent`] after every change. The lock is never held across an
//! `.await`; see [`crate::actions`].

pub mod detail;
pub mod lists;
pub mod memo;
pub mod orgs;
pub mod paged;
pub mod reviews;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hr_common::api::types::{ReviewListItem, ReviewOut};
use hr_common::Aggregate;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::error::ClientError;
use detail::{DetailSlice, PersonalityKey};
use lists::{MemberSlice, PersonalitySlice};
use orgs::OrgSlice;
use reviews::ReviewSlice;

/// Identifies one mutation so its error can be shown next to its target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MutationKey {
    CreateReview(Uuid),
    Review(Uuid),
    CreateOrg,
    Org(String),
    CreatePersonality(String),
    Personality(PersonalityKey),
    Promote(String, Uuid),
    Profile,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationState {
    Pending,
    Done,
    Failed(ClientError),
}

#[derive(Debug, Default)]
pub struct MutationLog {
    states: HashMap<MutationKey, MutationState>,
}

impl MutationLog {
    pub fn get(&self, key: &MutationKey) -> Option<&MutationState> {
        self.states.get(key)
    }

    pub fn error(&self, key: &MutationKey) -> Option<&ClientError> {
        match self.states.get(key) {
            Some(MutationState::Failed(err)) => Some(err),
            _ => None,
        }
    }

    pub fn is_pending(&self, key: &MutationKey) -> bool {
        matches!(self.states.get(key), Some(MutationState::Pending))
    }

    /// Mark `key` pending; false when it already is
    pub fn begin(&mut self, key: MutationKey) -> bool {
        if self.is_pending(&key) {
            return false;
        }
        self.states.insert(key, MutationState::Pending);
        true
    }

    pub fn finish<T>(&mut self, key: MutationKey, result: &Result<T, ClientError>) {
        let state = match result {
            Ok(_) => MutationState::Done,
            Err(err) => MutationState::Failed(err.clone()),
        };
        self.states.insert(key, state);
    }

    pub fn dismiss(&mut self, key: &MutationKey) {
        self.states.remove(key);
    }
}

#[derive(Debug, Default)]
pub struct Store {
    pub reviews: ReviewSlice,
    pub orgs: OrgSlice,
    pub personalities: PersonalitySlice,
    pub members: MemberSlice,
    pub details: DetailSlice,
    pub mutations: MutationLog,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache a review the user just created and bump its personality's stats
    pub fn record_review_created(&mut self, review: &ReviewOut) {
        let personality_id = review.personality.id;
        let inserted = self
            .reviews
            .create_local(personality_id, ReviewListItem::from(review));
        if !inserted {
            debug!(review_id = %review.id, "Review already cached, stats unchanged");
            return;
        }
        let fallback = self.personality_aggregate(&personality_id).map(|a| a.with_added(review.rating));
        self.sync_personality_stats(personality_id, fallback);
    }

    pub fn record_review_updated(&mut self, review: &ReviewOut) {
        let personality_id = review.personality.id;
        let old_rating = self.reviews.review(&review.id).map(|r| r.rating);
        self.reviews
            .update_local(personality_id, ReviewListItem::from(review));
        let fallback = match (old_rating, self.personality_aggregate(&personality_id)) {
            (Some(old), Some(agg)) => Some(agg.with_changed(old, review.rating)),
            _ => None,
        };
        self.sync_personality_stats(personality_id, fallback);
    }

    pub fn record_review_deleted(&mut self, review_id: Uuid, personality_id: Uuid) {
        let removed = self.reviews.delete_local(review_id, personality_id);
        let fallback = match (removed, self.personality_aggregate(&personality_id)) {
            (Some(item), Some(agg)) => Some(agg.with_removed(item.rating)),
            _ => None,
        };
        self.sync_personality_stats(personality_id, fallback);
    }

    fn personality_aggregate(&self, id: &Uuid) -> Option<Aggregate> {
        self.personalities
            .get(id)
            .map(|p| Aggregate::new(p.total_reviews, p.average_review))
    }

    /// Copy the review scope's stats onto the cached personality
    ///
    /// `fallback` applies when the review list was never fetched.
    fn sync_personality_stats(&mut self, personality_id: Uuid, fallback: Option<Aggregate>) {
        let Some(stats) = self.reviews.stats(&personality_id).or(fallback) else {
            return;
        };
        self.personalities.set_aggregate(&personality_id, stats);

        let keys: Vec<PersonalityKey> = self
            .details
            .personalities
            .entries()
            .filter(|(_, p)| p.id == personality_id)
            .map(|(key, _)| key.clone())
            .collect();
        for key in keys {
            self.details.personalities.update(&key, |p| {
                p.total_reviews = stats.total_reviews;
                p.average_review = stats.average_review;
            });
        }
    }
}

/// What changed in the store
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Reviews(Uuid),
    Orgs,
    Personalities(String),
    Members(String),
    Detail,
    Mutation(MutationKey),
    Session,
}

/// Store shared between tasks, with change notifications
#[derive(Debug, Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<Store>>,
    event_tx: broadcast::Sender<StoreEvent>,
}

impl Default for SharedStore {
    fn default() -> Self {
        Self::new(Store::default())
    }
}

impl SharedStore {
    pub fn new(store: Store) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            inner: Arc::new(Mutex::new(store)),
            event_tx,
        }
    }

    /// Lock the store; a panic in another holder does not poison it
    fn lock(&self) -> MutexGuard<'_, Store> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read<R>(&self, f: impl FnOnce(&Store) -> R) -> R {
        f(&self.lock())
    }

    /// Mutate the store, then announce `event`
    pub fn update<R>(&self, event: StoreEvent, f: impl FnOnce(&mut Store) -> R) -> R {
        let result = f(&mut self.lock());
        self.notify(event);
        result
    }

    pub fn notify(&self, event: StoreEvent) {
        // No receivers is fine
        let _ = self.event_tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_tx.subscribe()
    }
}
