//! Single-entity lookups with a distinct NotFound state

use std::collections::HashMap;
use std::hash::Hash;

use hr_common::api::types::{OrgOut, PersonalityOut, ProfileOut};

use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Detail<T> {
    Loading,
    Loaded(T),
    NotFound,
    Failed(ClientError),
}

impl<T> Detail<T> {
    /// A 404 becomes `NotFound`; any other error stays retryable
    pub fn from_result(result: ClientResult<T>) -> Self {
        match result {
            Ok(value) => Detail::Loaded(value),
            Err(err) if err.is_not_found() => Detail::NotFound,
            Err(err) => Detail::Failed(err),
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Detail::Loaded(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Detail::Loading)
    }
}

/// Keyed detail entries; one load per key at a time
#[derive(Debug, Clone)]
pub struct DetailMap<K, T> {
    entries: HashMap<K, Detail<T>>,
    revision: u64,
}

impl<K, T> Default for DetailMap<K, T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            revision: 0,
        }
    }
}

impl<K: Eq + Hash, T> DetailMap<K, T> {
    pub fn get(&self, key: &K) -> Option<&Detail<T>> {
        self.entries.get(key)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Mark `key` loading; false when a load is already running
    pub fn begin(&mut self, key: K) -> bool {
        if self.entries.get(&key).is_some_and(Detail::is_loading) {
            return false;
        }
        self.entries.insert(key, Detail::Loading);
        self.revision += 1;
        true
    }

    pub fn finish(&mut self, key: K, result: ClientResult<T>) {
        self.entries.insert(key, Detail::from_result(result));
        self.revision += 1;
    }

    pub fn put(&mut self, key: K, value: T) {
        self.entries.insert(key, Detail::Loaded(value));
        self.revision += 1;
    }

    /// Loaded entries only
    pub fn entries(&self) -> impl Iterator<Item = (&K, &T)> {
        self.entries
            .iter()
            .filter_map(|(key, detail)| detail.value().map(|value| (key, value)))
    }

    /// Edit a loaded entry in place
    pub fn update(&mut self, key: &K, f: impl FnOnce(&mut T)) {
        if let Some(Detail::Loaded(value)) = self.entries.get_mut(key) {
            f(value);
            self.revision += 1;
        }
    }

    pub fn remove(&mut self, key: &K) {
        if self.entries.remove(key).is_some() {
            self.revision += 1;
        }
    }
}

/// Personalities are addressed by organization slug plus their own slug
pub type PersonalityKey = (String, String);

#[derive(Debug, Default)]
pub struct DetailSlice {
    pub orgs: DetailMap<String, OrgOut>,
    pub personalities: DetailMap<PersonalityKey, PersonalityOut>,
    pub profiles: DetailMap<String, ProfileOut>,
}

/// Public profiles are looked up case-insensitively
pub fn profile_key(username: &str) -> String {
    username.trim().to_lowercase()
}

pub fn personality_key(org_slug: &str, slug: &str) -> PersonalityKey {
    (org_slug.to_string(), slug.to_string())
}
