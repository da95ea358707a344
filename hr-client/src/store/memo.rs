//! Memoized selectors
//!
//! A memo remembers the key it was computed from and hands back the same
//! `Arc` while the key is unchanged. Keys are built from revision counters,
//! so an untouched scope yields a pointer-identical result.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

#[derive(Debug)]
pub struct Memo<K, V> {
    cached: Option<(K, Arc<V>)>,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self { cached: None }
    }
}

impl<K: PartialEq, V> Memo<K, V> {
    pub fn get_or_compute(&mut self, key: K, compute: impl FnOnce() -> V) -> Arc<V> {
        if let Some((cached_key, value)) = &self.cached {
            if *cached_key == key {
                return Arc::clone(value);
            }
        }
        let value = Arc::new(compute());
        self.cached = Some((key, Arc::clone(&value)));
        value
    }

    pub fn clear(&mut self) {
        self.cached = None;
    }
}

/// One memo per scope, e.g. per personality
#[derive(Debug)]
pub struct MemoMap<S, K, V> {
    memos: HashMap<S, Memo<K, V>>,
}

impl<S, K, V> Default for MemoMap<S, K, V> {
    fn default() -> Self {
        Self {
            memos: HashMap::new(),
        }
    }
}

impl<S: Eq + Hash, K: PartialEq, V> MemoMap<S, K, V> {
    pub fn get_or_compute(&mut self, scope: S, key: K, compute: impl FnOnce() -> V) -> Arc<V> {
        self.memos.entry(scope).or_default().get_or_compute(key, compute)
    }
}
