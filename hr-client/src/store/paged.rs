//! Page-numbered list scope
//!
//! Backs the organization, personality and member lists. Page 1 replaces the
//! list, later pages append. `has_more` is approximated as "the last page was
//! full"; an empty page always ends the list.

use hr_common::api::query::{ListQuery, SortField, SortOrder};

use crate::error::ClientError;

/// Search, sort and order of a page-numbered list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageParams<S> {
    pub search: Option<String>,
    pub sort: Option<S>,
    pub order: Option<SortOrder>,
}

impl<S> Default for PageParams<S> {
    fn default() -> Self {
        Self {
            search: None,
            sort: None,
            order: None,
        }
    }
}

impl<S: SortField> PageParams<S> {
    /// Blank searches are the same as no search
    pub fn normalized(mut self) -> Self {
        self.search = self
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self
    }

    pub fn to_query(&self, page: u32, limit: u32) -> ListQuery<S> {
        ListQuery {
            page: Some(page),
            limit: Some(limit),
            search: self.search.clone(),
            sort: self.sort,
            order: self.order,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListStatus {
    Idle,
    Loading,
    Loaded,
    Failed(ClientError),
}

/// Proof that a fetch was started for a given scope generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTicket {
    pub generation: u64,
    pub page: u32,
}

/// Ordered keys of one page-numbered list
#[derive(Debug, Clone)]
pub struct PagedScope<K, P> {
    ids: Vec<K>,
    params: P,
    page: u32,
    page_size: u32,
    has_more: bool,
    status: ListStatus,
    generation: u64,
    revision: u64,
}

impl<K: Clone + PartialEq, P: Clone + PartialEq + Default> PagedScope<K, P> {
    pub fn new(page_size: u32) -> Self {
        Self {
            ids: Vec::new(),
            params: P::default(),
            page: 0,
            page_size: page_size.max(1),
            has_more: false,
            status: ListStatus::Idle,
            generation: 0,
            revision: 0,
        }
    }

    pub fn ids(&self) -> &[K] {
        &self.ids
    }

    pub fn params(&self) -> &P {
        &self.params
    }

    /// Last page applied; 0 before the first one
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn status(&self) -> &ListStatus {
        &self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status == ListStatus::Loading
    }

    pub fn error(&self) -> Option<&ClientError> {
        match &self.status {
            ListStatus::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Bumped on every visible change
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Drop everything loaded; in-flight responses become stale
    pub fn reset(&mut self) {
        self.ids.clear();
        self.page = 0;
        self.has_more = false;
        self.status = ListStatus::Idle;
        self.generation += 1;
        self.revision += 1;
    }

    /// Switch to `params`, resetting when they differ. Returns true on change.
    pub fn set_params(&mut self, params: P) -> bool {
        if self.params == params {
            return false;
        }
        self.params = params;
        self.reset();
        true
    }

    /// Start loading page 1, unless a load is already running
    pub fn begin_first(&mut self) -> Option<PageTicket> {
        self.begin(1)
    }

    /// Start loading the page after the last one, if there is one
    pub fn begin_next(&mut self) -> Option<PageTicket> {
        if !self.has_more || self.page == 0 {
            return None;
        }
        self.begin(self.page + 1)
    }

    fn begin(&mut self, page: u32) -> Option<PageTicket> {
        if self.is_loading() {
            return None;
        }
        self.status = ListStatus::Loading;
        self.revision += 1;
        Some(PageTicket {
            generation: self.generation,
            page,
        })
    }

    /// Apply a fetched page; false when the ticket is stale
    pub fn apply(&mut self, ticket: PageTicket, keys: Vec<K>) -> bool {
        if ticket.generation != self.generation {
            return false;
        }

        let returned = keys.len();
        if ticket.page <= 1 {
            self.ids.clear();
        }
        for key in keys {
            if !self.ids.contains(&key) {
                self.ids.push(key);
            }
        }

        self.page = ticket.page;
        self.has_more = returned > 0 && returned == self.page_size as usize;
        self.status = ListStatus::Loaded;
        self.revision += 1;
        true
    }

    /// Record a failed fetch; false when the ticket is stale
    pub fn fail(&mut self, ticket: PageTicket, err: ClientError) -> bool {
        if ticket.generation != self.generation {
            return false;
        }
        self.status = ListStatus::Failed(err);
        self.revision += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hr_common::api::query::OrgSort;

    type Scope = PagedScope<u32, PageParams<OrgSort>>;

    #[test]
    fn test_full_page_means_more() {
        let mut scope = Scope::new(3);
        let ticket = scope.begin_first().unwrap();
        assert!(scope.apply(ticket, vec![1, 2, 3]));
        assert!(scope.has_more());

        let ticket = scope.begin_next().unwrap();
        assert_eq!(ticket.page, 2);
        assert!(scope.apply(ticket, vec![]));
        assert!(!scope.has_more());
        assert_eq!(scope.ids(), &[1, 2, 3]);
        assert!(scope.begin_next().is_none());
    }

    #[test]
    fn test_short_page_means_done() {
        let mut scope = Scope::new(3);
        let ticket = scope.begin_first().unwrap();
        scope.apply(ticket, vec![1, 2]);
        assert!(!scope.has_more());
    }

    #[test]
    fn test_concurrent_load_is_noop() {
        let mut scope = Scope::new(3);
        assert!(scope.begin_first().is_some());
        assert!(scope.begin_first().is_none());
    }

    #[test]
    fn test_param_change_discards_in_flight_page() {
        let mut scope = Scope::new(3);
        let old = scope.begin_first().unwrap();

        assert!(scope.set_params(PageParams {
            search: Some("acme".into()),
            ..Default::default()
        }));
        assert!(scope.ids().is_empty());

        let new = scope.begin_first().unwrap();
        assert!(!scope.apply(old, vec![9]));
        assert!(scope.apply(new, vec![4]));
        assert_eq!(scope.ids(), &[4]);
    }

    #[test]
    fn test_failure_is_retryable() {
        let mut scope = Scope::new(3);
        let ticket = scope.begin_first().unwrap();
        scope.fail(ticket, ClientError::api(500, "boom"));
        assert_eq!(scope.error().unwrap().status(), Some(500));

        let retry = scope.begin_first().unwrap();
        scope.apply(retry, vec![1]);
        assert!(scope.error().is_none());
    }

    #[test]
    fn test_first_page_replaces_with_dedup() {
        let mut scope = Scope::new(2);
        let t = scope.begin_first().unwrap();
        scope.apply(t, vec![1, 2]);
        let t = scope.begin_next().unwrap();
        scope.apply(t, vec![2, 3]);
        assert_eq!(scope.ids(), &[1, 2, 3]);

        let t = scope.begin_first().unwrap();
        scope.apply(t, vec![1, 2]);
        assert_eq!(scope.ids(), &[1, 2]);
    }

    #[test]
    fn test_blank_search_normalized() {
        let params = PageParams::<OrgSort> {
            search: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(params.normalized().search, None);
    }
}
