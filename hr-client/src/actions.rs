//! Store-backed operations
//!
//! Every action follows the same shape: lock the store and take a ticket,
//! unlock, await the server, lock again and apply the response with the
//! ticket. A response whose ticket went stale in the meantime is dropped.

use std::future::Future;

use hr_common::api::requests::{
    OrgCreate, PersonalityCreate, PersonalityUpdate, ProfileUpdate, ReviewCreate, ReviewUpdate,
};
use hr_common::api::types::{MemberRole, OrgOut, PersonalityOut, ProfileOut, ReviewOut, TokenResponse};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};
use crate::http::ApiClient;
use crate::store::detail::{personality_key, profile_key};
use crate::store::lists::{MemberParams, PersonalityParams};
use crate::store::orgs::{OrgEntry, OrgParams};
use crate::store::reviews::ReviewParams;
use crate::store::{MutationKey, SharedStore, StoreEvent};

/// Addresses one personality both by id (cache) and by slugs (API)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonalityRef {
    pub id: Uuid,
    pub org_slug: String,
    pub slug: String,
}

impl PersonalityRef {
    pub fn new(org_slug: &str, personality: &PersonalityOut) -> Self {
        Self {
            id: personality.id,
            org_slug: org_slug.to_string(),
            slug: personality.slug.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Actions {
    api: ApiClient,
    store: SharedStore,
}

impl Actions {
    pub fn new(api: ApiClient, store: SharedStore) -> Self {
        Self { api, store }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Announce a lost session so views can prompt for login
    fn observe<T>(&self, result: &ClientResult<T>) {
        if matches!(result, Err(ClientError::SessionExpired)) {
            self.store.notify(StoreEvent::Session);
        }
    }

    async fn mutate<T, Fut>(&self, key: MutationKey, call: Fut) -> ClientResult<T>
    where
        Fut: Future<Output = ClientResult<T>>,
    {
        let fresh = self
            .store
            .update(StoreEvent::Mutation(key.clone()), |s| s.mutations.begin(key.clone()));
        if !fresh {
            debug!(?key, "Mutation already pending, sending again");
        }

        let result = call.await;
        self.observe(&result);
        self.store
            .update(StoreEvent::Mutation(key.clone()), |s| s.mutations.finish(key, &result));
        result
    }

    // ========================================
    // Session
    // ========================================

    pub async fn login(&self, username: &str, password: &str) -> ClientResult<TokenResponse> {
        let result = self.api.login(username, password).await;
        if result.is_ok() {
            // Membership flags in the org list belong to the previous user
            self.store.update(StoreEvent::Session, |s| s.orgs.list.reset());
        }
        result
    }

    pub async fn logout(&self) -> ClientResult<()> {
        let result = self.api.logout().await;
        self.store.update(StoreEvent::Session, |s| s.orgs.list.reset());
        result
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> ClientResult<ProfileOut> {
        let result = self
            .mutate(MutationKey::Profile, self.api.update_me(update))
            .await;
        if let Ok(profile) = &result {
            self.store.update(StoreEvent::Detail, |s| {
                s.details
                    .profiles
                    .put(profile_key(&profile.username), profile.clone())
            });
        }
        result
    }

    // ========================================
    // Reviews
    // ========================================

    /// Load the first page of reviews with `params`
    ///
    /// Changed params clear the list before the request goes out. Returns
    /// without a request when the same load is already running.
    pub async fn load_reviews(&self, target: &PersonalityRef, params: ReviewParams) -> ClientResult<()> {
        hr_common::validation::rating_range(params.rating_min, params.rating_max)?;
        let Some(ticket) = self.store.update(StoreEvent::Reviews(target.id), |s| {
            s.reviews.begin_fetch(target.id, params)
        }) else {
            debug!(personality_id = %target.id, "Review load already running");
            return Ok(());
        };
        self.finish_review_fetch(target, ticket).await
    }

    /// Append the next page; no-op while loading or when exhausted
    pub async fn load_more_reviews(&self, target: &PersonalityRef) -> ClientResult<()> {
        let Some(ticket) = self.store.update(StoreEvent::Reviews(target.id), |s| {
            s.reviews.begin_load_more(target.id)
        }) else {
            return Ok(());
        };
        self.finish_review_fetch(target, ticket).await
    }

    /// Drop the cached list and load page one again
    pub async fn reload_reviews(&self, target: &PersonalityRef) -> ClientResult<()> {
        let params = self.store.update(StoreEvent::Reviews(target.id), |s| {
            s.reviews.reset_scope(target.id);
            s.reviews.scope(&target.id).map(|scope| scope.params).unwrap_or_default()
        });
        self.load_reviews(target, params).await
    }

    async fn finish_review_fetch(
        &self,
        target: &PersonalityRef,
        ticket: crate::store::reviews::FetchTicket,
    ) -> ClientResult<()> {
        let result = self
            .api
            .list_reviews(&target.org_slug, &target.slug, &ticket.query(None))
            .await;
        self.observe(&result);

        self.store.update(StoreEvent::Reviews(target.id), |s| match result {
            Ok(page) => {
                if !s.reviews.apply_page(&ticket, page) {
                    debug!(personality_id = %target.id, "Discarding stale review page");
                }
                Ok(())
            }
            Err(err) => {
                s.reviews.fail_page(&ticket, err.clone());
                Err(err)
            }
        })
    }

    pub async fn create_review(&self, target: &PersonalityRef, request: &ReviewCreate) -> ClientResult<ReviewOut> {
        let result = self
            .mutate(
                MutationKey::CreateReview(target.id),
                self.api.create_review(&target.org_slug, &target.slug, request),
            )
            .await;
        if let Ok(review) = &result {
            self.store.update(StoreEvent::Reviews(target.id), |s| {
                s.record_review_created(review)
            });
            info!(review_id = %review.id, "Review created");
        }
        result
    }

    pub async fn update_review(&self, review_id: Uuid, update: &ReviewUpdate) -> ClientResult<ReviewOut> {
        let result = self
            .mutate(
                MutationKey::Review(review_id),
                self.api.update_review(review_id, update),
            )
            .await;
        if let Ok(review) = &result {
            self.store
                .update(StoreEvent::Reviews(review.personality.id), |s| {
                    s.record_review_updated(review)
                });
        }
        result
    }

    pub async fn delete_review(&self, personality_id: Uuid, review_id: Uuid) -> ClientResult<()> {
        let result = self
            .mutate(MutationKey::Review(review_id), self.api.delete_review(review_id))
            .await;
        if result.is_ok() {
            self.store.update(StoreEvent::Reviews(personality_id), |s| {
                s.record_review_deleted(review_id, personality_id)
            });
        }
        result
    }

    // ========================================
    // Organizations
    // ========================================

    /// Load page one of the org list, with membership flags when logged in
    pub async fn load_orgs(&self, params: OrgParams) -> ClientResult<()> {
        let Some(ticket) = self.store.update(StoreEvent::Orgs, |s| {
            s.orgs.set_params(params);
            s.orgs.list.begin_first()
        }) else {
            return Ok(());
        };
        self.finish_org_fetch(ticket).await
    }

    pub async fn load_more_orgs(&self) -> ClientResult<()> {
        let Some(ticket) = self.store.update(StoreEvent::Orgs, |s| s.orgs.list.begin_next()) else {
            return Ok(());
        };
        self.finish_org_fetch(ticket).await
    }

    async fn finish_org_fetch(&self, ticket: crate::store::paged::PageTicket) -> ClientResult<()> {
        let (query, logged_in) = self.store.read(|s| {
            let list = &s.orgs.list;
            (list.params().to_query(ticket.page, list.page_size()), self.api.session().is_logged_in())
        });

        if logged_in {
            let result = self.api.list_orgs_with_membership(&query).await;
            self.observe(&result);
            self.store.update(StoreEvent::Orgs, |s| match result {
                Ok(orgs) => {
                    s.orgs.apply_page(ticket, orgs);
                    Ok(())
                }
                Err(err) => {
                    s.orgs.fail_page(ticket, err.clone());
                    Err(err)
                }
            })
        } else {
            let result = self.api.list_orgs(&query).await;
            self.store.update(StoreEvent::Orgs, |s| match result {
                Ok(orgs) => {
                    s.orgs.apply_public_page(ticket, orgs);
                    Ok(())
                }
                Err(err) => {
                    s.orgs.fail_page(ticket, err.clone());
                    Err(err)
                }
            })
        }
    }

    /// Join with an optimistic update, rolled back if the server refuses
    pub async fn join_org(&self, slug: &str) -> ClientResult<()> {
        let optimistic = self.store.update(StoreEvent::Orgs, |s| s.orgs.begin_join(slug));

        let result = self.api.join_org(slug).await.map(|_| ());
        self.observe(&result);

        self.store.update(StoreEvent::Orgs, |s| match &result {
            Ok(()) if optimistic => {
                s.orgs.commit_join(slug);
            }
            Err(err) if optimistic => {
                s.orgs.rollback_join(slug, err.clone());
            }
            _ => {}
        });
        if result.is_ok() {
            info!(slug = %slug, "Joined organization");
        }
        result
    }

    pub async fn load_org(&self, slug: &str) -> ClientResult<()> {
        if !self
            .store
            .update(StoreEvent::Detail, |s| s.details.orgs.begin(slug.to_string()))
        {
            return Ok(());
        }
        let result = self.api.org(slug).await;
        self.store.update(StoreEvent::Detail, |s| {
            if let Ok(org) = &result {
                s.orgs.upsert(org.clone());
            }
            s.details.orgs.finish(slug.to_string(), result.clone());
        });
        result.map(|_| ())
    }

    pub async fn create_org(&self, request: &OrgCreate) -> ClientResult<OrgOut> {
        let result = self
            .mutate(MutationKey::CreateOrg, self.api.create_org(request))
            .await;
        if let Ok(org) = &result {
            self.store.update(StoreEvent::Orgs, |s| {
                s.orgs.upsert_with_membership(OrgEntry {
                    org: org.clone(),
                    is_member: true,
                    role: Some(MemberRole::Creator),
                });
                s.details.orgs.put(org.slug.clone(), org.clone());
            });
        }
        result
    }

    pub async fn delete_org(&self, slug: &str) -> ClientResult<()> {
        let result = self
            .mutate(MutationKey::Org(slug.to_string()), self.api.delete_org(slug))
            .await;
        if result.is_ok() {
            self.store.update(StoreEvent::Orgs, |s| {
                s.orgs.remove(slug);
                s.details.orgs.remove(&slug.to_string());
            });
        }
        result
    }

    // ========================================
    // Members
    // ========================================

    pub async fn load_members(&self, org_slug: &str, params: MemberParams) -> ClientResult<()> {
        let event = StoreEvent::Members(org_slug.to_string());
        let Some(ticket) = self.store.update(event, |s| {
            let list = s.members.list_mut(org_slug);
            list.set_params(params.normalized());
            list.begin_first()
        }) else {
            return Ok(());
        };
        self.finish_member_fetch(org_slug, ticket).await
    }

    pub async fn load_more_members(&self, org_slug: &str) -> ClientResult<()> {
        let event = StoreEvent::Members(org_slug.to_string());
        let Some(ticket) = self
            .store
            .update(event, |s| s.members.list_mut(org_slug).begin_next())
        else {
            return Ok(());
        };
        self.finish_member_fetch(org_slug, ticket).await
    }

    async fn finish_member_fetch(
        &self,
        org_slug: &str,
        ticket: crate::store::paged::PageTicket,
    ) -> ClientResult<()> {
        let query = self.store.read(|s| {
            s.members
                .list(org_slug)
                .map(|list| list.params().to_query(ticket.page, list.page_size()))
        });
        let Some(query) = query else {
            return Ok(());
        };

        let result = self.api.list_members(org_slug, &query).await;
        self.observe(&result);
        self.store
            .update(StoreEvent::Members(org_slug.to_string()), |s| match result {
                Ok(members) => {
                    s.members.apply_page(org_slug, ticket, members);
                    Ok(())
                }
                Err(err) => {
                    s.members.fail_page(org_slug, ticket, err.clone());
                    Err(err)
                }
            })
    }

    pub async fn promote_member(&self, org_slug: &str, profile_id: Uuid) -> ClientResult<()> {
        let result = self
            .mutate(
                MutationKey::Promote(org_slug.to_string(), profile_id),
                self.api.promote_member(org_slug, profile_id),
            )
            .await;
        if result.is_ok() {
            self.store
                .update(StoreEvent::Members(org_slug.to_string()), |s| {
                    s.members.invalidate(org_slug)
                });
        }
        result.map(|_| ())
    }

    // ========================================
    // Personalities
    // ========================================

    pub async fn load_personalities(&self, org_slug: &str, params: PersonalityParams) -> ClientResult<()> {
        let event = StoreEvent::Personalities(org_slug.to_string());
        let Some(ticket) = self.store.update(event, |s| {
            let list = s.personalities.list_mut(org_slug);
            list.set_params(params.normalized());
            list.begin_first()
        }) else {
            return Ok(());
        };
        self.finish_personality_fetch(org_slug, ticket).await
    }

    pub async fn load_more_personalities(&self, org_slug: &str) -> ClientResult<()> {
        let event = StoreEvent::Personalities(org_slug.to_string());
        let Some(ticket) = self
            .store
            .update(event, |s| s.personalities.list_mut(org_slug).begin_next())
        else {
            return Ok(());
        };
        self.finish_personality_fetch(org_slug, ticket).await
    }

    async fn finish_personality_fetch(
        &self,
        org_slug: &str,
        ticket: crate::store::paged::PageTicket,
    ) -> ClientResult<()> {
        let query = self.store.read(|s| {
            s.personalities
                .list(org_slug)
                .map(|list| list.params().to_query(ticket.page, list.page_size()))
        });
        let Some(query) = query else {
            return Ok(());
        };

        let result = self.api.list_personalities(org_slug, &query).await;
        self.store
            .update(StoreEvent::Personalities(org_slug.to_string()), |s| match result {
                Ok(items) => {
                    s.personalities.apply_page(org_slug, ticket, items);
                    Ok(())
                }
                Err(err) => {
                    s.personalities.fail_page(org_slug, ticket, err.clone());
                    Err(err)
                }
            })
    }

    pub async fn load_personality(&self, org_slug: &str, slug: &str) -> ClientResult<()> {
        let key = personality_key(org_slug, slug);
        if !self
            .store
            .update(StoreEvent::Detail, |s| s.details.personalities.begin(key.clone()))
        {
            return Ok(());
        }
        let result = self.api.personality(org_slug, slug).await;
        self.store.update(StoreEvent::Detail, |s| {
            if let Ok(p) = &result {
                s.personalities.upsert(p.clone());
            }
            s.details.personalities.finish(key, result.clone());
        });
        result.map(|_| ())
    }

    pub async fn create_personality(
        &self,
        org_slug: &str,
        request: &PersonalityCreate,
    ) -> ClientResult<PersonalityOut> {
        let result = self
            .mutate(
                MutationKey::CreatePersonality(org_slug.to_string()),
                self.api.create_personality(org_slug, request),
            )
            .await;
        if let Ok(p) = &result {
            self.store
                .update(StoreEvent::Personalities(org_slug.to_string()), |s| {
                    s.personalities.upsert(p.clone());
                    s.personalities.list_mut(org_slug).reset();
                    s.details
                        .personalities
                        .put(personality_key(org_slug, &p.slug), p.clone());
                });
        }
        result
    }

    pub async fn update_personality(
        &self,
        org_slug: &str,
        slug: &str,
        update: &PersonalityUpdate,
    ) -> ClientResult<PersonalityOut> {
        let result = self
            .mutate(
                MutationKey::Personality(personality_key(org_slug, slug)),
                self.api.update_personality(org_slug, slug, update),
            )
            .await;
        if let Ok(p) = &result {
            self.store
                .update(StoreEvent::Personalities(org_slug.to_string()), |s| {
                    s.personalities.upsert(p.clone());
                    // A rename may change the slug
                    s.details.personalities.remove(&personality_key(org_slug, slug));
                    s.details
                        .personalities
                        .put(personality_key(org_slug, &p.slug), p.clone());
                });
        }
        result
    }

    pub async fn delete_personality(&self, org_slug: &str, slug: &str) -> ClientResult<()> {
        let key = personality_key(org_slug, slug);
        let result = self
            .mutate(
                MutationKey::Personality(key.clone()),
                self.api.delete_personality(org_slug, slug),
            )
            .await;
        if result.is_ok() {
            self.store
                .update(StoreEvent::Personalities(org_slug.to_string()), |s| {
                    let id = s.details.personalities.get(&key).and_then(|d| d.value()).map(|p| p.id);
                    if let Some(id) = id {
                        s.personalities.remove(&id);
                        s.reviews.reset_scope(id);
                    }
                    s.personalities.list_mut(org_slug).reset();
                    s.details.personalities.remove(&key);
                });
        }
        result
    }

    // ========================================
    // Profiles
    // ========================================

    pub async fn load_profile(&self, username: &str) -> ClientResult<()> {
        let key = profile_key(username);
        if !self
            .store
            .update(StoreEvent::Detail, |s| s.details.profiles.begin(key.clone()))
        {
            return Ok(());
        }
        let result = self.api.profile(username).await;
        self.store
            .update(StoreEvent::Detail, |s| s.details.profiles.finish(key, result.clone()));
        result.map(|_| ())
    }
}
