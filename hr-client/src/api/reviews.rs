//! Reviews of a personality

use hr_common::api::query::ReviewListQuery;
use hr_common::api::requests::{ReviewCreate, ReviewUpdate};
use hr_common::api::types::{ReviewOut, ReviewPage};
use hr_common::validation;
use reqwest::Method;
use uuid::Uuid;

use crate::error::ClientResult;
use crate::http::{ApiClient, Auth, NO_BODY};

impl ApiClient {
    /// GET /orgs/{org_slug}/personalities/{slug}/reviews
    pub async fn list_reviews(
        &self,
        org_slug: &str,
        personality_slug: &str,
        query: &ReviewListQuery,
    ) -> ClientResult<ReviewPage> {
        validation::rating_range(query.rating_min, query.rating_max)?;
        self.request(
            Method::GET,
            &["orgs", org_slug, "personalities", personality_slug, "reviews"],
            &query.to_pairs(),
            NO_BODY,
            Auth::None,
        )
        .await
    }

    /// POST /orgs/{org_slug}/personalities/{slug}/reviews
    pub async fn create_review(
        &self,
        org_slug: &str,
        personality_slug: &str,
        request: &ReviewCreate,
    ) -> ClientResult<ReviewOut> {
        request.validate()?;
        self.request(
            Method::POST,
            &["orgs", org_slug, "personalities", personality_slug, "reviews"],
            &[],
            Some(request),
            Auth::Bearer,
        )
        .await
    }

    /// PATCH /reviews/{id}
    pub async fn update_review(&self, review_id: Uuid, update: &ReviewUpdate) -> ClientResult<ReviewOut> {
        update.validate()?;
        let id = review_id.to_string();
        self.request(
            Method::PATCH,
            &["reviews", id.as_str()],
            &[],
            Some(update),
            Auth::Bearer,
        )
        .await
    }

    /// DELETE /reviews/{id}
    pub async fn delete_review(&self, review_id: Uuid) -> ClientResult<()> {
        let id = review_id.to_string();
        self.request_empty(Method::DELETE, &["reviews", id.as_str()], NO_BODY, Auth::Bearer)
            .await
    }
}
