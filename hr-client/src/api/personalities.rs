//! Personalities within an organization

use hr_common::api::query::{ListQuery, PersonalitySort};
use hr_common::api::requests::{PersonalityCreate, PersonalityUpdate};
use hr_common::api::types::PersonalityOut;
use reqwest::Method;

use crate::error::ClientResult;
use crate::http::{ApiClient, Auth, NO_BODY};

impl ApiClient {
    /// GET /orgs/{org_slug}/personalities
    pub async fn list_personalities(
        &self,
        org_slug: &str,
        query: &ListQuery<PersonalitySort>,
    ) -> ClientResult<Vec<PersonalityOut>> {
        self.request(
            Method::GET,
            &["orgs", org_slug, "personalities"],
            &query.to_pairs(),
            NO_BODY,
            Auth::None,
        )
        .await
    }

    /// GET /orgs/{org_slug}/personalities/{slug}
    pub async fn personality(&self, org_slug: &str, slug: &str) -> ClientResult<PersonalityOut> {
        self.request(
            Method::GET,
            &["orgs", org_slug, "personalities", slug],
            &[],
            NO_BODY,
            Auth::None,
        )
        .await
    }

    /// POST /orgs/{org_slug}/personalities
    pub async fn create_personality(
        &self,
        org_slug: &str,
        request: &PersonalityCreate,
    ) -> ClientResult<PersonalityOut> {
        request.validate()?;
        self.request(
            Method::POST,
            &["orgs", org_slug, "personalities"],
            &[],
            Some(request),
            Auth::Bearer,
        )
        .await
    }

    /// PATCH /orgs/{org_slug}/personalities/{slug}
    pub async fn update_personality(
        &self,
        org_slug: &str,
        slug: &str,
        update: &PersonalityUpdate,
    ) -> ClientResult<PersonalityOut> {
        update.validate()?;
        self.request(
            Method::PATCH,
            &["orgs", org_slug, "personalities", slug],
            &[],
            Some(update),
            Auth::Bearer,
        )
        .await
    }

    /// DELETE /orgs/{org_slug}/personalities/{slug}
    pub async fn delete_personality(&self, org_slug: &str, slug: &str) -> ClientResult<()> {
        self.request_empty(
            Method::DELETE,
            &["orgs", org_slug, "personalities", slug],
            NO_BODY,
            Auth::Bearer,
        )
        .await
    }
}
