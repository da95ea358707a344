//! Organizations and memberships

use hr_common::api::query::{ListQuery, MemberSort, OrgSort};
use hr_common::api::requests::{OrgCreate, OrgUpdate};
use hr_common::api::types::{DetailResponse, OrgMemberOut, OrgOut, OrgWithMembershipOut};
use reqwest::Method;
use uuid::Uuid;

use crate::error::ClientResult;
use crate::http::{ApiClient, Auth, NO_BODY};

impl ApiClient {
    /// GET /orgs
    pub async fn list_orgs(&self, query: &ListQuery<OrgSort>) -> ClientResult<Vec<OrgOut>> {
        self.request(
            Method::GET,
            &["orgs"],
            &query.to_pairs(),
            NO_BODY,
            Auth::None,
        )
        .await
    }

    /// GET /orgs/with-membership
    pub async fn list_orgs_with_membership(
        &self,
        query: &ListQuery<OrgSort>,
    ) -> ClientResult<Vec<OrgWithMembershipOut>> {
        self.request(
            Method::GET,
            &["orgs", "with-membership"],
            &query.to_pairs(),
            NO_BODY,
            Auth::Bearer,
        )
        .await
    }

    /// GET /orgs/{slug}
    pub async fn org(&self, slug: &str) -> ClientResult<OrgOut> {
        self.request(Method::GET, &["orgs", slug], &[], NO_BODY, Auth::None)
            .await
    }

    /// POST /orgs
    pub async fn create_org(&self, request: &OrgCreate) -> ClientResult<OrgOut> {
        request.validate()?;
        self.request(Method::POST, &["orgs"], &[], Some(request), Auth::Bearer)
            .await
    }

    /// PATCH /orgs/{slug}
    pub async fn update_org(&self, slug: &str, update: &OrgUpdate) -> ClientResult<OrgOut> {
        update.validate()?;
        self.request(
            Method::PATCH,
            &["orgs", slug],
            &[],
            Some(update),
            Auth::Bearer,
        )
        .await
    }

    /// DELETE /orgs/{slug}
    pub async fn delete_org(&self, slug: &str) -> ClientResult<()> {
        self.request_empty(Method::DELETE, &["orgs", slug], NO_BODY, Auth::Bearer)
            .await
    }

    /// POST /orgs/{slug}/join
    pub async fn join_org(&self, slug: &str) -> ClientResult<DetailResponse> {
        self.request(
            Method::POST,
            &["orgs", slug, "join"],
            &[],
            NO_BODY,
            Auth::Bearer,
        )
        .await
    }

    /// POST /orgs/{slug}/promote/{profile_id}
    pub async fn promote_member(&self, slug: &str, profile_id: Uuid) -> ClientResult<DetailResponse> {
        let profile_id = profile_id.to_string();
        self.request(
            Method::POST,
            &["orgs", slug, "promote", profile_id.as_str()],
            &[],
            NO_BODY,
            Auth::Bearer,
        )
        .await
    }

    /// GET /orgs/{slug}/members
    pub async fn list_members(
        &self,
        slug: &str,
        query: &ListQuery<MemberSort>,
    ) -> ClientResult<Vec<OrgMemberOut>> {
        self.request(
            Method::GET,
            &["orgs", slug, "members"],
            &query.to_pairs(),
            NO_BODY,
            Auth::Bearer,
        )
        .await
    }
}
