//! Own and public profiles

use hr_common::api::requests::ProfileUpdate;
use hr_common::api::types::ProfileOut;
use reqwest::Method;

use crate::error::ClientResult;
use crate::http::{ApiClient, Auth, NO_BODY};

impl ApiClient {
    /// GET /profile/me
    pub async fn me(&self) -> ClientResult<ProfileOut> {
        self.request(Method::GET, &["profile", "me"], &[], NO_BODY, Auth::Bearer)
            .await
    }

    /// PATCH /profile/me
    pub async fn update_me(&self, update: &ProfileUpdate) -> ClientResult<ProfileOut> {
        let update = update.trimmed();
        update.validate()?;
        self.request(
            Method::PATCH,
            &["profile", "me"],
            &[],
            Some(&update),
            Auth::Bearer,
        )
        .await
    }

    /// GET /profiles/{username}
    pub async fn profile(&self, username: &str) -> ClientResult<ProfileOut> {
        self.request(
            Method::GET,
            &["profiles", username],
            &[],
            NO_BODY,
            Auth::None,
        )
        .await
    }
}
