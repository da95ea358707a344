//! Registration, login, logout and recovery

use hr_common::api::requests::{LoginRequest, RecoverRequest, RefreshRequest, RegisterRequest};
use hr_common::api::types::{DetailResponse, RegisterResponse, TokenResponse};
use reqwest::Method;
use tracing::{info, warn};

use crate::error::{ClientError, ClientResult};
use crate::http::{ApiClient, Auth};

impl ApiClient {
    /// POST /auth/register
    ///
    /// The returned recovery codes are shown once; they are not stored.
    pub async fn register(&self, request: &RegisterRequest) -> ClientResult<RegisterResponse> {
        request.validate()?;
        self.request(
            Method::POST,
            &["auth", "register"],
            &[],
            Some(request),
            Auth::None,
        )
        .await
    }

    /// POST /auth/login, storing the issued tokens
    pub async fn login(&self, username: &str, password: &str) -> ClientResult<TokenResponse> {
        let request = LoginRequest {
            username: username.trim().to_string(),
            password: password.to_string(),
        };
        request.validate()?;

        let tokens: TokenResponse = self
            .request(
                Method::POST,
                &["auth", "login"],
                &[],
                Some(&request),
                Auth::None,
            )
            .await?;
        self.session().store(&tokens)?;
        info!(username = %request.username, "Logged in");
        Ok(tokens)
    }

    /// Force a refresh now
    pub async fn refresh(&self) -> ClientResult<TokenResponse> {
        let refresh_token = self
            .session()
            .refresh_token()?
            .ok_or(ClientError::SessionExpired)?;
        let tokens: TokenResponse = self
            .request(
                Method::POST,
                &["auth", "refresh"],
                &[],
                Some(&RefreshRequest { refresh_token }),
                Auth::None,
            )
            .await?;
        self.session().store(&tokens)?;
        Ok(tokens)
    }

    /// POST /auth/logout
    ///
    /// Local tokens are cleared even when the server call fails.
    pub async fn logout(&self) -> ClientResult<()> {
        let result = match self.session().refresh_token()? {
            Some(refresh_token) => {
                self.request_empty(
                    Method::POST,
                    &["auth", "logout"],
                    Some(&RefreshRequest { refresh_token }),
                    Auth::None,
                )
                .await
            }
            None => Ok(()),
        };
        if let Err(e) = &result {
            warn!("Server logout failed, clearing local session anyway: {}", e);
        }
        self.session().clear()?;
        result
    }

    /// POST /auth/recover
    pub async fn recover(&self, request: &RecoverRequest) -> ClientResult<DetailResponse> {
        request.validate()?;
        self.request(
            Method::POST,
            &["auth", "recover"],
            &[],
            Some(request),
            Auth::None,
        )
        .await
    }
}
