//! HTTP transport for the HonestReviews API
//!
//! [`ApiClient`] owns the reqwest client and the [`SessionManager`]. An
//! authenticated request that comes back 401 triggers one (shared) refresh
//! and is retried exactly once with the new access token.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use hr_common::api::types::TokenResponse;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::session::SessionManager;
use crate::storage::TokenStorage;

const USER_AGENT: &str = concat!("honest/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Body argument for requests without one
pub(crate) const NO_BODY: Option<&'static ()> = None;

/// Whether a request carries the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Auth {
    None,
    Bearer,
}

/// HonestReviews API client
///
/// Cheap to clone; clones share the connection pool and session.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    base_url: Url,
    session: SessionManager,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client for `base_url` (which includes the `/api` prefix)
    pub fn new(base_url: &str, storage: Arc<dyn TokenStorage>) -> ClientResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ClientError::Network(format!("Invalid base URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Network(format!(
                "Invalid base URL {}",
                base_url
            )));
        }

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url,
                session: SessionManager::new(storage),
            }),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub fn session(&self) -> &SessionManager {
        &self.inner.session
    }

    /// Base URL joined with percent-encoded path segments
    pub(crate) fn url(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Network(format!("Invalid base URL {}", self.inner.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and decode a JSON response body
    pub(crate) async fn request<B, T>(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        body: Option<&B>,
        auth: Auth,
    ) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.execute(method, segments, query, body, auth).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Send a request whose success response has no interesting body
    pub(crate) async fn request_empty<B>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
        auth: Auth,
    ) -> ClientResult<()>
    where
        B: Serialize + ?Sized,
    {
        self.execute(method, segments, &[], body, auth).await?;
        Ok(())
    }

    async fn execute<B>(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        body: Option<&B>,
        auth: Auth,
    ) -> ClientResult<reqwest::Response>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(segments)?;
        let body = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        let token = match auth {
            Auth::None => None,
            Auth::Bearer => {
                self.session()
                    .usable_access_token(|refresh| self.refresh_raw(refresh))
                    .await?
            }
        };

        let response = self
            .dispatch(method.clone(), url.clone(), query, body.as_ref(), token.as_deref())
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED || auth == Auth::None {
            return ensure_success(response).await;
        }

        debug!(%url, "Got 401, refreshing session and retrying once");
        let fresh = self
            .session()
            .refresh_after(token.as_deref(), |refresh| self.refresh_raw(refresh))
            .await?;
        let retried = self
            .dispatch(method, url, query, body.as_ref(), Some(&fresh))
            .await?;
        ensure_success(retried).await
    }

    async fn dispatch(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<&Value>,
        token: Option<&str>,
    ) -> ClientResult<reqwest::Response> {
        debug!(%method, %url, "API request");
        let mut request = self.inner.http.request(method, url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }

    /// `POST /auth/refresh` without touching stored tokens
    async fn refresh_raw(&self, refresh_token: String) -> ClientResult<TokenResponse> {
        let body = serde_json::json!({ "refresh_token": refresh_token });
        let response = self
            .dispatch(Method::POST, self.url(&["auth", "refresh"])?, &[], Some(&body), None)
            .await?;
        let response = ensure_success(response).await?;
        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

async fn ensure_success(response: reqwest::Response) -> ClientResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(normalize_error(status, &body))
}

/// Turn an error response into [`ClientError::Api`]
///
/// Accepts `detail`, `message` or `error`, each either a string, an object
/// with a `message`, or a list of such entries. Anything else falls back to
/// the raw body or the status reason.
pub fn normalize_error(status: StatusCode, body: &str) -> ClientError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            ["detail", "message", "error"]
                .iter()
                .find_map(|key| json.get(key).and_then(message_of))
        })
        .or_else(|| {
            let text = body.trim();
            (!text.is_empty() && text.len() <= 200 && !text.starts_with('{')).then(|| text.to_string())
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });

    ClientError::api(status.as_u16(), message)
}

fn message_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Object(map) => map
            .get("message")
            .or_else(|| map.get("msg"))
            .and_then(message_of),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(message_of).collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        _ => None,
    }
}
