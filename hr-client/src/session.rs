//! Auth session manager
//!
//! Holds the access/refresh token pair in a [`TokenStorage`] and performs
//! single-flight refresh: concurrent callers that hit a 401 share one
//! refresh round trip. The server rotates refresh tokens, so a second
//! refresh with the old token would be rejected and log the user out.

use std::future::Future;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hr_common::api::types::TokenResponse;
use hr_common::time::now_millis;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ClientError, ClientResult};
use crate::storage::{TokenStorage, ACCESS_EXPIRES_AT_KEY, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};

/// Tokens as persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix milliseconds
    pub access_expires_at: Option<i64>,
}

impl TokenSet {
    /// Expired, or within `skew_ms` of expiring, at `now_ms`
    pub fn is_expired_at(&self, now_ms: i64, skew_ms: i64) -> bool {
        self.access_expires_at
            .is_some_and(|expires_at| now_ms + skew_ms >= expires_at)
    }
}

/// Access token claims, decoded without signature validation
///
/// For display only; the server is the authority on validity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub exp: Option<i64>,
}

/// Decode the payload segment of a JWT
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Refresh this long before the stored expiry
const EXPIRY_SKEW_MS: i64 = 5_000;

pub struct SessionManager {
    storage: Arc<dyn TokenStorage>,
    refresh_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        Self {
            storage,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Current tokens, if logged in
    pub fn tokens(&self) -> ClientResult<Option<TokenSet>> {
        let Some(access_token) = self.storage.get(ACCESS_TOKEN_KEY)? else {
            return Ok(None);
        };
        let access_expires_at = self
            .storage
            .get(ACCESS_EXPIRES_AT_KEY)?
            .and_then(|v| v.parse::<i64>().ok());
        Ok(Some(TokenSet {
            access_token,
            refresh_token: self.storage.get(REFRESH_TOKEN_KEY)?,
            access_expires_at,
        }))
    }

    pub fn access_token(&self) -> ClientResult<Option<String>> {
        self.storage.get(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> ClientResult<Option<String>> {
        self.storage.get(REFRESH_TOKEN_KEY)
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self.access_token(), Ok(Some(_)))
    }

    /// Claims of the stored access token
    pub fn claims(&self) -> Option<TokenClaims> {
        self.access_token().ok().flatten().as_deref().and_then(decode_claims)
    }

    /// Persist a login or refresh response
    pub fn store(&self, tokens: &TokenResponse) -> ClientResult<()> {
        let expires_at = now_millis() + tokens.expires_in.max(0) * 1000;
        self.storage.set(ACCESS_TOKEN_KEY, &tokens.access_token)?;
        self.storage.set(REFRESH_TOKEN_KEY, &tokens.refresh_token)?;
        self.storage
            .set(ACCESS_EXPIRES_AT_KEY, &expires_at.to_string())?;
        debug!("Stored session tokens, access expires at {}", expires_at);
        Ok(())
    }

    /// Forget every stored token
    pub fn clear(&self) -> ClientResult<()> {
        self.storage.remove(ACCESS_TOKEN_KEY)?;
        self.storage.remove(REFRESH_TOKEN_KEY)?;
        self.storage.remove(ACCESS_EXPIRES_AT_KEY)
    }

    /// Access token to send, refreshing first when the stored expiry passed
    pub async fn usable_access_token<F, Fut>(&self, refresh: F) -> ClientResult<Option<String>>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = ClientResult<TokenResponse>>,
    {
        match self.tokens()? {
            None => Ok(None),
            Some(tokens) if tokens.is_expired_at(now_millis(), EXPIRY_SKEW_MS) => {
                debug!("Access token past stored expiry, refreshing before request");
                self.refresh_after(Some(&tokens.access_token), refresh)
                    .await
                    .map(Some)
            }
            Some(tokens) => Ok(Some(tokens.access_token)),
        }
    }

    /// Refresh the session once on behalf of every caller that saw `stale`
    ///
    /// Whoever takes the lock first performs the refresh. Callers that were
    /// waiting find the access token already rotated and reuse it. A server
    /// rejection purges the tokens and yields [`ClientError::SessionExpired`];
    /// transport failures are returned as-is and the tokens are kept.
    pub async fn refresh_after<F, Fut>(&self, stale: Option<&str>, refresh: F) -> ClientResult<String>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = ClientResult<TokenResponse>>,
    {
        let _guard = self.refresh_lock.lock().await;

        let current = self.access_token()?;
        if let Some(current) = current {
            if stale != Some(current.as_str()) {
                debug!("Access token already rotated by a concurrent refresh");
                return Ok(current);
            }
        }

        let Some(refresh_token) = self.refresh_token()? else {
            self.clear()?;
            return Err(ClientError::SessionExpired);
        };

        match refresh(refresh_token).await {
            Ok(tokens) => {
                self.store(&tokens)?;
                info!("Session refreshed");
                Ok(tokens.access_token)
            }
            Err(err @ (ClientError::Network(_) | ClientError::Storage(_))) => Err(err),
            Err(err) => {
                warn!("Refresh rejected, clearing session: {}", err);
                self.clear()?;
                Err(ClientError::SessionExpired)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(MemoryStorage::new()))
    }

    fn response(access: &str, refresh: &str) -> TokenResponse {
        TokenResponse {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
            expires_in: 900,
            token_type: "bearer".to_string(),
        }
    }

    fn jwt(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn test_decode_claims() {
        let token = jwt(r#"{"sub":"abc","username":"alice","iat":1,"exp":901}"#);
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.sub, "abc");
        assert_eq!(claims.username.as_deref(), Some("alice"));
        assert_eq!(claims.exp, Some(901));

        assert!(decode_claims("garbage").is_none());
        assert!(decode_claims("a.!!!.c").is_none());
    }

    #[test]
    fn test_store_and_clear() {
        let session = manager();
        session.store(&response("a1", "r1")).unwrap();

        let tokens = session.tokens().unwrap().unwrap();
        assert_eq!(tokens.access_token, "a1");
        assert_eq!(tokens.refresh_token.as_deref(), Some("r1"));
        assert!(!tokens.is_expired_at(now_millis(), EXPIRY_SKEW_MS));
        assert!(tokens.is_expired_at(now_millis() + 901_000, 0));

        session.clear().unwrap();
        assert!(session.tokens().unwrap().is_none());
        assert!(!session.is_logged_in());
    }

    #[tokio::test]
    async fn test_concurrent_refresh_is_single_flight() {
        let session = Arc::new(manager());
        session.store(&response("stale", "r1")).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let session = session.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                session
                    .refresh_after(Some("stale"), |refresh_token| async move {
                        assert_eq!(refresh_token, "r1");
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Ok(response("fresh", "r2"))
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "fresh");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.refresh_token().unwrap().as_deref(), Some("r2"));
    }

    #[tokio::test]
    async fn test_rejected_refresh_purges_tokens() {
        let session = manager();
        session.store(&response("stale", "r1")).unwrap();

        let result = session
            .refresh_after(Some("stale"), |_| async {
                Err(ClientError::api(401, "Invalid or revoked refresh token"))
            })
            .await;

        assert_eq!(result, Err(ClientError::SessionExpired));
        assert!(session.tokens().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_network_failure_keeps_tokens() {
        let session = manager();
        session.store(&response("stale", "r1")).unwrap();

        let result = session
            .refresh_after(Some("stale"), |_| async {
                Err(ClientError::Network("connection refused".into()))
            })
            .await;

        assert!(matches!(result, Err(ClientError::Network(_))));
        assert_eq!(session.refresh_token().unwrap().as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_expires_session() {
        let session = manager();

        let result = session
            .refresh_after(None, |_| async { Ok(response("never", "never")) })
            .await;

        assert_eq!(result, Err(ClientError::SessionExpired));
    }
}
