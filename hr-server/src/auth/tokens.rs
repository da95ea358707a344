//! Access tokens (HS256 JWT), refresh tokens and recovery codes
//!
//! Refresh tokens and recovery codes are random strings handed to the client
//! once. The database only stores their HMAC-SHA256 under a server pepper,
//! which keeps lookups indexable without keeping anything replayable.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use hr_common::api::types::ExpiredTokenDetail;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{ApiError, ApiResult};

type HmacSha256 = Hmac<Sha256>;

const REFRESH_TOKEN_BYTES: usize = 48;

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Profile id
    pub sub: String,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and checks every credential the API hands out
#[derive(Clone)]
pub struct TokenService {
    config: AuthConfig,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenService {
    pub fn new(config: AuthConfig) -> Self {
        let encoding = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        Self {
            config,
            encoding,
            decoding,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Access token lifetime in seconds
    pub fn access_ttl_secs(&self) -> i64 {
        self.config.access_ttl.as_secs() as i64
    }

    pub fn issue_access_token(&self, profile_id: Uuid, username: &str) -> ApiResult<String> {
        self.issue_access_token_at(profile_id, username, Utc::now().timestamp())
    }

    /// Issue a token as if at `issued_at` (unix seconds)
    pub fn issue_access_token_at(
        &self,
        profile_id: Uuid,
        username: &str,
        issued_at: i64,
    ) -> ApiResult<String> {
        let claims = AccessClaims {
            sub: profile_id.to_string(),
            username: username.to_string(),
            iat: issued_at,
            exp: issued_at + self.access_ttl_secs(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("Token encoding failed: {}", e)))
    }

    /// Verify signature and expiry of an access token
    ///
    /// An expired but otherwise valid token yields [`ApiError::TokenExpired`]
    /// carrying its issue and expiry times.
    pub fn verify_access_token(&self, token: &str) -> ApiResult<AccessClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        match decode::<AccessClaims>(token, &self.decoding, &validation) {
            Ok(data) => Ok(data.claims),
            Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => {
                Err(ApiError::TokenExpired(self.expired_detail(token)))
            }
            Err(_) => Err(ApiError::Unauthorized("Invalid token".to_string())),
        }
    }

    fn expired_detail(&self, token: &str) -> ExpiredTokenDetail {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        let claims = decode::<AccessClaims>(token, &self.decoding, &validation)
            .ok()
            .map(|data| data.claims);

        ExpiredTokenDetail {
            message: "Token has expired".to_string(),
            token_iat: claims.as_ref().and_then(|c| iso_from_unix(c.iat)),
            token_exp: claims.as_ref().and_then(|c| iso_from_unix(c.exp)),
            server_time: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    /// New random refresh token (returned raw to the client exactly once)
    pub fn new_refresh_token(&self) -> String {
        random_token(REFRESH_TOKEN_BYTES)
    }

    /// New batch of raw recovery codes
    pub fn new_recovery_codes(&self) -> Vec<String> {
        (0..self.config.recovery_code_count)
            .map(|_| random_token(self.config.recovery_code_bytes))
            .collect()
    }

    /// Keyed hash of a refresh token or recovery code, as stored
    pub fn hash_secret(&self, raw: &str) -> ApiResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.config.refresh_pepper.as_bytes())
            .map_err(|e| ApiError::Internal(format!("HMAC key rejected: {}", e)))?;
        mac.update(raw.trim().as_bytes());
        Ok(format!("{:x}", mac.finalize().into_bytes()))
    }
}

fn random_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// Storage timestamp `ttl` from now
pub fn expires_after(ttl: std::time::Duration) -> ApiResult<String> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|delta| Utc::now().checked_add_signed(delta))
        .map(|at| hr_common::time::to_db(&at))
        .ok_or_else(|| ApiError::Internal("Token lifetime out of range".to_string()))
}

fn iso_from_unix(secs: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(secs, 0).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(AuthConfig::new("test-jwt-secret", "test-pepper"))
    }

    #[test]
    fn test_access_token_round_trip() {
        let svc = service();
        let id = Uuid::new_v4();
        let token = svc.issue_access_token(id, "alice").unwrap();
        let claims = svc.verify_access_token(&token).unwrap();
        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_expired_token_has_structured_detail() {
        let svc = service();
        let an_hour_ago = Utc::now().timestamp() - 3600;
        let token = svc
            .issue_access_token_at(Uuid::new_v4(), "alice", an_hour_ago)
            .unwrap();

        match svc.verify_access_token(&token) {
            Err(ApiError::TokenExpired(detail)) => {
                assert_eq!(detail.message, "Token has expired");
                assert!(detail.token_iat.is_some());
                assert!(detail.token_exp.is_some());
            }
            other => panic!("expected TokenExpired, got {:?}", other),
        }
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let other = TokenService::new(AuthConfig::new("another-secret", "pepper"));
        let token = other.issue_access_token(Uuid::new_v4(), "mallory").unwrap();
        assert!(matches!(
            service().verify_access_token(&token),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_secret_hash_is_keyed_and_stable() {
        let svc = service();
        let a = svc.hash_secret("token").unwrap();
        assert_eq!(a, svc.hash_secret("token").unwrap());
        assert_eq!(a.len(), 64);

        let other = TokenService::new(AuthConfig::new("test-jwt-secret", "other-pepper"));
        assert_ne!(a, other.hash_secret("token").unwrap());
    }

    #[test]
    fn test_recovery_codes_shape() {
        let codes = service().new_recovery_codes();
        assert_eq!(codes.len(), 10);
        // 9 bytes -> 12 base64 characters
        assert!(codes.iter().all(|c| c.len() == 12));
    }

    #[test]
    fn test_expires_after_is_in_the_future() {
        let at = expires_after(std::time::Duration::from_secs(60)).unwrap();
        assert!(at > hr_common::time::now_db());
    }

    #[test]
    fn test_refresh_tokens_are_unique() {
        let svc = service();
        assert_ne!(svc.new_refresh_token(), svc.new_refresh_token());
    }
}
