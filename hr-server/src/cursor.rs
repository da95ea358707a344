//! Opaque keyset cursor for review lists
//!
//! A cursor is the URL-safe base64 of `rating|created_at|id` taken from the
//! last row of a page. Carrying all three keys makes it valid for every
//! review sort order.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hr_common::db::ReviewRow;
use hr_common::time::parse_db;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewCursor {
    pub rating: i64,
    pub created_at: String,
    pub id: String,
}

impl ReviewCursor {
    pub fn from_row(row: &ReviewRow) -> Self {
        Self {
            rating: row.rating,
            created_at: row.created_at.clone(),
            id: row.id.clone(),
        }
    }

    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(format!("{}|{}|{}", self.rating, self.created_at, self.id))
    }

    pub fn decode(cursor: &str) -> ApiResult<Self> {
        let invalid = || ApiError::BadRequest("Invalid cursor".to_string());

        let bytes = URL_SAFE_NO_PAD
            .decode(cursor.trim().trim_end_matches('='))
            .map_err(|_| invalid())?;
        let text = String::from_utf8(bytes).map_err(|_| invalid())?;

        let mut parts = text.splitn(3, '|');
        let (rating, created_at, id) = match (parts.next(), parts.next(), parts.next()) {
            (Some(r), Some(c), Some(i)) => (r, c, i),
            _ => return Err(invalid()),
        };

        let rating: i64 = rating.parse().map_err(|_| invalid())?;
        parse_db("cursor", created_at).map_err(|_| invalid())?;
        Uuid::parse_str(id).map_err(|_| invalid())?;

        Ok(Self {
            rating,
            created_at: created_at.to_string(),
            id: id.to_string(),
        })
    }
}
