//! Pagination utilities
//!
//! Page-based lists use `page` (1-indexed) and `limit`. Out-of-range values
//! are rejected rather than clamped so that clients notice bad requests.

use hr_common::api::query::{SortField, SortOrder};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};

/// Raw query string of a page-based list
///
/// `sort` and `order` stay strings here so that unknown values produce the
/// API's own error messages instead of a deserializer rejection.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

/// Validated list parameters
#[derive(Debug, Clone)]
pub struct ResolvedList<S> {
    pub window: PageWindow,
    /// Trimmed search text; `None` when absent or blank
    pub search: Option<String>,
    pub sort: S,
    pub order: SortOrder,
}

impl ListParams {
    pub fn resolve<S: SortField>(self, default_limit: u32, max_limit: u32) -> ApiResult<ResolvedList<S>> {
        let sort = match self.sort.as_deref() {
            None => S::default(),
            Some(value) => S::parse(value)
                .ok_or_else(|| ApiError::BadRequest("Invalid sort field".to_string()))?,
        };
        let order = match self.order.as_deref() {
            None => SortOrder::default(),
            Some(value) => SortOrder::parse(value)
                .ok_or_else(|| ApiError::BadRequest("Invalid order".to_string()))?,
        };

        Ok(ResolvedList {
            window: page_window(self.page, self.limit, default_limit, max_limit)?,
            search: self
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            sort,
            order,
        })
    }
}

impl<S: SortField> ResolvedList<S> {
    /// ORDER BY clause with the row id as a stable tie-breaker
    pub fn order_by(&self, id_column: &str) -> String {
        format!(
            "{} {}, {} {}",
            self.sort.column(),
            self.order.sql(),
            id_column,
            self.order.sql()
        )
    }
}

/// Resolved LIMIT/OFFSET window for a page-based list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// Current page number (1-indexed)
    pub page: i64,
    /// Rows per page
    pub limit: i64,
    /// Offset for SQL LIMIT/OFFSET query
    pub offset: i64,
}

/// Validate `page`/`limit` and compute the SQL window
///
/// # Examples
/// ```
/// use hr_server::pagination::page_window;
///
/// let w = page_window(Some(3), None, 25, 100).unwrap();
/// assert_eq!(w.limit, 25);
/// assert_eq!(w.offset, 50);
///
/// assert!(page_window(Some(0), None, 25, 100).is_err());
/// assert!(page_window(None, Some(101), 25, 100).is_err());
/// ```
pub fn page_window(
    page: Option<u32>,
    limit: Option<u32>,
    default_limit: u32,
    max_limit: u32,
) -> ApiResult<PageWindow> {
    let page = page.unwrap_or(1);
    if page < 1 {
        return Err(ApiError::BadRequest("page must be at least 1".to_string()));
    }
    let limit = cursor_limit(limit, default_limit, max_limit)?;

    Ok(PageWindow {
        page: page as i64,
        limit,
        offset: (page as i64 - 1) * limit,
    })
}

/// Validate a `limit` on its own (cursor lists have no page)
pub fn cursor_limit(limit: Option<u32>, default_limit: u32, max_limit: u32) -> ApiResult<i64> {
    let limit = limit.unwrap_or(default_limit);
    if limit < 1 || limit > max_limit {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            max_limit
        )));
    }
    Ok(limit as i64)
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern
pub fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
