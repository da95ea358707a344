//! # HonestReviews Common Library
//!
//! Shared code for the HonestReviews server and client including:
//! - API request/response types and list query parameters
//! - Field validation rules
//! - Review aggregate math
//! - Configuration loading
//! - Database schema, migrations and backfill (`sqlx` feature)
//! - Utility functions

pub mod api;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod stats;
pub mod time;
pub mod uuid_utils;
pub mod validation;

pub use error::{Error, Result};
pub use stats::{round2, Aggregate};
pub use validation::ValidationError;
