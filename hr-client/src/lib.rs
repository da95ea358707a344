//! # HonestReviews Client
//!
//! Typed HTTP client for the HonestReviews API plus a normalized cache:
//! - [`ApiClient`]: one method per endpoint, client-side validation,
//!   transparent token refresh
//! - [`session`]: token storage and single-flight refresh
//! - [`store`]: normalized entities, paged and cursor lists, optimistic join
//! - [`actions`]: store-aware operations tying the two together
//! - [`views`]: memoized selectors and text rendering

pub mod actions;
pub mod api;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod storage;
pub mod store;
pub mod views;

pub use actions::{Actions, PersonalityRef};
pub use error::{ClientError, ClientResult};
pub use http::ApiClient;
pub use storage::{FileStorage, MemoryStorage, TokenStorage};
pub use store::{SharedStore, Store, StoreEvent};
