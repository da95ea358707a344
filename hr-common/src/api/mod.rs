//! API types shared by the server and the client
//!
//! This module contains ONLY plain data types and their validation. No HTTP
//! framework dependencies live here; `hr-server` and `hr-client` wrap these
//! with axum and reqwest respectively.

pub mod query;
pub mod requests;
pub mod types;

pub use query::{
    ListQuery, MemberSort, OrgSort, PersonalitySort, ReviewListQuery, ReviewSort, SortField,
    SortOrder,
};
pub use requests::*;
pub use types::*;
