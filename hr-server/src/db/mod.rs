//! Repository functions over the SQLite pool
//!
//! Each module owns the SQL for one resource. Functions that change review
//! aggregates run inside a single transaction.

pub mod orgs;
pub mod personalities;
pub mod profiles;
pub mod reviews;
pub mod sessions;
