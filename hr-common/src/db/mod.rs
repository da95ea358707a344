//! Relational schema, migrations and aggregate repair

pub mod backfill;
pub mod init;
pub mod migrations;
pub mod models;

pub use backfill::{recompute_aggregates, BackfillReport};
pub use init::init_database;
pub use migrations::run_migrations;
pub use models::*;
