//! Repository implementations for database access
//!
//! Rows are inserted once and never updated; conflicts on the
//! (conversation_id, version_number) key surface as errors instead of being
//! retried.

pub mod versions;

pub use versions::{DbError, PgVersionStore, VersionRepo, VersionRow};
