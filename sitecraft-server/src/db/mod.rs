//! Database layer - connection pool, migrations, and the version repository
//!
//! Version rows are write-once. Numbering is serialized per conversation by
//! the core ledger and backed by a UNIQUE constraint here.

pub mod migrations;
pub mod pool;
pub mod repos;

pub use pool::create_pool;
pub use repos::*;
