//! sitecraft-server: HTTP surface for the generation pipeline
//!
//! Accepts generation requests, exposes stored artifact versions, and serves
//! sanitized, harness-wrapped previews for sandboxed rendering.

pub mod db;
pub mod http;

pub use db::{create_pool, PgVersionStore};
pub use http::{build_router, run_server, serve, ApiError, AppState, ServerConfig, ServerError};
