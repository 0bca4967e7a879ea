//! Sandboxed preview endpoint
//!
//! The document is sanitized and wrapped on every request. The CSP sandbox
//! directive gives the document an opaque origin even when it is opened
//! directly rather than through a sandboxed iframe.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::http::error::ApiError;
use crate::http::server::AppState;

pub const PREVIEW_CSP: &str = "sandbox allow-scripts allow-popups";

/// GET /preview/{id} - sanitized, harness-wrapped document
async fn preview(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let rendered = state.renderer.render(&id).await?;
    tracing::debug!(
        id = %id,
        version = rendered.version.version_number,
        bytes = rendered.document().len(),
        "serving preview"
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CONTENT_SECURITY_POLICY, PREVIEW_CSP),
            (header::REFERRER_POLICY, "no-referrer"),
            (header::CACHE_CONTROL, "no-store"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        rendered.artifact.final_code,
    )
        .into_response())
}

/// Preview routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/preview/{id}", get(preview))
}
