//! Artifact lookup endpoint

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use sitecraft_core::artifact::ArtifactVersion;

use crate::http::error::ApiError;
use crate::http::server::AppState;

/// Artifact version response
#[derive(Serialize)]
pub struct ArtifactResponse {
    pub id: String,
    pub conversation_id: String,
    pub version_number: i32,
    pub created_at: String,
    pub code: String,
}

impl From<ArtifactVersion> for ArtifactResponse {
    fn from(v: ArtifactVersion) -> Self {
        Self {
            id: v.id.to_string(),
            conversation_id: v.conversation_id,
            version_number: v.version_number,
            created_at: v.created_at.to_rfc3339(),
            code: v.code,
        }
    }
}

/// GET /api/artifacts/{id} - exact version id, else latest for a conversation id
async fn get_artifact(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ArtifactResponse>, ApiError> {
    let version = state.resolver.resolve(&id).await?;
    Ok(Json(ArtifactResponse::from(version)))
}

/// Artifact routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/artifacts/{id}", get(get_artifact))
}
