//! Generation endpoint

use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use sitecraft_core::artifact::{BusinessProfile, GenerationRequest};

use crate::http::error::ApiError;
use crate::http::server::AppState;

/// Longest accepted prompt, in chars
const MAX_PROMPT_CHARS: usize = 8000;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub profile: Option<BusinessProfile>,
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub conversation_id: String,
    pub provider: String,
    pub code_length: usize,
    pub preview_url: String,
}

impl GenerateRequest {
    fn validate(self) -> Result<GenerationRequest, ApiError> {
        let prompt = self.prompt.trim();
        if prompt.is_empty() {
            return Err(ApiError::validation("prompt", "cannot be empty"));
        }
        if prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(ApiError::validation(
                "prompt",
                format!("exceeds maximum length of {} characters", MAX_PROMPT_CHARS),
            ));
        }

        let mut request = GenerationRequest::new(prompt);
        if let Some(profile) = self.profile.filter(|p| !p.is_empty()) {
            request = request.with_profile(profile);
        }
        if let Some(target) = self.target.filter(|t| !t.trim().is_empty()) {
            request = request.with_target(target);
        }
        Ok(request)
    }
}

/// POST /api/generate - run the provider chain; persistence continues in the background
async fn generate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let request = req.validate()?;
    let outcome = state.generator.generate(&request).await?;

    // Dropping the handle detaches the task; the response does not wait on it.
    drop(outcome.background);

    Ok(Json(GenerateResponse {
        preview_url: format!("/preview/{}", outcome.conversation_id),
        code_length: outcome.code.len(),
        conversation_id: outcome.conversation_id,
        provider: outcome.provider,
    }))
}

/// Generation routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/generate", post(generate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(prompt: &str) -> GenerateRequest {
        GenerateRequest {
            prompt: prompt.to_string(),
            profile: None,
            target: None,
        }
    }

    #[test]
    fn prompt_is_trimmed() {
        assert_eq!(req("  bakery  ").validate().unwrap().prompt, "bakery");
    }

    #[test]
    fn oversized_prompt_is_rejected() {
        assert!(req(&"a".repeat(MAX_PROMPT_CHARS + 1)).validate().is_err());
    }

    #[test]
    fn blank_target_and_empty_profile_are_dropped() {
        let mut r = req("bakery");
        r.target = Some("  ".into());
        r.profile = Some(BusinessProfile::default());
        let request = r.validate().unwrap();
        assert!(request.target.is_none());
        assert!(request.profile.is_none());
    }
}
