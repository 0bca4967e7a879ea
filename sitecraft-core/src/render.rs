//! Render path: resolve an identifier, sanitize, wrap in the harness.
//!
//! Sanitization runs on every render, not just at generation time, so
//! artifacts stored before a rule change are still cleaned.

use std::sync::Arc;

use tracing::debug;

use crate::artifact::{ArtifactVersion, CodeArtifact};
use crate::error::Result;
use crate::harness::{HarnessInjector, HarnessOptions};
use crate::sanitize::Sanitizer;
use crate::version::{VersionResolver, VersionStore};

/// A document ready for the sandboxed surface.
#[derive(Debug, Clone)]
pub struct RenderedPreview {
    pub version: ArtifactVersion,
    pub artifact: CodeArtifact,
}

impl RenderedPreview {
    /// Self-contained document string.
    pub fn document(&self) -> &str {
        &self.artifact.final_code
    }
}

#[derive(Clone)]
pub struct PreviewRenderer {
    resolver: VersionResolver,
    sanitizer: Arc<Sanitizer>,
    harness: Arc<HarnessInjector>,
}

impl PreviewRenderer {
    pub fn new(store: Arc<dyn VersionStore>, sanitizer: Sanitizer, harness: HarnessInjector) -> Self {
        Self {
            resolver: VersionResolver::new(store),
            sanitizer: Arc::new(sanitizer),
            harness: Arc::new(harness),
        }
    }

    pub fn with_defaults(store: Arc<dyn VersionStore>) -> Self {
        Self::new(store, Sanitizer::default(), HarnessInjector::new(HarnessOptions::default()))
    }

    pub async fn render(&self, identifier: &str) -> Result<RenderedPreview> {
        let version = self.resolver.resolve(identifier).await?;
        debug!(
            identifier = %identifier,
            conversation_id = %version.conversation_id,
            version = version.version_number,
            "rendering preview"
        );

        let artifact = self.render_code(&version.code, &version.id.to_string());
        Ok(RenderedPreview { version, artifact })
    }

    /// Sanitize and wrap already-normalized code. The provider response is
    /// not kept past normalization, so `raw` stays empty.
    pub fn render_code(&self, code: &str, artifact_id: &str) -> CodeArtifact {
        let sanitized = self.sanitizer.sanitize(code);
        let final_code = self.harness.inject(&sanitized, artifact_id);
        CodeArtifact {
            raw: String::new(),
            normalized: code.to_string(),
            sanitized,
            final_code,
        }
    }
}
