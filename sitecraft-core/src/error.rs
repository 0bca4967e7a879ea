/// Structured error types for sitecraft-core.
///
/// Uses `thiserror` so the server and CLI can match on failure kinds.
/// Binary crates (sitecraft-cli) still use `anyhow` for convenience.
use std::io;
use thiserror::Error;

/// Main error type for sitecraft-core operations
#[derive(Error, Debug)]
pub enum SiteError {
    /// A single provider call failed (timeout, quota, malformed or empty response).
    /// Recoverable: the orchestrator moves on to the next provider.
    #[error("provider '{provider}' failed: {reason}")]
    ProviderFailure { provider: String, reason: String },

    /// The normalized artifact was below the minimum viable length.
    #[error("provider '{provider}' returned an artifact of {len} chars (minimum {min})")]
    ArtifactTooShort {
        provider: String,
        len: usize,
        min: usize,
    },

    /// Every provider in the chain failed; carries the last underlying cause.
    #[error("all {attempts} providers failed; last error: {last}")]
    AllProvidersFailed { attempts: usize, last: Box<SiteError> },

    /// Generating an image for a slot failed
    #[error("asset generation for slot '{slot}' failed: {reason}")]
    AssetResolution { slot: String, reason: String },

    /// The version store rejected a read or write
    #[error("persistence error: {reason}")]
    Persistence { reason: String },

    /// No stored artifact matches the identifier
    #[error("no artifact found for '{identifier}'")]
    NotFound { identifier: String },

    /// Configuration error
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// JSON parsing or serialization failed
    #[error("JSON error at {context}: {source}")]
    Json {
        context: String,
        source: serde_json::Error,
    },

    /// HTTP transport failed before a response arrived
    #[error("HTTP error: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },
}

/// Result type alias for sitecraft-core operations
pub type Result<T> = std::result::Result<T, SiteError>;

impl SiteError {
    /// Create a provider failure
    pub fn provider(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProviderFailure {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Create an artifact-too-short error
    pub fn too_short(provider: impl Into<String>, len: usize, min: usize) -> Self {
        Self::ArtifactTooShort {
            provider: provider.into(),
            len,
            min,
        }
    }

    /// Create an asset resolution error
    pub fn asset(slot: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AssetResolution {
            slot: slot.into(),
            reason: reason.into(),
        }
    }

    /// Create a persistence error
    pub fn persistence(reason: impl Into<String>) -> Self {
        Self::Persistence {
            reason: reason.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            identifier: identifier.into(),
        }
    }

    /// Create a config error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Create a JSON error with context
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    /// Whether this error advances the provider fallback loop instead of ending it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ProviderFailure { .. }
                | Self::ArtifactTooShort { .. }
                | Self::Http { .. }
                | Self::Json { .. }
                | Self::AssetResolution { .. }
                | Self::Persistence { .. }
        )
    }
}
