pub mod anchors;
pub mod artifact;
pub mod assets;
pub mod config;
pub mod error;
pub mod harness;
pub mod normalize;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod render;
pub mod sanitize;
pub mod version;

pub use anchors::{detect_slots, resolve_anchors, strip_unresolved_anchors, AnchorReport, Placement};
pub use artifact::{
    ArtifactVersion, AssetSlot, BusinessProfile, CodeArtifact, GenerationRequest,
    ProviderDescriptor, ProviderDialect, ResolvedAsset,
};
pub use assets::{generate_assets, AssetGenerator, OpenAiImageGenerator, PlaceholderAssets};
pub use config::SiteConfig;
pub use error::{Result, SiteError};
pub use harness::{inject_harness, HarnessInjector, HarnessOptions};
pub use normalize::normalize;
pub use orchestrator::{GenerationOutcome, GenerationSettings, Generator, ProviderChain};
pub use provider::{build_provider, Provider, ProviderCall};
pub use render::{PreviewRenderer, RenderedPreview};
pub use sanitize::{sanitize, Sanitizer};
pub use version::{MemoryVersionStore, VersionLedger, VersionResolver, VersionStore};
