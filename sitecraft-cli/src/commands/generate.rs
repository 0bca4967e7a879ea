use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sitecraft_core::assets::{AssetGenerator, OpenAiImageGenerator, PlaceholderAssets};
use sitecraft_core::harness::{HarnessInjector, HarnessOptions};
use sitecraft_core::orchestrator::{GenerationSettings, Generator, ProviderChain};
use sitecraft_core::render::PreviewRenderer;
use sitecraft_core::sanitize::Sanitizer;
use sitecraft_core::version::{MemoryVersionStore, VersionLedger, VersionStore};
use sitecraft_core::{BusinessProfile, GenerationRequest, SiteConfig};
use tracing::{info, warn};

use super::transform::{read_input, write_output};
use crate::ui;

#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// What the website should be
    pub prompt: String,

    /// Company name
    #[arg(long)]
    pub company: Option<String>,

    /// Business sector (e.g. "bakery", "law firm")
    #[arg(long)]
    pub sector: Option<String>,

    /// Visual style (e.g. "minimal", "playful")
    #[arg(long)]
    pub style: Option<String>,

    /// Requested features, comma separated
    #[arg(long = "feature", value_delimiter = ',')]
    pub features: Vec<String>,

    /// Existing artifact to revise
    #[arg(long)]
    pub target: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(long, short)]
    pub out: Option<PathBuf>,

    /// Write the sanitized, harness-wrapped preview instead of the raw artifact
    #[arg(long)]
    pub preview: bool,

    /// Use placeholder images instead of calling the image service
    #[arg(long)]
    pub no_assets: bool,
}

impl GenerateArgs {
    fn profile(&self) -> Option<BusinessProfile> {
        let profile = BusinessProfile {
            company: self.company.clone(),
            sector: self.sector.clone(),
            style: self.style.clone(),
            features: self
                .features
                .iter()
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect(),
        };
        (!profile.is_empty()).then_some(profile)
    }
}

fn asset_generator(config: &SiteConfig, no_assets: bool) -> Arc<dyn AssetGenerator> {
    if no_assets || !config.assets.enabled {
        return Arc::new(PlaceholderAssets);
    }
    match OpenAiImageGenerator::from_config(&config.assets) {
        Some(generator) => Arc::new(generator),
        None => {
            warn!("no image API key configured, using placeholder images");
            Arc::new(PlaceholderAssets)
        }
    }
}

pub async fn run_generate(args: GenerateArgs) -> Result<()> {
    let config = SiteConfig::load()?;
    let chain = ProviderChain::from_config(&config)?;
    info!(providers = ?chain.names(), "provider chain ready");

    let mut settings = GenerationSettings::from(&config);
    let placeholders = args.no_assets || !config.assets.enabled;
    if placeholders {
        settings.asset_delay = Duration::ZERO;
    }

    let store = Arc::new(MemoryVersionStore::new());
    let ledger = VersionLedger::new(store.clone());

    let mut request = GenerationRequest::new(args.prompt.clone());
    if let Some(profile) = args.profile() {
        request = request.with_profile(profile);
    }
    if let Some(ref path) = args.target {
        let previous = read_input(path)?;
        let conversation = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "local".to_string());
        let seeded = ledger.append(&conversation, &previous).await?;
        request = request.with_target(seeded.id.to_string());
    }

    let generator = Generator::new(chain, settings)
        .with_ledger(ledger)
        .with_assets(asset_generator(&config, args.no_assets));

    let outcome = ui::with_spinner_async(
        "Generating website",
        |o: &sitecraft_core::GenerationOutcome| format!("Generated with {}", o.provider),
        generator.generate(&request),
    )
    .await?;

    let mut code = outcome.code;
    if let Some(handle) = outcome.background {
        let pb = ui::spinner("Resolving images");
        match handle.await.context("Asset task panicked")? {
            Some(version) => {
                ui::finish_success(pb, format!("Saved version {}", version.version_number));
                code = version.code;
            }
            None => {
                ui::finish_error(pb, "Image resolution failed, keeping unresolved artifact");
            }
        }
    }

    if args.preview {
        let renderer = PreviewRenderer::new(
            store.clone() as Arc<dyn VersionStore>,
            Sanitizer::new(&config.sanitizer),
            HarnessInjector::new(HarnessOptions::from(&config.harness)),
        );
        code = renderer.render_code(&code, &outcome.conversation_id).final_code;
    }

    info!(
        conversation_id = %outcome.conversation_id,
        versions = store.len().await,
        "generation complete"
    );
    write_output(args.out.as_deref(), &code)
}
