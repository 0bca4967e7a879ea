//! Image generation for anchor slots.
//!
//! The image collaborator is rate limited, so slots are generated one at a
//! time with a fixed pause between calls. A slot that fails gets a
//! placeholder URL; the remaining slots still run.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::artifact::{AssetSlot, ResolvedAsset};
use crate::config::AssetsConfig;
use crate::error::{Result, SiteError};
use crate::provider::truncate_body;

const OPENAI_IMAGES_BASE: &str = "https://api.openai.com/v1";

#[async_trait]
pub trait AssetGenerator: Send + Sync {
    /// Produce a public URL for one slot.
    async fn generate(&self, slot: AssetSlot, business_context: &str) -> Result<String>;
}

/// Deterministic placeholder image for a slot.
pub fn placeholder_url(slot: AssetSlot) -> String {
    let (w, h) = match slot {
        AssetSlot::PrimaryBanner => (1600, 900),
        AssetSlot::SecondaryContext => (1200, 800),
        AssetSlot::Gallery(_) => (800, 800),
    };
    format!("https://placehold.co/{}x{}?text={}", w, h, slot.slug())
}

/// Generator that never calls out; used when image generation is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderAssets;

#[async_trait]
impl AssetGenerator for PlaceholderAssets {
    async fn generate(&self, slot: AssetSlot, _business_context: &str) -> Result<String> {
        Ok(placeholder_url(slot))
    }
}

pub struct OpenAiImageGenerator {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiImageGenerator {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: OPENAI_IMAGES_BASE.to_string(),
        }
    }

    /// None when no key is configured.
    pub fn from_config(config: &AssetsConfig) -> Option<Self> {
        if config.api_key.trim().is_empty() {
            return None;
        }
        let mut generator = Self::new(&config.api_key, &config.image_model);
        if let Some(ref url) = config.base_url {
            generator.base_url = url.trim_end_matches('/').to_string();
        }
        Some(generator)
    }

    fn size_for(slot: AssetSlot) -> &'static str {
        match slot {
            AssetSlot::PrimaryBanner => "1792x1024",
            AssetSlot::SecondaryContext => "1024x1024",
            AssetSlot::Gallery(_) => "1024x1024",
        }
    }
}

/// Image prompt for a slot.
pub fn image_prompt(slot: AssetSlot, business_context: &str) -> String {
    let subject = match slot {
        AssetSlot::PrimaryBanner => "a wide hero banner photograph",
        AssetSlot::SecondaryContext => "a photograph illustrating the team or workspace",
        AssetSlot::Gallery(_) => "a product or service showcase photograph",
    };
    format!(
        "Professional {} for a website. Business: {}. No text, no logos, natural lighting.",
        subject, business_context
    )
}

#[async_trait]
impl AssetGenerator for OpenAiImageGenerator {
    async fn generate(&self, slot: AssetSlot, business_context: &str) -> Result<String> {
        let url = format!("{}/images/generations", self.base_url);
        let body = json!({
            "model": self.model,
            "prompt": image_prompt(slot, business_context),
            "n": 1,
            "size": Self::size_for(slot),
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SiteError::asset(
                slot.slug(),
                format!("HTTP {}: {}", status, truncate_body(&error_text, 500)),
            ));
        }

        let value: Value = response.json().await?;
        value
            .pointer("/data/0/url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| SiteError::asset(slot.slug(), "response carried no image url"))
    }
}

/// Generate every slot sequentially, pausing `delay` between calls.
pub async fn generate_assets(
    generator: &dyn AssetGenerator,
    slots: &[AssetSlot],
    business_context: &str,
    delay: Duration,
) -> Vec<ResolvedAsset> {
    let mut assets = Vec::with_capacity(slots.len());

    for (i, &slot) in slots.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let url = match generator.generate(slot, business_context).await {
            Ok(url) => {
                debug!(slot = %slot, "asset generated");
                url
            }
            Err(e) => {
                warn!(slot = %slot, error = %e, "asset generation failed, using placeholder");
                placeholder_url(slot)
            }
        };
        assets.push(ResolvedAsset::new(slot, url));
    }

    assets
}
