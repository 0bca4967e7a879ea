use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SiteError;

/// Highest gallery position an anchor may name.
pub const MAX_GALLERY_SLOTS: u8 = 12;

/// Optional structured description of the business the site is for.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusinessProfile {
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
}

impl BusinessProfile {
    pub fn is_empty(&self) -> bool {
        self.company.is_none()
            && self.sector.is_none()
            && self.style.is_none()
            && self.features.is_empty()
    }
}

/// A user's request for a generated site. Immutable once submitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default)]
    pub profile: Option<BusinessProfile>,
    /// Version id or conversation id of an artifact to revise.
    #[serde(default)]
    pub target: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            profile: None,
            target: None,
        }
    }

    pub fn with_profile(mut self, profile: BusinessProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// Wire format spoken by a provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderDialect {
    Openai,
    Anthropic,
    Gemini,
}

impl fmt::Display for ProviderDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Openai => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        };
        f.write_str(name)
    }
}

/// One entry of the ordered provider priority list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderDescriptor {
    pub name: String,
    pub dialect: ProviderDialect,
    pub model: String,
    pub max_output_tokens: u32,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ProviderDescriptor {
    pub fn new(
        name: impl Into<String>,
        dialect: ProviderDialect,
        model: impl Into<String>,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            name: name.into(),
            dialect,
            model: model.into(),
            max_output_tokens,
            api_key: String::new(),
            base_url: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }
}

/// The four progressively-transformed states of one artifact.
///
/// Versions persist the normalized stage (anchors resolved); sanitizing and
/// harness injection run again on every render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeArtifact {
    pub raw: String,
    pub normalized: String,
    pub sanitized: String,
    pub final_code: String,
}

/// Named placement category for a generated image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssetSlot {
    PrimaryBanner,
    SecondaryContext,
    Gallery(u8),
}

impl AssetSlot {
    /// Slug used in `ANCHOR:<slug>` markers.
    pub fn slug(&self) -> String {
        match self {
            Self::PrimaryBanner => "primary-banner".to_string(),
            Self::SecondaryContext => "secondary-context".to_string(),
            Self::Gallery(n) => format!("gallery-{}", n),
        }
    }

    /// Literal anchor token for this slot.
    pub fn anchor(&self) -> String {
        format!("ANCHOR:{}", self.slug())
    }

    pub fn is_gallery(&self) -> bool {
        matches!(self, Self::Gallery(_))
    }
}

impl fmt::Display for AssetSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.slug())
    }
}

impl FromStr for AssetSlot {
    type Err = SiteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary-banner" => Ok(Self::PrimaryBanner),
            "secondary-context" => Ok(Self::SecondaryContext),
            other => {
                let n = other
                    .strip_prefix("gallery-")
                    .and_then(|n| n.parse::<u8>().ok())
                    .filter(|n| (1..=MAX_GALLERY_SLOTS).contains(n))
                    .ok_or_else(|| SiteError::asset(other, "unknown asset slot"))?;
                Ok(Self::Gallery(n))
            }
        }
    }
}

/// An image produced for a slot by the asset collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub slot: AssetSlot,
    pub url: String,
}

impl ResolvedAsset {
    pub fn new(slot: AssetSlot, url: impl Into<String>) -> Self {
        Self {
            slot,
            url: url.into(),
        }
    }
}

/// One immutable, numbered snapshot of an artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactVersion {
    pub id: Uuid,
    pub conversation_id: String,
    pub version_number: i32,
    pub code: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_slugs_parse_back() {
        for slot in [
            AssetSlot::PrimaryBanner,
            AssetSlot::SecondaryContext,
            AssetSlot::Gallery(1),
            AssetSlot::Gallery(12),
        ] {
            assert_eq!(slot.slug().parse::<AssetSlot>().unwrap(), slot);
        }
    }

    #[test]
    fn slot_parse_rejects_unknown() {
        assert!("hero".parse::<AssetSlot>().is_err());
        assert!("gallery-0".parse::<AssetSlot>().is_err());
        assert!("gallery-13".parse::<AssetSlot>().is_err());
    }

    #[test]
    fn anchor_token() {
        assert_eq!(AssetSlot::PrimaryBanner.anchor(), "ANCHOR:primary-banner");
        assert_eq!(AssetSlot::Gallery(3).anchor(), "ANCHOR:gallery-3");
    }

    #[test]
    fn request_deserializes_without_optional_fields() {
        let req: GenerationRequest = serde_json::from_str(r#"{"prompt":"a bakery site"}"#).unwrap();
        assert_eq!(req.prompt, "a bakery site");
        assert!(req.profile.is_none());
        assert!(req.target.is_none());
    }

    #[test]
    fn dialect_serde_lowercase() {
        let d: ProviderDialect = serde_json::from_str("\"gemini\"").unwrap();
        assert_eq!(d, ProviderDialect::Gemini);
        assert_eq!(d.to_string(), "gemini");
    }
}
