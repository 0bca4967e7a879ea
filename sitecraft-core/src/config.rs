use std::collections::HashMap;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::artifact::{ProviderDescriptor, ProviderDialect};
use crate::sanitize::DEFAULT_DENIED_HOSTS;

static VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("variable regex"));

/// Centralized configuration for sitecraft
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Ordered provider priority list. Empty means the built-in default order.
    #[serde(default)]
    pub providers: Vec<ProviderDescriptor>,

    #[serde(default)]
    pub assets: AssetsConfig,

    #[serde(default)]
    pub sanitizer: SanitizerConfig,

    #[serde(default)]
    pub harness: HarnessConfig,

    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Fixed high temperature for stylistic variety
    pub temperature: f32,
    /// Normalized artifacts shorter than this (in chars) count as failures
    pub min_artifact_len: usize,
    pub call_timeout_secs: u64,
    /// Manually chosen provider, tried before the rest of the chain
    pub preferred_provider: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            min_artifact_len: 100,
            call_timeout_secs: 120,
            preferred_provider: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    pub enabled: bool,
    /// Fixed delay between image calls, respecting the collaborator's rate limit
    pub delay_ms: u64,
    pub image_model: String,
    pub api_key: String,
    pub base_url: Option<String>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: 1500,
            image_model: "dall-e-3".to_string(),
            api_key: "${OPENAI_API_KEY}".to_string(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizerConfig {
    pub denied_hosts: Vec<String>,
    pub extra_env_names: Vec<String>,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            denied_hosts: DEFAULT_DENIED_HOSTS.iter().map(|h| h.to_string()).collect(),
            extra_env_names: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub watermark_text: String,
    pub allowed_script_hosts: Vec<String>,
    pub reassert_interval_ms: u64,
    pub mobile_breakpoint_px: u32,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            watermark_text: "PREVIEW".to_string(),
            allowed_script_hosts: vec!["cdn.tailwindcss.com".to_string()],
            reassert_interval_ms: 1000,
            mobile_breakpoint_px: 768,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind_addr: SocketAddr,
    /// Empty means an in-memory version store
    pub database_url: String,
    pub cors_permissive: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3030)),
            database_url: "${DATABASE_URL}".to_string(),
            cors_permissive: false,
        }
    }
}

/// Built-in provider order used when the config lists none.
pub fn default_providers() -> Vec<ProviderDescriptor> {
    vec![
        ProviderDescriptor::new("gemini", ProviderDialect::Gemini, "gemini-2.5-flash", 65536)
            .with_api_key("${GEMINI_API_KEY}"),
        ProviderDescriptor::new("openai", ProviderDialect::Openai, "gpt-4o", 16384)
            .with_api_key("${OPENAI_API_KEY}"),
        ProviderDescriptor::new(
            "anthropic",
            ProviderDialect::Anthropic,
            "claude-sonnet-4-20250514",
            16000,
        )
        .with_api_key("${ANTHROPIC_API_KEY}"),
    ]
}

/// Load environment variables from .env files
///
/// Priority order (highest to lowest):
/// 1. Environment variables already set
/// 2. Current directory .env
/// 3. ~/.sitecraft/.env
pub fn load_dotenv() {
    if let Ok(path) = dotenvy::dotenv() {
        debug!("Loaded .env from current directory: {}", path.display());
    }

    if let Some(dir) = config_dir() {
        let env_file = dir.join(".env");
        if env_file.exists() {
            // dotenvy doesn't overwrite existing vars
            match dotenvy::from_path(&env_file) {
                Ok(_) => debug!("Loaded .env from {}", env_file.display()),
                Err(e) => warn!("Failed to load {}: {}", env_file.display(), e),
            }
        }
    }
}

/// ~/.sitecraft
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".sitecraft"))
}

impl SiteConfig {
    /// Config file path: $SITECRAFT_CONFIG, else ~/.sitecraft/config.toml
    pub fn config_path() -> PathBuf {
        if let Ok(path) = env::var("SITECRAFT_CONFIG") {
            return PathBuf::from(path);
        }
        config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// Load from the default path. A missing file yields defaults.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            info!("No config at {:?}, using defaults", path);
            let mut config = Self::default();
            config.expand_variables(&env_vars());
            return Ok(config);
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {:?}", path))?;
        let mut config = Self::from_toml(&content)?;
        config.expand_variables(&env_vars());
        Ok(config)
    }

    /// Parse without variable expansion
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file (invalid TOML)")
    }

    /// Descriptors in the configured order, or the built-in order when none
    /// are listed. Not yet filtered for missing keys.
    pub fn provider_descriptors(&self) -> Vec<ProviderDescriptor> {
        if self.providers.is_empty() {
            let vars = env_vars();
            default_providers()
                .into_iter()
                .map(|mut d| {
                    d.api_key = expand_string(&d.api_key, &vars);
                    d
                })
                .collect()
        } else {
            self.providers.clone()
        }
    }

    /// Expand ${VAR} references in every string a user would put a secret in
    fn expand_variables(&mut self, vars: &HashMap<String, String>) {
        for provider in &mut self.providers {
            provider.api_key = expand_string(&provider.api_key, vars);
            if let Some(ref url) = provider.base_url {
                provider.base_url = Some(expand_string(url, vars));
            }
        }

        self.assets.api_key = expand_string(&self.assets.api_key, vars);
        if let Some(ref url) = self.assets.base_url {
            self.assets.base_url = Some(expand_string(url, vars));
        }

        self.server.database_url = expand_string(&self.server.database_url, vars);
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(path, toml_str).context(format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }
}

fn env_vars() -> HashMap<String, String> {
    env::vars().collect()
}

/// Expand ${var} references in a string; unknown variables become empty.
fn expand_string(s: &str, vars: &HashMap<String, String>) -> String {
    VAR_RE
        .replace_all(s, |caps: &Captures| {
            vars.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}
