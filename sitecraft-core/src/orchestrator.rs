//! Multi-provider generation with ordered fallback.
//!
//! Providers are tried one at a time, never in parallel. The first response
//! that normalizes to a viable artifact wins; everything else (errors,
//! timeouts, blank or too-short output) advances to the next provider.
//! Persistence and asset resolution run afterwards on a detached task and
//! never affect the result handed back to the caller.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::anchors::{detect_slots, resolve_anchors_with_report, strip_unresolved_anchors};
use crate::artifact::{ArtifactVersion, GenerationRequest, ProviderDescriptor};
use crate::assets::{generate_assets, AssetGenerator};
use crate::config::SiteConfig;
use crate::error::{Result, SiteError};
use crate::normalize::normalize;
use crate::prompt::{build_user_prompt, business_context, SYSTEM_INSTRUCTION};
use crate::provider::{build_provider, Provider, ProviderCall};
use crate::version::{VersionLedger, VersionResolver};

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub min_artifact_len: usize,
    pub call_timeout: Duration,
    pub asset_delay: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::from(&SiteConfig::default())
    }
}

impl From<&SiteConfig> for GenerationSettings {
    fn from(config: &SiteConfig) -> Self {
        Self {
            temperature: config.generation.temperature,
            min_artifact_len: config.generation.min_artifact_len,
            call_timeout: Duration::from_secs(config.generation.call_timeout_secs),
            asset_delay: Duration::from_millis(config.assets.delay_ms),
        }
    }
}

struct ChainEntry {
    provider: Arc<dyn Provider>,
    max_output_tokens: u32,
}

/// Ordered provider priority list.
#[derive(Default)]
pub struct ProviderChain {
    entries: Vec<ChainEntry>,
}

impl ProviderChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, provider: Arc<dyn Provider>, max_output_tokens: u32) -> Self {
        self.entries.push(ChainEntry {
            provider,
            max_output_tokens,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.provider.name().to_string())
            .collect()
    }

    /// Build the chain from configuration: the preferred provider first, the
    /// rest in configured (or built-in) order. Descriptors without a key are
    /// skipped.
    pub fn from_config(config: &SiteConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.generation.call_timeout_secs);
        let ordered = order_descriptors(
            config.provider_descriptors(),
            config.generation.preferred_provider.as_deref(),
        );

        let mut chain = Self::new();
        for descriptor in ordered {
            if descriptor.api_key.trim().is_empty() {
                warn!(provider = %descriptor.name, "no API key configured, skipping provider");
                continue;
            }
            let provider = build_provider(&descriptor, timeout)?;
            chain = chain.push(provider, descriptor.max_output_tokens);
        }

        if chain.is_empty() {
            return Err(SiteError::config(
                "no usable providers: set an API key for at least one provider",
            ));
        }
        Ok(chain)
    }
}

/// Move the preferred descriptor to the front, keeping the others in order.
pub fn order_descriptors(
    mut descriptors: Vec<ProviderDescriptor>,
    preferred: Option<&str>,
) -> Vec<ProviderDescriptor> {
    if let Some(name) = preferred {
        match descriptors.iter().position(|d| d.name == name) {
            Some(idx) => {
                let chosen = descriptors.remove(idx);
                descriptors.insert(0, chosen);
            }
            None => warn!(provider = %name, "preferred provider is not configured"),
        }
    }
    descriptors
}

/// Result of a successful generation.
#[derive(Debug)]
pub struct GenerationOutcome {
    /// Normalized artifact, before asset resolution.
    pub code: String,
    pub provider: String,
    pub conversation_id: String,
    /// Persistence and asset work. `None` when no ledger is configured.
    pub background: Option<JoinHandle<Option<ArtifactVersion>>>,
}

pub struct Generator {
    chain: ProviderChain,
    settings: GenerationSettings,
    ledger: Option<VersionLedger>,
    assets: Option<Arc<dyn AssetGenerator>>,
}

impl Generator {
    pub fn new(chain: ProviderChain, settings: GenerationSettings) -> Self {
        Self {
            chain,
            settings,
            ledger: None,
            assets: None,
        }
    }

    pub fn with_ledger(mut self, ledger: VersionLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn with_assets(mut self, assets: Arc<dyn AssetGenerator>) -> Self {
        self.assets = Some(assets);
        self
    }

    pub fn chain(&self) -> &ProviderChain {
        &self.chain
    }

    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutcome> {
        let (conversation_id, previous) = self.resolve_target(request).await;

        let call = ProviderCall {
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            user_prompt: build_user_prompt(request, previous.as_deref()),
            max_output_tokens: 0,
            temperature: self.settings.temperature,
        };

        let (provider, code) = self.run_chain(&call).await?;
        info!(
            provider = %provider,
            conversation_id = %conversation_id,
            len = code.len(),
            "generation succeeded"
        );

        let background = self.spawn_background(&conversation_id, &code, business_context(request));

        Ok(GenerationOutcome {
            code,
            provider,
            conversation_id,
            background,
        })
    }

    /// Conversation to append to and the code being revised, if any.
    async fn resolve_target(&self, request: &GenerationRequest) -> (String, Option<String>) {
        let target = match request.target.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return (Uuid::new_v4().to_string(), None),
        };

        let Some(ledger) = &self.ledger else {
            return (target.to_string(), None);
        };

        match VersionResolver::new(ledger.store()).resolve(target).await {
            Ok(version) => (version.conversation_id, Some(version.code)),
            Err(SiteError::NotFound { .. }) => (target.to_string(), None),
            Err(e) => {
                warn!(target = %target, error = %e, "could not load revision target");
                (target.to_string(), None)
            }
        }
    }

    async fn run_chain(&self, base: &ProviderCall) -> Result<(String, String)> {
        let mut last: Option<SiteError> = None;

        for entry in &self.chain.entries {
            let name = entry.provider.name().to_string();
            let call = ProviderCall {
                max_output_tokens: entry.max_output_tokens,
                ..base.clone()
            };

            match self.attempt(entry.provider.as_ref(), &call).await {
                Ok(code) => return Ok((name, code)),
                Err(e) => {
                    warn!(provider = %name, error = %e, "provider attempt failed");
                    last = Some(e);
                }
            }
        }

        Err(SiteError::AllProvidersFailed {
            attempts: self.chain.len(),
            last: Box::new(last.unwrap_or_else(|| SiteError::config("provider chain is empty"))),
        })
    }

    async fn attempt(&self, provider: &dyn Provider, call: &ProviderCall) -> Result<String> {
        let raw = match tokio::time::timeout(self.settings.call_timeout, provider.complete(call)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(SiteError::provider(
                    provider.name(),
                    format!("timed out after {:?}", self.settings.call_timeout),
                ))
            }
        };

        let code = normalize(&raw);
        let len = code.chars().count();
        if len < self.settings.min_artifact_len {
            return Err(SiteError::too_short(
                provider.name(),
                len,
                self.settings.min_artifact_len,
            ));
        }
        Ok(code)
    }

    fn spawn_background(
        &self,
        conversation_id: &str,
        code: &str,
        context: String,
    ) -> Option<JoinHandle<Option<ArtifactVersion>>> {
        let ledger = self.ledger.clone()?;
        let assets = self.assets.clone();
        let delay = self.settings.asset_delay;
        let conversation_id = conversation_id.to_string();
        let code = code.to_string();

        Some(tokio::spawn(async move {
            let slots = detect_slots(&code);
            let resolved = match (&assets, slots.is_empty()) {
                (Some(generator), false) => {
                    let generated =
                        generate_assets(generator.as_ref(), &slots, &context, delay).await;
                    let report = resolve_anchors_with_report(&code, &generated);
                    info!(
                        conversation_id = %conversation_id,
                        slots = slots.len(),
                        placed = report.placed(),
                        "assets resolved"
                    );
                    report.code
                }
                _ => code,
            };
            let final_code = strip_unresolved_anchors(&resolved);

            match ledger.append(&conversation_id, &final_code).await {
                Ok(version) => {
                    info!(
                        conversation_id = %conversation_id,
                        version = version.version_number,
                        "artifact persisted"
                    );
                    Some(version)
                }
                Err(e) => {
                    warn!(conversation_id = %conversation_id, error = %e, "failed to persist artifact");
                    None
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::PlaceholderAssets;
    use crate::version::{MemoryVersionStore, VersionStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    enum Script {
        Fail,
        Text(String),
        Hang,
    }

    struct Scripted {
        name: String,
        script: Script,
        calls: AtomicUsize,
        seen_budget: Mutex<Option<u32>>,
    }

    impl Scripted {
        fn new(name: &str, script: Script) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                script,
                calls: AtomicUsize::new(0),
                seen_budget: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl Provider for Scripted {
        fn name(&self) -> &str {
            &self.name
        }

        async fn complete(&self, call: &ProviderCall) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.seen_budget.lock().unwrap() = Some(call.max_output_tokens);
            match &self.script {
                Script::Fail => Err(SiteError::provider(&self.name, "quota exceeded")),
                Script::Text(t) => Ok(t.clone()),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(String::new())
                }
            }
        }
    }

    fn artifact(len: usize) -> String {
        format!("<div>{}</div>", "x".repeat(len.saturating_sub(11)))
    }

    fn settings() -> GenerationSettings {
        GenerationSettings {
            temperature: 1.0,
            min_artifact_len: 100,
            call_timeout: Duration::from_secs(5),
            asset_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn falls_through_failure_and_short_output() {
        let a = Scripted::new("a", Script::Fail);
        let b = Scripted::new("b", Script::Text("x".repeat(40)));
        let c_code = format!("<html>{}</html>", "y".repeat(487));
        assert_eq!(c_code.len(), 500);
        let c = Scripted::new("c", Script::Text(c_code.clone()));

        let chain = ProviderChain::new()
            .push(a.clone(), 10)
            .push(b.clone(), 20)
            .push(c.clone(), 30);
        let outcome = Generator::new(chain, settings())
            .generate(&GenerationRequest::new("site"))
            .await
            .unwrap();

        assert_eq!(outcome.provider, "c");
        assert_eq!(outcome.code, c_code);
        assert!(outcome.background.is_none());
        assert_eq!(*c.seen_budget.lock().unwrap(), Some(30));
        for p in [&a, &b, &c] {
            assert_eq!(p.calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn stops_at_first_success() {
        let a = Scripted::new("a", Script::Text(artifact(200)));
        let b = Scripted::new("b", Script::Text(artifact(200)));
        let chain = ProviderChain::new().push(a.clone(), 1).push(b.clone(), 1);

        let outcome = Generator::new(chain, settings())
            .generate(&GenerationRequest::new("site"))
            .await
            .unwrap();
        assert_eq!(outcome.provider, "a");
        assert_eq!(b.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exhaustion_carries_last_error() {
        let chain = ProviderChain::new()
            .push(Scripted::new("a", Script::Fail), 1)
            .push(Scripted::new("b", Script::Text("short".into())), 1);

        let err = Generator::new(chain, settings())
            .generate(&GenerationRequest::new("site"))
            .await
            .unwrap_err();

        match err {
            SiteError::AllProvidersFailed { attempts, last } => {
                assert_eq!(attempts, 2);
                assert!(matches!(*last, SiteError::ArtifactTooShort { len: 5, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_as_provider_failure() {
        let chain = ProviderChain::new()
            .push(Scripted::new("slow", Script::Hang), 1)
            .push(Scripted::new("fast", Script::Text(artifact(150))), 1);

        let outcome = Generator::new(chain, settings())
            .generate(&GenerationRequest::new("site"))
            .await
            .unwrap();
        assert_eq!(outcome.provider, "fast");
    }

    #[tokio::test]
    async fn fenced_response_is_normalized() {
        let inner = artifact(150);
        let raw = format!("Here you go:\n```html\n{}\n```\nEnjoy!", inner);
        let chain = ProviderChain::new().push(Scripted::new("a", Script::Text(raw)), 1);

        let outcome = Generator::new(chain, settings())
            .generate(&GenerationRequest::new("site"))
            .await
            .unwrap();
        assert_eq!(outcome.code, inner.trim());
    }

    #[tokio::test]
    async fn background_resolves_assets_and_persists() {
        let code = format!(
            "<section class=\"hero\"><!-- ANCHOR:primary-banner --><h1>Hi</h1></section>{}",
            artifact(120)
        );
        let chain = ProviderChain::new().push(Scripted::new("a", Script::Text(code)), 1);
        let store = Arc::new(MemoryVersionStore::new());

        let generator = Generator::new(chain, settings())
            .with_ledger(VersionLedger::new(store.clone()))
            .with_assets(Arc::new(PlaceholderAssets));

        let outcome = generator.generate(&GenerationRequest::new("site")).await.unwrap();
        let version = outcome.background.unwrap().await.unwrap().unwrap();

        assert_eq!(version.version_number, 1);
        assert_eq!(version.conversation_id, outcome.conversation_id);
        assert!(version.code.contains("placehold.co/1600x900"));
        assert!(!version.code.contains("ANCHOR:"));
        assert!(store.latest(&outcome.conversation_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn revision_targets_existing_conversation() {
        let store = Arc::new(MemoryVersionStore::new());
        let ledger = VersionLedger::new(store.clone());
        let first = ledger.append("conv-1", "<p>old site</p>").await.unwrap();

        let provider = Scripted::new("a", Script::Text(artifact(150)));
        let generator = Generator::new(ProviderChain::new().push(provider, 1), settings())
            .with_ledger(ledger);

        let request = GenerationRequest::new("make it blue").with_target(first.id.to_string());
        let outcome = generator.generate(&request).await.unwrap();
        assert_eq!(outcome.conversation_id, "conv-1");

        let version = outcome.background.unwrap().await.unwrap().unwrap();
        assert_eq!(version.version_number, 2);
    }

    #[tokio::test]
    async fn unknown_target_starts_conversation_with_that_id() {
        let store = Arc::new(MemoryVersionStore::new());
        let provider = Scripted::new("a", Script::Text(artifact(150)));
        let generator = Generator::new(ProviderChain::new().push(provider, 1), settings())
            .with_ledger(VersionLedger::new(store));

        let outcome = generator
            .generate(&GenerationRequest::new("x").with_target("fresh"))
            .await
            .unwrap();
        assert_eq!(outcome.conversation_id, "fresh");
    }

    #[test]
    fn preferred_provider_moves_to_front() {
        use crate::config::default_providers;
        let names: Vec<_> = order_descriptors(default_providers(), Some("anthropic"))
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["anthropic", "gemini", "openai"]);

        let unchanged: Vec<_> = order_descriptors(default_providers(), Some("missing"))
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(unchanged, vec!["gemini", "openai", "anthropic"]);
    }

    #[test]
    fn chain_skips_descriptors_without_keys() {
        let mut config = SiteConfig::default();
        config.providers = vec![
            ProviderDescriptor::new("nokey", crate::artifact::ProviderDialect::Openai, "gpt-4o", 10),
            ProviderDescriptor::new("keyed", crate::artifact::ProviderDialect::Gemini, "g", 10)
                .with_api_key("k"),
        ];
        let chain = ProviderChain::from_config(&config).unwrap();
        assert_eq!(chain.names(), vec!["keyed"]);

        config.providers.truncate(1);
        assert!(matches!(
            ProviderChain::from_config(&config),
            Err(SiteError::Config { .. })
        ));
    }
}
