//! Language-model providers behind one uniform call shape.
//!
//! Every vendor is reduced to `ProviderCall -> raw text`. Any failure
//! (transport, non-2xx, malformed body, blank completion) surfaces as
//! `SiteError::ProviderFailure` so the orchestrator can move on.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::artifact::{ProviderDescriptor, ProviderDialect};
use crate::error::{Result, SiteError};

const OPENAI_BASE: &str = "https://api.openai.com/v1";
const ANTHROPIC_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com";

/// Upper bound on how much of an error body ends up in logs.
const ERROR_BODY_LIMIT: usize = 500;

/// One request to a provider, identical across vendors.
#[derive(Debug, Clone)]
pub struct ProviderCall {
    pub system_instruction: String,
    pub user_prompt: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

#[async_trait]
pub trait Provider: Send + Sync {
    /// Descriptor name, used in logs and errors.
    fn name(&self) -> &str;

    async fn complete(&self, call: &ProviderCall) -> Result<String>;
}

/// Build the HTTP provider for a descriptor.
pub fn build_provider(descriptor: &ProviderDescriptor, timeout: Duration) -> Result<Arc<dyn Provider>> {
    let client = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SiteError::provider(&descriptor.name, format!("client setup failed: {}", e)))?;

    let provider: Arc<dyn Provider> = match descriptor.dialect {
        ProviderDialect::Openai => Arc::new(OpenAiProvider::new(client, descriptor)),
        ProviderDialect::Anthropic => Arc::new(AnthropicProvider::new(client, descriptor)),
        ProviderDialect::Gemini => Arc::new(GeminiProvider::new(client, descriptor)),
    };
    Ok(provider)
}

/// Shared per-descriptor fields.
#[derive(Debug, Clone)]
struct Endpoint {
    name: String,
    model: String,
    api_key: String,
    base_url: String,
}

impl Endpoint {
    fn new(descriptor: &ProviderDescriptor, default_base: &str) -> Self {
        Self {
            name: descriptor.name.clone(),
            model: descriptor.model.clone(),
            api_key: descriptor.api_key.clone(),
            base_url: descriptor
                .base_url
                .clone()
                .unwrap_or_else(|| default_base.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    fn fail(&self, reason: impl Into<String>) -> SiteError {
        SiteError::provider(&self.name, reason)
    }

    async fn post(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request
            .send()
            .await
            .map_err(|e| self.fail(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(self.fail(format!(
                "HTTP {}: {}",
                status,
                truncate_body(&error_text, ERROR_BODY_LIMIT)
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| self.fail(format!("malformed response: {}", e)))
    }

    fn non_blank(&self, text: Option<String>) -> Result<String> {
        match text {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(self.fail("empty completion")),
        }
    }
}

/// Cut an error body at a char boundary so multibyte text never panics.
pub fn truncate_body(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

pub struct OpenAiProvider {
    client: Client,
    endpoint: Endpoint,
}

impl OpenAiProvider {
    pub fn new(client: Client, descriptor: &ProviderDescriptor) -> Self {
        Self {
            client,
            endpoint: Endpoint::new(descriptor, OPENAI_BASE),
        }
    }

    fn body(&self, call: &ProviderCall) -> Value {
        json!({
            "model": self.endpoint.model,
            "messages": [
                {"role": "system", "content": call.system_instruction},
                {"role": "user", "content": call.user_prompt},
            ],
            "max_tokens": call.max_output_tokens,
            "temperature": call.temperature,
        })
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.endpoint.name
    }

    async fn complete(&self, call: &ProviderCall) -> Result<String> {
        let url = format!("{}/chat/completions", self.endpoint.base_url);
        let request = self
            .client
            .post(&url)
            .bearer_auth(&self.endpoint.api_key)
            .json(&self.body(call));
        let value = self.endpoint.post(request).await?;
        self.endpoint.non_blank(openai_text(&value))
    }
}

fn openai_text(value: &Value) -> Option<String> {
    value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
}

pub struct AnthropicProvider {
    client: Client,
    endpoint: Endpoint,
}

impl AnthropicProvider {
    pub fn new(client: Client, descriptor: &ProviderDescriptor) -> Self {
        Self {
            client,
            endpoint: Endpoint::new(descriptor, ANTHROPIC_BASE),
        }
    }

    fn body(&self, call: &ProviderCall) -> Value {
        json!({
            "model": self.endpoint.model,
            "system": call.system_instruction,
            "messages": [{"role": "user", "content": call.user_prompt}],
            "max_tokens": call.max_output_tokens,
            "temperature": call.temperature,
        })
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.endpoint.name
    }

    async fn complete(&self, call: &ProviderCall) -> Result<String> {
        let url = format!("{}/v1/messages", self.endpoint.base_url);
        let request = self
            .client
            .post(&url)
            .header("x-api-key", &self.endpoint.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.body(call));
        let value = self.endpoint.post(request).await?;
        self.endpoint.non_blank(anthropic_text(&value))
    }
}

#[derive(Deserialize)]
struct AnthropicBlock {
    #[serde(default)]
    text: Option<String>,
}

fn anthropic_text(value: &Value) -> Option<String> {
    let blocks: Vec<AnthropicBlock> =
        serde_json::from_value(value.get("content")?.clone()).ok()?;
    let text: String = blocks.into_iter().filter_map(|b| b.text).collect();
    Some(text)
}

pub struct GeminiProvider {
    client: Client,
    endpoint: Endpoint,
}

impl GeminiProvider {
    pub fn new(client: Client, descriptor: &ProviderDescriptor) -> Self {
        Self {
            client,
            endpoint: Endpoint::new(descriptor, GEMINI_BASE),
        }
    }

    fn body(&self, call: &ProviderCall) -> Value {
        json!({
            "systemInstruction": {"parts": [{"text": call.system_instruction}]},
            "contents": [{"role": "user", "parts": [{"text": call.user_prompt}]}],
            "generationConfig": {
                "maxOutputTokens": call.max_output_tokens,
                "temperature": call.temperature,
            },
        })
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        &self.endpoint.name
    }

    async fn complete(&self, call: &ProviderCall) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint.base_url, self.endpoint.model
        );
        let request = self
            .client
            .post(&url)
            .query(&[("key", self.endpoint.api_key.as_str())])
            .json(&self.body(call));
        let value = self.endpoint.post(request).await?;
        self.endpoint.non_blank(gemini_text(&value))
    }
}

fn gemini_text(value: &Value) -> Option<String> {
    let parts = value.pointer("/candidates/0/content/parts")?.as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    Some(text)
}
