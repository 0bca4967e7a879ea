//! Protective script injected into every preview before it reaches the sandbox.
//!
//! The script body lives in `guard.js`; this module decides where in the
//! document it goes and feeds it a small JSON config. Console blocking and
//! devtools heuristics in the script are obfuscation, not a security boundary:
//! the sandbox attribute on the rendering surface is what actually isolates
//! the artifact.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use crate::config::HarnessConfig;

const GUARD_SCRIPT: &str = include_str!("guard.js");
const CONFIG_PLACEHOLDER: &str = "/*__SITECRAFT_CONFIG__*/ {}";

/// Attribute carried by the injected script tag. Never used to skip
/// injection: artifact text is untrusted and may carry it too.
pub const HARNESS_MARKER: &str = "data-preview-harness";

static HEAD_OPEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<head\b[^>]*>").expect("head open regex"));
static HEAD_CLOSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</head\s*>").expect("head close regex"));
static BODY_OPEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<body\b").expect("body open regex"));

/// Where the harness block ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    AfterHeadOpen,
    BeforeHeadClose,
    SynthesizedHead,
    Prepended,
}

#[derive(Debug, Clone)]
pub struct HarnessOptions {
    pub watermark_text: String,
    pub allowed_script_hosts: Vec<String>,
    pub reassert_interval_ms: u64,
    pub mobile_breakpoint_px: u32,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self::from(&HarnessConfig::default())
    }
}

impl From<&HarnessConfig> for HarnessOptions {
    fn from(config: &HarnessConfig) -> Self {
        Self {
            watermark_text: config.watermark_text.clone(),
            allowed_script_hosts: config.allowed_script_hosts.clone(),
            reassert_interval_ms: config.reassert_interval_ms.max(100),
            mobile_breakpoint_px: config.mobile_breakpoint_px,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HarnessInjector {
    options: HarnessOptions,
}

impl HarnessInjector {
    pub fn new(options: HarnessOptions) -> Self {
        Self { options }
    }

    /// The complete `<script>` element for one artifact.
    pub fn harness_block(&self, artifact_id: &str) -> String {
        let config = json!({
            "artifactId": artifact_id,
            "watermark": self.options.watermark_text,
            "allowedScriptHosts": self.options.allowed_script_hosts,
            "reassertMs": self.options.reassert_interval_ms,
            "mobileBreakpoint": self.options.mobile_breakpoint_px,
        });
        let script = GUARD_SCRIPT.replacen(CONFIG_PLACEHOLDER, &script_safe_json(&config), 1);
        format!("<script {}>\n{}</script>", HARNESS_MARKER, script)
    }

    pub fn inject(&self, code: &str, artifact_id: &str) -> String {
        self.inject_with_position(code, artifact_id).0
    }

    /// Insert the harness as early in the document as structure allows.
    /// Always inserts; callers pass code that has not been wrapped yet.
    pub fn inject_with_position(&self, code: &str, artifact_id: &str) -> (String, Insertion) {
        let block = self.harness_block(artifact_id);

        if let Some(m) = HEAD_OPEN_RE.find(code) {
            return (splice(code, m.end(), &block), Insertion::AfterHeadOpen);
        }
        if let Some(m) = HEAD_CLOSE_RE.find(code) {
            return (splice(code, m.start(), &block), Insertion::BeforeHeadClose);
        }
        if let Some(m) = BODY_OPEN_RE.find(code) {
            let head = format!("<head>{}</head>", block);
            return (splice(code, m.start(), &head), Insertion::SynthesizedHead);
        }

        (format!("{}\n{}", block, code), Insertion::Prepended)
    }
}

/// Inject with default options.
pub fn inject_harness(code: &str, artifact_id: &str) -> String {
    HarnessInjector::default().inject(code, artifact_id)
}

fn splice(code: &str, at: usize, block: &str) -> String {
    let mut out = String::with_capacity(code.len() + block.len() + 2);
    out.push_str(&code[..at]);
    out.push('\n');
    out.push_str(block);
    out.push('\n');
    out.push_str(&code[at..]);
    out
}

/// JSON that cannot terminate the surrounding script element.
fn script_safe_json(value: &serde_json::Value) -> String {
    value
        .to_string()
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}
