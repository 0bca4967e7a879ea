//! Content sanitizer for provider-authored markup.
//!
//! Runs before every render. Five ordered textual passes:
//!
//! 1. strip HTML comments
//! 2. drop credential-shaped attributes and redact inline key/value secrets
//! 3. redact provider-key-shaped tokens
//! 4. neutralize navigation and egress to denied internal hosts
//! 5. redact sensitive environment-variable names
//!
//! Every pass is applied until the text stops changing, so re-running a pass
//! on its own output is a no-op. Nothing here parses HTML and nothing here
//! can fail: any string in, renderable text out.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::warn;

use crate::config::SanitizerConfig;

pub const REDACTED: &str = "[REDACTED]";
pub const REDACTED_TOKEN: &str = "[REDACTED_TOKEN]";
pub const REDACTED_ENV: &str = "[REDACTED_ENV]";
pub const INERT_HREF: &str = "#";

/// Hosts seen embedded in generated artifacts that must never be reachable
/// from a preview.
pub const DEFAULT_DENIED_HOSTS: &[&str] = &["internal-host"];

pub const SENSITIVE_ENV_NAMES: &[&str] = &[
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "GEMINI_API_KEY",
    "GOOGLE_API_KEY",
    "DATABASE_URL",
    "SUPABASE_URL",
    "SUPABASE_ANON_KEY",
    "SUPABASE_SERVICE_ROLE_KEY",
    "STRIPE_SECRET_KEY",
    "JWT_SECRET",
    "SESSION_SECRET",
    "NEXTAUTH_SECRET",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "CLOUDFLARE_API_TOKEN",
    "R2_SECRET_ACCESS_KEY",
    "HUBSPOT_ACCESS_TOKEN",
    "WHATSAPP_ACCESS_TOKEN",
    "TELEGRAM_BOT_TOKEN",
];

/// Upper bound on fixpoint rounds; real documents settle in one or two.
const MAX_SETTLE_ROUNDS: usize = 256;

static COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment regex"));

static CREDENTIAL_ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\s+data-(?:api-?key|token|secret|auth-token|access-token|client-secret|password)\s*=\s*(?:"[^"]*"|'[^']*'|\{(?:`[^`]*`|"[^"]*"|'[^']*'|\{[^{}]*\}|[^{}`"'])*\}|[^\s>]+)"#,
    )
    .expect("credential attribute regex")
});

static INLINE_SECRET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\b((?:api[_-]?key|apikey|secret(?:[_-]?key)?|client[_-]?secret|access[_-]?token|auth[_-]?token|token|password)["']?\s*[:=]\s*)("[^"\s]{8,}"|'[^'\s]{8,}'|`[^`\s]{8,}`)"#,
    )
    .expect("inline secret regex")
});

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:sk-(?:ant-|proj-|live-)?|sk_live_|sk_test_|rk_live_|AIza|gsk_|xai-|ghp_|gho_|github_pat_|hf_|glpat-|xox[abpr]-|AKIA)[A-Za-z0-9_\-]{16,}",
    )
    .expect("token regex")
});

static SCRIPT_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("script block regex"));

static URL_ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\b(href|src|action|formaction)\s*=\s*(?:"[^"]*"|'[^']*'|\{(?:`[^`]*`|"[^"]*"|'[^']*'|\{[^{}]*\}|[^{}`"'])*\}|[^\s>]+)"#,
    )
    .expect("url attribute regex")
});

/// The assigned value is one string literal, or a bare expression that stops
/// at any quote so it cannot run past an enclosing attribute.
static LOCATION_ASSIGN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)(?:\b(?:window|document|top|self|parent)\.)?\blocation(?:\.href)?\s*=\s*(?:"[^"\n]*"|'[^'\n]*'|`[^`]*`|[^;\n<>"'`]+)"#,
    )
    .expect("location assignment regex")
});

static NAV_CALL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:\b[A-Za-z_$][\w$]*\.open|\blocation\.(?:assign|replace)|\bnavigator\.sendBeacon)\s*\([^)]*\)",
    )
    .expect("navigation call regex")
});

static FETCH_CALL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bfetch\s*\([^)]*\)").expect("fetch call regex"));

static META_REFRESH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta\b[^>]*http-equiv\s*=\s*["']?refresh["']?[^>]*>"#)
        .expect("meta refresh regex")
});

static ENV_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("env name regex"));

static DEFAULT_SANITIZER: Lazy<Sanitizer> =
    Lazy::new(|| Sanitizer::new(&SanitizerConfig::default()));

/// Sanitize with the built-in rule set.
pub fn sanitize(code: &str) -> String {
    DEFAULT_SANITIZER.sanitize(code)
}

/// Apply `pass` until the text stops changing.
fn settle<F>(input: &str, pass: F) -> String
where
    F: Fn(&str) -> Cow<'_, str>,
{
    let mut current = input.to_string();
    for _ in 0..MAX_SETTLE_ROUNDS {
        let next = match pass(&current) {
            Cow::Borrowed(_) => None,
            Cow::Owned(next) => Some(next),
        };
        match next {
            Some(next) if next != current => current = next,
            _ => break,
        }
    }
    current
}

/// Compiled sanitizer rules. Stateless after construction, so a single
/// instance is shared across concurrent renders.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    denied_hosts: Vec<String>,
    env_re: Option<Regex>,
}

impl Default for Sanitizer {
    fn default() -> Self {
        DEFAULT_SANITIZER.clone()
    }
}

impl Sanitizer {
    pub fn new(config: &SanitizerConfig) -> Self {
        let denied_hosts = config
            .denied_hosts
            .iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();

        let names: Vec<String> = SENSITIVE_ENV_NAMES
            .iter()
            .map(|s| s.to_string())
            .chain(config.extra_env_names.iter().map(|s| s.trim().to_string()))
            .filter(|name| {
                let valid = ENV_NAME_RE.is_match(name);
                if !valid && !name.is_empty() {
                    warn!(name = %name, "ignoring invalid environment variable name");
                }
                valid
            })
            .map(|name| regex::escape(&name))
            .collect();

        let env_re = if names.is_empty() {
            None
        } else {
            let pattern = format!(
                r"(?:\bprocess\.env\.|\bimport\.meta\.env\.)?\b(?:{})\b",
                names.join("|")
            );
            match Regex::new(&pattern) {
                Ok(re) => Some(re),
                Err(err) => {
                    warn!(error = %err, "environment name redaction disabled");
                    None
                }
            }
        };

        Self {
            denied_hosts,
            env_re,
        }
    }

    /// Run all passes in order.
    pub fn sanitize(&self, code: &str) -> String {
        let out = self.strip_comments(code);
        let out = self.strip_credential_attributes(&out);
        let out = self.redact_tokens(&out);
        let out = self.neutralize_denied_hosts(&out);
        self.redact_env_names(&out)
    }

    /// Pass 1: providers sometimes echo secrets into comments.
    pub fn strip_comments(&self, code: &str) -> String {
        settle(code, |s| COMMENT_RE.replace_all(s, ""))
    }

    /// Pass 2: `data-api-key`-style attributes and `apiKey: "..."`-style literals.
    pub fn strip_credential_attributes(&self, code: &str) -> String {
        settle(code, |s| {
            let without_attrs = CREDENTIAL_ATTR_RE.replace_all(s, "");
            let redacted = INLINE_SECRET_RE
                .replace_all(&without_attrs, |caps: &Captures| {
                    // placeholders from earlier passes or runs stay as they are
                    if caps[2][1..].starts_with("[REDACTED") {
                        caps[0].to_string()
                    } else {
                        format!("{}\"{}\"", &caps[1], REDACTED)
                    }
                })
                .into_owned();
            if redacted == s {
                Cow::Borrowed(s)
            } else {
                Cow::Owned(redacted)
            }
        })
    }

    /// Pass 3: token-shaped literals become a visible placeholder, never
    /// silently deleted.
    pub fn redact_tokens(&self, code: &str) -> String {
        settle(code, |s| TOKEN_RE.replace_all(s, REDACTED_TOKEN))
    }

    /// Pass 4: scripts, URL attributes and navigation/egress calls that
    /// reference a denied host, plus any forced-refresh meta directive.
    pub fn neutralize_denied_hosts(&self, code: &str) -> String {
        settle(code, |s| {
            let out = META_REFRESH_RE.replace_all(s, "");
            if self.denied_hosts.is_empty() {
                return Cow::Owned(out.into_owned());
            }

            let out = SCRIPT_BLOCK_RE.replace_all(&out, |caps: &Captures| {
                if self.mentions_denied_host(&caps[0]) {
                    String::new()
                } else {
                    caps[0].to_string()
                }
            });

            let out = LOCATION_ASSIGN_RE.replace_all(&out, |caps: &Captures| {
                if self.mentions_denied_host(&caps[0]) {
                    "void 0".to_string()
                } else {
                    caps[0].to_string()
                }
            });

            let out = NAV_CALL_RE.replace_all(&out, |caps: &Captures| {
                if self.mentions_denied_host(&caps[0]) {
                    "void 0".to_string()
                } else {
                    caps[0].to_string()
                }
            });

            let out = FETCH_CALL_RE.replace_all(&out, |caps: &Captures| {
                if self.mentions_denied_host(&caps[0]) {
                    "Promise.reject(new Error(\"blocked\"))".to_string()
                } else {
                    caps[0].to_string()
                }
            });

            let out = URL_ATTR_RE.replace_all(&out, |caps: &Captures| {
                if self.mentions_denied_host(&caps[0]) {
                    format!("{}=\"{}\"", &caps[1], INERT_HREF)
                } else {
                    caps[0].to_string()
                }
            });

            Cow::Owned(out.into_owned())
        })
    }

    /// Pass 5: env names copied verbatim from server code.
    pub fn redact_env_names(&self, code: &str) -> String {
        let Some(re) = &self.env_re else {
            return code.to_string();
        };
        settle(code, |s| {
            re.replace_all(s, |caps: &Captures| {
                let m = &caps[0];
                if m.starts_with("process.") || m.starts_with("import.") {
                    format!("\"{}\"", REDACTED_ENV)
                } else {
                    REDACTED_ENV.to_string()
                }
            })
        })
    }

    fn mentions_denied_host(&self, span: &str) -> bool {
        let lower = span.to_ascii_lowercase();
        self.denied_hosts.iter().any(|host| lower.contains(host.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denied_host_href_becomes_inert_anchor() {
        let out = sanitize(r#"<a href="http://internal-host:3001/x">link</a>"#);
        assert_eq!(out, r##"<a href="#">link</a>"##);
    }

    #[test]
    fn other_hrefs_are_untouched() {
        let code = r#"<a href="https://example.com/menu">Menu</a>"#;
        assert_eq!(sanitize(code), code);
    }

    #[test]
    fn jsx_and_unquoted_attributes_are_rewritten() {
        let out = sanitize(r#"<img src={"http://INTERNAL-HOST/p.png"} /><form action=http://internal-host/f>"#);
        assert_eq!(out, r##"<img src="#" /><form action="#">"##);
    }

    #[test]
    fn script_block_with_denied_host_is_removed() {
        let code = "<p>a</p><script>fetch('http://internal-host:3001/leak')</script><script>ok()</script>";
        assert_eq!(sanitize(code), "<p>a</p><script>ok()</script>");
    }

    #[test]
    fn navigation_statements_become_noops() {
        let code = "onClick={() => { window.location.href = 'http://internal-host:3001/'; }}";
        assert_eq!(sanitize(code), "onClick={() => { void 0; }}");

        let code = "btn.onclick = () => window.open('http://internal-host/admin', '_blank');";
        assert_eq!(sanitize(code), "btn.onclick = () => void 0;");
    }

    #[test]
    fn inline_handler_navigation_keeps_surrounding_markup() {
        let code = r#"<button onclick="location.href='http://internal-host/x'">Go</button><p>after</p>"#;
        assert_eq!(
            sanitize(code),
            r#"<button onclick="void 0">Go</button><p>after</p>"#
        );

        let code = "location = base + '/x'; next();";
        assert_eq!(sanitize(code), code);
    }

    #[test]
    fn jsx_template_literal_href_is_replaced_whole() {
        let code = r#"<a href={`http://internal-host/${id}`}>Open</a>"#;
        assert_eq!(sanitize(code), r##"<a href="#">Open</a>"##);

        let kept = r#"<a href={`/items/${id}`} className="x">Item</a>"#;
        assert_eq!(sanitize(kept), kept);
    }

    #[test]
    fn fetch_outside_script_blocks_is_rejected() {
        let code = "useEffect(() => { fetch(`http://internal-host:3001/api`).then(r => r) }, [])";
        let out = sanitize(code);
        assert!(out.contains("Promise.reject(new Error(\"blocked\")).then"));
        assert!(!out.contains("internal-host"));
    }

    #[test]
    fn meta_refresh_is_stripped() {
        let code = r#"<head><meta http-equiv="refresh" content="0;url=https://evil.test"><title>t</title></head>"#;
        assert_eq!(sanitize(code), "<head><title>t</title></head>");
    }

    #[test]
    fn comments_are_stripped_even_when_nested_by_removal() {
        assert_eq!(sanitize("a<!-- key: sk-abc -->b"), "ab");
        assert_eq!(sanitize("<!<!---->-- hidden -->x"), "x");
    }

    #[test]
    fn credential_attributes_are_dropped() {
        let code = r#"<div data-api-key="abc123" data-token='t' class="x">y</div>"#;
        assert_eq!(sanitize(code), r#"<div class="x">y</div>"#);
    }

    #[test]
    fn inline_secrets_are_redacted_with_placeholder() {
        let code = r#"const config = { apiKey: "live_9f8e7d6c5b4a", title: "Bakery" };"#;
        assert_eq!(
            sanitize(code),
            r#"const config = { apiKey: "[REDACTED]", title: "Bakery" };"#
        );
    }

    #[test]
    fn short_form_values_are_left_alone() {
        let code = "const [password, setPassword] = useState('');";
        assert_eq!(sanitize(code), code);
    }

    #[test]
    fn provider_tokens_are_redacted_visibly() {
        let code = "const k = 'sk-proj-abcdefghijklmnopqrstuvwxyz012345'; const g = 'AIzaSyA1234567890abcdefghij';";
        let out = sanitize(code);
        assert_eq!(out.matches(REDACTED_TOKEN).count(), 2);
        assert!(!out.contains("sk-proj-"));
        assert!(!out.contains("AIzaSy"));
    }

    #[test]
    fn env_names_are_redacted() {
        let code = "const url = process.env.DATABASE_URL; // see OPENAI_API_KEY";
        assert_eq!(
            sanitize(code),
            "const url = \"[REDACTED_ENV]\"; // see [REDACTED_ENV]"
        );
    }

    #[test]
    fn custom_denied_hosts_and_env_names() {
        let sanitizer = Sanitizer::new(&SanitizerConfig {
            denied_hosts: vec!["crm.corp.local".to_string()],
            extra_env_names: vec!["MY_SECRET".to_string(), "not valid!".to_string()],
        });
        let out = sanitizer.sanitize(r#"<a href="https://crm.corp.local/x">x</a> MY_SECRET"#);
        assert_eq!(out, r##"<a href="#">x</a> [REDACTED_ENV]"##);

        // The default host is not denied by a custom list.
        let kept = r#"<a href="http://internal-host/x">x</a>"#;
        assert_eq!(sanitizer.sanitize(kept), kept);
    }

    #[test]
    fn each_pass_is_idempotent_on_a_realistic_document() {
        let doc = r#"<!DOCTYPE html><html><head><meta http-equiv='refresh' content='5'>
<!-- token: sk-ant-REDACTED --></head>
<body data-secret="x"><a href="http://internal-host:3001/x">go</a>
<script>const apiKey = "abcdefghijkl"; location = "http://internal-host/";</script>
<p>process.env.GEMINI_API_KEY</p></body></html>"#;
        let s = Sanitizer::default();
        let passes: [fn(&Sanitizer, &str) -> String; 5] = [
            Sanitizer::strip_comments,
            Sanitizer::strip_credential_attributes,
            Sanitizer::redact_tokens,
            Sanitizer::neutralize_denied_hosts,
            Sanitizer::redact_env_names,
        ];
        for pass in passes {
            let once = pass(&s, doc);
            assert_eq!(pass(&s, &once), once);
        }
        let full = s.sanitize(doc);
        assert!(!full.contains("internal-host"));
        assert!(!full.contains("sk-ant-"));
        assert!(!full.contains("GEMINI_API_KEY"));
    }

    #[test]
    fn full_sanitize_is_stable_across_runs() {
        let code = "const client = new OpenAI({ apiKey: process.env.OPENAI_API_KEY });";
        let once = sanitize(code);
        assert_eq!(once, "const client = new OpenAI({ apiKey: \"[REDACTED_ENV]\" });");
        assert_eq!(sanitize(&once), once);

        let token = "const token = 'sk-proj-abcdefghijklmnopqrstuvwxyz';";
        let once = sanitize(token);
        assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn sanitize_never_panics_on_odd_input() {
        for input in ["", "<", "<!--", "<script>", "href=", "\u{0}\u{FFFF}", "🚀<a href='🚀'>"] {
            let _ = sanitize(input);
        }
    }
}
