use proptest::prelude::*;
use sitecraft_core::harness::{inject_harness, HARNESS_MARKER};
use sitecraft_core::normalize::normalize;
use sitecraft_core::sanitize::Sanitizer;

// Markup-ish fragments that exercise every sanitizer rule
fn arb_fragment() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("<!-- note -->".to_string()),
        Just("<!--".to_string()),
        Just("-->".to_string()),
        Just("<a href=\"http://internal-host:3001/x\">go</a>".to_string()),
        Just("<img src='//internal-host/p.png'>".to_string()),
        Just("<script>fetch('http://internal-host/api')</script>".to_string()),
        Just("window.location.href = 'http://internal-host';".to_string()),
        Just("window.open(\"https://internal-host/\")".to_string()),
        Just("<meta http-equiv=\"refresh\" content=\"0;url=/\">".to_string()),
        Just("<div data-api-key=\"abc123\" data-token='t'>".to_string()),
        Just("const apiKey = \"supersecretvalue\";".to_string()),
        Just("sk-abcdefghijklmnopqrstuvwxyz012345".to_string()),
        Just("process.env.OPENAI_API_KEY".to_string()),
        Just("DATABASE_URL".to_string()),
        Just("<section class=\"hero\">".to_string()),
        "[ -~]{0,40}",
        "\\PC{0,20}",
    ]
}

fn arb_document() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_fragment(), 0..24).prop_map(|parts| parts.join("\n"))
}

proptest! {
    /// Property: each pass is a no-op on its own output
    #[test]
    fn prop_each_pass_is_idempotent(doc in arb_document()) {
        let s = Sanitizer::default();
        let passes: [(&str, fn(&Sanitizer, &str) -> String); 5] = [
            ("comments", Sanitizer::strip_comments),
            ("credentials", Sanitizer::strip_credential_attributes),
            ("tokens", Sanitizer::redact_tokens),
            ("hosts", Sanitizer::neutralize_denied_hosts),
            ("env", Sanitizer::redact_env_names),
        ];
        for (name, pass) in passes {
            let once = pass(&s, &doc);
            let twice = pass(&s, &once);
            prop_assert_eq!(&once, &twice, "pass {} not idempotent", name);
        }
    }

    /// Property: sanitized output never carries the denied host in an href or a raw token
    #[test]
    fn prop_sanitize_removes_known_leaks(doc in arb_document()) {
        let once = Sanitizer::default().sanitize(&doc);
        prop_assert!(!once.contains("href=\"http://internal-host"));
        prop_assert!(!once.contains("sk-abcdefghijklmnopqrstuvwxyz012345"));
    }

    /// Property: sanitize is total over arbitrary text
    #[test]
    fn prop_sanitize_never_panics(text in "\\PC*") {
        let _ = Sanitizer::default().sanitize(&text);
    }

    /// Property: a fenced block is returned exactly, trimmed
    #[test]
    fn prop_fenced_content_is_extracted(
        preamble in "[a-zA-Z ,.!]{0,40}",
        lang in "[a-z]{0,6}",
        inner in "[^`]{1,200}",
        trailer in "[a-zA-Z ,.!]{0,40}",
    ) {
        let raw = format!("{}\n```{}\n{}\n```\n{}", preamble, lang, inner, trailer);
        prop_assert_eq!(normalize(&raw), inner.trim());
    }

    /// Property: harness injection adds exactly one harness and keeps the original text
    #[test]
    fn prop_harness_injected_once(doc in "[ -~]{0,200}") {
        prop_assume!(!doc.contains(HARNESS_MARKER));
        let out = inject_harness(&doc, "artifact");
        prop_assert_eq!(out.matches(HARNESS_MARKER).count(), 1);
        prop_assert_eq!(inject_harness(&out, "artifact"), out.clone());
        prop_assert!(out.len() > doc.len());
    }
}

#[test]
fn multibyte_documents_survive_every_stage() {
    let doc = "Voici 👋 le site\n<html><head></head><body><h1>你好世界 مرحبا</h1><!-- 🚀 --></body></html>";
    let normalized = normalize(doc);
    assert!(normalized.starts_with("<html>"));

    let sanitized = Sanitizer::default().sanitize(&normalized);
    assert!(sanitized.contains("你好世界 مرحبا"));
    assert!(!sanitized.contains("🚀"));

    let rendered = inject_harness(&sanitized, "ü-1");
    assert!(rendered.contains("你好世界"));
}
