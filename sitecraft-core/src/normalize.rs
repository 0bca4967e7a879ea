//! Extract the runnable artifact from a free-form model response.
//!
//! Two stages: a fenced block wins outright; otherwise residual fence
//! markers are stripped and any chatter before the first line that looks
//! like the start of a document or module is dropped. Never fails.

use once_cell::sync::Lazy;
use regex::Regex;

/// Opening fence with an optional language hint, then the body up to the
/// next closing fence.
static FENCED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[^\n`]*\r?\n(.*?)```").expect("fenced block regex"));

static FENCE_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```[A-Za-z0-9_+#.\-]*").expect("fence marker regex"));

static ARTIFACT_START_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:import\s|export\s|<!doctype|<html\b|<head\b|<body\b|<main\b|<header\b|<nav\b|<section\b|<div\b|<script\b|<style\b|<svg\b|<template\b)",
    )
    .expect("artifact start regex")
});

/// Inner content of the first fenced block, if the response has one.
pub fn extract_fenced(raw: &str) -> Option<&str> {
    FENCED_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// Normalize a raw provider response into artifact source text.
///
/// Callers validate emptiness and minimum length themselves.
pub fn normalize(raw: &str) -> String {
    if let Some(inner) = extract_fenced(raw) {
        return inner.to_string();
    }

    let cleaned = FENCE_MARKER_RE.replace_all(raw, "");

    let mut offset = 0;
    for line in cleaned.split_inclusive('\n') {
        if ARTIFACT_START_RE.is_match(line) {
            return cleaned[offset..].trim().to_string();
        }
        offset += line.len();
    }

    cleaned.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_jsx_block_is_extracted() {
        let raw = "Here you go:\n```jsx\nimport X from 'y';\nexport default X;\n```";
        assert_eq!(normalize(raw), "import X from 'y';\nexport default X;");
    }

    #[test]
    fn fence_without_language_hint() {
        let raw = "```\n<html><body>hi</body></html>\n```\nHope this helps!";
        assert_eq!(normalize(raw), "<html><body>hi</body></html>");
    }

    #[test]
    fn first_fenced_block_wins() {
        let raw = "```html\n<p>one</p>\n```\ntext\n```css\nbody{}\n```";
        assert_eq!(normalize(raw), "<p>one</p>");
    }

    #[test]
    fn preamble_before_doctype_is_dropped() {
        let raw = "Sure! Below is the site.\n\n<!DOCTYPE html>\n<html></html>";
        assert_eq!(normalize(raw), "<!DOCTYPE html>\n<html></html>");
    }

    #[test]
    fn unclosed_fence_marker_is_stripped() {
        let raw = "Okay:\n```html\n<div class=\"hero\">Hi</div>";
        assert_eq!(normalize(raw), "<div class=\"hero\">Hi</div>");
    }

    #[test]
    fn plain_text_is_returned_trimmed() {
        assert_eq!(normalize("  just words  \n"), "just words");
    }

    #[test]
    fn empty_input_yields_empty_string() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("```"), "");
    }

    #[test]
    fn multibyte_preamble_keeps_char_boundaries() {
        let raw = "Voilà, le site 🚀\n<html lang=\"fr\"></html>";
        assert_eq!(normalize(raw), "<html lang=\"fr\"></html>");
    }
}
