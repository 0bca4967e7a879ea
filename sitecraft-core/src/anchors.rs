//! Asset anchor resolution.
//!
//! Generated artifacts mark image placements with `ANCHOR:<slot>` tokens,
//! usually wrapped in an HTML or JSX comment. Each resolved asset is placed
//! at its exact marker when one exists, otherwise before the first element
//! a slot-specific heuristic recognizes. Assets that fit nowhere are dropped:
//! they are cosmetic and the artifact stays renderable without them.
//!
//! Resolution only inserts. Apart from the marker being replaced, existing
//! content is never removed or reordered.

use std::collections::BTreeSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use crate::artifact::{AssetSlot, ResolvedAsset};

/// Every marker form, with the slug captured in exactly one group.
static MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"<!--\s*ANCHOR:([a-z0-9-]+)\s*-->|\{\s*/\*\s*ANCHOR:([a-z0-9-]+)\s*\*/\s*\}|/\*\s*ANCHOR:([a-z0-9-]+)\s*\*/|ANCHOR:([a-z0-9-]+)",
    )
    .expect("anchor marker regex")
});

static JSX_HINT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)\bclassName\s*=|^\s*(?:import|export)\s").expect("jsx hint regex")
});

static BANNER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_patterns(&[
        r"(?i)<(?:section|div|header)\b[^>]*\bclass(?:name)?\s*=[^>]*?(?:hero|banner|jumbotron|masthead)[^>]*>",
        r"(?i)<header\b[^>]*>",
        r"(?i)<section\b[^>]*>",
    ])
});

static CONTEXT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_patterns(&[
        r"(?i)<(?:section|div)\b[^>]*\b(?:id|class(?:name)?)\s*=[^>]*?(?:about|story|mission|intro)[^>]*>",
        r"(?i)<(?:div|article)\b[^>]*\bclass(?:name)?\s*=[^>]*?(?:card|feature)[^>]*>",
    ])
});

static GALLERY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_patterns(&[
        r"(?i)<(?:div|section)\b[^>]*\b(?:id|class(?:name)?)\s*=[^>]*?(?:gallery|portfolio|showcase)[^>]*>",
        r"(?i)<div\b[^>]*\bclass(?:name)?\s*=[^>]*?\bgrid-cols-[2-9][^>]*>",
        r"(?i)<div\b[^>]*\bclass(?:name)?\s*=[^>]*?\bgrid\b[^>]*>",
    ])
});

fn compile_patterns(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("anchor heuristic regex"))
        .collect()
}

fn marker_slug<'a>(caps: &Captures<'a>) -> Option<&'a str> {
    (1..=4).find_map(|i| caps.get(i)).map(|m| m.as_str())
}

/// How an asset ended up in the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Exact,
    Heuristic,
    Dropped,
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Exact => "exact",
            Self::Heuristic => "heuristic",
            Self::Dropped => "dropped",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct AnchorReport {
    pub code: String,
    pub placements: Vec<(AssetSlot, Placement)>,
}

impl AnchorReport {
    pub fn placed(&self) -> usize {
        self.placements
            .iter()
            .filter(|(_, p)| *p != Placement::Dropped)
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Html,
    Jsx,
}

impl Dialect {
    fn detect(code: &str) -> Self {
        if JSX_HINT_RE.is_match(code) {
            Self::Jsx
        } else {
            Self::Html
        }
    }
}

/// Slots named by markers in the artifact, in slot order, deduplicated.
pub fn detect_slots(code: &str) -> Vec<AssetSlot> {
    let slots: BTreeSet<AssetSlot> = MARKER_RE
        .captures_iter(code)
        .filter_map(|caps| marker_slug(&caps).and_then(|slug| slug.parse().ok()))
        .collect();
    slots.into_iter().collect()
}

/// Insert every asset into the artifact.
pub fn resolve_anchors(code: &str, assets: &[ResolvedAsset]) -> String {
    resolve_anchors_with_report(code, assets).code
}

pub fn resolve_anchors_with_report(code: &str, assets: &[ResolvedAsset]) -> AnchorReport {
    let dialect = Dialect::detect(code);
    let mut current = code.to_string();
    let mut placements = Vec::with_capacity(assets.len());

    for asset in assets {
        let fragment = fragment_for(asset, dialect);

        let placement = if let Some(next) = place_exact(&current, asset.slot, &fragment) {
            current = next;
            Placement::Exact
        } else if let Some(next) = place_heuristic(&current, asset.slot, &fragment) {
            current = next;
            Placement::Heuristic
        } else {
            Placement::Dropped
        };

        debug!(slot = %asset.slot, placement = %placement, "anchor resolution");
        placements.push((asset.slot, placement));
    }

    AnchorReport {
        code: current,
        placements,
    }
}

/// Remove markers no asset claimed, so they never show up in a render.
pub fn strip_unresolved_anchors(code: &str) -> String {
    MARKER_RE.replace_all(code, "").into_owned()
}

/// Replace the first marker for `slot` with the fragment and drop any
/// duplicates of that marker.
fn place_exact(code: &str, slot: AssetSlot, fragment: &str) -> Option<String> {
    let slug = slot.slug();
    let mut found = false;

    let replaced = MARKER_RE.replace_all(code, |caps: &Captures| {
        if marker_slug(caps) != Some(slug.as_str()) {
            return caps[0].to_string();
        }
        if found {
            String::new()
        } else {
            found = true;
            fragment.to_string()
        }
    });

    found.then(|| replaced.into_owned())
}

fn place_heuristic(code: &str, slot: AssetSlot, fragment: &str) -> Option<String> {
    let patterns: &[Regex] = match slot {
        AssetSlot::PrimaryBanner => &*BANNER_PATTERNS,
        AssetSlot::SecondaryContext => &*CONTEXT_PATTERNS,
        AssetSlot::Gallery(_) => &*GALLERY_PATTERNS,
    };

    let start = patterns
        .iter()
        .find_map(|re| re.find(code))
        .map(|m| m.start())?;

    let mut out = String::with_capacity(code.len() + fragment.len());
    out.push_str(&code[..start]);
    out.push_str(fragment);
    out.push_str(&code[start..]);
    Some(out)
}

/// Percent-encode characters that could break out of an attribute or a
/// CSS `url('...')`.
fn attr_safe_url(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    for c in url.chars() {
        match c {
            '"' => out.push_str("%22"),
            '\'' => out.push_str("%27"),
            '<' => out.push_str("%3C"),
            '>' => out.push_str("%3E"),
            '(' => out.push_str("%28"),
            ')' => out.push_str("%29"),
            '\\' => out.push_str("%5C"),
            c if c.is_whitespace() => out.push_str("%20"),
            c => out.push(c),
        }
    }
    out
}

fn alt_text(slot: AssetSlot) -> String {
    match slot {
        AssetSlot::PrimaryBanner => "Banner image".to_string(),
        AssetSlot::SecondaryContext => "Supporting image".to_string(),
        AssetSlot::Gallery(n) => format!("Gallery image {}", n),
    }
}

fn fragment_for(asset: &ResolvedAsset, dialect: Dialect) -> String {
    let url = attr_safe_url(&asset.url);
    let slug = asset.slot.slug();

    match (asset.slot, dialect) {
        (AssetSlot::PrimaryBanner, Dialect::Html) => format!(
            r#"<div data-asset-slot="{slug}" aria-hidden="true" style="position:absolute;inset:0;z-index:0;background-image:url('{url}');background-size:cover;background-position:center"></div>"#
        ),
        (AssetSlot::PrimaryBanner, Dialect::Jsx) => format!(
            r#"<div data-asset-slot="{slug}" aria-hidden="true" style={{{{ position: 'absolute', inset: 0, zIndex: 0, backgroundImage: "url('{url}')", backgroundSize: 'cover', backgroundPosition: 'center' }}}} />"#
        ),
        (slot, Dialect::Html) => format!(
            r#"<img data-asset-slot="{slug}" src="{url}" alt="{alt}" loading="lazy" style="width:100%;height:auto;object-fit:cover;border-radius:0.75rem" />"#,
            alt = alt_text(slot)
        ),
        (slot, Dialect::Jsx) => format!(
            r#"<img data-asset-slot="{slug}" src="{url}" alt="{alt}" loading="lazy" style={{{{ width: '100%', height: 'auto', objectFit: 'cover', borderRadius: '0.75rem' }}}} />"#,
            alt = alt_text(slot)
        ),
    }
}
