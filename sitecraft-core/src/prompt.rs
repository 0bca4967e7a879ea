use crate::artifact::GenerationRequest;

/// Longest business context handed to the image collaborator, in chars.
pub const BUSINESS_CONTEXT_LIMIT: usize = 280;

pub const SYSTEM_INSTRUCTION: &str = "\
You are a senior web designer and front-end engineer. Produce ONE complete, \
self-contained website document for the request below.

Rules:
- Reply with a single fenced code block and nothing else.
- Use semantic HTML and style it with Tailwind CSS loaded from \
https://cdn.tailwindcss.com. No other external scripts.
- Do not include API keys, tokens, secrets, analytics or tracking code.
- Never link to internal or private hosts.
- Mark where images belong with these exact comments, each at most once:
  <!-- ANCHOR:primary-banner --> inside the hero section,
  <!-- ANCHOR:secondary-context --> inside the about or story section,
  <!-- ANCHOR:gallery-1 --> ... <!-- ANCHOR:gallery-12 --> inside gallery cards.
- Write realistic copy for the business; no lorem ipsum.
- Make the layout responsive down to small phones.";

/// Render the user prompt, with the previous version appended for revisions.
pub fn build_user_prompt(request: &GenerationRequest, previous_code: Option<&str>) -> String {
    let mut out = String::new();
    out.push_str("Request:\n");
    out.push_str(request.prompt.trim());
    out.push('\n');

    if let Some(profile) = request.profile.as_ref().filter(|p| !p.is_empty()) {
        out.push_str("\nBusiness profile:\n");
        if let Some(ref company) = profile.company {
            out.push_str(&format!("- Company: {}\n", company));
        }
        if let Some(ref sector) = profile.sector {
            out.push_str(&format!("- Sector: {}\n", sector));
        }
        if let Some(ref style) = profile.style {
            out.push_str(&format!("- Visual style: {}\n", style));
        }
        if !profile.features.is_empty() {
            out.push_str(&format!("- Features: {}\n", profile.features.join(", ")));
        }
    }

    if let Some(code) = previous_code {
        out.push_str(
            "\nRevise the current version below to satisfy the request. \
Keep everything the request does not ask to change, and return the full updated document.\n\n\
Current version:\n```html\n",
        );
        out.push_str(code);
        out.push_str("\n```\n");
    }

    out
}

/// Short description of the business for image prompts.
pub fn business_context(request: &GenerationRequest) -> String {
    let summary = request
        .profile
        .as_ref()
        .filter(|p| p.company.is_some() || p.sector.is_some())
        .map(|p| {
            let mut parts = Vec::new();
            if let Some(ref company) = p.company {
                parts.push(company.clone());
            }
            if let Some(ref sector) = p.sector {
                parts.push(format!("({})", sector));
            }
            if let Some(ref style) = p.style {
                parts.push(format!("style: {}", style));
            }
            parts.join(" ")
        })
        .unwrap_or_else(|| request.prompt.trim().to_string());

    truncate_chars(&summary, BUSINESS_CONTEXT_LIMIT)
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::BusinessProfile;

    #[test]
    fn profile_lines_are_rendered() {
        let request = GenerationRequest::new("  a site for my bakery ").with_profile(BusinessProfile {
            company: Some("Pain Doré".into()),
            sector: Some("bakery".into()),
            style: None,
            features: vec!["menu".into(), "contact form".into()],
        });
        let prompt = build_user_prompt(&request, None);
        assert!(prompt.starts_with("Request:\na site for my bakery\n"));
        assert!(prompt.contains("- Company: Pain Doré"));
        assert!(prompt.contains("- Features: menu, contact form"));
        assert!(!prompt.contains("Visual style"));
        assert!(!prompt.contains("Current version"));
    }

    #[test]
    fn revision_embeds_previous_code() {
        let request = GenerationRequest::new("make the header blue");
        let prompt = build_user_prompt(&request, Some("<html>old</html>"));
        assert!(prompt.contains("Current version:\n```html\n<html>old</html>\n```"));
    }

    #[test]
    fn context_prefers_profile() {
        let request = GenerationRequest::new("whatever").with_profile(BusinessProfile {
            company: Some("Acme".into()),
            sector: Some("plumbing".into()),
            ..Default::default()
        });
        assert_eq!(business_context(&request), "Acme (plumbing)");
    }

    #[test]
    fn context_falls_back_to_truncated_prompt() {
        let request = GenerationRequest::new("ü".repeat(400));
        let ctx = business_context(&request);
        assert_eq!(ctx.chars().count(), BUSINESS_CONTEXT_LIMIT);
    }

    #[test]
    fn instruction_names_every_anchor_kind() {
        for anchor in ["ANCHOR:primary-banner", "ANCHOR:secondary-context", "ANCHOR:gallery-1"] {
            assert!(SYSTEM_INSTRUCTION.contains(anchor));
        }
    }
}
